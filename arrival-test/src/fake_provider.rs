//! A scriptable [`ProviderPlugin`] for tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use arrival_core::error::ProviderError;
use arrival_core::provider::{FetchContext, FetchOutcome, ProviderPlugin};
use async_trait::async_trait;
use smol_str::SmolStr;

enum ScriptEntry {
    Ok(serde_json::Value, u64),
    Err,
}

/// A provider whose `fetch` responses are scripted in advance.
///
/// Calling [`FakeProvider::fetch`] pops the next scripted entry off the
/// front of the queue; once the queue is empty it keeps returning a
/// default success response with a null payload, so tests that don't care
/// about the exact payload don't need to script every call.
pub struct FakeProvider {
    provider_id: SmolStr,
    supported_types: HashSet<SmolStr>,
    script: Mutex<VecDeque<ScriptEntry>>,
    default_ttl_seconds: u64,
    call_count: AtomicUsize,
}

impl FakeProvider {
    /// Creates a provider supporting the given subscription types, with an
    /// empty response script.
    pub fn new<I, S>(provider_id: &str, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        FakeProvider {
            provider_id: SmolStr::new(provider_id),
            supported_types: types.into_iter().map(|t| SmolStr::new(t.as_ref())).collect(),
            script: Mutex::new(VecDeque::new()),
            default_ttl_seconds: 15,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Queues a successful fetch response.
    pub fn with_fetch_ok(self, payload: serde_json::Value, ttl_seconds: u64) -> Self {
        self.script.lock().unwrap().push_back(ScriptEntry::Ok(payload, ttl_seconds));
        self
    }

    /// Queues a failing fetch response.
    pub fn with_fetch_err(self) -> Self {
        self.script.lock().unwrap().push_back(ScriptEntry::Err);
        self
    }

    /// Number of times `fetch` has been called so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderPlugin for FakeProvider {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn supports(&self, type_: &str) -> bool {
        self.supported_types.contains(type_)
    }

    async fn fetch(&self, _ctx: &FetchContext) -> Result<FetchOutcome, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(ScriptEntry::Ok(payload, ttl_seconds)) => Ok(FetchOutcome { payload, ttl_seconds }),
            Some(ScriptEntry::Err) => Err(ProviderError::Fetch(Box::new(std::io::Error::other(
                "fake provider scripted failure",
            )))),
            None => Ok(FetchOutcome {
                payload: serde_json::Value::Null,
                ttl_seconds: self.default_ttl_seconds,
            }),
        }
    }
}
