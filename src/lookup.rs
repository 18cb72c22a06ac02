//! Debounced postcode lookup. Each new call supersedes the previous one; a
//! superseded call resolves to `None` whether it was overtaken while
//! waiting out the delay or while its request was in flight.
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::api::model::LookupAddress;
use crate::api::BoardingApi;
use crate::error::ApiError;
use crate::validate::is_valid_uk_postcode;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);
pub const NO_ADDRESSES_MESSAGE: &str = "No addresses found for this postcode.";

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Invalidate whatever call is pending or in flight.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Wait out the delay, then run `f` unless a newer call arrived.
    pub async fn run<F, Fut, T>(&self, f: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if !self.is_current(generation) {
            return None;
        }
        let out = f().await;
        if !self.is_current(generation) {
            debug!(generation, "discarding stale result");
            return None;
        }
        Some(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    pub addresses: Vec<LookupAddress>,
    /// Inline message to show instead of a result list.
    pub message: Option<String>,
}

impl LookupResult {
    fn empty() -> Self {
        Self {
            addresses: Vec::new(),
            message: None,
        }
    }
}

pub struct AddressLookup<A> {
    api: A,
    debouncer: Debouncer,
}

impl<A: BoardingApi> AddressLookup<A> {
    pub fn new(api: A, delay: Duration) -> Self {
        Self {
            api,
            debouncer: Debouncer::new(delay),
        }
    }

    /// `Ok(None)` means a newer lookup superseded this one.
    pub async fn lookup(&self, postcode: &str) -> Result<Option<LookupResult>, ApiError> {
        let postcode = postcode.trim().to_string();
        if !is_valid_uk_postcode(&postcode) {
            self.debouncer.cancel();
            return Ok(Some(LookupResult::empty()));
        }
        let outcome = self
            .debouncer
            .run(|| self.api.address_lookup(&postcode))
            .await
            .transpose()?;
        Ok(outcome.map(|addresses| {
            let message = addresses
                .is_empty()
                .then(|| NO_ADDRESSES_MESSAGE.to_string());
            LookupResult { addresses, message }
        }))
    }

    pub fn cancel(&self) {
        self.debouncer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn later_call_supersedes_pending_one() {
        let debouncer = Debouncer::new(Duration::from_millis(400));
        let calls = Arc::new(AtomicUsize::new(0));
        let first = {
            let calls = calls.clone();
            debouncer.run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                "first"
            })
        };
        let second = {
            let calls = calls.clone();
            let d = debouncer.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                d.run(move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    "second"
                })
                .await
            }
        };
        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, None);
        assert_eq!(b, Some("second"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_result_is_discarded_after_cancel() {
        let debouncer = Debouncer::new(Duration::from_millis(400));
        let d = debouncer.clone();
        let slow = debouncer.run(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            42
        });
        let cancel = async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            d.cancel();
        };
        let (out, ()) = tokio::join!(slow, cancel);
        assert_eq!(out, None);
    }

    #[tokio::test(start_paused = true)]
    async fn lone_call_runs_after_delay() {
        let debouncer = Debouncer::default();
        let start = tokio::time::Instant::now();
        let out = debouncer.run(|| async { 7 }).await;
        assert_eq!(out, Some(7));
        assert!(start.elapsed() >= DEFAULT_DEBOUNCE);
    }
}
