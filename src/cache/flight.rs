//! Single-flight coalescing of concurrent identical misses.

use super::key::CacheKey;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;

/// In-flight call map keyed by [`CacheKey`].
///
/// The first caller for a key runs the operation; callers arriving while it is
/// running wait and receive its outcome, success or failure. Errors are handed out
/// behind an [`Arc`] since one failure answers every waiter.
pub struct SingleFlight<T, E> {
    calls: Mutex<HashMap<CacheKey, Arc<Flight<T, E>>>>,
}

type Flight<T, E> = OnceCell<Result<T, Arc<E>>>;

impl<T: Clone, E> SingleFlight<T, E> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<Flight<T, E>>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` for `key` unless an identical call is already in flight.
    ///
    /// Returns the outcome and whether this caller executed `op`.
    pub async fn run<F, Fut>(&self, key: &CacheKey, op: F) -> (Result<T, Arc<E>>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cell = {
            let mut calls = self.lock();
            calls
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let mut executed = false;
        let outcome = cell
            .get_or_init(|| {
                executed = true;
                async move { op().await.map_err(Arc::new) }
            })
            .await
            .clone();

        if executed {
            let mut calls = self.lock();
            if calls.get(key).map_or(false, |current| Arc::ptr_eq(current, &cell)) {
                calls.remove(key);
            }
        }

        (outcome, executed)
    }

    /// Number of keys with a call currently in flight.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }
}

impl<T: Clone, E> Default for SingleFlight<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
