//! Coalesces concurrent computations of the same key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use pharma_analytics_core::{AnalyticsError, AnalyticsResult, CancellationToken};
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

type Slot<T> = Arc<OnceCell<AnalyticsResult<Arc<T>>>>;

/// At most one computation per key runs at a time; concurrent callers for
/// that key await the same result.
///
/// A key is forgotten as soon as its computation finishes, so a later call
/// starts afresh. A cancelled computation is only its runner's outcome:
/// waiters whose own token is still live start a new one.
pub struct SingleFlight<T> {
    in_flight: Mutex<HashMap<String, Slot<T>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> SingleFlight<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a computation in progress.
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Runs `compute` unless a computation for `key` is already running, in
    /// which case its result is awaited instead.
    ///
    /// `compute` runs under the caller's own `cancel`, so it may be invoked
    /// again when a shared computation was cancelled by another caller.
    ///
    /// # Errors
    ///
    /// Returns the error produced by the computation, or `Cancelled` when
    /// `cancel` has fired.
    pub async fn run<F, Fut>(&self, key: &str, cancel: &CancellationToken, compute: F) -> AnalyticsResult<Arc<T>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AnalyticsResult<T>>,
    {
        loop {
            let slot = {
                let mut in_flight = self.in_flight.lock().await;
                if in_flight.contains_key(key) {
                    debug!(key, "Joining in-flight computation");
                }
                in_flight.entry(key.to_string()).or_default().clone()
            };

            let result = slot
                .get_or_init(|| async { compute().await.map(Arc::new) })
                .await
                .clone();

            {
                let mut in_flight = self.in_flight.lock().await;
                if in_flight.get(key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
                    in_flight.remove(key);
                }
            }

            match result {
                Err(AnalyticsError::Cancelled(_)) if !cancel.is_cancelled() => {
                    debug!(key, "Shared computation was cancelled, running again");
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn forgets_key_after_completion() {
        let flights = SingleFlight::new();
        let value = flights
            .run("k", &CancellationToken::none(), || async { Ok(7u32) })
            .await
            .unwrap();

        assert_eq!(*value, 7);
        assert_eq!(flights.in_flight().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_run() {
        let flights = Arc::new(SingleFlight::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let call = |flights: Arc<SingleFlight<usize>>, runs: Arc<AtomicUsize>| async move {
            flights
                .run("k", &CancellationToken::none(), || {
                    let runs = runs.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(runs.fetch_add(1, Ordering::SeqCst))
                    }
                })
                .await
        };

        let first = tokio::spawn(call(flights.clone(), runs.clone()));
        let second = tokio::spawn(call(flights.clone(), runs.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(flights.in_flight().await, 1);

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn live_waiter_reruns_a_cancelled_computation() {
        let flights = Arc::new(SingleFlight::<&'static str>::new());
        let leader_token = CancellationToken::new();

        let leader = {
            let flights = flights.clone();
            let token = leader_token.clone();
            tokio::spawn(async move {
                flights
                    .run("k", &token, || {
                        let token = token.clone();
                        async move {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            token.check()?;
                            Ok("leader")
                        }
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let follower = {
            let flights = flights.clone();
            tokio::spawn(async move {
                flights
                    .run("k", &CancellationToken::none(), || async { Ok("follower") })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader_token.cancel();

        assert!(matches!(leader.await.unwrap(), Err(AnalyticsError::Cancelled(_))));
        assert_eq!(*follower.await.unwrap().unwrap(), "follower");
        assert_eq!(flights.in_flight().await, 0);
    }
}
