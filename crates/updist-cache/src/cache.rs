use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::trace;

/// `None` when the computation panicked.
type Outcome<V, E> = Option<Result<V, E>>;

type Flight<V, E> = Shared<BoxFuture<'static, Outcome<V, E>>>;

enum Slot<V, E> {
    Ready {
        value:      V,
        expires_at: Instant,
    },
    Pending {
        flight: u64,
        future: Flight<V, E>,
        ttl:    Option<Duration>,
    },
}

/// String-keyed TTL cache whose misses are computed at most once at a time.
///
/// Concurrent [`compute_if_absent`](Cache::compute_if_absent) calls for the
/// same absent key share one computation and observe the same result. Errors
/// are handed to every waiter and never cached. [`delete`](Cache::delete)
/// during a computation wins: the result is returned to its waiters but not
/// stored. A computation that panics leaves nothing behind; its waiters panic
/// and the next call computes again.
pub struct Cache<V, E> {
    slots:       Mutex<HashMap<String, Slot<V, E>>>,
    default_ttl: Duration,
    flights:     AtomicU64,
}

impl<V, E> Cache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            default_ttl,
            flights: AtomicU64::new(0),
        }
    }

    pub fn default_ttl(&self) -> Duration { self.default_ttl }

    /// A live value, without waiting on a computation in flight.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut slots = self.slots.lock();
        match slots.get(key) {
            Some(Slot::Ready { value, expires_at }) if *expires_at > Instant::now() => {
                Some(value.clone())
            }
            Some(Slot::Ready { .. }) => {
                slots.remove(key);
                None
            }
            _ => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        self.slots
            .lock()
            .insert(key.into(), Slot::Ready { value, expires_at });
    }

    /// Return the cached value or run `compute`, sharing it with every
    /// concurrent caller of the same key. On success the value is kept for
    /// the `ttl` of the call that started the computation (or the default
    /// TTL); callers joining a computation in flight do not change it.
    pub async fn compute_if_absent<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (flight, future) = {
            let mut slots = self.slots.lock();
            match slots.get(key) {
                Some(Slot::Ready { value, expires_at }) if *expires_at > Instant::now() => {
                    return Ok(value.clone());
                }
                Some(Slot::Pending { flight, future, .. }) => {
                    trace!(key, "joining computation in flight");
                    (*flight, future.clone())
                }
                _ => {
                    let flight = self.flights.fetch_add(1, Ordering::Relaxed);
                    let future = AssertUnwindSafe(compute())
                        .catch_unwind()
                        .map(Result::ok)
                        .boxed()
                        .shared();
                    slots.insert(
                        key.to_string(),
                        Slot::Pending {
                            flight,
                            future: future.clone(),
                            ttl,
                        },
                    );
                    (flight, future)
                }
            }
        };

        let outcome = future.await;
        self.settle(key, flight, outcome.as_ref());
        match outcome {
            Some(result) => result,
            None => panic!("computation for cache key '{key}' panicked"),
        }
    }

    /// Replace the pending slot of `flight` with its outcome. Every waiter
    /// calls this; only the first one still finds the slot pending.
    fn settle(&self, key: &str, flight: u64, outcome: Option<&Result<V, E>>) {
        let mut slots = self.slots.lock();
        let ttl = match slots.get(key) {
            Some(Slot::Pending { flight: pending, ttl, .. }) if *pending == flight => *ttl,
            _ => return,
        };
        match outcome {
            Some(Ok(value)) => {
                let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
                slots.insert(
                    key.to_string(),
                    Slot::Ready {
                        value: value.clone(),
                        expires_at,
                    },
                );
            }
            Some(Err(_)) | None => {
                slots.remove(key);
            }
        }
    }

    /// Returns whether a value or computation was dropped.
    pub fn delete(&self, key: &str) -> bool { self.slots.lock().remove(key).is_some() }

    /// Delete every key yielded by `keys`; returns how many existed.
    pub fn delete_many<I, K>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut slots = self.slots.lock();
        keys.into_iter()
            .filter(|key| slots.remove(key.as_ref()).is_some())
            .count()
    }

    pub fn evict_all(&self) { self.slots.lock().clear(); }

    pub fn len(&self) -> usize { self.slots.lock().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}
