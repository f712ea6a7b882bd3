//! In-flight call coalescing.
//!
//! A [`SingleFlight`] is owned by whatever wants its calls deduplicated (each
//! lock object owns a few). While a call for key `K` is running, further calls
//! with the same key attach to it and receive a clone of its output, error
//! included. Once the call settles its entry is dropped, so the next call with
//! that key runs again from scratch.
//!
//! ```
//! use rwlockfile::SingleFlight;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let flights: SingleFlight<&str, u32> = SingleFlight::new();
//! let (a, b) = tokio::join!(
//!     flights.run("answer", || async { 42 }),
//!     flights.run("answer", || async { unreachable!("joins the first call") }),
//! );
//! assert_eq!((a, b), (42, 42));
//! # }
//! ```

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

type Flight<T> = Shared<BoxFuture<'static, T>>;

struct Flights<K, T> {
    next_id: u64,
    active: HashMap<K, (u64, Flight<T>)>,
}

/// Coalesces concurrent calls that share a key.
pub struct SingleFlight<K = (), T = ()> {
    flights: Mutex<Flights<K, T>>,
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Mutex::new(Flights {
                next_id: 0,
                active: HashMap::new(),
            }),
        }
    }

    /// Run `f` for `key`, or join the call already running for it.
    ///
    /// `f` is only invoked when no call for `key` is in flight.
    pub async fn run<F, Fut>(&self, key: K, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (id, flight) = {
            let mut flights = self.lock();
            match flights.active.get(&key) {
                Some((id, flight)) => (*id, flight.clone()),
                None => {
                    let id = flights.next_id;
                    flights.next_id += 1;
                    let flight = f().boxed().shared();
                    flights.active.insert(key.clone(), (id, flight.clone()));
                    (id, flight)
                }
            }
        };

        let output = flight.await;

        // Only the flight we joined may be cleared; a newer one keeps its slot.
        let mut flights = self.lock();
        if flights
            .active
            .get(&key)
            .is_some_and(|(current, _)| *current == id)
        {
            flights.active.remove(&key);
        }
        output
    }

    /// Whether a call for `key` is currently running.
    pub fn in_flight(&self, key: &K) -> bool {
        self.lock().active.contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, Flights<K, T>> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> SingleFlight<(), T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run `f` under the single shared key.
    pub async fn call<F, Fut>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.run((), f).await
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> fmt::Debug for SingleFlight<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self
            .flights
            .lock()
            .map(|flights| flights.active.len())
            .unwrap_or_default();
        f.debug_struct("SingleFlight")
            .field("active", &active)
            .finish()
    }
}
