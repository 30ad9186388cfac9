//! Per-key deduplication of expensive concurrent work.
//!
//! The first caller for a key becomes the initiator: its work future is moved
//! into a spawned task so a caller-side cancellation never aborts the shared
//! run. Everyone else attaches to the pending outcome and receives an
//! identical clone when it lands. Registration and removal are short critical
//! sections on the registry map; the work itself always runs outside the lock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::watch;
use tracing::debug;

/// One pending run, shared by all callers of its key.
struct Flight<T> {
    rx: watch::Receiver<Option<T>>,
    subscribers: usize,
    started_at: Instant,
}

/// Snapshot of one in-flight key, for status endpoints.
#[derive(Debug, Clone)]
pub struct FlightInfo {
    pub key: String,
    /// Callers waiting on this run beyond the initiator.
    pub subscribers: usize,
    pub elapsed_ms: u64,
}

/// Coordinates at most one concurrent run per key.
pub struct Singleflight<T> {
    flights: Arc<Mutex<HashMap<String, Flight<T>>>>,
}

impl<T> Default for Singleflight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Singleflight<T> {
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of keys with a run in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().unwrap().len()
    }

    /// Whether a run is in flight for the given key.
    pub fn contains(&self, key: &str) -> bool {
        self.flights.lock().unwrap().contains_key(key)
    }

    /// Snapshot of all in-flight runs.
    pub fn flights(&self) -> Vec<FlightInfo> {
        let flights = self.flights.lock().unwrap();
        flights
            .iter()
            .map(|(key, flight)| FlightInfo {
                key: key.clone(),
                subscribers: flight.subscribers,
                elapsed_ms: flight.started_at.elapsed().as_millis() as u64,
            })
            .collect()
    }
}

impl<T> Singleflight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run `work` for `key`, or wait on the run already in flight for it.
    ///
    /// Returns `None` only if the initiating task died without publishing an
    /// outcome (a panic inside `work`).
    pub async fn run<F>(&self, key: &str, work: F) -> Option<T>
    where
        F: Future<Output = T> + Send + 'static,
    {
        // Check-and-register is one critical section: no window exists where
        // two callers both believe they are the initiator for the same key.
        let mut rx = {
            let mut flights = self.flights.lock().unwrap();
            match flights.get_mut(key) {
                Some(flight) => {
                    flight.subscribers += 1;
                    crate::metrics::SINGLEFLIGHT_SHARED_TOTAL.inc();
                    debug!(key = %key, subscribers = flight.subscribers, "Joining in-flight run");
                    flight.rx.clone()
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    flights.insert(
                        key.to_string(),
                        Flight {
                            rx: rx.clone(),
                            subscribers: 0,
                            started_at: Instant::now(),
                        },
                    );

                    let flights_handle = Arc::clone(&self.flights);
                    let key_owned = key.to_string();
                    tokio::spawn(async move {
                        // The work runs in its own task so a panic in it still
                        // lets this one deregister the flight.
                        if let Ok(outcome) = tokio::spawn(work).await {
                            // Publish before deregistering: late joiners
                            // between the two steps still observe the
                            // finished outcome.
                            let _ = tx.send(Some(outcome));
                        }
                        flights_handle.lock().unwrap().remove(&key_owned);
                    });

                    rx
                }
            }
        };

        loop {
            if let Some(outcome) = rx.borrow().clone() {
                return Some(outcome);
            }
            if rx.changed().await.is_err() {
                // Sender dropped without a value: the work task panicked.
                return None;
            }
        }
    }
}
