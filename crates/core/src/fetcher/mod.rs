//! Fetch orchestrator.
//!
//! The public entrypoint of the core: resolve an item id to a durable link,
//! serving from the cache when possible and driving exactly one acquisition
//! per id otherwise. Concurrent callers for the same id wait on the shared
//! run through the singleflight coordinator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::{CacheConfig, FetchConfig};
use crate::metrics;
use crate::pipeline::{AcquisitionPipeline, PipelineError};
use crate::singleflight::{FlightInfo, Singleflight};

/// Errors surfaced by `fetch`.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Item id must not be empty")]
    InvalidInput,

    #[error("Timed out waiting for acquisition")]
    Timeout,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FetchError {
    /// Metric label for this error.
    pub fn metric_label(&self) -> &'static str {
        match self {
            FetchError::InvalidInput => "invalid_input",
            FetchError::Timeout => "timeout",
            FetchError::Pipeline(_) => "pipeline_failure",
            FetchError::Internal(_) => "internal",
        }
    }
}

/// A successfully resolved link.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FetchOutcome {
    pub id: String,
    pub url: String,
    /// Whether the link came straight from the cache.
    pub cached: bool,
}

/// Point-in-time view of the orchestrator, for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct FetcherStatus {
    pub in_flight: usize,
    pub flights: Vec<FlightStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlightStatus {
    pub item_id: String,
    pub subscribers: usize,
    pub elapsed_ms: u64,
}

impl From<FlightInfo> for FlightStatus {
    fn from(info: FlightInfo) -> Self {
        Self {
            item_id: info.key,
            subscribers: info.subscribers,
            elapsed_ms: info.elapsed_ms,
        }
    }
}

/// The fetch orchestrator.
pub struct Fetcher {
    cache: Arc<dyn CacheStore>,
    pipeline: Arc<dyn AcquisitionPipeline>,
    singleflight: Singleflight<Result<String, PipelineError>>,
    wait_timeout: Duration,
    cache_ttl: Option<Duration>,
}

impl Fetcher {
    pub fn new(
        fetch_config: &FetchConfig,
        cache_config: &CacheConfig,
        cache: Arc<dyn CacheStore>,
        pipeline: Arc<dyn AcquisitionPipeline>,
    ) -> Self {
        Self {
            cache,
            pipeline,
            singleflight: Singleflight::new(),
            wait_timeout: fetch_config.wait_timeout(),
            cache_ttl: cache_config.ttl(),
        }
    }

    /// Resolve an item id to a durable link.
    pub async fn fetch(&self, item_id: &str) -> Result<FetchOutcome, FetchError> {
        let started = Instant::now();
        let result = self.fetch_inner(item_id).await;

        metrics::FETCH_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
        let label = match &result {
            Ok(outcome) if outcome.cached => "hit",
            Ok(_) => "resolved",
            Err(e) => e.metric_label(),
        };
        metrics::FETCH_REQUESTS_TOTAL.with_label_values(&[label]).inc();

        result
    }

    async fn fetch_inner(&self, item_id: &str) -> Result<FetchOutcome, FetchError> {
        if item_id.is_empty() {
            return Err(FetchError::InvalidInput);
        }

        // Fast path: serve straight from the cache. A read error degrades to
        // a miss so an unavailable store never blocks resolution.
        match self.cache.get(item_id).await {
            Ok(Some(link)) => {
                metrics::CACHE_HITS_TOTAL.inc();
                debug!(item_id = %item_id, "Cache hit");
                return Ok(FetchOutcome {
                    id: item_id.to_string(),
                    url: link,
                    cached: true,
                });
            }
            Ok(None) => {
                metrics::CACHE_MISSES_TOTAL.inc();
            }
            Err(e) => {
                metrics::CACHE_MISSES_TOTAL.inc();
                warn!(item_id = %item_id, error = %e, "Cache read failed, treating as miss");
            }
        }

        let work = {
            let cache = Arc::clone(&self.cache);
            let pipeline = Arc::clone(&self.pipeline);
            let ttl = self.cache_ttl;
            let id = item_id.to_string();
            async move {
                metrics::ACQUISITIONS_IN_FLIGHT.inc();
                let result = pipeline.acquire(&id).await;
                metrics::ACQUISITIONS_IN_FLIGHT.dec();

                match &result {
                    Ok(link) => {
                        metrics::PIPELINE_RUNS_TOTAL
                            .with_label_values(&["resolved"])
                            .inc();
                        // Write-then-respond: the entry lands before any
                        // caller sees the link, so the next fetch is a hit.
                        // A failed write is a warning, not a failure.
                        if let Err(e) = cache.set(&id, link, ttl).await {
                            warn!(item_id = %id, error = %e, "Failed to persist resolved link");
                        }
                    }
                    Err(e) => {
                        metrics::PIPELINE_RUNS_TOTAL
                            .with_label_values(&[e.kind()])
                            .inc();
                    }
                }

                result
            }
        };

        // The wait is bounded, the acquisition is not: timing out here leaves
        // the run going for other subscribers and the eventual cache write.
        let outcome = match timeout(self.wait_timeout, self.singleflight.run(item_id, work)).await
        {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                return Err(FetchError::Internal(
                    "Acquisition task aborted before producing a result".to_string(),
                ))
            }
            Err(_) => {
                info!(item_id = %item_id, "Gave up waiting for acquisition");
                return Err(FetchError::Timeout);
            }
        };

        match outcome {
            Ok(link) => Ok(FetchOutcome {
                id: item_id.to_string(),
                url: link,
                cached: false,
            }),
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "Acquisition failed");
                Err(FetchError::Pipeline(e))
            }
        }
    }

    /// Current orchestrator status.
    pub fn status(&self) -> FetcherStatus {
        FetcherStatus {
            in_flight: self.singleflight.in_flight(),
            flights: self
                .singleflight
                .flights()
                .into_iter()
                .map(FlightStatus::from)
                .collect(),
        }
    }
}
