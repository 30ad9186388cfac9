pub mod cache;
pub mod config;
pub mod fetcher;
pub mod metrics;
pub mod pipeline;
pub mod singleflight;
pub mod testing;

pub use cache::{CacheEntry, CacheStore, SqliteCacheStore, StoreError};
pub use config::{
    load_config, load_config_from_str, validate_config, CacheConfig, Config, ConfigError,
    FetchConfig, PipelineConfig, SanitizedConfig, ServerConfig,
};
pub use fetcher::{FetchError, FetchOutcome, Fetcher, FetcherStatus};
pub use pipeline::{AcquisitionPipeline, CommandPipeline, PipelineError};
pub use singleflight::Singleflight;
