//! Mock implementations for testing.
//!
//! These mocks let tests drive the orchestrator without a browser, rclone, or
//! a real cache database.

mod mock_cache;
mod mock_pipeline;

pub use mock_cache::MockCacheStore;
pub use mock_pipeline::MockPipeline;
