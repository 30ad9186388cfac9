//! Acquisition pipeline abstraction.
//!
//! This module provides an `AcquisitionPipeline` trait for turning an item id
//! into a durable link, and a production implementation that shells out to a
//! browser-automation command and rclone.

mod command;

use async_trait::async_trait;
use thiserror::Error;

pub use command::CommandPipeline;

/// Classified acquisition failures.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Browser automation timed out: {0}")]
    AutomationTimeout(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Acquisition failed: {0}")]
    Unknown(String),
}

impl PipelineError {
    /// Short kind tag for API responses and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NotFound(_) => "not_found",
            PipelineError::AutomationTimeout(_) => "automation_timeout",
            PipelineError::UploadFailed(_) => "upload_failed",
            PipelineError::Unknown(_) => "unknown",
        }
    }
}

/// Trait for acquisition pipeline backends.
///
/// `acquire` is slow (seconds) and fallible. Single concurrent invocation per
/// item id is guaranteed by the singleflight coordinator, not by
/// implementations.
#[async_trait]
pub trait AcquisitionPipeline: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Resolve an item id to a durable link.
    async fn acquire(&self, item_id: &str) -> Result<String, PipelineError>;
}
