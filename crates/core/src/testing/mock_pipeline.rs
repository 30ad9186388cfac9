//! Mock acquisition pipeline for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::pipeline::{AcquisitionPipeline, PipelineError};

/// Mock implementation of the `AcquisitionPipeline` trait.
///
/// Provides controllable behavior for testing:
/// - Scripted links or errors per item id
/// - Invocation counting for single-flight assertions
/// - Artificial delay to hold acquisitions open
pub struct MockPipeline {
    links: Mutex<HashMap<String, String>>,
    errors: Mutex<HashMap<String, PipelineError>>,
    delay: Mutex<Option<Duration>>,
    acquires: AtomicUsize,
}

impl Default for MockPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPipeline {
    pub fn new() -> Self {
        Self {
            links: Mutex::new(HashMap::new()),
            errors: Mutex::new(HashMap::new()),
            delay: Mutex::new(None),
            acquires: AtomicUsize::new(0),
        }
    }

    /// Script a successful resolution for an item id.
    pub fn set_link(&self, item_id: &str, link: &str) {
        self.links
            .lock()
            .unwrap()
            .insert(item_id.to_string(), link.to_string());
    }

    /// Script a failure for an item id.
    pub fn set_error(&self, item_id: &str, error: PipelineError) {
        self.errors
            .lock()
            .unwrap()
            .insert(item_id.to_string(), error);
    }

    /// Remove a scripted failure.
    pub fn clear_error(&self, item_id: &str) {
        self.errors.lock().unwrap().remove(item_id);
    }

    /// Delay every acquisition by the given duration.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Number of `acquire` calls so far.
    pub fn acquire_count(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcquisitionPipeline for MockPipeline {
    fn name(&self) -> &str {
        "mock"
    }

    async fn acquire(&self, item_id: &str) -> Result<String, PipelineError> {
        self.acquires.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.errors.lock().unwrap().get(item_id) {
            return Err(error.clone());
        }

        match self.links.lock().unwrap().get(item_id) {
            Some(link) => Ok(link.clone()),
            None => Err(PipelineError::NotFound(format!(
                "No scripted result for {}",
                item_id
            ))),
        }
    }
}
