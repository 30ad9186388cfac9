//! Common test utilities for E2E testing with mocks.
//!
//! Builds the full router in-process with a mock acquisition pipeline and an
//! in-memory cache, so tests never need a browser, rclone, or a real server
//! socket.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use stashlink_core::{
    testing::MockPipeline, CacheConfig, Config, FetchConfig, Fetcher, PipelineConfig,
    ServerConfig, SqliteCacheStore,
};
use stashlink_server::api::create_router;
use stashlink_server::state::AppState;

/// Test fixture for E2E testing with mock dependencies.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock pipeline - script resolutions and failures
    pub pipeline: Arc<MockPipeline>,
    /// The cache backing the fetcher
    pub cache: Arc<SqliteCacheStore>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default config.
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(config: Config) -> Self {
        let pipeline = Arc::new(MockPipeline::new());
        let cache = Arc::new(SqliteCacheStore::in_memory().expect("Failed to create cache"));

        let fetcher = Arc::new(Fetcher::new(
            &config.fetch,
            &config.cache,
            Arc::clone(&cache) as Arc<dyn stashlink_core::CacheStore>,
            Arc::clone(&pipeline) as Arc<dyn stashlink_core::AcquisitionPipeline>,
        ));

        let state = Arc::new(AppState::new(config, fetcher));
        let router = create_router(state);

        Self {
            router,
            pipeline,
            cache,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// GET a path and return the raw body as a string (for /metrics).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&body_bytes).to_string())
    }
}

/// Default configuration for tests.
pub fn test_config() -> Config {
    Config {
        pipeline: PipelineConfig {
            url_template: "https://example.com/items/{id}".to_string(),
            automation_command: "true".to_string(),
            automation_args: vec![],
            automation_timeout_ms: 1_000,
            downloads_dir: PathBuf::from("downloads"),
            rclone_remote: "mega".to_string(),
            rclone_folder: "stashlink_cache".to_string(),
        },
        server: ServerConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0, // Not used for in-process testing
        },
        cache: CacheConfig {
            path: PathBuf::from(":memory:"),
            ttl_secs: 86_400,
        },
        fetch: FetchConfig {
            wait_timeout_secs: 5,
        },
    }
}
