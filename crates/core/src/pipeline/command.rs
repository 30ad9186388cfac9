//! Subprocess-backed acquisition pipeline.
//!
//! Drives a headless-browser automation command against the templated target
//! URL, then pushes the resulting artifact to durable storage with rclone and
//! returns the shareable link.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;

use super::{AcquisitionPipeline, PipelineError};

static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

/// Acquisition pipeline backed by external commands.
pub struct CommandPipeline {
    config: PipelineConfig,
    http: reqwest::Client,
}

impl CommandPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Render the target page URL for an item id.
    fn target_url(&self, item_id: &str) -> String {
        self.config
            .url_template
            .replace("{id}", &urlencoding::encode(item_id))
    }

    /// Run the automation command and return the artifact it reports on stdout
    /// (a local path or a direct URL).
    async fn run_automation(&self, target_url: &str) -> Result<String, PipelineError> {
        debug!(url = %target_url, "Running browser automation");

        let mut cmd = Command::new(&self.config.automation_command);
        cmd.args(&self.config.automation_args)
            .arg(target_url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            PipelineError::Unknown(format!(
                "Failed to spawn {}: {}",
                self.config.automation_command, e
            ))
        })?;

        let output = match timeout(self.config.automation_timeout(), child.wait_with_output()).await
        {
            Ok(result) => result.map_err(|e| {
                PipelineError::Unknown(format!("Automation command failed to run: {}", e))
            })?,
            Err(_) => {
                // kill_on_drop reaps the child when the future is dropped.
                return Err(PipelineError::AutomationTimeout(format!(
                    "No result within {}ms",
                    self.config.automation_timeout_ms
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_automation_failure(stderr.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last() {
            Some(artifact) => Ok(artifact.to_string()),
            None => Err(PipelineError::Unknown(
                "Automation produced no artifact path or URL".to_string(),
            )),
        }
    }

    /// Download a direct URL reported by the automation step into the
    /// downloads directory.
    async fn fetch_direct(&self, url: &str, item_id: &str) -> Result<PathBuf, PipelineError> {
        debug!(url = %url, "Automation reported a direct URL, downloading");

        let response = self.http.get(url).send().await.map_err(|e| {
            PipelineError::Unknown(format!("Direct download request failed: {}", e))
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(PipelineError::NotFound(format!(
                "Direct download returned 404 for {}",
                url
            )));
        }
        if !response.status().is_success() {
            return Err(PipelineError::Unknown(format!(
                "Direct download returned HTTP {}",
                response.status()
            )));
        }

        let filename = url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("artifact");
        let local_path = self.config.downloads_dir.join(format!(
            "{}-{}-{}",
            sanitize_for_filename(item_id),
            chrono::Utc::now().timestamp(),
            filename
        ));

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Unknown(format!("Direct download read failed: {}", e)))?;
        tokio::fs::write(&local_path, &bytes)
            .await
            .map_err(|e| PipelineError::Unknown(format!("Failed to write artifact: {}", e)))?;

        Ok(local_path)
    }

    /// Upload a local artifact with rclone and return the shareable link.
    async fn upload(&self, local_path: &Path) -> Result<String, PipelineError> {
        let filename = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                PipelineError::UploadFailed(format!(
                    "Artifact path has no usable filename: {}",
                    local_path.display()
                ))
            })?;

        let remote_target = format!(
            "{}:{}/{}",
            self.config.rclone_remote,
            self.config.rclone_folder.trim_end_matches('/'),
            filename
        );

        debug!(target = %remote_target, "Uploading artifact with rclone");

        let copy = Command::new("rclone")
            .arg("copyto")
            .arg(local_path)
            .arg(&remote_target)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PipelineError::UploadFailed(format!("Failed to run rclone: {}", e)))?;

        if !copy.status.success() {
            return Err(PipelineError::UploadFailed(format!(
                "rclone copyto failed: {}",
                String::from_utf8_lossy(&copy.stderr).trim()
            )));
        }

        let link = Command::new("rclone")
            .arg("link")
            .arg(&remote_target)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PipelineError::UploadFailed(format!("Failed to run rclone: {}", e)))?;

        if !link.status.success() {
            return Err(PipelineError::UploadFailed(format!(
                "rclone link failed: {}",
                String::from_utf8_lossy(&link.stderr).trim()
            )));
        }

        parse_link_output(&String::from_utf8_lossy(&link.stdout))
    }
}

/// Map an automation failure to a pipeline error from its stderr.
fn classify_automation_failure(stderr: &str) -> PipelineError {
    let lower = stderr.to_lowercase();
    if lower.contains("not found") || lower.contains("404") {
        PipelineError::NotFound(stderr.to_string())
    } else if lower.contains("timeout") || lower.contains("timed out") {
        PipelineError::AutomationTimeout(stderr.to_string())
    } else {
        PipelineError::Unknown(format!("Automation failed: {}", stderr))
    }
}

/// Extract the shareable link from rclone link output.
fn parse_link_output(stdout: &str) -> Result<String, PipelineError> {
    LINK_RE
        .find(stdout)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            PipelineError::UploadFailed(format!(
                "rclone link produced no URL: {}",
                stdout.trim()
            ))
        })
}

/// Keep item ids filesystem-safe when used in artifact names.
fn sanitize_for_filename(item_id: &str) -> String {
    item_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait::async_trait]
impl AcquisitionPipeline for CommandPipeline {
    fn name(&self) -> &str {
        "command"
    }

    async fn acquire(&self, item_id: &str) -> Result<String, PipelineError> {
        tokio::fs::create_dir_all(&self.config.downloads_dir)
            .await
            .map_err(|e| {
                PipelineError::Unknown(format!("Failed to create downloads dir: {}", e))
            })?;

        let target_url = self.target_url(item_id);
        info!(item_id = %item_id, url = %target_url, "Starting acquisition");

        let artifact = self.run_automation(&target_url).await?;

        let local_path = if artifact.starts_with("http://") || artifact.starts_with("https://") {
            self.fetch_direct(&artifact, item_id).await?
        } else {
            let path = PathBuf::from(&artifact);
            if !path.exists() {
                return Err(PipelineError::Unknown(format!(
                    "Automation reported missing artifact: {}",
                    artifact
                )));
            }
            path
        };

        // The local artifact is removed whether or not the upload succeeded.
        let upload_result = self.upload(&local_path).await;

        if let Err(e) = tokio::fs::remove_file(&local_path).await {
            warn!(path = %local_path.display(), error = %e, "Failed to remove local artifact");
        }

        let link = upload_result?;

        info!(item_id = %item_id, link = %link, "Acquisition complete");
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn test_config(command: &str, args: Vec<String>) -> PipelineConfig {
        PipelineConfig {
            url_template: "https://example.com/item/{id}".to_string(),
            automation_command: command.to_string(),
            automation_args: args,
            automation_timeout_ms: 2_000,
            downloads_dir: std::env::temp_dir(),
            rclone_remote: "mega".to_string(),
            rclone_folder: "stashlink_cache".to_string(),
        }
    }

    #[test]
    fn test_target_url_substitutes_and_encodes() {
        let pipeline = CommandPipeline::new(test_config("true", vec![]));
        assert_eq!(
            pipeline.target_url("abc123"),
            "https://example.com/item/abc123"
        );
        assert_eq!(
            pipeline.target_url("a b/c"),
            "https://example.com/item/a%20b%2Fc"
        );
    }

    #[test]
    fn test_parse_link_output_extracts_url() {
        let link = parse_link_output("https://mega.nz/file/abc#key\n").unwrap();
        assert_eq!(link, "https://mega.nz/file/abc#key");

        let link = parse_link_output("NOTICE: created link\nhttp://share.example/x\n").unwrap();
        assert_eq!(link, "http://share.example/x");
    }

    #[test]
    fn test_parse_link_output_no_url_fails() {
        let err = parse_link_output("nothing here").unwrap_err();
        assert!(matches!(err, PipelineError::UploadFailed(_)));
    }

    #[test]
    fn test_classify_automation_failure() {
        assert!(matches!(
            classify_automation_failure("download control not found on page"),
            PipelineError::NotFound(_)
        ));
        assert!(matches!(
            classify_automation_failure("page load timed out"),
            PipelineError::AutomationTimeout(_)
        ));
        assert!(matches!(
            classify_automation_failure("segfault"),
            PipelineError::Unknown(_)
        ));
    }

    #[test]
    fn test_sanitize_for_filename() {
        assert_eq!(sanitize_for_filename("abc-123_x"), "abc-123_x");
        assert_eq!(sanitize_for_filename("a/b c"), "a_b_c");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_acquire_maps_not_found_stderr() {
        let pipeline = CommandPipeline::new(test_config(
            "/bin/sh",
            vec!["-c".to_string(), "echo 'control not found' >&2; exit 1".to_string()],
        ));
        let err = pipeline.acquire("some-id").await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_acquire_times_out_slow_automation() {
        let mut config = test_config(
            "/bin/sh",
            vec!["-c".to_string(), "sleep 10".to_string()],
        );
        config.automation_timeout_ms = 50;
        let pipeline = CommandPipeline::new(config);
        let err = pipeline.acquire("some-id").await.unwrap_err();
        assert!(matches!(err, PipelineError::AutomationTimeout(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_failure_removes_local_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("artifact.bin");
        std::fs::write(&artifact, b"data").unwrap();

        // The automation reports a real artifact; rclone then fails (no such
        // remote in the test environment).
        let pipeline = CommandPipeline::new(test_config(
            "/bin/sh",
            vec!["-c".to_string(), format!("echo {}", artifact.display())],
        ));
        let err = pipeline.acquire("some-id").await.unwrap_err();
        assert!(matches!(err, PipelineError::UploadFailed(_)));
        assert!(!artifact.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_acquire_rejects_missing_artifact() {
        let pipeline = CommandPipeline::new(test_config(
            "/bin/sh",
            vec![
                "-c".to_string(),
                "echo /definitely/not/a/real/path".to_string(),
            ],
        ));
        let err = pipeline.acquire("some-id").await.unwrap_err();
        assert!(matches!(err, PipelineError::Unknown(_)));
    }
}
