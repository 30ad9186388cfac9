use super::{types::Config, ConfigError};

/// Validate configuration beyond what deserialization enforces.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if !config.pipeline.url_template.contains("{id}") {
        return Err(ConfigError::ValidationError(
            "pipeline.url_template must contain an {id} placeholder".to_string(),
        ));
    }

    if config.pipeline.automation_command.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "pipeline.automation_command must not be empty".to_string(),
        ));
    }

    if config.pipeline.rclone_remote.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "pipeline.rclone_remote must not be empty".to_string(),
        ));
    }

    if config.fetch.wait_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "fetch.wait_timeout_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}
