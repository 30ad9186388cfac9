use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Env keys nest on double underscores so multi-word fields stay reachable:
/// `STASHLINK_PIPELINE__URL_TEMPLATE` maps to `pipeline.url_template`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("STASHLINK_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[pipeline]
url_template = "https://example.com/item/{id}"
automation_command = "fetch-page"

[server]
port = 9000
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_load_config_from_str_missing_pipeline() {
        let toml = r#"
[server]
port = 8080
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_env_overrides_nested_fields() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
[pipeline]
url_template = "https://example.com/item/{id}"
automation_command = "fetch-page"
"#,
            )?;
            jail.set_env("STASHLINK_PIPELINE__URL_TEMPLATE", "https://env.example/{id}");
            jail.set_env("STASHLINK_PIPELINE__AUTOMATION_TIMEOUT_MS", "5000");
            jail.set_env("STASHLINK_CACHE__TTL_SECS", "60");
            jail.set_env("STASHLINK_FETCH__WAIT_TIMEOUT_SECS", "7");
            jail.set_env("STASHLINK_SERVER__PORT", "9999");

            let config = load_config(Path::new("config.toml")).unwrap();
            assert_eq!(config.pipeline.url_template, "https://env.example/{id}");
            assert_eq!(config.pipeline.automation_timeout_ms, 5_000);
            assert_eq!(config.cache.ttl_secs, 60);
            assert_eq!(config.fetch.wait_timeout_secs, 7);
            assert_eq!(config.server.port, 9999);
            Ok(())
        });
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[pipeline]
url_template = "https://example.com/item/{{id}}"
automation_command = "fetch-page"

[server]
host = "127.0.0.1"
port = 3000
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.pipeline.url_template, "https://example.com/item/{id}");
    }
}
