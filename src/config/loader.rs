//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::EndpointEntry;

    #[test]
    fn parses_full_and_shorthand_endpoints() {
        let config = parse_config(
            r#"
            mount_path = "/api/proxy"

            [listener]
            bind_address = "127.0.0.1:7007"

            [endpoints]
            "/simple" = "http://localhost:3000"

            [endpoints."/full"]
            target = "http://localhost:4000/base"
            credentials = "dangerously-allow-unauthenticated"
            allowed_methods = ["GET", "POST"]

            [[endpoints."/full".headers]]
            name = "x-api-key"
            action = "override"
            value = "secret"

            [[auth.static_tokens]]
            token = "test-token"
            subject = "test-subject"
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoints.len(), 2);
        let simple = config.endpoints["/simple"].to_endpoint();
        assert_eq!(simple.target, "http://localhost:3000");
        assert_eq!(simple.credentials, "require");

        match &config.endpoints["/full"] {
            EndpointEntry::Full(full) => {
                assert_eq!(full.credentials, "dangerously-allow-unauthenticated");
                assert_eq!(full.headers.len(), 1);
                assert_eq!(full.headers[0].value.as_deref(), Some("secret"));
            }
            other => panic!("expected full endpoint, got {:?}", other),
        }
        assert_eq!(config.auth.static_tokens[0].subject, "test-subject");
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.mount_path, "/api/proxy");
        assert!(config.endpoints.is_empty());
        assert_eq!(config.timeouts.header_secs, 30);
    }

    #[test]
    fn reports_every_validation_error() {
        let err = parse_config(
            r#"
            [endpoints]
            "/relative" = "not-a-url"
            "/bad/" = "http://localhost:3000"

            [endpoints."/policy"]
            target = "http://localhost:3000"
            credentials = "maybe"
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation error, got {}", other),
        }
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        let err = parse_config("endpoints = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here/proxy.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn sample_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("proxy.toml");
        let config = load_config(&path).unwrap();
        assert_eq!(config.endpoints.len(), 3);
        assert_eq!(config.auth.static_tokens.len(), 1);
    }
}
