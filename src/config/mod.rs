//! Runtime configuration for streaming step execution

pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ErrorCode, StreamError};
use crate::subprocess::streaming::{ParseOptions, StreamLimits};

pub use loader::{apply_env_overrides, load_config, CONFIG_FILE_NAME};

const MIN_LINE_BYTES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamingConfig {
    /// Minimum spacing between tool-activity lines on the display
    #[serde(with = "humantime_serde")]
    pub throttle_interval: Duration,
    pub max_line_bytes: usize,
    /// Time allowed between SIGTERM and SIGKILL
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,
    /// Zero disables heartbeats
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub step_timeout: Option<Duration>,
    pub claude_binary: String,
    pub text_preview_chars: usize,
    pub command_display_chars: usize,
    pub stderr_tail_bytes: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            throttle_interval: Duration::from_secs(1),
            max_line_bytes: 10 * 1024 * 1024,
            grace_period: Duration::from_secs(3),
            heartbeat_interval: Duration::ZERO,
            step_timeout: None,
            claude_binary: "claude".to_string(),
            text_preview_chars: 200,
            command_display_chars: 60,
            stderr_tail_bytes: 64 * 1024,
        }
    }
}

impl StreamingConfig {
    /// Reject values that would break streaming
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_line_bytes < MIN_LINE_BYTES {
            return Err(ConfigError::invalid(
                "max_line_bytes",
                self.max_line_bytes.to_string(),
                format!("must be at least {}", MIN_LINE_BYTES),
            ));
        }
        if self.claude_binary.trim().is_empty() {
            return Err(ConfigError::invalid(
                "claude_binary",
                self.claude_binary.clone(),
                "must not be empty",
            ));
        }
        if self.text_preview_chars == 0 {
            return Err(ConfigError::invalid(
                "text_preview_chars",
                "0",
                "must be greater than zero",
            ));
        }
        if self.command_display_chars == 0 {
            return Err(ConfigError::invalid(
                "command_display_chars",
                "0",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn stream_limits(&self) -> StreamLimits {
        StreamLimits {
            parse: ParseOptions {
                max_line_bytes: self.max_line_bytes,
                text_preview_chars: self.text_preview_chars,
                command_display_chars: self.command_display_chars,
            },
            grace_period: self.grace_period,
            stderr_tail_bytes: self.stderr_tail_bytes,
        }
    }

    pub fn heartbeat(&self) -> Option<Duration> {
        (!self.heartbeat_interval.is_zero()).then_some(self.heartbeat_interval)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    fn path(&self) -> Option<PathBuf> {
        match self {
            ConfigError::NotFound(path)
            | ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. } => Some(path.clone()),
            ConfigError::InvalidValue { .. } => None,
        }
    }
}

impl From<ConfigError> for StreamError {
    fn from(err: ConfigError) -> Self {
        let code = match &err {
            ConfigError::NotFound(_) => ErrorCode::CONFIG_NOT_FOUND,
            ConfigError::Read { .. } => ErrorCode::CONFIG_GENERIC,
            ConfigError::Parse { .. } => ErrorCode::CONFIG_PARSE_ERROR,
            ConfigError::InvalidValue { .. } => ErrorCode::CONFIG_INVALID_VALUE,
        };
        let path = err.path();
        StreamError::config_with_code(code, err.to_string(), path).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = StreamingConfig::default();
        assert_eq!(config.throttle_interval, Duration::from_secs(1));
        assert_eq!(config.max_line_bytes, 10 * 1024 * 1024);
        assert_eq!(config.grace_period, Duration::from_secs(3));
        assert_eq!(config.heartbeat(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml_keeps_defaults() {
        let config: StreamingConfig = toml::from_str(
            r#"
throttle_interval = "250ms"
step_timeout = "10m"
claude_binary = "/opt/claude"
"#,
        )
        .unwrap();
        assert_eq!(config.throttle_interval, Duration::from_millis(250));
        assert_eq!(config.step_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.claude_binary, "/opt/claude");
        assert_eq!(config.grace_period, Duration::from_secs(3));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = toml::from_str::<StreamingConfig>("throttle = \"1s\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_tiny_line_limit() {
        let config = StreamingConfig {
            max_line_bytes: 10,
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "max_line_bytes"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_stream_limits_mapping() {
        let config = StreamingConfig {
            max_line_bytes: 4096,
            command_display_chars: 40,
            grace_period: Duration::from_secs(1),
            ..Default::default()
        };
        let limits = config.stream_limits();
        assert_eq!(limits.parse.max_line_bytes, 4096);
        assert_eq!(limits.parse.command_display_chars, 40);
        assert_eq!(limits.grace_period, Duration::from_secs(1));
    }

    #[test]
    fn test_config_error_maps_to_stream_error_code() {
        let err: StreamError = ConfigError::invalid("grace_period", "soon", "not a duration").into();
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_VALUE);
        assert_eq!(err.exit_code(), 2);
    }
}
