use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use super::{ConfigError, StreamingConfig};

pub const CONFIG_FILE_NAME: &str = "stepstream.toml";

const ENV_THROTTLE_INTERVAL: &str = "STEPSTREAM_THROTTLE_INTERVAL";
const ENV_MAX_LINE_BYTES: &str = "STEPSTREAM_MAX_LINE_BYTES";
const ENV_GRACE_PERIOD: &str = "STEPSTREAM_GRACE_PERIOD";
const ENV_HEARTBEAT_INTERVAL: &str = "STEPSTREAM_HEARTBEAT_INTERVAL";
const ENV_CLAUDE_BINARY: &str = "STEPSTREAM_CLAUDE_BINARY";

/// Load configuration from an explicit path, the working directory, or defaults
///
/// An explicit path must exist. Environment overrides are applied last and the
/// result is validated.
pub async fn load_config(explicit: Option<&Path>) -> Result<StreamingConfig, ConfigError> {
    let mut config = match explicit {
        Some(path) => {
            if !fs::try_exists(path).await.unwrap_or(false) {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            read_config_file(path).await?
        }
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if fs::try_exists(&local).await.unwrap_or(false) {
                read_config_file(&local).await?
            } else {
                tracing::debug!("No {} found; using defaults", CONFIG_FILE_NAME);
                StreamingConfig::default()
            }
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

async fn read_config_file(path: &Path) -> Result<StreamingConfig, ConfigError> {
    tracing::debug!("Loading configuration from {}", path.display());
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `STEPSTREAM_*` overrides using `lookup` to read variables
pub fn apply_env_overrides<F>(config: &mut StreamingConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_THROTTLE_INTERVAL) {
        config.throttle_interval = parse_duration_var(ENV_THROTTLE_INTERVAL, &value)?;
    }

    if let Some(value) = lookup(ENV_MAX_LINE_BYTES) {
        config.max_line_bytes = value.trim().parse().map_err(|_| {
            ConfigError::invalid(ENV_MAX_LINE_BYTES, value.clone(), "expected a byte count")
        })?;
    }

    if let Some(value) = lookup(ENV_GRACE_PERIOD) {
        config.grace_period = parse_duration_var(ENV_GRACE_PERIOD, &value)?;
    }

    if let Some(value) = lookup(ENV_HEARTBEAT_INTERVAL) {
        config.heartbeat_interval = parse_duration_var(ENV_HEARTBEAT_INTERVAL, &value)?;
    }

    if let Some(value) = lookup(ENV_CLAUDE_BINARY) {
        config.claude_binary = value;
    }

    Ok(())
}

fn parse_duration_var(key: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime_serde::re::humantime::parse_duration(value.trim())
        .map_err(|e| ConfigError::invalid(key, value, e.to_string()))
}
