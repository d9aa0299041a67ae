use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8001";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RECENTER_DELAY: Duration = Duration::from_millis(100);

const ENV_BACKEND_URL: &str = "RECON_BACKEND_URL";
const ENV_REQUEST_TIMEOUT: &str = "RECON_REQUEST_TIMEOUT_SECS";
const ENV_RECENTER_DELAY: &str = "RECON_RECENTER_DELAY_MS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must not be empty")]
    Empty { key: &'static str },
    #[error("{key}={value} is not a valid number")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key}={value} must start with http:// or https://")]
    InvalidUrl { key: &'static str, value: String },
}

/// Runtime settings for the editor. Defaults point at a backend on localhost.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    pub backend_url: String,
    pub request_timeout: Duration,
    /// Delay between a finished scene load and the camera recenter it triggers.
    pub recenter_delay: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            recenter_delay: DEFAULT_RECENTER_DELAY,
        }
    }
}

impl EditorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_BACKEND_URL) {
            config.backend_url = parse_url(ENV_BACKEND_URL, &value)?;
        }
        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT) {
            config.request_timeout = Duration::from_secs(parse_number(ENV_REQUEST_TIMEOUT, &value)?);
        }
        if let Some(value) = lookup(ENV_RECENTER_DELAY) {
            config.recenter_delay = Duration::from_millis(parse_number(ENV_RECENTER_DELAY, &value)?);
        }

        Ok(config)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.backend_url, path.trim_start_matches('/'))
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::Empty { key });
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidUrl {
            key,
            value: value.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty { key });
    }
    trimmed.parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: value.to_string(),
    })
}
