use std::collections::HashMap;
use std::env;
use std::fs;
use std::time::Duration;

use crate::error::ClientError;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `KEY=VALUE` pairs from an optional config file, with the process
/// environment as fallback.
#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    /// Reads `CONFIG_FILE` if set; an unreadable file is an error.
    pub fn load() -> Result<Self, ClientError> {
        match env::var("CONFIG_FILE") {
            Ok(path) => Self::from_file(&path),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &str) -> Result<Self, ClientError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("cannot read {}: {}", path, e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ClientError> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ClientError::Config(format!(
                    "invalid config line {}: {}",
                    idx + 1,
                    line
                )));
            };
            values.insert(key.trim().to_string(), unquote(value.trim()).to_string());
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| env::var(key).ok())
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Typed client settings resolved from an [`AppConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub backend_url: String,
    pub request_timeout: Option<Duration>,
    pub log_level: String,
}

impl ClientSettings {
    pub fn resolve(config: &AppConfig) -> Result<Self, ClientError> {
        let backend_url = config
            .get("BACKEND_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        let request_timeout = match config.get("REQUEST_TIMEOUT_SECS") {
            Some(raw) if !raw.trim().is_empty() => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    ClientError::Config(format!("REQUEST_TIMEOUT_SECS is not a number: {}", raw))
                })?;
                if secs == 0 {
                    return Err(ClientError::Config(
                        "REQUEST_TIMEOUT_SECS must be positive".to_string(),
                    ));
                }
                Some(Duration::from_secs(secs))
            }
            _ => None,
        };

        let log_level = config
            .get("LOG_LEVEL")
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Self {
            backend_url,
            request_timeout,
            log_level,
        })
    }
}
