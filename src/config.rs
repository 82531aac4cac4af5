use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Labscore";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "medgemma";
pub const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_FINGERPRINT_SALT: &str = "labscore";

/// Short admission window: 10 requests per minute.
pub const DEFAULT_SHORT_WINDOW: WindowConfig = WindowConfig {
    window_secs: 60,
    limit: 10,
};
/// Long admission window: 100 requests per hour.
pub const DEFAULT_LONG_WINDOW: WindowConfig = WindowConfig {
    window_secs: 3600,
    limit: 100,
};

/// Cooldown reported when the quota store cannot be reached.
pub const FAIL_CLOSED_RETRY_AFTER_SECS: u64 = 60;

/// Documents above this size never reach the inference service (10 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;
/// Transcripts shorter than this are treated as image-only scans.
pub const DEFAULT_MIN_TRANSCRIPT_CHARS: usize = 50;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Cannot determine home directory; set LABSCORE_DB_PATH")]
    NoHomeDir,
}

/// One admission quota: at most `limit` requests per `window_secs` bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub window_secs: u64,
    pub limit: u32,
}

/// Runtime configuration, read from `LABSCORE_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub ollama_url: String,
    pub model: String,
    pub inference_timeout_secs: u64,
    pub fingerprint_salt: String,
    pub short_window: WindowConfig,
    pub long_window: WindowConfig,
    pub max_document_bytes: usize,
    pub min_transcript_chars: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = match lookup("LABSCORE_DB_PATH") {
            Some(path) => PathBuf::from(path),
            None => app_data_dir()?.join("labscore.db"),
        };

        let config = Self {
            bind_addr: parse_or(&lookup, "LABSCORE_BIND_ADDR", || {
                SocketAddr::from(([127, 0, 0, 1], 8080))
            })?,
            database_path,
            ollama_url: lookup("LABSCORE_OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.into()),
            model: lookup("LABSCORE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            inference_timeout_secs: parse_or(&lookup, "LABSCORE_INFERENCE_TIMEOUT_SECS", || {
                DEFAULT_INFERENCE_TIMEOUT_SECS
            })?,
            fingerprint_salt: lookup("LABSCORE_FINGERPRINT_SALT")
                .unwrap_or_else(|| DEFAULT_FINGERPRINT_SALT.into()),
            short_window: WindowConfig {
                window_secs: parse_or(&lookup, "LABSCORE_SHORT_WINDOW_SECS", || {
                    DEFAULT_SHORT_WINDOW.window_secs
                })?,
                limit: parse_or(&lookup, "LABSCORE_SHORT_WINDOW_LIMIT", || {
                    DEFAULT_SHORT_WINDOW.limit
                })?,
            },
            long_window: WindowConfig {
                window_secs: parse_or(&lookup, "LABSCORE_LONG_WINDOW_SECS", || {
                    DEFAULT_LONG_WINDOW.window_secs
                })?,
                limit: parse_or(&lookup, "LABSCORE_LONG_WINDOW_LIMIT", || {
                    DEFAULT_LONG_WINDOW.limit
                })?,
            },
            max_document_bytes: parse_or(&lookup, "LABSCORE_MAX_DOCUMENT_BYTES", || {
                DEFAULT_MAX_DOCUMENT_BYTES
            })?,
            min_transcript_chars: parse_or(&lookup, "LABSCORE_MIN_TRANSCRIPT_CHARS", || {
                DEFAULT_MIN_TRANSCRIPT_CHARS
            })?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, window) in [
            ("LABSCORE_SHORT_WINDOW", self.short_window),
            ("LABSCORE_LONG_WINDOW", self.long_window),
        ] {
            if window.window_secs == 0 || window.limit == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    value: format!("{}s/{}", window.window_secs, window.limit),
                });
            }
        }
        if self.max_document_bytes == 0 {
            return Err(ConfigError::Invalid {
                key: "LABSCORE_MAX_DOCUMENT_BYTES",
                value: "0".into(),
            });
        }
        Ok(())
    }

    /// Windows in evaluation order: short first, then long.
    pub fn windows(&self) -> [WindowConfig; 2] {
        [self.short_window, self.long_window]
    }
}

fn parse_or<F, T, D>(lookup: &F, key: &'static str, default: D) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    D: FnOnce() -> T,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default()),
    }
}

/// Get the application data directory
/// ~/Labscore/ on all platforms
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(APP_NAME))
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "labscore=info,labscore_lib=info,tower_http=info"
}

/// Defaults with the database at `db_path`.
#[cfg(test)]
pub(crate) fn test_config(db_path: &std::path::Path) -> ServiceConfig {
    let db_path = db_path.display().to_string();
    ServiceConfig::from_lookup(|key| (key == "LABSCORE_DB_PATH").then(|| db_path.clone()))
        .unwrap()
}
