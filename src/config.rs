//! Configuration: a mapping with recognized keys and built-in defaults.
//! Unknown keys are silently ignored; missing keys fall back to defaults.
//! Failure to load a config file is logged and defaults are used -
//! `ConfigLoadError` never aborts startup.

use std::path::{Path, PathBuf};

use serde::Deserialize;

fn default_log_paths() -> Vec<PathBuf> {
    [
        "/var/log/auth.log",
        "/var/log/syslog",
        "/var/log/kern.log",
        "/var/log/nginx/access.log",
        "/var/log/nginx/error.log",
        "/var/log/mysql/error.log",
        "/var/log/ufw.log",
    ]
    .iter()
    .map(PathBuf::from)
    .collect()
}

fn default_backend_url() -> String {
    "http://127.0.0.1:5050/ingest".to_string()
}

fn default_batch_size() -> usize {
    25
}

fn default_flush_interval() -> f64 {
    2.0
}

fn default_spool_dir() -> PathBuf {
    PathBuf::from("/var/spool/log_collector")
}

fn default_max_spool_bytes() -> u64 {
    200 * 1024 * 1024
}

fn default_connect_timeout() -> f64 {
    3.0
}

fn default_request_timeout() -> f64 {
    5.0
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/var/log/log_collector.log")
}

fn default_hostname() -> String {
    whoami::fallible::hostname().unwrap_or_else(|_| "unknown-host".to_string())
}

/// Raw, partially-specified config as read from a JSON file. Every field is
/// optional; absent fields fall back to [`Config`]'s defaults.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(rename = "LOG_PATHS")]
    log_paths: Option<Vec<PathBuf>>,
    #[serde(rename = "BACKEND_URL")]
    backend_url: Option<String>,
    #[serde(rename = "API_TOKEN")]
    api_token: Option<String>,
    #[serde(rename = "BATCH_SIZE")]
    batch_size: Option<usize>,
    #[serde(rename = "FLUSH_INTERVAL")]
    flush_interval: Option<f64>,
    #[serde(rename = "SPOOL_DIR")]
    spool_dir: Option<PathBuf>,
    #[serde(rename = "MAX_SPOOL_BYTES")]
    max_spool_bytes: Option<u64>,
    #[serde(rename = "CONNECT_TIMEOUT")]
    connect_timeout: Option<f64>,
    #[serde(rename = "REQUEST_TIMEOUT")]
    request_timeout: Option<f64>,
    #[serde(rename = "LOG_FILE")]
    log_file: Option<PathBuf>,
    #[serde(rename = "HOSTNAME")]
    hostname: Option<String>,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_paths: Vec<PathBuf>,
    pub backend_url: String,
    pub api_token: Option<String>,
    pub batch_size: usize,
    pub flush_interval_secs: f64,
    pub spool_dir: PathBuf,
    pub max_spool_bytes: u64,
    pub connect_timeout_secs: f64,
    pub request_timeout_secs: f64,
    pub log_file: PathBuf,
    pub hostname: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_paths: default_log_paths(),
            backend_url: default_backend_url(),
            api_token: None,
            batch_size: default_batch_size(),
            flush_interval_secs: default_flush_interval(),
            spool_dir: default_spool_dir(),
            max_spool_bytes: default_max_spool_bytes(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            log_file: default_log_file(),
            hostname: default_hostname(),
        }
    }
}

impl Config {
    /// Loads config from an optional JSON file, merging over defaults.
    /// A missing path argument or a file that fails to parse both result in
    /// defaults being used - this is `ConfigLoadError`'s disposition (§7):
    /// logged, never fatal.
    pub fn load(path: Option<&Path>) -> Self {
        let mut cfg = Config::default();
        let Some(path) = path else {
            return cfg;
        };
        let raw = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<RawConfig>(&text) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse config file; using defaults");
                    return cfg;
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config file; using defaults");
                return cfg;
            }
        };

        if let Some(v) = raw.log_paths {
            cfg.log_paths = v;
        }
        if let Some(v) = raw.backend_url {
            cfg.backend_url = v;
        }
        if raw.api_token.is_some() {
            cfg.api_token = raw.api_token;
        }
        if let Some(v) = raw.batch_size {
            cfg.batch_size = v;
        }
        if let Some(v) = raw.flush_interval {
            cfg.flush_interval_secs = v;
        }
        if let Some(v) = raw.spool_dir {
            cfg.spool_dir = v;
        }
        if let Some(v) = raw.max_spool_bytes {
            cfg.max_spool_bytes = v;
        }
        if let Some(v) = raw.connect_timeout {
            cfg.connect_timeout_secs = v;
        }
        if let Some(v) = raw.request_timeout {
            cfg.request_timeout_secs = v;
        }
        if let Some(v) = raw.log_file {
            cfg.log_file = v;
        }
        if let Some(v) = raw.hostname {
            cfg.hostname = v;
        }

        tracing::info!(path = %path.display(), "loaded config");
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let cfg = Config::load(None);
        assert_eq!(cfg.batch_size, 25);
        assert_eq!(cfg.backend_url, "http://127.0.0.1:5050/ingest");
    }

    #[test]
    fn unknown_keys_are_ignored_and_known_overrides_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"BATCH_SIZE": 5, "NOT_A_REAL_KEY": true, "API_TOKEN": "xyz"}"#,
        )
        .unwrap();

        let cfg = Config::load(Some(&path));
        assert_eq!(cfg.batch_size, 5);
        assert_eq!(cfg.api_token.as_deref(), Some("xyz"));
        // Keys absent from the override file keep their defaults.
        assert_eq!(cfg.flush_interval_secs, 2.0);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json at all").unwrap();

        let cfg = Config::load(Some(&path));
        assert_eq!(cfg.batch_size, 25);
    }
}
