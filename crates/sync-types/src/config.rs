//! Configuration loading for vector-sync.
//!
//! Layered precedence: built-in defaults -> config file
//! (~/.config/vector-sync/config.toml) -> CLI-given config file ->
//! environment variables (SYNC_*). CLI flag overrides are applied by the
//! caller after `Settings::load` returns.
//!
//! Connection settings for the change source and the downstream API have no
//! defaults on purpose: a missing value is a fatal startup error, never a
//! silent fallback.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::SyncError;

/// Which change source strategy the worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Periodic cursor polling on the `_id` field. Deletions are not
    /// observable in this mode.
    #[default]
    Poll,
    /// Native change stream subscription with resume tokens.
    Stream,
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceMode::Poll => write!(f, "poll"),
            SourceMode::Stream => write!(f, "stream"),
        }
    }
}

impl std::str::FromStr for SourceMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "poll" => Ok(SourceMode::Poll),
            "stream" => Ok(SourceMode::Stream),
            other => Err(SyncError::InvalidInput(format!(
                "unknown source mode '{}', expected 'poll' or 'stream'",
                other
            ))),
        }
    }
}

/// Main application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// MongoDB connection string (required).
    pub mongo_uri: String,

    /// Source database name (required).
    pub mongo_db: String,

    /// Source collection name; also the checkpoint partition name (required).
    pub mongo_collection: String,

    /// Base URL of the downstream indexing API (required).
    pub api_base: String,

    /// Bearer token for the downstream API.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Change source strategy.
    #[serde(default)]
    pub mode: SourceMode,

    /// Seconds between polls in poll mode.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum events fetched/dispatched per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Base delay for delivery retries, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single retry delay, in milliseconds.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Delivery attempts per event before it is abandoned as terminal.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-request timeout against the downstream API, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Directory holding checkpoint files (one per partition).
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: String,

    /// Bounded queue capacity (batches) between the source and dispatcher.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Grace period for in-flight work on shutdown, in seconds.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Bind host for the HTTP surface (`serve`) and metrics exporter.
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// Port for the indexing API surface.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Port for the worker's metrics/health exporter.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_batch_size() -> usize {
    100
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_cap_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_checkpoint_dir() -> String {
    ProjectDirs::from("", "", "vector-sync")
        .map(|p| p.data_local_dir().join("checkpoints"))
        .unwrap_or_else(|| PathBuf::from("./checkpoints"))
        .to_string_lossy()
        .to_string()
}

fn default_queue_capacity() -> usize {
    4
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_metrics_port() -> u16 {
    9464
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load settings with layered precedence.
    ///
    /// Missing required values (Mongo connection, API base) surface as a
    /// `SyncError::Config`, which callers treat as fatal.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, SyncError> {
        let config_dir = ProjectDirs::from("", "", "vector-sync")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SYNC_MONGO_URI, SYNC_API_BASE, SYNC_BATCH_SIZE, ...
        builder = builder.add_source(Environment::with_prefix("SYNC").try_parsing(true));

        let config = builder
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate values that must be non-zero for the worker to make progress.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.batch_size == 0 {
            return Err(SyncError::Config("batch_size must be > 0".into()));
        }
        if self.max_attempts == 0 {
            return Err(SyncError::Config("max_attempts must be > 0".into()));
        }
        if self.queue_capacity == 0 {
            return Err(SyncError::Config("queue_capacity must be > 0".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(SyncError::Config("poll_interval_secs must be > 0".into()));
        }
        if self.api_base.is_empty() {
            return Err(SyncError::Config("api_base must not be empty".into()));
        }
        Ok(())
    }

    /// Socket address for the indexing API surface.
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Socket address for the worker metrics exporter.
    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.metrics_port)
    }

    /// Checkpoint directory as a path.
    pub fn checkpoint_path(&self) -> PathBuf {
        PathBuf::from(&self.checkpoint_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Settings {
        Settings {
            mongo_uri: "mongodb://localhost:27017".into(),
            mongo_db: "app".into(),
            mongo_collection: "articles".into(),
            api_base: "http://localhost:8080".into(),
            api_token: None,
            mode: SourceMode::default(),
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
            checkpoint_dir: default_checkpoint_dir(),
            queue_capacity: default_queue_capacity(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            http_host: default_http_host(),
            http_port: default_http_port(),
            metrics_port: default_metrics_port(),
            log_level: default_log_level(),
        }
    }

    #[test]
    fn test_defaults() {
        let settings = minimal();
        assert_eq!(settings.mode, SourceMode::Poll);
        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.http_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut settings = minimal();
        settings.batch_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut settings = minimal();
        settings.max_attempts = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_fails_fast_without_required_values() {
        // No config file and no SYNC_* variables for the Mongo connection:
        // startup must fail rather than run with accidental defaults.
        let result = Settings::load(Some("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
mongo_uri = "mongodb://localhost:27017"
mongo_db = "app"
mongo_collection = "articles"
api_base = "http://localhost:8080"
mode = "stream"
batch_size = 25
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.mongo_db, "app");
        assert_eq!(settings.mode, SourceMode::Stream);
        assert_eq!(settings.batch_size, 25);
        // Untouched fields fall back to defaults.
        assert_eq!(settings.max_attempts, 5);
    }

    #[test]
    fn test_source_mode_from_str() {
        assert_eq!("poll".parse::<SourceMode>().unwrap(), SourceMode::Poll);
        assert_eq!("stream".parse::<SourceMode>().unwrap(), SourceMode::Stream);
        assert!("push".parse::<SourceMode>().is_err());
    }
}
