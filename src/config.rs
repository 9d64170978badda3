//! Configuration for the intake client
//!
//! Every field has a default matching the server's limits, so an empty (or missing) TOML file is
//! a valid configuration. Durations are written as whole seconds, except the token save debounce
//! which is in milliseconds.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 50 MiB, the largest file the server accepts
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Top-level client configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Base URL of the intake server (default: http://localhost:5000)
    pub server_url: String,

    /// Path prefix of the JSON API (default: /api)
    pub api_base: String,

    /// Maximum number of files per upload request (default: 50)
    pub batch_size: usize,

    /// Largest accepted file in bytes (default: 50 MiB)
    pub max_file_size: u64,

    /// Children returned per directory page by the filesystem reader (default: 100)
    pub directory_page_size: usize,

    /// Glob patterns of file names dropped silently while collecting a tree
    pub ignore_patterns: Vec<String>,

    /// How long an access token stays valid after it was first entered (default: 6 hours)
    #[serde(with = "duration_secs")]
    pub token_validity: Duration,

    /// Remaining validity below which the token badge turns into a warning (default: 30 minutes)
    #[serde(with = "duration_secs")]
    pub token_warning: Duration,

    /// Interval between token status refreshes (default: 60 seconds)
    #[serde(with = "duration_secs")]
    pub token_refresh_interval: Duration,

    /// Quiet period after the last token edit before it is sent to the server (default: 800 ms)
    #[serde(with = "duration_millis")]
    pub token_save_debounce: Duration,

    /// Delay before a finished progress bar is hidden (default: 1 second)
    #[serde(with = "duration_secs")]
    pub progress_reset_delay: Duration,

    /// Optional per-request timeout; unset means requests may wait forever
    #[serde(with = "optional_duration_secs")]
    pub request_timeout: Option<Duration>,

    /// Where the session snapshot is kept while the client runs; removed on a clean exit
    pub session_file: PathBuf,

    /// Retry policy for transient network failures
    pub retry: RetryConfig,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            api_base: "/api".to_string(),
            batch_size: 50,
            max_file_size: MAX_FILE_SIZE,
            directory_page_size: 100,
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                "desktop.ini".to_string(),
            ],
            token_validity: Duration::from_secs(6 * 60 * 60),
            token_warning: Duration::from_secs(30 * 60),
            token_refresh_interval: Duration::from_secs(60),
            token_save_debounce: Duration::from_millis(800),
            progress_reset_delay: Duration::from_secs(1),
            request_timeout: None,
            session_file: default_session_file(),
            retry: RetryConfig::default(),
        }
    }
}

/// Per-user location of the session file (the user's cache dir, falling back to the temp dir)
pub fn default_session_file() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("doc-intake")
        .join("session.json")
}

impl IntakeConfig {
    /// Load a configuration from a TOML file and validate it
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: IntakeConfig = toml::from_str(&content)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the client cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be greater than 0"));
        }
        if self.directory_page_size == 0 {
            return Err(Error::config("directory_page_size must be greater than 0"));
        }
        if self.token_refresh_interval.is_zero() {
            return Err(Error::config("token_refresh_interval must be greater than 0"));
        }
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(Error::config(format!(
                "server_url must be an http(s) URL, got '{}'",
                self.server_url
            )));
        }
        for pattern in &self.ignore_patterns {
            glob::Pattern::new(pattern)
                .map_err(|e| Error::config(format!("bad ignore pattern '{}': {}", pattern, e)))?;
        }
        Ok(())
    }

    /// Full URL of an API route such as `upload/csv` or `token`
    pub fn endpoint(&self, route: &str) -> String {
        format!(
            "{}/{}/{}",
            self.server_url.trim_end_matches('/'),
            self.api_base.trim_matches('/'),
            route.trim_start_matches('/')
        )
    }
}

/// Retry behavior for network failures during upload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first failure (default: 3)
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(with = "duration_secs")]
    pub initial_delay: Duration,

    /// Upper bound for the backoff delay (default: 30 seconds)
    #[serde(with = "duration_secs")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry (default: 2.0)
    pub backoff_multiplier: f64,

    /// Randomize delays to avoid synchronized retries (default: true)
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod optional_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_server_limits() {
        let config = IntakeConfig::default();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_file_size, 52_428_800);
        assert_eq!(config.token_validity, Duration::from_secs(21_600));
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.request_timeout.is_none());
        assert!(config.session_file.ends_with("doc-intake/session.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server_url = \"https://intake.example.com/\"\nbatch_size = 20\ntoken_save_debounce = 250\n\n[retry]\nmax_attempts = 1"
        )
        .unwrap();

        let config = IntakeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.token_save_debounce, Duration::from_millis(250));
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
        assert_eq!(config.directory_page_size, 100);
        assert_eq!(
            config.endpoint("upload/csv"),
            "https://intake.example.com/api/upload/csv"
        );
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let config = IntakeConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_non_http_server_url_is_rejected() {
        let config = IntakeConfig {
            server_url: "ftp://files.example.com".into(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ftp://files.example.com"));
    }

    #[test]
    fn test_broken_ignore_pattern_is_rejected() {
        let config = IntakeConfig {
            ignore_patterns: vec!["[unclosed".into()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
