//! Configuration types for feed-relay
//!
//! The configuration is read from a TOML file before the pipeline starts. Sections:
//! - top level: request timeout and staging directory
//! - [`source`](SourceConfig): feed server, download proxy, account ids, page range
//! - [`destination`](DestinationConfig): publishing server and credentials
//! - [`retry`](RetryConfig): per-item retry budget and backoff

use crate::error::{Error, Result};
use crate::types::PageRange;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Name of the directory created under the home directory for staged media
pub const DEFAULT_STAGING_DIR_NAME: &str = ".feed-relay";

/// Main configuration for a relay run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Per-request timeout in seconds (absent or non-positive = no timeout)
    #[serde(default, with = "optional_timeout_serde")]
    pub timeout: Option<Duration>,

    /// Root directory for staged media (default: `~/.feed-relay`)
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    /// Source feed settings
    pub source: SourceConfig,

    /// Destination publishing settings
    pub destination: DestinationConfig,

    /// Retry behavior for failed items
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Source feed configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the paginated feed API
    pub server: String,

    /// Base URL of the proxy that media downloads are routed through
    pub download_server: String,

    /// Source account ids to migrate, processed in order
    pub ids: Vec<String>,

    /// First page to fetch for every id (default: 1)
    #[serde(default = "default_from_page")]
    pub from_page: u32,

    /// Page at which fetching stops, exclusive (None = until the feed reports no more pages)
    #[serde(default)]
    pub end_page: Option<u32>,

    /// User-Agent header sent with feed requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Destination publishing API configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Base URL of the destination site
    pub server: String,

    /// Username for HTTP Basic authentication
    pub username: String,

    /// Password (or application password) for HTTP Basic authentication
    pub password: String,

    /// Delete media uploaded by a publish attempt that later failed (default: true)
    #[serde(default = "default_true")]
    pub delete_orphaned_media: bool,
}

impl std::fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"***")
            .field("delete_orphaned_media", &self.delete_orphaned_media)
            .finish()
    }
}

/// Retry configuration for items that fail transiently
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries per item; 0 retries forever (default: 10)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Whether the retry budget is unlimited
    pub fn is_unbounded(&self) -> bool {
        self.max_attempts == 0
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        debug!(?path, "loading config");
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::Config {
            message: e.to_string(),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot enforce on its own
    pub fn validate(&self) -> Result<()> {
        check_url("source.server", &self.source.server)?;
        check_url("source.download_server", &self.source.download_server)?;
        check_url("destination.server", &self.destination.server)?;

        if self.source.ids.is_empty() {
            return Err(Error::config("source.ids", "at least one id is required"));
        }
        if let Some(id) = self.source.ids.iter().find(|id| id.trim().is_empty()) {
            return Err(Error::config(
                "source.ids",
                format!("ids must not be blank (got {:?})", id),
            ));
        }
        if self.destination.username.is_empty() {
            return Err(Error::config("destination.username", "must not be empty"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                format!("must be at least 1.0 (got {})", self.retry.backoff_multiplier),
            ));
        }

        self.page_range().map_err(|e| match e {
            Error::Precondition(message) => {
                let key = if self.source.from_page < 1 {
                    "source.from_page"
                } else {
                    "source.end_page"
                };
                Error::config(key, message)
            }
            other => other,
        })?;
        Ok(())
    }

    /// Page range applied to every source id
    pub fn page_range(&self) -> Result<PageRange> {
        PageRange::new(self.source.from_page, self.source.end_page)
    }

    /// Directory under which staging areas are created
    pub fn staging_root(&self) -> Result<PathBuf> {
        match &self.staging_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|home| home.join(DEFAULT_STAGING_DIR_NAME))
                .ok_or_else(|| {
                    Error::config("staging_dir", "home directory unknown; set staging_dir")
                }),
        }
    }
}

fn check_url(key: &str, value: &str) -> Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| Error::config(key, format!("invalid URL {:?}: {}", value, e)))
}

fn default_from_page() -> u32 {
    1
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/109.0.0.0 Safari/537.36"
        .to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
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
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Request timeout: a non-positive number of seconds disables the timeout
mod optional_timeout_serde {
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
        let secs = Option::<i64>::deserialize(deserializer)?;
        Ok(secs
            .filter(|s| *s > 0)
            .map(|s| Duration::from_secs(s.unsigned_abs())))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [source]
        server = "https://feed.example"
        download_server = "https://proxy.example"
        ids = ["alice", "bob"]

        [destination]
        server = "https://blog.example"
        username = "editor"
        password = "secret"
    "#;

    fn with_source_line(line: &str) -> String {
        MINIMAL.replacen("[source]\n", &format!("[source]\n{}\n", line), 1)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_toml_str(MINIMAL).expect("minimal config must parse");

        assert_eq!(config.timeout, None);
        assert_eq!(config.staging_dir, None);
        assert_eq!(config.source.ids, vec!["alice", "bob"]);
        assert_eq!(config.source.from_page, 1);
        assert_eq!(config.source.end_page, None);
        assert!(config.source.user_agent.starts_with("Mozilla/5.0"));
        assert!(config.destination.delete_orphaned_media);
        assert_eq!(config.retry.max_attempts, 10);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
        assert_eq!(config.retry.max_delay, Duration::from_secs(60));
        assert!(config.retry.jitter);
    }

    #[test]
    fn positive_timeout_is_kept() {
        let text = format!("timeout = 30\n{}", MINIMAL);
        let config = Config::from_toml_str(&text).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn non_positive_timeout_means_no_timeout() {
        for value in ["0", "-1"] {
            let text = format!("timeout = {}\n{}", value, MINIMAL);
            let config = Config::from_toml_str(&text).unwrap();
            assert_eq!(config.timeout, None, "timeout = {} must disable it", value);
        }
    }

    #[test]
    fn page_range_comes_from_source_section() {
        let text = with_source_line("from_page = 2\nend_page = 4");
        let config = Config::from_toml_str(&text).unwrap();
        let range = config.page_range().unwrap();
        assert_eq!(range.start(), 2);
        assert_eq!(range.end(), Some(4));
    }

    #[test]
    fn end_page_not_after_from_page_is_rejected() {
        let text = with_source_line("from_page = 3\nend_page = 3");
        match Config::from_toml_str(&text) {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("source.end_page")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn from_page_zero_names_from_page() {
        let text = with_source_line("from_page = 0");
        match Config::from_toml_str(&text) {
            Err(Error::Config { key, message }) => {
                assert_eq!(key.as_deref(), Some("source.from_page"));
                assert!(message.contains("start at 1"), "unexpected message {message}");
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn empty_id_list_is_rejected() {
        let text = MINIMAL.replace(r#"ids = ["alice", "bob"]"#, "ids = []");
        match Config::from_toml_str(&text) {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("source.ids")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_server_url_names_the_key() {
        let text = MINIMAL.replace("https://blog.example", "not a url");
        match Config::from_toml_str(&text) {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("destination.server"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn shrinking_backoff_multiplier_is_rejected() {
        let text = format!("{}\n[retry]\nbackoff_multiplier = 0.5\n", MINIMAL);
        match Config::from_toml_str(&text) {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("retry.backoff_multiplier"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn retry_section_durations_are_seconds() {
        let text = format!(
            "{}\n[retry]\nmax_attempts = 0\ninitial_delay = 5\nmax_delay = 120\njitter = false\n",
            MINIMAL
        );
        let config = Config::from_toml_str(&text).unwrap();
        assert!(config.retry.is_unbounded());
        assert_eq!(config.retry.initial_delay, Duration::from_secs(5));
        assert_eq!(config.retry.max_delay, Duration::from_secs(120));
        assert!(!config.retry.jitter);
    }

    #[test]
    fn missing_destination_section_is_a_config_error() {
        let text = r#"
            [source]
            server = "https://feed.example"
            download_server = "https://proxy.example"
            ids = ["alice"]
        "#;
        assert!(matches!(
            Config::from_toml_str(text),
            Err(Error::Config { key: None, .. })
        ));
    }

    #[test]
    fn explicit_staging_dir_wins() {
        let text = format!("staging_dir = \"/var/tmp/relay\"\n{}", MINIMAL);
        let config = Config::from_toml_str(&text).unwrap();
        assert_eq!(
            config.staging_root().unwrap(),
            PathBuf::from("/var/tmp/relay")
        );
    }

    #[test]
    fn debug_output_hides_password() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        let rendered = format!("{:?}", config.destination);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn load_reports_missing_file_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
