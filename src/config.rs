//! Configuration file parser for ~/.config/newspush/config.toml.
//!
//! The config file is optional: a missing file yields
//! `Config::default()`, which has no tags or sources and therefore publishes
//! nothing. Unknown keys are accepted by serde but logged as warnings.
use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// One feed URL configured under a tag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Source {
    pub url: String,
    #[serde(default)]
    pub enable_role_mention: bool,
}

/// Maps a logical feed category to a destination channel and optional
/// mention role. An empty `mention_role_id` disables mentions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub mention_role_id: String,
}

/// Gate applied to the first `<img>` found in an entry's raw HTML content.
///
/// `BlobOnly` keeps the legacy gate, which only accepts `blob:` URLs and so
/// in practice never yields an image for public feeds. `ExcludeBlob` accepts
/// every URL except `blob:` ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddedImagePolicy {
    #[default]
    BlobOnly,
    ExcludeBlob,
    Disabled,
}

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// Custom Debug impl masks `discord_token`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minutes between scheduled runs.
    pub poll_interval_minutes: u64,

    /// Entries published more than this many hours ago are ignored.
    pub recent_window_hours: u64,

    /// SQLite file holding the feed check records.
    pub database_path: String,

    pub embedded_image_policy: EmbeddedImagePolicy,

    /// Base URL of the Discord REST API.
    pub discord_api_base: String,

    /// Bot token (alternative to DISCORD_TOKEN env var).
    /// Env var takes precedence over config file.
    pub discord_token: Option<String>,

    /// Maximum number of entries held by the in-memory check cache.
    pub cache_capacity: usize,

    pub tags: Vec<Tag>,

    /// Tag name → sources published to that tag's channel, in file order.
    pub sources: IndexMap<String, Vec<Source>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_minutes: 10,
            recent_window_hours: 5,
            database_path: "newspush.db".to_string(),
            embedded_image_policy: EmbeddedImagePolicy::default(),
            discord_api_base: "https://discord.com/api/v10".to_string(),
            discord_token: None,
            cache_capacity: 10_000,
            tags: Vec::new(),
            sources: IndexMap::new(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("poll_interval_minutes", &self.poll_interval_minutes)
            .field("recent_window_hours", &self.recent_window_hours)
            .field("database_path", &self.database_path)
            .field("embedded_image_policy", &self.embedded_image_policy)
            .field("discord_api_base", &self.discord_api_base)
            .field(
                "discord_token",
                &self.discord_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("cache_capacity", &self.cache_capacity)
            .field("tags", &self.tags)
            .field("sources", &self.sources)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Upper bound on the recent-entries window (one century).
    const MAX_WINDOW_HOURS: u64 = 24 * 365 * 100;

    const KNOWN_KEYS: [&'static str; 9] = [
        "poll_interval_minutes",
        "recent_window_hours",
        "database_path",
        "embedded_image_policy",
        "discord_api_base",
        "discord_token",
        "cache_capacity",
        "tags",
        "sources",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            tags = config.tags.len(),
            sources = config.source_count(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler cannot run with and warn about
    /// sources that can never be delivered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_minutes must be at least 1".to_string(),
            ));
        }
        if self.recent_window_hours == 0 {
            return Err(ConfigError::Invalid(
                "recent_window_hours must be at least 1".to_string(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache_capacity must be at least 1".to_string(),
            ));
        }

        for tag in self.sources.keys() {
            match self.tag(tag) {
                None => tracing::warn!(tag = %tag, "Sources configured for a tag with no definition"),
                Some(t) if t.channel_id.is_empty() => {
                    tracing::warn!(tag = %tag, "Tag has no channel_id configured")
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Look up a tag definition by name.
    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }

    pub fn source_count(&self) -> usize {
        self.sources.values().map(Vec::len).sum()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes.saturating_mul(60))
    }

    pub fn recent_window(&self) -> chrono::Duration {
        let hours = self.recent_window_hours.min(Self::MAX_WINDOW_HOURS);
        chrono::Duration::hours(hours as i64)
    }

    /// Resolve the bot token: DISCORD_TOKEN env var first, then the file.
    pub fn discord_token(&self) -> Option<SecretString> {
        std::env::var("DISCORD_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.discord_token.clone())
            .map(SecretString::from)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL: &str = r#"
poll_interval_minutes = 15
recent_window_hours = 12
database_path = "/var/lib/newspush/checks.db"
embedded_image_policy = "exclude_blob"
discord_token = "test-token-123"

[[tags]]
name = "tech"
channel_id = "1001"
mention_role_id = "2002"

[[tags]]
name = "world"
channel_id = "1003"

[sources]
tech = [
    { url = "https://example.com/tech.xml", enable_role_mention = true },
    { url = "https://example.org/feed" },
]
world = [{ url = "https://news.example.net/rss" }]
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval_minutes, 10);
        assert_eq!(config.recent_window_hours, 5);
        assert_eq!(config.embedded_image_policy, EmbeddedImagePolicy::BlobOnly);
        assert_eq!(config.cache_capacity, 10_000);
        assert!(config.tags.is_empty());
        assert!(config.sources.is_empty());
        assert!(config.discord_token.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/newspush_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.poll_interval_minutes, 10);
    }

    #[test]
    fn test_whitespace_only_returns_default() {
        let config = Config::from_toml("   \n  \n").unwrap();
        assert_eq!(config.recent_window_hours, 5);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(FULL).unwrap();
        assert_eq!(config.poll_interval_minutes, 15);
        assert_eq!(config.recent_window(), chrono::Duration::hours(12));
        assert_eq!(config.database_path, "/var/lib/newspush/checks.db");
        assert_eq!(
            config.embedded_image_policy,
            EmbeddedImagePolicy::ExcludeBlob
        );
        assert_eq!(config.source_count(), 3);

        let tech = config.tag("tech").unwrap();
        assert_eq!(tech.channel_id, "1001");
        assert_eq!(tech.mention_role_id, "2002");
        assert_eq!(config.tag("world").unwrap().mention_role_id, "");

        let sources = &config.sources["tech"];
        assert!(sources[0].enable_role_mention);
        assert!(!sources[1].enable_role_mention);
    }

    #[test]
    fn test_sources_keep_file_order() {
        let config = Config::from_toml(
            r#"
[sources]
zeta = [{ url = "https://zeta.example.com/rss" }]
alpha = [{ url = "https://alpha.example.com/rss" }]
mid = [{ url = "https://mid.example.com/rss" }]
"#,
        )
        .unwrap();
        let tags: Vec<_> = config.sources.keys().map(String::as_str).collect();
        assert_eq!(tags, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::from_toml("recent_window_hours = 2\n").unwrap();
        assert_eq!(config.recent_window_hours, 2);
        assert_eq!(config.poll_interval_minutes, 10);
        assert_eq!(config.discord_api_base, "https://discord.com/api/v10");
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join("newspush_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, FULL).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.tags.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let result = Config::from_toml("embedded_image_policy = \"sometimes\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = Config::from_toml("poll_interval_minutes = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml("totally_fake_key = 1\nrecent_window_hours = 3\n").unwrap();
        assert_eq!(config.recent_window_hours, 3);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("newspush_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_debug_masks_token() {
        let config = Config::from_toml(FULL).unwrap();
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("test-token-123"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
