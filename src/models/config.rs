//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Worker pool, pacing and scan window settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Message classification settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// SQLite database locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session gateway connection settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Keywords used to search for entry-point channels
    #[serde(default = "defaults::channel_keywords")]
    pub channel_keywords: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.workers == 0 {
            return Err(AppError::validation("crawler.workers must be > 0"));
        }
        if self.crawler.message_window == 0 {
            return Err(AppError::validation("crawler.message_window must be > 0"));
        }
        if self.crawler.page_size == 0 {
            return Err(AppError::validation("crawler.page_size must be > 0"));
        }
        if self.crawler.search_limit == 0 {
            return Err(AppError::validation("crawler.search_limit must be > 0"));
        }
        if self.classifier.fuzzy_threshold > 100 {
            return Err(AppError::validation(
                "classifier.fuzzy_threshold must be within 0..=100",
            ));
        }
        if self.transport.base_url.trim().is_empty() {
            return Err(AppError::validation("transport.base_url is empty"));
        }
        if self.transport.timeout_secs == 0 {
            return Err(AppError::validation("transport.timeout_secs must be > 0"));
        }
        if self.channel_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(AppError::validation("No channel keywords defined"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            classifier: ClassifierConfig::default(),
            storage: StorageConfig::default(),
            transport: TransportConfig::default(),
            channel_keywords: defaults::channel_keywords(),
        }
    }
}

/// Worker pool and crawl pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent crawl workers
    #[serde(default = "defaults::workers")]
    pub workers: usize,

    /// Pause a worker takes after each task, in milliseconds
    #[serde(default = "defaults::task_interval")]
    pub task_interval_ms: u64,

    /// Most recent messages scanned per channel
    #[serde(default = "defaults::message_window")]
    pub message_window: usize,

    /// Messages requested per history page
    #[serde(default = "defaults::page_size")]
    pub page_size: usize,

    /// Channels requested per discovery search
    #[serde(default = "defaults::search_limit")]
    pub search_limit: usize,

    /// Pause between two passes over the discovery keywords, in seconds
    #[serde(default = "defaults::seed_interval")]
    pub seed_interval_secs: u64,
}

impl CrawlerConfig {
    /// Per-worker pacing delay.
    pub fn task_interval(&self) -> Duration {
        Duration::from_millis(self.task_interval_ms)
    }

    /// Delay between seed passes.
    pub fn seed_interval(&self) -> Duration {
        Duration::from_secs(self.seed_interval_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: defaults::workers(),
            task_interval_ms: defaults::task_interval(),
            message_window: defaults::message_window(),
            page_size: defaults::page_size(),
            search_limit: defaults::search_limit(),
            seed_interval_secs: defaults::seed_interval(),
        }
    }
}

/// Message classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Fuzzy similarity (0-100) a keyword must exceed to match
    #[serde(default = "defaults::fuzzy_threshold")]
    pub fuzzy_threshold: u8,

    /// Whether any recognized named entity flags a message
    #[serde(default = "defaults::entity_signal")]
    pub entity_signal: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: defaults::fuzzy_threshold(),
            entity_signal: defaults::entity_signal(),
        }
    }
}

/// SQLite database file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database holding the `messages` table
    #[serde(default = "defaults::messages_db")]
    pub messages_db: String,

    /// Database holding the `channels` table
    #[serde(default = "defaults::channels_db")]
    pub channels_db: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            messages_db: defaults::messages_db(),
            channels_db: defaults::channels_db(),
        }
    }
}

/// Session gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Base URL of the gateway that owns the platform session
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// User-Agent header for gateway requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Bearer token sent to the gateway, if it requires one
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            timeout_secs: defaults::timeout(),
            user_agent: defaults::user_agent(),
            api_token: None,
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn workers() -> usize {
        20
    }
    pub fn task_interval() -> u64 {
        3_000
    }
    pub fn message_window() -> usize {
        100
    }
    pub fn page_size() -> usize {
        100
    }
    pub fn search_limit() -> usize {
        10
    }
    pub fn seed_interval() -> u64 {
        60
    }

    // Classifier defaults
    pub fn fuzzy_threshold() -> u8 {
        70
    }
    pub fn entity_signal() -> bool {
        true
    }

    // Storage defaults
    pub fn messages_db() -> String {
        "telegram_messages.db".into()
    }
    pub fn channels_db() -> String {
        "telegram_channels.db".into()
    }

    // Transport defaults
    pub fn base_url() -> String {
        "http://127.0.0.1:8081".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn user_agent() -> String {
        "telescan/0.1".into()
    }

    // Discovery defaults: trade terms mixed with innocuous control terms
    pub fn channel_keywords() -> Vec<String> {
        [
            "party",
            "supplies",
            "research chemicals",
            "pharma",
            "meds",
            "buy drugs",
            "sell drugs",
            "LSD",
            "MDMA",
            "cocaine",
            "heroin",
            "ecstasy",
            "meth",
            "drugstore",
            "online pharmacy",
            "illegal drugs",
            "psychedelics",
            "narcotics",
            "recreational drugs",
            "drug deals",
            "fashion",
            "music",
            "sports",
            "news",
            "tech",
            "gaming",
            "movies",
            "travel",
            "food",
            "lifestyle",
            "fitness",
            "education",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.crawler.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_threshold_above_scale() {
        let mut config = Config::default();
        config.classifier.fuzzy_threshold = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_blank_channel_keywords() {
        let mut config = Config::default();
        config.channel_keywords = vec!["  ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_falls_back_to_field_defaults() {
        let config: Config = toml::from_str(
            r#"
            [crawler]
            workers = 4

            [storage]
            messages_db = "crawl.db"
            channels_db = "crawl.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.crawler.workers, 4);
        assert_eq!(config.crawler.task_interval(), Duration::from_secs(3));
        assert_eq!(config.crawler.message_window, 100);
        assert_eq!(config.classifier.fuzzy_threshold, 70);
        assert_eq!(config.storage.channels_db, "crawl.db");
        assert!(config.channel_keywords.iter().any(|k| k == "MDMA"));
    }

    #[test]
    fn load_or_default_survives_missing_file() {
        let config = Config::load_or_default("/nonexistent/telescan.toml");
        assert_eq!(config.crawler.workers, 20);
    }
}
