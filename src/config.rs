use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

use crate::error::ConfigError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default = "default_landing_page")]
    pub landing_page: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            static_dir: default_static_dir(),
            landing_page: default_landing_page(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5502".to_string()
}

fn default_static_dir() -> String {
    "public".to_string()
}

fn default_landing_page() -> String {
    "/landing.html".to_string()
}

/// What to do when a single feed cannot be fetched or parsed.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole aggregation on the first failing feed.
    #[default]
    FailFast,
    /// Log the failure, leave the feed out and keep going.
    SkipFailed,
}

/// Field used to order articles.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// The raw `pubDate` field only.
    #[default]
    PubDate,
    /// The same multi-field timestamp used for the recency flag.
    Resolved,
}

/// Which articles `hasRecent` looks at.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecentScope {
    /// Every matched article, before truncation.
    #[default]
    All,
    /// Only the articles actually returned.
    Returned,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsConfig {
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
    #[serde(default = "default_recent_window_days")]
    pub recent_window_days: i64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub sort_key: SortKey,
    #[serde(default)]
    pub has_recent_scope: RecentScope,
    /// Per-feed request timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub general_feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub curated_feeds: Vec<FeedConfig>,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            max_articles: default_max_articles(),
            recent_window_days: default_recent_window_days(),
            failure_policy: FailurePolicy::default(),
            sort_key: SortKey::default(),
            has_recent_scope: RecentScope::default(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            user_agent: default_user_agent(),
            keywords: Vec::new(),
            general_feeds: Vec::new(),
            curated_feeds: Vec::new(),
        }
    }
}

fn default_max_articles() -> usize {
    50
}

/// Upper bound for `news.recent_window_days` (about a century).
pub const MAX_RECENT_WINDOW_DAYS: i64 = 36_500;

fn default_recent_window_days() -> i64 {
    7
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_user_agent() -> String {
    "IslandsOfBharath/1.0 (News Aggregator)".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_command")]
    pub command: String,
    #[serde(default = "default_dashboard_script")]
    pub script: String,
    /// Replaces the generated streamlit arguments when non-empty.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_dashboard_command(),
            script: default_dashboard_script(),
            args: Vec::new(),
            port: default_dashboard_port(),
            health_timeout_secs: default_health_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_dashboard_command() -> String {
    "streamlit".to_string()
}

fn default_dashboard_script() -> String {
    "dashboard.py".to_string()
}

fn default_dashboard_port() -> u16 {
    8501
}

fn default_health_timeout_secs() -> u64 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_mail_from")]
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            from: default_mail_from(),
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_mail_from() -> String {
    "Islands of Bharath <islands.bharat@gmail.com>".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: default_chat_endpoint(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_chat_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        .to_string()
}

fn default_chat_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.news.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid(
                "news.max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if self.news.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "news.fetch_timeout_secs must be at least 1".to_string(),
            ));
        }
        if !(0..=MAX_RECENT_WINDOW_DAYS).contains(&self.news.recent_window_days) {
            return Err(ConfigError::Invalid(format!(
                "news.recent_window_days must be between 0 and {}",
                MAX_RECENT_WINDOW_DAYS
            )));
        }
        if self.news.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "news.keywords must not contain blank entries".to_string(),
            ));
        }
        Ok(())
    }

    /// Listen address, with the port replaced by `port_override` if set.
    pub fn bind_addr(&self, port_override: Option<&str>) -> Result<SocketAddr, ConfigError> {
        let mut addr: SocketAddr = self.server.bind.parse().map_err(|_| {
            ConfigError::Invalid(format!("server.bind is not an address: {}", self.server.bind))
        })?;

        if let Some(port) = port_override {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a port number: {}", port)))?;
            addr.set_port(port);
        }

        Ok(addr)
    }

    /// Total number of feeds fetched per news request.
    pub fn feed_count(&self) -> usize {
        self.news.general_feeds.len() + self.news.curated_feeds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_for_empty_config() {
        let config = Config::from_str("").unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:5502");
        assert_eq!(config.server.static_dir, "public");
        assert_eq!(config.news.max_articles, 50);
        assert_eq!(config.news.recent_window_days, 7);
        assert_eq!(config.news.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.news.sort_key, SortKey::PubDate);
        assert_eq!(config.news.has_recent_scope, RecentScope::All);
        assert_eq!(config.dashboard.port, 8501);
        assert!(config.dashboard.enabled);
        assert_eq!(config.mail.smtp_port, 587);
        assert_eq!(config.feed_count(), 0);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            [news]
            max_articles = 20
            failure_policy = "skip_failed"
            sort_key = "resolved"
            has_recent_scope = "returned"
            keywords = ["island", "Andaman"]
            general_feeds = [
                { name = "National", url = "https://example.com/national.xml" },
            ]
            curated_feeds = [
                { name = "Majuli", url = "https://example.com/majuli.xml" },
                { name = "Diu", url = "https://example.com/diu.xml" },
            ]

            [dashboard]
            enabled = false
            port = 9000
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.news.max_articles, 20);
        assert_eq!(config.news.failure_policy, FailurePolicy::SkipFailed);
        assert_eq!(config.news.sort_key, SortKey::Resolved);
        assert_eq!(config.news.has_recent_scope, RecentScope::Returned);
        assert_eq!(config.news.keywords, vec!["island", "Andaman"]);
        assert_eq!(config.news.general_feeds.len(), 1);
        assert_eq!(config.news.curated_feeds[1].name, "Diu");
        assert_eq!(config.feed_count(), 3);
        assert!(!config.dashboard.enabled);
        assert_eq!(config.dashboard.port, 9000);
        assert_eq!(config.dashboard.command, "streamlit");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/islands.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let result = Config::from_str("this is not valid toml {{{");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_failure_policy_rejected() {
        let result = Config::from_str("[news]\nfailure_policy = \"retry\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_feed_missing_url_rejected() {
        let content = r#"
            [news]
            general_feeds = [{ name = "No URL" }]
        "#;
        assert!(Config::from_str(content).is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = Config::from_str("[news]\nmax_concurrent_fetches = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Config::from_str("[news]\nfetch_timeout_secs = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_recent_window_bounds() {
        for days in [-1, MAX_RECENT_WINDOW_DAYS + 1, i64::MAX] {
            let result = Config::from_str(&format!("[news]\nrecent_window_days = {}", days));
            assert!(matches!(result, Err(ConfigError::Invalid(_))), "{} days", days);
        }

        let config = Config::from_str("[news]\nrecent_window_days = 36500").unwrap();
        assert_eq!(config.news.recent_window_days, MAX_RECENT_WINDOW_DAYS);
        let config = Config::from_str("[news]\nrecent_window_days = 0").unwrap();
        assert_eq!(config.news.recent_window_days, 0);
    }

    #[test]
    fn test_bind_addr_default() {
        let config = Config::default();
        assert_eq!(config.bind_addr(None).unwrap().to_string(), "127.0.0.1:5502");
    }

    #[test]
    fn test_bind_addr_port_override() {
        let config = Config::default();
        assert_eq!(config.bind_addr(Some("8080")).unwrap().port(), 8080);
        assert!(matches!(
            config.bind_addr(Some("eighty")),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_bind_addr_invalid() {
        let config = Config::from_str("[server]\nbind = \"localhost\"").unwrap();
        assert!(config.bind_addr(None).is_err());
    }

    #[test]
    fn test_blank_keyword_rejected() {
        let result = Config::from_str("[news]\nkeywords = [\"island\", \"  \"]");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
