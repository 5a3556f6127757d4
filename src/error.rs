use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// A single feed could not be turned into items.
#[derive(Error, Debug)]
pub enum FeedFetchError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Feed {url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Failed to parse feed {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: feed_rs::parser::ParseFeedError,
    },
}

impl FeedFetchError {
    pub fn url(&self) -> &str {
        match self {
            FeedFetchError::Request { url, .. }
            | FeedFetchError::Status { url, .. }
            | FeedFetchError::Parse { url, .. } => url,
        }
    }
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Mail delivery is disabled")]
    Disabled,
}

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    #[error("Chat request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Chat API returned status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Failed to start dashboard: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to stop dashboard: {0}")]
    Shutdown(#[source] std::io::Error),
}
