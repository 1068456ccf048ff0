use std::time::Duration;

use thiserror::Error;

/// Failure of a single provider fetch.
///
/// Every abnormal exit of a provider (error return, panic, hang) ends up as
/// one of these, so the orchestrator can treat them uniformly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("provider function panicked: {0}")]
    Panicked(String),

    #[error("provider fetch timed out after {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionsError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("cache read failed: {0}")]
    CacheRead(String),

    #[error("cache write failed: {0}")]
    CacheWrite(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("notification delivery failed: {0}")]
    Notification(String),

    #[error("invalid provider registry: {0}")]
    Registry(String),
}

impl RegionsError {
    /// Errors that count as "this provider produced no fresh data".
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Serialization(_))
    }
}

impl From<serde_json::Error> for RegionsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RegionsError>;
