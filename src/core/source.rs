//! Fetch requests and HTTP client configuration for warming-dl

use std::time::Duration;

/// One URL awaiting download, tagged with its position in the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    url: String,
    index: usize,
}

impl FetchRequest {
    pub(crate) fn new(url: impl Into<String>, index: usize) -> Self {
        Self {
            url: url.into(),
            index,
        }
    }

    /// The resource locator to GET
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Zero-based insertion position among all requests added to the queue
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Configuration for the HTTP client used by [`crate::HttpFetcher`]
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Overall request timeout, body included
    pub timeout: Duration,

    /// Connection establishment timeout
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("warming-dl/{}", env!("WARMING_DL_VERSION")),
        }
    }
}

impl FetchConfig {
    /// Default configuration with a different overall timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}
