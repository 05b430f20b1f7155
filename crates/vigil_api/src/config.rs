//! Client and polling configuration.

use std::time::Duration;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://sentry.io/api/0";

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Bearer token for authentication.
    pub auth_token: String,
    /// Organization slug.
    pub organization: String,
    /// Project slug.
    pub project: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_token: String::new(),
            organization: String::new(),
            project: String::new(),
            timeout_seconds: 30,
        }
    }
}

/// Timing of the verification polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before each poll.
    pub interval: Duration,
    /// Hard ceiling measured from the 202 response.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(3 * 60),
        }
    }
}
