//! Client configuration.
//!
//! One knob: the remote API base URL, overridable through the environment
//! for self-hosted deployments.

/// Default remote API endpoint for local development.
pub const DEFAULT_API_URL: &str = "https://localhost:7265/api";

/// Environment variable overriding the API base URL.
pub const API_URL_ENV: &str = "DEVHUB_API_URL";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL the transport prefixes onto every resource path.
    pub api_base_url: String,
}

impl Config {
    /// Reads configuration from the environment, falling back to the
    /// default local endpoint.
    pub fn from_env() -> Self {
        let api_base_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self { api_base_url }
    }

    /// Configuration with an explicit base URL.
    pub fn with_base_url(url: impl Into<String>) -> Self {
        Self {
            api_base_url: url.into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_base_url(DEFAULT_API_URL)
    }
}
