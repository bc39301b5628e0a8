//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup; the rest of the crate receives the
//! resulting `Config` by reference.

use std::env;

/// Identity-toolkit REST base used when `IDENTITY_API_URL` is not set.
const DEFAULT_IDENTITY_API_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Identity-toolkit REST base URL
    pub identity_api_url: String,
    /// Web API key appended to identity-toolkit calls
    pub identity_api_key: String,
    /// Token verification endpoint (provider access token -> federation token)
    pub verify_token_url: String,
    /// Callable endpoint for derived-chart computation
    pub chart_function_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// For local development a `.env` file is honored.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            identity_api_url: env::var("IDENTITY_API_URL")
                .unwrap_or_else(|_| DEFAULT_IDENTITY_API_URL.to_string()),
            identity_api_key: env::var("IDENTITY_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("IDENTITY_API_KEY"))?,
            verify_token_url: env::var("VERIFY_TOKEN_URL")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("VERIFY_TOKEN_URL"))?,
            chart_function_url: env::var("CHART_FUNCTION_URL")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("CHART_FUNCTION_URL"))?,
        })
    }

    /// Fixed configuration for tests; endpoints point at localhost and are
    /// overridden per test where a stub server is involved.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            identity_api_url: "http://localhost:9099/v1".to_string(),
            identity_api_key: "test_api_key".to_string(),
            verify_token_url: "http://localhost:9099/api/verifyToken".to_string(),
            chart_function_url: "http://localhost:9099/api/calculateChart".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
