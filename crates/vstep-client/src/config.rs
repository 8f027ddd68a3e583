//! Inference client configuration.

use std::time::Duration;

use validator::Validate;

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_API_URL: &str = "http://localhost:9001";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Configuration for the inference client.
#[derive(Debug, Clone, Validate)]
pub struct InferenceClientConfig {
    /// Base URL of the inference server
    #[validate(url)]
    pub api_url: String,
    /// API key sent with model loading and inference calls
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries for retryable failures
    #[validate(range(max = 10))]
    pub max_retries: u32,
}

impl Default for InferenceClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl InferenceClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("INFERENCE_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            api_key: std::env::var("INFERENCE_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            timeout: Duration::from_secs(
                std::env::var("INFERENCE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            max_retries: std::env::var("INFERENCE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_RETRIES),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Check the configuration before building a client.
    pub fn validate(&self) -> ClientResult<()> {
        Validate::validate(self).map_err(|e| ClientError::InvalidConfig(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = InferenceClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:9001");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 2);
        assert!(config.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let bad_url = InferenceClientConfig::default().with_api_url("not a url");
        assert!(matches!(bad_url.validate(), Err(ClientError::InvalidConfig(_))));

        let too_many_retries = InferenceClientConfig::default().with_max_retries(50);
        assert!(too_many_retries.validate().is_err());
    }
}
