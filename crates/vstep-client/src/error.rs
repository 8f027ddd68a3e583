//! Inference client error types.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Status codes worth retrying: rate limiting and gateway/availability errors.
const RETRYABLE_STATUS: &[u16] = &[429, 502, 503, 504];

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("Inference server returned {status}: {}", .api_message.as_deref().unwrap_or("<no message>"))]
    HttpCall {
        status: u16,
        api_message: Option<String>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to read image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::HttpCall { status, .. } => RETRYABLE_STATUS.contains(status),
            _ => false,
        }
    }

    /// Short label used in metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::InvalidConfig(_) => "invalid_config",
            ClientError::HttpCall { .. } => "http_status",
            ClientError::InvalidResponse(_) => "invalid_response",
            ClientError::Image { .. } => "image",
            ClientError::Network(e) if e.is_timeout() => "timeout",
            ClientError::Network(_) => "network",
            ClientError::Json(_) => "json",
        }
    }

    /// HTTP status of a failed call, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::HttpCall { status, .. } => Some(*status),
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let call = |status| ClientError::HttpCall {
            status,
            api_message: None,
        };
        assert!(call(503).is_retryable());
        assert!(call(429).is_retryable());
        assert!(!call(400).is_retryable());
        assert!(!call(500).is_retryable());
        assert!(!ClientError::InvalidResponse("x".into()).is_retryable());
    }

    #[test]
    fn test_error_kind() {
        let call = ClientError::HttpCall {
            status: 503,
            api_message: None,
        };
        assert_eq!(call.kind(), "http_status");
        assert_eq!(ClientError::InvalidResponse("x".into()).kind(), "invalid_response");
    }

    #[test]
    fn test_http_call_display() {
        let err = ClientError::HttpCall {
            status: 404,
            api_message: Some("Model not found".to_string()),
        };
        assert_eq!(err.to_string(), "Inference server returned 404: Model not found");
        assert_eq!(err.status(), Some(404));
    }
}
