//! Model call failures
//!
//! A failed call aborts only the current fix attempt. The engine counts it
//! against the target's retry budget and carries on.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("model endpoint rejected credentials: {0}")]
    Auth(String),

    #[error("model endpoint is rate limiting{}: {message}", retry_hint(.retry_after))]
    RateLimited { message: String, retry_after: Option<Duration> },

    #[error("no model response within {0:?}")]
    Timeout(Duration),

    #[error("could not reach model endpoint: {0}")]
    Network(String),

    #[error("model endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("model provider misconfigured: {0}")]
    Config(String),

    #[error("unusable model response: {0}")]
    Response(String),

    #[error("model stream broke off: {0}")]
    Stream(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after.map(|d| format!(" (retry in {}s)", d.as_secs())).unwrap_or_default()
}

impl LLMError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn rate_limit(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimited { message: message.into(), retry_after }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::Timeout(after)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Http { status, body: body.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Response(message.into())
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }
}

pub type LLMResult<T> = Result<T, LLMError>;

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        Self::Response(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(LLMError::auth("bad key").to_string(), "model endpoint rejected credentials: bad key");
        assert_eq!(
            LLMError::rate_limit("slow down", Some(Duration::from_secs(30))).to_string(),
            "model endpoint is rate limiting (retry in 30s): slow down"
        );
        assert_eq!(LLMError::rate_limit("slow down", None).to_string(), "model endpoint is rate limiting: slow down");
        assert_eq!(LLMError::api(502, "bad gateway").to_string(), "model endpoint returned HTTP 502: bad gateway");
    }

    #[test]
    fn test_json_errors_are_response_errors() {
        let err: LLMError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, LLMError::Response(_)));
    }
}
