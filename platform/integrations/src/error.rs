use agent_runtime::{ConfigError, HandlerError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl IntegrationError {
    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        matches!(self, IntegrationError::Api { status, .. } if (400..500).contains(status))
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        matches!(self, IntegrationError::Api { status, .. } if (500..600).contains(status))
    }
}

impl From<ConfigError> for IntegrationError {
    fn from(e: ConfigError) -> Self {
        IntegrationError::Config(e.to_string())
    }
}

impl From<reqwest::Error> for IntegrationError {
    fn from(e: reqwest::Error) -> Self {
        IntegrationError::Http(e.to_string())
    }
}

/// Vendor failures are retried by the runtime until the delivery bound
impl From<IntegrationError> for HandlerError {
    fn from(e: IntegrationError) -> Self {
        HandlerError::External(e.to_string())
    }
}

pub type IntegrationResult<T> = Result<T, IntegrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        let not_found = IntegrationError::Api {
            status: 404,
            message: "missing".to_string(),
        };
        assert!(not_found.is_client_error());
        assert!(!not_found.is_server_error());

        let unavailable = IntegrationError::Api {
            status: 503,
            message: "down".to_string(),
        };
        assert!(unavailable.is_server_error());
        assert!(!IntegrationError::Http("reset".to_string()).is_client_error());
    }

    #[test]
    fn test_handler_error_is_retriable() {
        let err: HandlerError = IntegrationError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        }
        .into();
        assert!(err.is_retriable());
        assert!(err.to_string().contains("502"));
    }
}
