use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Normalized shape of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub error: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,
    #[error("could not reach the server: {0}")]
    Unreachable(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("{}", .0.error)]
    Server(ErrorShape),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    Request(String),
}

impl ApiError {
    /// Transport-level failures where the server never answered.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Timeout | ApiError::Unreachable(_))
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Server(shape) => Some(shape.status_code),
            _ => None,
        }
    }

    /// Message suitable for a page banner or an inline field error.
    pub fn user_message(&self, api_base: &str) -> String {
        match self {
            ApiError::Timeout => {
                "Request took too long. Please check your connection and try again.".into()
            }
            ApiError::Unreachable(_) => format!(
                "Could not reach the server. Check that the backend is running (e.g. at {}) and try again.",
                api_base
            ),
            ApiError::Unauthorized => "Your session has expired. Please log in again.".into(),
            ApiError::Server(shape) => shape.error.clone(),
            ApiError::Decode(_) | ApiError::Request(_) => {
                "Something went wrong. Please try again.".into()
            }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_connect() {
            ApiError::Unreachable(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else if err.is_builder() {
            ApiError::Request(err.to_string())
        } else {
            ApiError::Unreachable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_distinguish_transport_from_server() {
        let base = "http://localhost:8000";
        assert!(ApiError::Timeout.user_message(base).contains("too long"));
        let unreachable = ApiError::Unreachable("refused".into()).user_message(base);
        assert!(unreachable.contains("http://localhost:8000"));
        let server = ApiError::Server(ErrorShape {
            error: "Invalid or expired link".into(),
            status_code: 404,
            validation_errors: None,
        });
        assert_eq!(server.user_message(base), "Invalid or expired link");
        assert_eq!(server.status_code(), Some(404));
        assert!(ApiError::Timeout.is_transport());
        assert!(!server.is_transport());
    }

    #[test]
    fn error_shape_serializes_status_code_camel_case() {
        let shape = ErrorShape {
            error: "nope".into(),
            status_code: 400,
            validation_errors: None,
        };
        let v = serde_json::to_value(&shape).unwrap();
        assert_eq!(v["statusCode"], 400);
        assert!(v.get("validation_errors").is_none());
    }
}
