//! tastytrade REST API access
//! Session lifecycle, authenticated calls, and broker wire types

pub mod broker;
pub mod models;
pub mod session;

pub use broker::BrokerApi;
pub use models::{
    AccountBalance, Envelope, MarketDataItem, OptionChainItem, OrderFill, OrderLeg, OrderRecord,
    PositionItem,
};
pub use session::{with_session, with_session_until, Credentials, SessionClient, CERT_API_URL, PROD_API_URL};

#[cfg(test)]
pub use broker::MockBrokerApi;

use thiserror::Error;

/// Transport-level failures talking to the broker
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Unauthorized (401): {message}")]
    Unauthorized { message: String },
    #[error("Authentication failed: {status} - {message}")]
    AuthFailed { status: u16, message: String },
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Missing field in response: {0}")]
    MissingField(&'static str),
    #[error("Session token is not a valid header value")]
    InvalidToken,
    #[error("Interrupted by user")]
    Cancelled,
}

impl ApiError {
    /// Errors worth another attempt: network hiccups, 5xx, 429 and expired sessions
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::ApiError { status, .. } => *status >= 500 || *status == 429,
            ApiError::Unauthorized { .. } => true,
            ApiError::JsonError(_)
            | ApiError::AuthFailed { .. }
            | ApiError::NotLoggedIn
            | ApiError::MissingField(_)
            | ApiError::InvalidToken
            | ApiError::Cancelled => false,
        }
    }

    /// Short label used to detect repeated identical failures
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::HttpError(_) => "http",
            ApiError::JsonError(_) => "json",
            ApiError::ApiError { .. } => "api",
            ApiError::Unauthorized { .. } => "unauthorized",
            ApiError::AuthFailed { .. } => "auth",
            ApiError::NotLoggedIn => "not_logged_in",
            ApiError::MissingField(_) => "missing_field",
            ApiError::InvalidToken => "invalid_token",
            ApiError::Cancelled => "cancelled",
        }
    }
}

/// Build an error from a non-success response body.
/// 401 gets its own variant; long bodies are truncated.
pub fn sanitize_api_error(status: u16, detailed_message: String) -> ApiError {
    let safe_message = if detailed_message.len() > 500 {
        let mut cut = 500;
        while !detailed_message.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... (truncated)", &detailed_message[..cut])
    } else {
        detailed_message
    };

    if status == 401 {
        return ApiError::Unauthorized {
            message: safe_message,
        };
    }

    ApiError::ApiError {
        status,
        message: safe_message,
    }
}

/// Mask an account number down to its last four characters
pub fn mask_account(account_number: &str) -> String {
    let visible: String = account_number
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{:*>8}", visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_maps_401_to_unauthorized() {
        let err = sanitize_api_error(401, "token expired".to_string());
        assert!(matches!(err, ApiError::Unauthorized { .. }));
        assert!(err.is_transient());
        assert_eq!(err.kind(), "unauthorized");
    }

    #[test]
    fn test_sanitize_truncates_long_body() {
        let body = "x".repeat(800);
        match sanitize_api_error(422, body) {
            ApiError::ApiError { status, message } => {
                assert_eq!(status, 422);
                assert!(message.ends_with("... (truncated)"));
                assert!(message.len() < 600);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        let err = sanitize_api_error(400, "bad symbol".to_string());
        assert!(!err.is_transient());
        assert!(sanitize_api_error(503, String::new()).is_transient());
    }

    #[test]
    fn test_mask_account() {
        assert_eq!(mask_account("5WT12345"), "****2345");
        assert_eq!(mask_account("12"), "******12");
    }
}
