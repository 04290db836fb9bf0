//! Trading error taxonomy
//! Auth is fatal to a run, quote/position gaps are recoverable, rejections end one order

use rust_decimal::Decimal;
use thiserror::Error;

use crate::api::ApiError;

/// Domain errors raised by the trading components
#[derive(Error, Debug, Clone)]
pub enum TradingError {
    /// Login or session failure; nothing downstream can run
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// No tradable price for a symbol
    #[error("Quote unavailable for {symbol}: {reason}")]
    QuoteUnavailable { symbol: String, reason: String },

    /// Positions could not be read
    #[error("Position unavailable for {symbol}: {reason}")]
    PositionUnavailable { symbol: String, reason: String },

    /// Broker refused the order; `body` is the raw response
    #[error("Order rejected ({status}): {body}")]
    OrderRejected { status: u16, body: String },

    /// Order request failed local validation
    #[error("Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// OCC symbol inputs out of range
    #[error("Invalid option symbol input: {reason}")]
    InvalidSymbol { reason: String },

    /// Not enough shares or cash to act
    #[error("Insufficient {what}: available={available}, required={required}")]
    Insufficient {
        what: &'static str,
        available: Decimal,
        required: Decimal,
    },

    /// The user interrupted the run; the session was closed
    #[error("Interrupted by user")]
    Cancelled,

    /// Other broker/API failure
    #[error("API error: {kind} - {message}")]
    Api {
        kind: &'static str,
        message: String,
        transient: bool,
    },
}

impl TradingError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            TradingError::Api { transient, .. } => *transient,
            TradingError::QuoteUnavailable { .. } | TradingError::PositionUnavailable { .. } => true,
            _ => false,
        }
    }

    /// Whether the whole run must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, TradingError::Auth { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TradingError::Auth { .. } => "AUTH",
            TradingError::QuoteUnavailable { .. } => "QUOTE",
            TradingError::PositionUnavailable { .. } => "POSITION",
            TradingError::OrderRejected { .. } => "ORDER_REJECTED",
            TradingError::InvalidOrder { .. } => "INVALID_ORDER",
            TradingError::InvalidSymbol { .. } => "INVALID_SYMBOL",
            TradingError::Insufficient { .. } => "INSUFFICIENT",
            TradingError::Cancelled => "CANCELLED",
            TradingError::Api { .. } => "API",
        }
    }
}

impl From<ApiError> for TradingError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::AuthFailed { status, message } => TradingError::Auth {
                message: format!("{status} - {message}"),
            },
            ApiError::NotLoggedIn => TradingError::Auth {
                message: "not logged in".to_string(),
            },
            ApiError::InvalidToken => TradingError::Auth {
                message: "session token is not a valid header value".to_string(),
            },
            ApiError::Cancelled => TradingError::Cancelled,
            other => TradingError::Api {
                kind: other.kind(),
                transient: other.is_transient(),
                message: other.to_string(),
            },
        }
    }
}
