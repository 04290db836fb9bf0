//! TT Trader - tastytrade order lifecycle toolkit
//!
//! Features:
//! - Session-scoped REST access with guaranteed logout
//! - Equity and two-leg option order submission
//! - Fill tracking with fill de-duplication and failure bounds
//! - Balance/position reconciliation
//! - Cash sweep, DCA and risk reversal flows

pub mod api;
pub mod config;
pub mod strategy;
pub mod trading;
pub mod utils;

// Re-export commonly used types
pub use api::{with_session, with_session_until, ApiError, BrokerApi, Credentials, SessionClient};
pub use config::Config;
pub use trading::{
    FillOutcome, OrderHandle, OrderRequest, OrderStatus, OrderSubmitter, Side, TradingError,
    TradingMode,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
