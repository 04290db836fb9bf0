//! Trading module
//! Quotes, balances, order submission, fulfillment tracking and reconciliation

pub mod balance;
pub mod errors;
pub mod occ;
pub mod order;
pub mod order_tracker;
pub mod quotes;
pub mod reconcile;
pub mod simulation;
pub mod types;

pub use balance::{get_buying_power, get_cash_balance, get_position, snapshot, try_get_position};
pub use errors::TradingError;
pub use occ::{build_occ_from_parts, build_occ_symbol, OccSymbol, OptionType, OCC_SYMBOL_LEN};
pub use order::{build_payload, risk_reversal_request, OrderPayload, OrderSubmitter};
pub use order_tracker::{track_order, FillOutcome, FulfillmentTracker, TrackerConfig};
pub use quotes::{get_option_quotes, get_spot_price, BidAsk};
pub use reconcile::{
    reconcile, verify_after_relogin, wait_for_balance_update, ReconcileConfig, ReconcileVerdict,
};
pub use simulation::{DryRunRecorder, TradingMode};
pub use types::{
    AccountSnapshot, Fill, InstrumentKind, OrderAction, OrderHandle, OrderRequest, OrderStatus,
    OrderType, PositionEffect, PriceEffect, Side, TimeInForce,
};
