//! Strategy flows
//! Each flow runs inside one logged-in session and places at most one order

pub mod calendar;
pub mod dca;
pub mod pricing;
pub mod risk_reversal;
pub mod sweep;

pub use calendar::MarketCalendar;
pub use dca::{execute_dca, DcaConfig, DcaPlan};
pub use risk_reversal::{
    build_plan, execute_risk_reversal, ExpiryChoice, RiskReversalConfig, RiskReversalOrder,
    RiskReversalPlan,
};
pub use sweep::{decide, run_sweep, SweepConfig, SweepContext, SweepDecision, SweepReport};
