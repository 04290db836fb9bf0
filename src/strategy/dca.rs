//! Dollar-cost averaging plan
//! Capital split into equal steps of whole shares (or contracts) at one entry price

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::BrokerApi;
use crate::trading::errors::TradingError;
use crate::trading::order::OrderSubmitter;
use crate::trading::order_tracker::{track_order, FillOutcome, TrackerConfig};
use crate::trading::types::{OrderRequest, PositionEffect, Side};

/// Shares per equity option contract
pub const OPTION_MULTIPLIER: Decimal = Decimal::ONE_HUNDRED;

/// DCA defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcaConfig {
    pub capital: Decimal,
    pub steps: u32,
    /// Entry as a fraction of spot when no entry price is given
    pub discount: Decimal,
}

impl Default for DcaConfig {
    fn default() -> Self {
        Self {
            capital: Decimal::from(10_000),
            steps: 10,
            discount: Decimal::new(95, 2),
        }
    }
}

/// Computed plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DcaPlan {
    pub symbol: String,
    pub side: Side,
    pub entry: Decimal,
    pub exit: Option<Decimal>,
    pub capital: Decimal,
    pub steps: u32,
    pub step_size: Decimal,
    /// 1 for stock, 100 for option contracts
    pub multiplier: Decimal,
    pub shares_per_step: Decimal,
    pub total_shares: Decimal,
}

impl DcaPlan {
    pub fn new(
        symbol: &str,
        side: Side,
        entry: Decimal,
        capital: Decimal,
        steps: u32,
        exit: Option<Decimal>,
    ) -> Result<Self, TradingError> {
        Self::with_multiplier(symbol, side, entry, capital, steps, exit, Decimal::ONE)
    }

    /// Plan in option contracts; `entry` is the premium per share
    pub fn for_options(
        symbol: &str,
        side: Side,
        premium: Decimal,
        capital: Decimal,
        steps: u32,
        exit: Option<Decimal>,
    ) -> Result<Self, TradingError> {
        Self::with_multiplier(symbol, side, premium, capital, steps, exit, OPTION_MULTIPLIER)
    }

    fn with_multiplier(
        symbol: &str,
        side: Side,
        entry: Decimal,
        capital: Decimal,
        steps: u32,
        exit: Option<Decimal>,
        multiplier: Decimal,
    ) -> Result<Self, TradingError> {
        if entry <= Decimal::ZERO {
            return Err(TradingError::InvalidOrder {
                reason: format!("entry price must be positive, got {entry}"),
            });
        }
        if capital <= Decimal::ZERO || steps == 0 {
            return Err(TradingError::InvalidOrder {
                reason: format!("need positive capital and at least one step (capital={capital}, steps={steps})"),
            });
        }

        let step_size = capital / Decimal::from(steps);
        let shares_per_step = (step_size / (entry * multiplier)).floor();
        Ok(Self {
            symbol: symbol.trim().to_uppercase(),
            side,
            entry,
            exit,
            capital,
            steps,
            step_size,
            multiplier,
            shares_per_step,
            total_shares: shares_per_step * Decimal::from(steps),
        })
    }

    /// Notional at entry: cost of a long, proceeds of a short
    pub fn entry_notional(&self) -> Decimal {
        self.total_shares * self.entry * self.multiplier
    }

    pub fn is_options(&self) -> bool {
        self.multiplier != Decimal::ONE
    }

    fn unit(&self) -> &'static str {
        if self.is_options() {
            "contracts"
        } else {
            "shares"
        }
    }

    /// Profit at the exit price, if one was given
    pub fn pnl(&self) -> Option<Decimal> {
        let exit = self.exit?;
        let move_per_share = match self.side {
            Side::Buy => exit - self.entry,
            Side::Sell => self.entry - exit,
        };
        Some(move_per_share * self.total_shares * self.multiplier)
    }

    /// P&L as a fraction of entry notional
    pub fn pnl_fraction(&self) -> Option<Decimal> {
        let notional = self.entry_notional();
        if notional.is_zero() {
            return None;
        }
        self.pnl().map(|p| p / notional)
    }

    /// Lines for the terminal
    pub fn describe(&self) -> Vec<String> {
        let direction = match self.side {
            Side::Buy => "Long",
            Side::Sell => "Short",
        };
        let mut lines = vec![
            format!("Symbol: {} | Side: {} ({})", self.symbol, self.side, direction),
            format!(
                "Capital: ${:.2} | Steps: {} | Step Size: ${:.2}",
                self.capital, self.steps, self.step_size
            ),
            format!("Entry: ${:.2}", self.entry),
            format!("{} per step: {}", capitalize(self.unit()), self.shares_per_step),
            format!("Total {}: {}", self.unit(), self.total_shares),
            format!("Entry notional: ${:.2}", self.entry_notional()),
        ];
        match (self.pnl(), self.pnl_fraction()) {
            (Some(pnl), Some(frac)) => lines.push(format!(
                "Exit: ${:.2} | P&L: ${:.2} ({:+.1}%)",
                self.exit.unwrap_or_default(),
                pnl,
                frac * Decimal::ONE_HUNDRED
            )),
            _ => lines.push("Exit price not set - P&L not calculated".to_string()),
        }
        lines
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Entry price at a discount to spot
pub fn entry_from_spot(spot: Decimal, discount: Decimal) -> Decimal {
    (spot * discount).round_dp(2)
}

/// Place the whole plan as one market order and track it.
/// Returns `None` in dry-run mode.
pub async fn execute_dca<B>(
    broker: &B,
    submitter: &OrderSubmitter<B>,
    plan: &DcaPlan,
    tracker: &TrackerConfig,
) -> Result<Option<FillOutcome>, TradingError>
where
    B: BrokerApi + ?Sized,
{
    if plan.is_options() {
        return Err(TradingError::InvalidOrder {
            reason: "option DCA plans are planning-only".to_string(),
        });
    }
    if plan.total_shares <= Decimal::ZERO {
        return Err(TradingError::Insufficient {
            what: "capital",
            available: plan.step_size,
            required: plan.entry,
        });
    }

    info!(
        "Executing DCA plan: {} {} shares of {}",
        plan.side, plan.total_shares, plan.symbol
    );
    let request = OrderRequest::equity(&plan.symbol, plan.side, plan.total_shares, PositionEffect::Open);
    let Some(handle) = submitter.submit(&request).await? else {
        return Ok(None);
    };

    let outcome = track_order(broker, handle, plan.total_shares, tracker.clone()).await;
    info!(
        "DCA order finished: {} {} / {} (avg {:?})",
        outcome.status, outcome.filled_quantity, plan.total_shares, outcome.average_price
    );
    Ok(Some(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockBrokerApi;
    use crate::trading::simulation::TradingMode;
    use crate::trading::types::OrderStatus;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_share_math() {
        let plan = DcaPlan::new("spy", Side::Buy, dec!(95), dec!(10000), 10, None).unwrap();
        assert_eq!(plan.step_size, dec!(1000));
        assert_eq!(plan.shares_per_step, dec!(10));
        assert_eq!(plan.total_shares, dec!(100));
        assert_eq!(plan.entry_notional(), dec!(9500));
        assert_eq!(plan.pnl(), None);
    }

    #[test]
    fn test_discounted_entry_plan() {
        let entry = entry_from_spot(dec!(412.37), dec!(0.95));
        assert_eq!(entry, dec!(391.75));
        let plan = DcaPlan::new("SPY", Side::Buy, entry, dec!(10000), 10, None).unwrap();
        assert_eq!(plan.shares_per_step, dec!(2));
        assert_eq!(plan.total_shares, dec!(20));
    }

    #[test]
    fn test_short_pnl() {
        let plan = DcaPlan::new("TQQQ", Side::Sell, dec!(50), dec!(5000), 5, Some(dec!(45))).unwrap();
        assert_eq!(plan.total_shares, dec!(100));
        assert_eq!(plan.pnl(), Some(dec!(500)));
        assert_eq!(plan.pnl_fraction(), Some(dec!(0.1)));
    }

    #[test]
    fn test_option_plan_uses_contract_multiplier() {
        let plan = DcaPlan::for_options("TQQQ", Side::Buy, dec!(2.50), dec!(10000), 10, Some(dec!(3.00))).unwrap();
        // 1000 per step / 250 per contract
        assert_eq!(plan.shares_per_step, dec!(4));
        assert_eq!(plan.total_shares, dec!(40));
        assert_eq!(plan.entry_notional(), dec!(10000));
        assert_eq!(plan.pnl(), Some(dec!(2000)));
        assert!(plan.describe().iter().any(|l| l == "Total contracts: 40"));
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(DcaPlan::new("SPY", Side::Buy, dec!(0), dec!(1000), 10, None).is_err());
        assert!(DcaPlan::new("SPY", Side::Buy, dec!(10), dec!(1000), 0, None).is_err());
    }

    #[tokio::test]
    async fn test_execute_submits_and_tracks() {
        let mut broker = MockBrokerApi::new();
        broker
            .expect_create_order()
            .withf(|payload| payload["legs"][0]["quantity"] == json!("20"))
            .returning(|_| Ok(json!({ "order": { "id": 5 } })));
        broker.expect_get_order().returning(|_| {
            Ok(serde_json::from_value(json!({ "id": 5, "status": "Filled", "filled-quantity": "20" })).unwrap())
        });
        let broker = Arc::new(broker);

        let submitter = OrderSubmitter::new(Arc::clone(&broker), TradingMode::Live);
        let plan = DcaPlan::new("SPY", Side::Buy, dec!(50), dec!(1000), 10, None).unwrap();
        let tracker = TrackerConfig {
            poll_interval: Duration::from_millis(1),
            ..TrackerConfig::default()
        };

        let outcome = execute_dca(broker.as_ref(), &submitter, &plan, &tracker)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn test_execute_zero_shares_is_insufficient() {
        let broker = Arc::new(MockBrokerApi::new());
        let submitter = OrderSubmitter::new(Arc::clone(&broker), TradingMode::Live);
        let plan = DcaPlan::new("NVR", Side::Buy, dec!(8000), dec!(10000), 10, None).unwrap();
        let err = execute_dca(broker.as_ref(), &submitter, &plan, &TrackerConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.category(), "INSUFFICIENT");
    }
}
