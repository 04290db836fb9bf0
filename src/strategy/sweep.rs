//! Cash sweep into a money-market ETF
//!
//! - First trading day of the month: put idle cash to work, or sell to cover a debit
//! - Last trading day after the cutoff: sell everything
//! - Any other day with negative cash: sell enough to cover it

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tracing::{info, warn};

use crate::api::{Credentials, SessionClient};
use crate::strategy::calendar::MarketCalendar;
use crate::trading::balance::snapshot;
use crate::trading::errors::TradingError;
use crate::trading::order::OrderSubmitter;
use crate::trading::order_tracker::{track_order, FillOutcome, TrackerConfig};
use crate::trading::quotes::get_spot_price;
use crate::trading::reconcile::{
    verify_after_relogin, wait_for_balance_update, ReconcileConfig, ReconcileVerdict,
};
use crate::trading::types::{AccountSnapshot, OrderRequest, PositionEffect, Side};

/// Sweep settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub symbol: String,
    /// Extra cash raised when covering a negative balance on the first trading day
    pub negative_cash_buffer: Decimal,
    /// Eastern time after which the month-end liquidation runs
    pub month_end_cutoff: NaiveTime,
    /// Closures beyond the built-in holiday list
    pub extra_holidays: Vec<NaiveDate>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            symbol: "SGOV".to_string(),
            negative_cash_buffer: Decimal::from(5),
            month_end_cutoff: NaiveTime::from_hms_opt(15, 55, 0).unwrap_or_default(),
            extra_holidays: Vec::new(),
        }
    }
}

/// Which rule fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SweepCase {
    MarketClosed,
    FirstTradingDay,
    MonthEndLiquidation,
    NegativeCash,
    NoAction,
}

impl fmt::Display for SweepCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SweepCase::MarketClosed => "market closed",
            SweepCase::FirstTradingDay => "first trading day of month",
            SweepCase::MonthEndLiquidation => "last trading day after cutoff",
            SweepCase::NegativeCash => "negative cash",
            SweepCase::NoAction => "no action",
        };
        write!(f, "{s}")
    }
}

/// What the sweep wants to do
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepDecision {
    pub case: SweepCase,
    /// Side and whole-share quantity, when a trade is needed
    pub trade: Option<(Side, Decimal)>,
    pub reason: String,
}

impl SweepDecision {
    fn hold(case: SweepCase, reason: impl Into<String>) -> Self {
        Self {
            case,
            trade: None,
            reason: reason.into(),
        }
    }

    fn trade(case: SweepCase, side: Side, qty: Decimal, reason: String) -> Self {
        if qty > Decimal::ZERO {
            Self {
                case,
                trade: Some((side, qty)),
                reason,
            }
        } else {
            Self::hold(case, format!("{reason}; quantity rounds to zero"))
        }
    }
}

/// Pure sweep rule. `now` is New York wall-clock time.
pub fn decide(
    now: NaiveDateTime,
    calendar: &MarketCalendar,
    cash: Decimal,
    position: Decimal,
    price: Decimal,
    config: &SweepConfig,
) -> SweepDecision {
    let today = now.date();
    if !calendar.is_trading_day(today) {
        return SweepDecision::hold(SweepCase::MarketClosed, format!("market closed on {today}"));
    }
    if price <= Decimal::ZERO {
        return SweepDecision::hold(SweepCase::NoAction, format!("unusable price {price}"));
    }
    let whole_shares = position.max(Decimal::ZERO).floor();

    if calendar.is_first_trading_day(today) {
        if cash < Decimal::ZERO {
            let needed = cash.abs() + config.negative_cash_buffer;
            let qty = (needed / price).ceil().min(whole_shares);
            return SweepDecision::trade(
                SweepCase::FirstTradingDay,
                Side::Sell,
                qty,
                format!("negative cash ${cash:.2} plus ${:.2} buffer", config.negative_cash_buffer),
            );
        }
        if cash > price {
            let qty = (cash / price).floor();
            return SweepDecision::trade(
                SweepCase::FirstTradingDay,
                Side::Buy,
                qty,
                format!("deploy idle cash ${cash:.2}"),
            );
        }
        return SweepDecision::hold(
            SweepCase::FirstTradingDay,
            format!("cash ${cash:.2} below one share at ${price:.4}"),
        );
    }

    if calendar.is_last_trading_day(today) && now.time() >= config.month_end_cutoff {
        if position > Decimal::ZERO {
            return SweepDecision::trade(
                SweepCase::MonthEndLiquidation,
                Side::Sell,
                position,
                "month-end liquidation".to_string(),
            );
        }
        return SweepDecision::hold(SweepCase::MonthEndLiquidation, format!("no {} holdings", config.symbol));
    }

    if cash < Decimal::ZERO {
        let need = cash.abs();
        let qty = if need < price {
            Decimal::ONE
        } else {
            (need / price).ceil()
        };
        return SweepDecision::trade(
            SweepCase::NegativeCash,
            Side::Sell,
            qty.min(whole_shares),
            format!("negative cash ${cash:.2}"),
        );
    }

    SweepDecision::hold(SweepCase::NoAction, "cash non-negative and not first/last trading day")
}

/// Everything the sweep did
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub before: AccountSnapshot,
    pub price: Decimal,
    pub decision: SweepDecision,
    pub submitted: bool,
    pub fill: Option<FillOutcome>,
    pub verification: Option<ReconcileVerdict>,
}

/// Inputs shared by every run
pub struct SweepContext<'a> {
    pub session: &'a SessionClient,
    pub credentials: &'a Credentials,
    pub submitter: &'a OrderSubmitter<SessionClient>,
    pub calendar: &'a MarketCalendar,
    pub sweep: &'a SweepConfig,
    pub tracker: &'a TrackerConfig,
    pub reconcile: &'a ReconcileConfig,
}

/// Run the sweep once. `confirm` is asked before any order goes out.
pub async fn run_sweep<C, Fut>(
    ctx: &SweepContext<'_>,
    now: NaiveDateTime,
    confirm: C,
) -> Result<SweepReport, TradingError>
where
    C: FnOnce(&SweepDecision, Decimal) -> Fut,
    Fut: Future<Output = bool>,
{
    let symbol = ctx.sweep.symbol.as_str();
    let before = snapshot(ctx.session, symbol).await?;
    let price = get_spot_price(ctx.session, symbol).await?;
    info!(
        "Cash ${:.2}, {} {} @ ${:.4}",
        before.cash_balance, symbol, before.position, price
    );

    let decision = decide(now, ctx.calendar, before.cash_balance, before.position, price, ctx.sweep);
    info!("Sweep case: {} ({})", decision.case, decision.reason);

    let mut report = SweepReport {
        before,
        price,
        decision,
        submitted: false,
        fill: None,
        verification: None,
    };

    let Some((side, qty)) = report.decision.trade else {
        info!("No trade needed.");
        return Ok(report);
    };
    if !confirm(&report.decision, price).await {
        info!("Trade cancelled by user.");
        return Ok(report);
    }

    let effect = match side {
        Side::Buy => PositionEffect::Open,
        Side::Sell => PositionEffect::Close,
    };
    let request = OrderRequest::equity(symbol, side, qty, effect);
    let Some(handle) = ctx.submitter.submit(&request).await? else {
        info!("Dry run, skipping post-trade check.");
        return Ok(report);
    };
    report.submitted = true;

    let outcome = track_order(ctx.session, handle.clone(), qty, ctx.tracker.clone()).await;
    if outcome.is_filled() {
        let fill_price = outcome.average_price.unwrap_or(price);
        let expected = match side {
            Side::Buy => -(outcome.filled_quantity * fill_price),
            Side::Sell => outcome.filled_quantity * fill_price,
        };
        wait_for_balance_update(ctx.session, report.before.cash_balance, expected, ctx.reconcile).await;
    } else {
        info!("Order {} ended as {}; verifying through a fresh session", handle, outcome.status);
        match verify_after_relogin(ctx.session, ctx.credentials, &report.before, side, ctx.reconcile).await {
            Ok(verdict) => {
                if verdict.effectively_filled {
                    info!("Order {} effectively filled", handle);
                } else {
                    warn!("Order {} may still be pending; balances unchanged", handle);
                }
                report.verification = Some(verdict);
            }
            Err(e) => warn!("Post-trade verification failed: {}", e),
        }
    }
    report.fill = Some(outcome);
    Ok(report)
}
