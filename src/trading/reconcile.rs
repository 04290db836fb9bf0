//! Reconciliation from balances
//!
//! When order polling cannot say what happened, cash and position movement can.
//! A buy that filled spent cash or added shares; a sell did the opposite.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::api::{BrokerApi, Credentials, SessionClient};
use crate::trading::balance::{get_cash_balance, snapshot};
use crate::trading::errors::TradingError;
use crate::trading::types::{AccountSnapshot, Side};
use crate::utils::{retry_with_backoff, RetryConfig};

/// Reconciliation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Cash moves at or below this are noise (interest, rounding)
    pub noise_tolerance: Decimal,
    /// Pause between logout and the fresh login
    #[serde(with = "crate::utils::duration_secs")]
    pub relogin_delay: Duration,
    /// `wait_for_balance_update` accepts |Δcash − expected| below this
    pub balance_tolerance: Decimal,
    #[serde(with = "crate::utils::duration_secs")]
    pub balance_poll_interval: Duration,
    #[serde(with = "crate::utils::duration_secs")]
    pub balance_timeout: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            noise_tolerance: Decimal::new(1, 2),
            relogin_delay: Duration::from_secs(2),
            balance_tolerance: Decimal::TWO,
            balance_poll_interval: Duration::from_secs(2),
            balance_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of comparing two snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileVerdict {
    pub effectively_filled: bool,
    pub cash_change: Decimal,
    pub position_change: Decimal,
}

impl ReconcileVerdict {
    pub fn label(&self) -> &'static str {
        if self.effectively_filled {
            "effectively filled"
        } else {
            "not yet filled"
        }
    }
}

/// Decide whether an order on `side` went through, judging only by balances
pub fn reconcile(
    before: &AccountSnapshot,
    after: &AccountSnapshot,
    side: Side,
    noise_tolerance: Decimal,
) -> ReconcileVerdict {
    let cash_change = after.cash_balance - before.cash_balance;
    let position_change = after.position - before.position;

    let effectively_filled = match side {
        Side::Buy => cash_change < -noise_tolerance || position_change > Decimal::ZERO,
        Side::Sell => cash_change > noise_tolerance || position_change < Decimal::ZERO,
    };

    let verdict = ReconcileVerdict {
        effectively_filled,
        cash_change,
        position_change,
    };
    info!(
        "🔍 Reconcile {} {}: cash {:+} (${} → ${}), position {:+} ({} → {}) => {}",
        side,
        after.symbol,
        cash_change,
        before.cash_balance,
        after.cash_balance,
        position_change,
        before.position,
        after.position,
        verdict.label()
    );
    verdict
}

/// Log out, wait, log back in and reconcile against a fresh snapshot.
/// Some balance changes only show up on a new session.
pub async fn verify_after_relogin(
    session: &SessionClient,
    credentials: &Credentials,
    before: &AccountSnapshot,
    side: Side,
    config: &ReconcileConfig,
) -> Result<ReconcileVerdict, TradingError> {
    info!("🔐 Re-authenticating to verify {} {}", side, before.symbol);
    session.logout().await;
    sleep(config.relogin_delay).await;
    session.login(credentials).await?;

    let retry_config = RetryConfig::new(3, Duration::from_millis(500));
    let after = retry_with_backoff("post-order snapshot", &retry_config, || {
        snapshot(session, &before.symbol)
    })
    .await?;

    Ok(reconcile(before, &after, side, config.noise_tolerance))
}

/// Poll cash until it has moved by `expected_change` (within tolerance).
/// Returns the new cash balance, or `None` on timeout.
pub async fn wait_for_balance_update<B>(
    broker: &B,
    initial_cash: Decimal,
    expected_change: Decimal,
    config: &ReconcileConfig,
) -> Option<Decimal>
where
    B: BrokerApi + ?Sized,
{
    info!(
        "⏳ Waiting for cash to move {:+} from ${} (timeout {:?})",
        expected_change, initial_cash, config.balance_timeout
    );
    let deadline = Instant::now() + config.balance_timeout;

    loop {
        match get_cash_balance(broker).await {
            Ok(cash) => {
                let actual = cash - initial_cash;
                if (actual - expected_change).abs() < config.balance_tolerance {
                    info!("✅ Cash updated: ${} → ${} ({:+})", initial_cash, cash, actual);
                    return Some(cash);
                }
                debug!(
                    "Cash ${} moved {:+}, expecting {:+}",
                    cash, actual, expected_change
                );
            }
            Err(e) => warn!("Balance check failed: {}", e),
        }

        let now = Instant::now();
        if now >= deadline {
            warn!(
                "⏰ Cash did not move by {:+} within {:?}",
                expected_change, config.balance_timeout
            );
            return None;
        }
        sleep(config.balance_poll_interval.min(deadline - now)).await;
    }
}
