//! Order fulfillment tracking
//! Polls one order until it reaches a terminal state, fails repeatedly, or times out

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::api::{ApiError, BrokerApi, OrderFill, OrderRecord};
use crate::trading::types::{Fill, OrderHandle, OrderStatus};

/// Polling parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Delay between polls
    #[serde(with = "crate::utils::duration_secs")]
    pub poll_interval: Duration,
    /// Overall deadline
    #[serde(with = "crate::utils::duration_secs")]
    pub timeout: Duration,
    /// Identical failures in a row before giving up
    pub max_consecutive_failures: u32,
    /// How close filled must be to requested to count as complete
    pub quantity_tolerance: Decimal,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
            max_consecutive_failures: 3,
            quantity_tolerance: Decimal::new(1, 3),
        }
    }
}

/// What the tracker saw by the time it stopped
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FillOutcome {
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    /// Volume-weighted price of unique fills
    pub average_price: Option<Decimal>,
    pub last_price: Option<Decimal>,
    pub polls: u32,
    pub fills: Vec<Fill>,
}

impl FillOutcome {
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}

/// State for one tracked order
#[derive(Debug)]
pub struct FulfillmentTracker {
    handle: OrderHandle,
    requested: Decimal,
    config: TrackerConfig,
    status: OrderStatus,
    seen_fills: HashSet<String>,
    fills: Vec<Fill>,
    // Fill quantity per leg; multi-leg orders report one fill per leg per contract
    leg_filled: HashMap<String, Decimal>,
    broker_filled: Decimal,
    last_price: Option<Decimal>,
    consecutive_failures: u32,
    last_failure_kind: Option<&'static str>,
    polls: u32,
}

impl FulfillmentTracker {
    pub fn new(handle: OrderHandle, requested: Decimal, config: TrackerConfig) -> Self {
        Self {
            handle,
            requested,
            config,
            status: OrderStatus::Pending,
            seen_fills: HashSet::new(),
            fills: Vec::new(),
            leg_filled: HashMap::new(),
            broker_filled: Decimal::ZERO,
            last_price: None,
            consecutive_failures: 0,
            last_failure_kind: None,
            polls: 0,
        }
    }

    pub fn handle(&self) -> &OrderHandle {
        &self.handle
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Larger of the broker's `filled-quantity` and the unique fills seen so far
    pub fn filled_quantity(&self) -> Decimal {
        let from_fills = self
            .leg_filled
            .values()
            .copied()
            .max()
            .unwrap_or(Decimal::ZERO);
        self.broker_filled.max(from_fills)
    }

    /// Apply one successful poll. Returns the status after the update.
    pub fn observe(&mut self, record: &OrderRecord) -> OrderStatus {
        self.consecutive_failures = 0;
        self.last_failure_kind = None;

        for (index, fill) in record.fills.iter().enumerate() {
            self.absorb_fill("", index, fill);
        }
        for leg in &record.legs {
            let key = leg.symbol.as_deref().unwrap_or("");
            for (index, fill) in leg.fills.iter().enumerate() {
                self.absorb_fill(key, index, fill);
            }
        }

        if let Some(qty) = record.filled_quantity {
            self.broker_filled = self.broker_filled.max(qty);
        }
        if self.last_price.is_none() {
            self.last_price = record.first_leg_filled_price();
        }

        let broker_status = record.status.as_deref().unwrap_or("");
        let filled = self.filled_quantity();
        self.status = match OrderStatus::from_broker(broker_status) {
            OrderStatus::Filled => {
                if (filled - self.requested).abs() < self.config.quantity_tolerance {
                    OrderStatus::Filled
                } else {
                    debug!(
                        "Order {} reports Filled but quantity {}/{} does not match yet",
                        self.handle, filled, self.requested
                    );
                    OrderStatus::PartiallyFilled
                }
            }
            OrderStatus::Pending if filled > Decimal::ZERO => OrderStatus::PartiallyFilled,
            other => other,
        };

        if matches!(self.status, OrderStatus::Rejected) {
            warn!(
                "❌ Order {} rejected: {}",
                self.handle,
                record.reject_reason.as_deref().unwrap_or("no reason given")
            );
        }
        self.status
    }

    /// Count a failed poll. Returns true once the failure bound is reached.
    fn record_failure(&mut self, err: &ApiError) -> bool {
        let kind = err.kind();
        if self.last_failure_kind == Some(kind) {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 1;
            self.last_failure_kind = Some(kind);
        }
        warn!(
            "Poll {} for order {} failed ({}/{}): {}",
            self.polls, self.handle, self.consecutive_failures, self.config.max_consecutive_failures, err
        );
        self.consecutive_failures >= self.config.max_consecutive_failures
    }

    /// `index` is the fill's position in its list; fill lists only grow between polls
    fn absorb_fill(&mut self, leg: &str, index: usize, fill: &OrderFill) {
        let (Some(quantity), Some(price)) = (fill.quantity, fill.fill_price) else {
            debug!("Skipping fill without quantity/price on order {}", self.handle);
            return;
        };
        let id = fill.fill_id.clone().unwrap_or_else(|| {
            format!(
                "{}#{}:{}:{}:{}",
                leg,
                index,
                fill.filled_at.as_deref().unwrap_or(""),
                quantity,
                price
            )
        });
        if !self.seen_fills.insert(id.clone()) {
            return;
        }

        let filled_at = fill
            .filled_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));

        info!("💰 Fill {}: {} @ ${} on order {}", id, quantity, price, self.handle);
        *self.leg_filled.entry(leg.to_string()).or_insert(Decimal::ZERO) += quantity;
        self.last_price = Some(price);
        self.fills.push(Fill {
            id,
            quantity,
            price,
            filled_at,
        });
    }

    /// Volume-weighted average of the unique fills
    pub fn average_price(&self) -> Option<Decimal> {
        let qty: Decimal = self.fills.iter().map(|f| f.quantity).sum();
        if qty.is_zero() {
            return None;
        }
        let notional: Decimal = self.fills.iter().map(|f| f.quantity * f.price).sum();
        Some(notional / qty)
    }

    fn outcome(self) -> FillOutcome {
        FillOutcome {
            status: self.status,
            filled_quantity: self.filled_quantity(),
            average_price: self.average_price(),
            last_price: self.last_price,
            polls: self.polls,
            fills: self.fills,
        }
    }

    /// Poll until terminal, the failure bound, or the deadline.
    /// Consumes the tracker so a finished order is never polled again.
    pub async fn track<B>(mut self, broker: &B) -> FillOutcome
    where
        B: BrokerApi + ?Sized,
    {
        info!(
            "📋 Tracking order {} for {} (every {:?}, timeout {:?})",
            self.handle, self.requested, self.config.poll_interval, self.config.timeout
        );
        let deadline = Instant::now() + self.config.timeout;

        loop {
            self.polls += 1;
            match broker.get_order(self.handle.as_str()).await {
                Ok(record) => {
                    let status = self.observe(&record);
                    debug!(
                        "⏳ Order {} poll {}: {} ({} / {})",
                        self.handle,
                        self.polls,
                        status,
                        self.filled_quantity(),
                        self.requested
                    );
                    if status.is_terminal() {
                        info!(
                            "✅ Order {} finished as {} after {} polls",
                            self.handle, status, self.polls
                        );
                        return self.outcome();
                    }
                }
                Err(e) => {
                    if self.record_failure(&e) {
                        warn!(
                            "🛑 Giving up on order {} after {} consecutive '{}' failures",
                            self.handle, self.consecutive_failures, e.kind()
                        );
                        self.status = OrderStatus::Unknown;
                        return self.outcome();
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "⏰ Order {} not terminal after {:?}; filled {} of {}",
                    self.handle,
                    self.config.timeout,
                    self.filled_quantity(),
                    self.requested
                );
                self.status = OrderStatus::Unknown;
                return self.outcome();
            }
            sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }
}

/// Track `handle` with a fresh tracker
pub async fn track_order<B>(
    broker: &B,
    handle: OrderHandle,
    requested: Decimal,
    config: TrackerConfig,
) -> FillOutcome
where
    B: BrokerApi + ?Sized,
{
    FulfillmentTracker::new(handle, requested, config)
        .track(broker)
        .await
}
