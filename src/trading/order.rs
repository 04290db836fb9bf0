//! Order construction and submission
//! Single-leg equity orders and two-leg risk reversals

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::api::models::extract_order_id;
use crate::api::{ApiError, BrokerApi};
use crate::trading::errors::TradingError;
use crate::trading::occ::{build_occ_symbol, OccSymbol, OptionType};
use crate::trading::simulation::{DryRunRecorder, TradingMode};
use crate::trading::types::{
    InstrumentKind, LegInstrument, LegRequest, OrderAction, OrderHandle, OrderRequest, OrderType,
    PriceEffect, Side, TimeInForce,
};

/// Wire payload for `POST /accounts/{acct}/orders`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OrderPayload {
    pub time_in_force: TimeInForce,
    pub order_type: OrderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_effect: Option<PriceEffect>,
    pub legs: Vec<LegPayload>,
}

/// Wire leg
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LegPayload {
    pub instrument_type: LegInstrument,
    pub symbol: String,
    pub quantity: Decimal,
    pub action: OrderAction,
}

/// Turn a request into the broker payload.
///
/// Equity orders carry a price effect from the side (`Debit` buys, `Credit` sells).
/// Multi-leg limit prices are net: positive is a credit, negative a debit.
pub fn build_payload(request: &OrderRequest) -> Result<OrderPayload, TradingError> {
    if request.quantity() <= Decimal::ZERO {
        return Err(TradingError::InvalidOrder {
            reason: format!("quantity must be positive, got {}", request.quantity()),
        });
    }
    if request.legs().is_empty() {
        return Err(TradingError::InvalidOrder {
            reason: "order has no legs".to_string(),
        });
    }

    let (price, price_effect) = match (request.instrument(), request.price()) {
        (InstrumentKind::Equity, None) => (None, Some(request.side().price_effect())),
        (InstrumentKind::Equity, Some(p)) if p > Decimal::ZERO => {
            (Some(format_price(p)), Some(request.side().price_effect()))
        }
        (InstrumentKind::Equity, Some(p)) => {
            return Err(TradingError::InvalidOrder {
                reason: format!("equity limit price must be positive, got {p}"),
            })
        }
        (InstrumentKind::MultiLegOption, None) => (None, None),
        (InstrumentKind::MultiLegOption, Some(p)) if p.is_zero() => {
            return Err(TradingError::InvalidOrder {
                reason: "net limit price of zero; use a market order".to_string(),
            })
        }
        (InstrumentKind::MultiLegOption, Some(p)) => {
            let effect = if p > Decimal::ZERO {
                PriceEffect::Credit
            } else {
                PriceEffect::Debit
            };
            (Some(format_price(p.abs())), Some(effect))
        }
    };

    let legs = request
        .legs()
        .iter()
        .map(|leg| LegPayload {
            instrument_type: leg.instrument,
            symbol: leg.symbol.clone(),
            quantity: leg.quantity,
            action: leg.action,
        })
        .collect();

    Ok(OrderPayload {
        time_in_force: request.time_in_force(),
        order_type: request.order_type(),
        price,
        price_effect,
        legs,
    })
}

fn format_price(price: Decimal) -> String {
    format!("{:.2}", price.round_dp(2))
}

/// Risk reversal on one strike and expiry.
///
/// `Side::Buy` is bullish (short put, long call); `Side::Sell` is bearish (long put, short call).
pub fn risk_reversal_request(
    underlying: &str,
    expiry: NaiveDate,
    strike: Decimal,
    direction: Side,
    contracts: Decimal,
    net_limit: Option<Decimal>,
) -> Result<OrderRequest, TradingError> {
    let put = build_occ_symbol(underlying, expiry, OptionType::Put, strike)?;
    let call = build_occ_symbol(underlying, expiry, OptionType::Call, strike)?;

    let (put_action, call_action) = match direction {
        Side::Buy => (OrderAction::SellToOpen, OrderAction::BuyToOpen),
        Side::Sell => (OrderAction::BuyToOpen, OrderAction::SellToOpen),
    };

    let legs = vec![
        LegRequest {
            instrument: LegInstrument::EquityOption,
            symbol: put,
            quantity: contracts,
            action: put_action,
        },
        LegRequest {
            instrument: LegInstrument::EquityOption,
            symbol: call,
            quantity: contracts,
            action: call_action,
        },
    ];

    let request = OrderRequest::multi_leg(underlying, direction, contracts, legs);
    Ok(match net_limit {
        Some(price) => request.with_limit(price),
        None => request,
    })
}

/// Submits orders, or records them when running dry
pub struct OrderSubmitter<B: ?Sized> {
    broker: Arc<B>,
    mode: TradingMode,
    recorder: Arc<DryRunRecorder>,
}

impl<B> OrderSubmitter<B>
where
    B: BrokerApi + ?Sized,
{
    pub fn new(broker: Arc<B>, mode: TradingMode) -> Self {
        Self {
            broker,
            mode,
            recorder: Arc::new(DryRunRecorder::new()),
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<DryRunRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn mode(&self) -> TradingMode {
        self.mode
    }

    /// Submit `request`. Returns `None` in dry-run mode.
    pub async fn submit(&self, request: &OrderRequest) -> Result<Option<OrderHandle>, TradingError> {
        let payload = build_payload(request)?;
        let body = serde_json::to_value(&payload).map_err(ApiError::from)?;
        let summary = describe(request);

        if self.mode.is_dry_run() {
            self.recorder.record(summary, body);
            return Ok(None);
        }

        info!("📤 Placing order: {}", summary);
        let data = self.broker.create_order(&body).await.map_err(|e| match e {
            ApiError::ApiError { status, message } => TradingError::OrderRejected {
                status,
                body: message,
            },
            ApiError::Unauthorized { message } => TradingError::OrderRejected {
                status: 401,
                body: message,
            },
            other => TradingError::from(other),
        });

        let data = match data {
            Ok(data) => data,
            Err(e) => {
                error!("❌ Order failed: {}", e);
                return Err(e);
            }
        };

        let order_id = extract_order_id(&data).ok_or_else(|| TradingError::OrderRejected {
            status: 200,
            body: format!("no order id returned: {data}"),
        })?;
        info!("✅ Order placed successfully (ID: {})", order_id);
        Ok(Some(OrderHandle::new(order_id)))
    }

    /// Broker-side validation without routing; returns the raw response
    pub async fn preview(&self, request: &OrderRequest) -> Result<serde_json::Value, TradingError> {
        let payload = build_payload(request)?;
        let body = serde_json::to_value(&payload).map_err(ApiError::from)?;
        self.broker.preview_order(&body).await.map_err(|e| match e {
            ApiError::ApiError { status, message } => TradingError::OrderRejected {
                status,
                body: message,
            },
            other => TradingError::from(other),
        })
    }
}

/// One-line human description of a request
pub fn describe(request: &OrderRequest) -> String {
    let price = match request.price() {
        Some(p) => format!("limit {}", format_price(p)),
        None => "market".to_string(),
    };
    match request.instrument() {
        InstrumentKind::Equity => format!(
            "{} {} {} ({})",
            request.legs()[0].action,
            request.quantity(),
            request.symbol(),
            price
        ),
        InstrumentKind::MultiLegOption => {
            let legs: Vec<String> = request
                .legs()
                .iter()
                .map(|l| {
                    let label = OccSymbol::parse(&l.symbol)
                        .map(|occ| occ.to_string())
                        .unwrap_or_else(|_| l.symbol.trim_end().to_string());
                    format!("{} {} {}", l.action, l.quantity, label)
                })
                .collect();
            format!("{} [{}] ({})", request.symbol(), legs.join(" / "), price)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockBrokerApi;
    use crate::trading::types::PositionEffect;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_sell_limit_is_credit_buy_limit_is_debit() {
        let sell = OrderRequest::equity("SGOV", Side::Sell, dec!(5), PositionEffect::Close)
            .with_limit(dec!(100.5));
        let payload = serde_json::to_value(build_payload(&sell).unwrap()).unwrap();
        assert_eq!(payload["price-effect"], json!("Credit"));
        assert_eq!(payload["price"], json!("100.50"));
        assert_eq!(payload["order-type"], json!("Limit"));
        assert_eq!(payload["legs"][0]["action"], json!("Sell to Close"));

        let buy = OrderRequest::equity("SGOV", Side::Buy, dec!(5), PositionEffect::Open)
            .with_limit(dec!(100.5));
        let payload = serde_json::to_value(build_payload(&buy).unwrap()).unwrap();
        assert_eq!(payload["price-effect"], json!("Debit"));
        assert_eq!(payload["legs"][0]["action"], json!("Buy to Open"));
    }

    #[test]
    fn test_describe_labels_option_legs() {
        let expiry = NaiveDate::from_ymd_opt(2025, 12, 26).unwrap();
        let req = risk_reversal_request("T", expiry, dec!(27), Side::Buy, dec!(1), None).unwrap();
        assert_eq!(
            describe(&req),
            "T [Sell to Open 1 T 2025-12-26 27 P / Buy to Open 1 T 2025-12-26 27 C] (market)"
        );
    }

    #[test]
    fn test_market_equity_payload_shape() {
        let req = OrderRequest::equity("sgov", Side::Buy, dec!(9), PositionEffect::Open);
        let payload = serde_json::to_value(build_payload(&req).unwrap()).unwrap();
        assert_eq!(
            payload,
            json!({
                "time-in-force": "Day",
                "order-type": "Market",
                "price-effect": "Debit",
                "legs": [{
                    "instrument-type": "Equity",
                    "symbol": "SGOV",
                    "quantity": "9",
                    "action": "Buy to Open"
                }]
            })
        );
    }

    #[test]
    fn test_rejects_non_positive_quantity_and_price() {
        let zero = OrderRequest::equity("SPY", Side::Buy, dec!(0), PositionEffect::Open);
        assert!(matches!(build_payload(&zero), Err(TradingError::InvalidOrder { .. })));

        let neg = OrderRequest::equity("SPY", Side::Buy, dec!(1), PositionEffect::Open)
            .with_limit(dec!(-2));
        assert!(build_payload(&neg).is_err());
    }

    #[test]
    fn test_bullish_risk_reversal_legs() {
        let expiry = NaiveDate::from_ymd_opt(2025, 12, 26).unwrap();
        let req = risk_reversal_request("T", expiry, dec!(27), Side::Buy, dec!(2), Some(dec!(0.15)))
            .unwrap();
        let payload = serde_json::to_value(build_payload(&req).unwrap()).unwrap();

        assert_eq!(payload["price-effect"], json!("Credit"));
        assert_eq!(payload["price"], json!("0.15"));
        assert_eq!(payload["legs"][0]["symbol"], json!("T     251226P00027000"));
        assert_eq!(payload["legs"][0]["action"], json!("Sell to Open"));
        assert_eq!(payload["legs"][0]["instrument-type"], json!("Equity Option"));
        assert_eq!(payload["legs"][1]["symbol"], json!("T     251226C00027000"));
        assert_eq!(payload["legs"][1]["action"], json!("Buy to Open"));
    }

    #[test]
    fn test_bearish_risk_reversal_debit() {
        let expiry = NaiveDate::from_ymd_opt(2026, 3, 20).unwrap();
        let req = risk_reversal_request("TQQQ", expiry, dec!(50), Side::Sell, dec!(1), Some(dec!(-0.4)))
            .unwrap();
        let payload = build_payload(&req).unwrap();
        assert_eq!(payload.price_effect, Some(PriceEffect::Debit));
        assert_eq!(payload.price.as_deref(), Some("0.40"));
        assert_eq!(payload.legs[0].action, OrderAction::BuyToOpen);
        assert_eq!(payload.legs[1].action, OrderAction::SellToOpen);

        let market = risk_reversal_request("TQQQ", expiry, dec!(50), Side::Sell, dec!(1), None).unwrap();
        let payload = build_payload(&market).unwrap();
        assert_eq!(payload.order_type, OrderType::Market);
        assert_eq!(payload.price_effect, None);
    }

    #[tokio::test]
    async fn test_submit_returns_handle() {
        let mut broker = MockBrokerApi::new();
        broker
            .expect_create_order()
            .times(1)
            .returning(|_| Ok(json!({ "order": { "id": 98765, "status": "Received" } })));

        let submitter = OrderSubmitter::new(Arc::new(broker), TradingMode::Live);
        let req = OrderRequest::equity("SGOV", Side::Buy, dec!(1), PositionEffect::Open);
        let handle = submitter.submit(&req).await.unwrap();
        assert_eq!(handle, Some(OrderHandle::new("98765")));
    }

    #[tokio::test]
    async fn test_submit_rejection_carries_raw_body() {
        let mut broker = MockBrokerApi::new();
        broker.expect_create_order().returning(|_| {
            Err(ApiError::ApiError {
                status: 422,
                message: r#"{"error":{"code":"insufficient_buying_power"}}"#.to_string(),
            })
        });

        let submitter = OrderSubmitter::new(Arc::new(broker), TradingMode::Live);
        let req = OrderRequest::equity("SGOV", Side::Buy, dec!(1), PositionEffect::Open);
        match submitter.submit(&req).await {
            Err(TradingError::OrderRejected { status, body }) => {
                assert_eq!(status, 422);
                assert!(body.contains("insufficient_buying_power"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let mut broker = MockBrokerApi::new();
        broker.expect_create_order().never();

        let recorder = Arc::new(DryRunRecorder::new());
        let submitter = OrderSubmitter::new(Arc::new(broker), TradingMode::DryRun)
            .with_recorder(Arc::clone(&recorder));
        let req = OrderRequest::equity("SGOV", Side::Sell, dec!(3), PositionEffect::Close);
        assert_eq!(submitter.submit(&req).await.unwrap(), None);
        assert_eq!(recorder.count(), 1);
    }
}
