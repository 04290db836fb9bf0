//! Order and account types shared by the submitter, tracker and reconciler

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Price effect of a priced order on this side
    pub fn price_effect(self) -> PriceEffect {
        match self {
            Side::Buy => PriceEffect::Debit,
            Side::Sell => PriceEffect::Credit,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "b" => Ok(Side::Buy),
            "sell" | "s" => Ok(Side::Sell),
            other => Err(format!("unknown side '{other}'")),
        }
    }
}

/// Whether an order opens or closes a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionEffect {
    Open,
    Close,
}

/// Instrument kind of a whole order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentKind {
    Equity,
    MultiLegOption,
}

/// Instrument type of a single leg, as the broker spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegInstrument {
    #[serde(rename = "Equity")]
    Equity,
    #[serde(rename = "Equity Option")]
    EquityOption,
}

/// Leg action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    #[serde(rename = "Buy to Open")]
    BuyToOpen,
    #[serde(rename = "Sell to Close")]
    SellToClose,
    #[serde(rename = "Sell to Open")]
    SellToOpen,
    #[serde(rename = "Buy to Close")]
    BuyToClose,
}

impl OrderAction {
    pub fn new(side: Side, effect: PositionEffect) -> Self {
        match (side, effect) {
            (Side::Buy, PositionEffect::Open) => OrderAction::BuyToOpen,
            (Side::Sell, PositionEffect::Close) => OrderAction::SellToClose,
            (Side::Sell, PositionEffect::Open) => OrderAction::SellToOpen,
            (Side::Buy, PositionEffect::Close) => OrderAction::BuyToClose,
        }
    }

    pub fn side(self) -> Side {
        match self {
            OrderAction::BuyToOpen | OrderAction::BuyToClose => Side::Buy,
            OrderAction::SellToOpen | OrderAction::SellToClose => Side::Sell,
        }
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderAction::BuyToOpen => "Buy to Open",
            OrderAction::SellToClose => "Sell to Close",
            OrderAction::SellToOpen => "Sell to Open",
            OrderAction::BuyToClose => "Buy to Close",
        };
        write!(f, "{s}")
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    #[default]
    Day,
    #[serde(rename = "GTC")]
    Gtc,
}

/// Direction of cash for a priced order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceEffect {
    Debit,
    Credit,
}

/// One leg of an order request
#[derive(Debug, Clone, PartialEq)]
pub struct LegRequest {
    pub instrument: LegInstrument,
    pub symbol: String,
    pub quantity: Decimal,
    pub action: OrderAction,
}

/// What to trade. Built once, then only borrowed by the submitter.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    symbol: String,
    side: Side,
    quantity: Decimal,
    instrument: InstrumentKind,
    price: Option<Decimal>,
    time_in_force: TimeInForce,
    effect: PositionEffect,
    legs: Vec<LegRequest>,
}

impl OrderRequest {
    /// Single-leg equity market order
    pub fn equity(symbol: &str, side: Side, quantity: Decimal, effect: PositionEffect) -> Self {
        let symbol = symbol.trim().to_uppercase();
        let legs = vec![LegRequest {
            instrument: LegInstrument::Equity,
            symbol: symbol.clone(),
            quantity,
            action: OrderAction::new(side, effect),
        }];
        Self {
            symbol,
            side,
            quantity,
            instrument: InstrumentKind::Equity,
            price: None,
            time_in_force: TimeInForce::Day,
            effect,
            legs,
        }
    }

    /// Multi-leg option order on `underlying`. `side` is the direction of the structure.
    pub fn multi_leg(underlying: &str, side: Side, quantity: Decimal, legs: Vec<LegRequest>) -> Self {
        Self {
            symbol: underlying.trim().to_uppercase(),
            side,
            quantity,
            instrument: InstrumentKind::MultiLegOption,
            price: None,
            time_in_force: TimeInForce::Day,
            effect: PositionEffect::Open,
            legs,
        }
    }

    /// Limit price. Multi-leg prices are net: positive is a credit, negative a debit.
    pub fn with_limit(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn instrument(&self) -> InstrumentKind {
        self.instrument
    }

    pub fn price(&self) -> Option<Decimal> {
        self.price
    }

    pub fn time_in_force(&self) -> TimeInForce {
        self.time_in_force
    }

    pub fn effect(&self) -> PositionEffect {
        self.effect
    }

    pub fn legs(&self) -> &[LegRequest] {
        &self.legs
    }

    pub fn order_type(&self) -> OrderType {
        if self.price.is_some() {
            OrderType::Limit
        } else {
            OrderType::Market
        }
    }
}

/// Broker-assigned order id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderHandle(String);

impl OrderHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    PartiallyFilled,
    Rejected,
    Cancelled,
    Expired,
    Unknown,
}

impl OrderStatus {
    /// Map a broker status string
    pub fn from_broker(status: &str) -> Self {
        match status.trim() {
            "Received" | "Routed" | "In Flight" | "Live" | "Contingent" | "Cancel Requested"
            | "Replace Requested" => OrderStatus::Pending,
            "Filled" => OrderStatus::Filled,
            "Partially Filled" | "Partially-Filled" => OrderStatus::PartiallyFilled,
            "Rejected" => OrderStatus::Rejected,
            "Cancelled" | "Canceled" => OrderStatus::Cancelled,
            "Expired" => OrderStatus::Expired,
            _ => OrderStatus::Unknown,
        }
    }

    /// No further transitions happen from a terminal status
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Rejected | OrderStatus::Cancelled | OrderStatus::Expired
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Filled => "Filled",
            OrderStatus::PartiallyFilled => "PartiallyFilled",
            OrderStatus::Rejected => "Rejected",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Expired => "Expired",
            OrderStatus::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

/// An execution against an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub filled_at: Option<DateTime<Utc>>,
}

/// Cash and position for one symbol at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub symbol: String,
    pub cash_balance: Decimal,
    pub position: Decimal,
    pub taken_at: DateTime<Utc>,
}

impl AccountSnapshot {
    pub fn new(symbol: &str, cash_balance: Decimal, position: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            cash_balance,
            position,
            taken_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_action_from_side_and_effect() {
        assert_eq!(OrderAction::new(Side::Buy, PositionEffect::Open), OrderAction::BuyToOpen);
        assert_eq!(OrderAction::new(Side::Sell, PositionEffect::Close), OrderAction::SellToClose);
        assert_eq!(OrderAction::SellToOpen.to_string(), "Sell to Open");
        assert_eq!(
            serde_json::to_value(OrderAction::BuyToClose).unwrap(),
            serde_json::json!("Buy to Close")
        );
    }

    #[test]
    fn test_status_mapping_and_terminal_states() {
        assert_eq!(OrderStatus::from_broker("Live"), OrderStatus::Pending);
        assert_eq!(OrderStatus::from_broker("Canceled"), OrderStatus::Cancelled);
        assert_eq!(OrderStatus::from_broker("garbage"), OrderStatus::Unknown);

        for status in [OrderStatus::Filled, OrderStatus::Rejected, OrderStatus::Cancelled, OrderStatus::Expired] {
            assert!(status.is_terminal());
        }
        for status in [OrderStatus::Pending, OrderStatus::PartiallyFilled, OrderStatus::Unknown] {
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn test_equity_request_defaults_to_market_day() {
        let req = OrderRequest::equity("sgov", Side::Buy, dec!(9), PositionEffect::Open);
        assert_eq!(req.symbol(), "SGOV");
        assert_eq!(req.order_type(), OrderType::Market);
        assert_eq!(req.time_in_force(), TimeInForce::Day);
        assert_eq!(req.legs().len(), 1);
        assert_eq!(req.legs()[0].action, OrderAction::BuyToOpen);

        let limit = req.with_limit(dec!(100.25));
        assert_eq!(limit.order_type(), OrderType::Limit);
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("B".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("sell".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());
    }
}
