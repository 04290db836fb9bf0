//! Broker wire types
//! Every tastytrade response wraps its payload in `{"data": ...}`; amounts arrive as decimal strings

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// `{"data": T}` response wrapper
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// `{"items": [...]}` list payload
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ItemList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// Session creation payload
#[derive(Debug, Clone, Deserialize)]
pub struct SessionData {
    #[serde(rename = "session-token")]
    pub session_token: String,
    #[serde(default)]
    pub user: Option<serde_json::Value>,
}

/// Account balances
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccountBalance {
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub cash_balance: Option<Decimal>,
    #[serde(default, alias = "equity-buying-power", deserialize_with = "de_opt_decimal")]
    pub buying_power: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub net_liquidating_value: Option<Decimal>,
}

/// A single account position
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PositionItem {
    pub symbol: String,
    #[serde(default)]
    pub instrument_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub quantity_direction: Option<String>,
}

impl PositionItem {
    /// Quantity with direction applied (shorts negative)
    pub fn signed_quantity(&self) -> Decimal {
        let qty = self.quantity.unwrap_or(Decimal::ZERO).abs();
        match self.quantity_direction.as_deref() {
            Some("Short") => -qty,
            _ => qty,
        }
    }
}

/// Market data row from `/market-data/by-type`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MarketDataItem {
    pub symbol: String,
    #[serde(default)]
    pub instrument_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub bid: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub ask: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub mid: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub last: Option<Decimal>,
}

/// Option chain entry from `/option-chains/{symbol}`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OptionChainItem {
    pub symbol: String,
    pub expiration_date: String,
    #[serde(deserialize_with = "de_decimal")]
    pub strike_price: Decimal,
    pub option_type: String,
    #[serde(default)]
    pub underlying_symbol: Option<String>,
}

/// A fill as reported on an order or one of its legs
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OrderFill {
    #[serde(default, alias = "ext-exec-id", deserialize_with = "de_opt_id")]
    pub fill_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub quantity: Option<Decimal>,
    #[serde(default, alias = "price", deserialize_with = "de_opt_decimal")]
    pub fill_price: Option<Decimal>,
    #[serde(default)]
    pub filled_at: Option<String>,
}

/// Order leg
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OrderLeg {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub instrument_type: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub quantity: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub remaining_quantity: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub filled_price: Option<Decimal>,
    #[serde(default = "Vec::new")]
    pub fills: Vec<OrderFill>,
}

/// Order as returned by `/accounts/{acct}/orders/{id}`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OrderRecord {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub size: Option<Decimal>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub filled_quantity: Option<Decimal>,
    #[serde(default = "Vec::new")]
    pub legs: Vec<OrderLeg>,
    #[serde(default = "Vec::new")]
    pub fills: Vec<OrderFill>,
    #[serde(default)]
    pub reject_reason: Option<String>,
}

impl OrderRecord {
    /// Order-level fills followed by every leg's fills
    pub fn all_fills(&self) -> impl Iterator<Item = &OrderFill> {
        self.fills
            .iter()
            .chain(self.legs.iter().flat_map(|leg| leg.fills.iter()))
    }

    /// Filled price reported on the first leg, if any
    pub fn first_leg_filled_price(&self) -> Option<Decimal> {
        self.legs.first().and_then(|leg| leg.filled_price)
    }
}

/// Pull an order out of a `data` payload that is either the order itself or `{"order": {...}}`
pub fn unwrap_order(data: serde_json::Value) -> Result<OrderRecord, serde_json::Error> {
    match data {
        serde_json::Value::Object(mut map) if map.contains_key("order") => {
            let order = map.remove("order").unwrap_or(serde_json::Value::Null);
            serde_json::from_value(order)
        }
        other => serde_json::from_value(other),
    }
}

/// Broker-assigned id from an order creation response
pub fn extract_order_id(data: &serde_json::Value) -> Option<String> {
    let candidates = [
        data.pointer("/order/id"),
        data.get("order-id"),
        data.get("id"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(id_to_string)
}

fn id_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decimal from a JSON string or number; empty strings and nulls read as `None`
fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Deserialize::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(serde_json::Value::Number(n)) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected decimal, got {other}"
        ))),
    }
}

fn de_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    de_opt_decimal(deserializer)?.ok_or_else(|| serde::de::Error::custom("missing decimal"))
}

/// Ids come back as either strings or integers
fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Deserialize::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_to_string))
}
