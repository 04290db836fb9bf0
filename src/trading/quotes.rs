//! Spot and option quotes

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::api::{BrokerApi, MarketDataItem};
use crate::trading::errors::TradingError;

/// Bid/ask pair; missing sides read as zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BidAsk {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl BidAsk {
    /// Midpoint when both sides are quoted, zero otherwise
    pub fn mid(&self) -> Decimal {
        if self.bid > Decimal::ZERO && self.ask > Decimal::ZERO {
            (self.bid + self.ask) / Decimal::TWO
        } else {
            Decimal::ZERO
        }
    }
}

/// Tradable price from a quote row: mid, then last, then the bid/ask midpoint
pub fn tradable_price(item: &MarketDataItem) -> Option<Decimal> {
    let positive = |v: Option<Decimal>| v.filter(|p| *p > Decimal::ZERO);

    positive(item.mid).or_else(|| positive(item.last)).or_else(|| {
        match (positive(item.bid), positive(item.ask)) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    })
}

/// Current price of an equity
pub async fn get_spot_price<B>(broker: &B, symbol: &str) -> Result<Decimal, TradingError>
where
    B: BrokerApi + ?Sized,
{
    let symbol = symbol.trim().to_uppercase();
    let items = broker
        .market_data(std::slice::from_ref(&symbol), &[])
        .await
        .map_err(|e| TradingError::QuoteUnavailable {
            symbol: symbol.clone(),
            reason: e.to_string(),
        })?;

    let item = items
        .iter()
        .find(|i| i.symbol.eq_ignore_ascii_case(&symbol))
        .ok_or_else(|| TradingError::QuoteUnavailable {
            symbol: symbol.clone(),
            reason: "symbol not in quote response".to_string(),
        })?;

    let price = tradable_price(item).ok_or_else(|| TradingError::QuoteUnavailable {
        symbol: symbol.clone(),
        reason: "no positive mid/last price".to_string(),
    })?;

    info!("{} price: ${:.4}", symbol, price);
    Ok(price)
}

/// Bid/ask for a batch of OCC symbols; symbols the broker omits get zeros
pub async fn get_option_quotes<B>(
    broker: &B,
    occ_symbols: &[String],
) -> Result<HashMap<String, BidAsk>, TradingError>
where
    B: BrokerApi + ?Sized,
{
    if occ_symbols.is_empty() {
        return Ok(HashMap::new());
    }

    let items = broker.market_data(&[], occ_symbols).await?;
    let mut quotes: HashMap<String, BidAsk> = items
        .into_iter()
        .map(|item| {
            let quote = BidAsk {
                bid: item.bid.unwrap_or(Decimal::ZERO),
                ask: item.ask.unwrap_or(Decimal::ZERO),
            };
            (item.symbol, quote)
        })
        .collect();

    for sym in occ_symbols {
        if !quotes.contains_key(sym) {
            warn!("No quote returned for {:?}", sym);
            quotes.insert(sym.clone(), BidAsk::default());
        }
    }
    debug!("Fetched {} option quotes", quotes.len());
    Ok(quotes)
}
