//! Risk reversal planning and execution
//!
//! Picks an expiry from the open chain, centers a strike window on the
//! in-the-money strike, prices each strike at NAT/MID/OPP and suggests one.

use chrono::{Duration as ChronoDuration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::api::{BrokerApi, OptionChainItem};
use crate::strategy::pricing::{
    itm_strike, price_table, strike_window, suggest_strike, NetPrice, SpreadPrices, StrikeQuotes,
};
use crate::trading::balance::get_buying_power;
use crate::trading::errors::TradingError;
use crate::trading::occ::{build_occ_symbol, OptionType};
use crate::trading::order::{risk_reversal_request, OrderSubmitter};
use crate::trading::order_tracker::{track_order, FillOutcome, TrackerConfig};
use crate::trading::quotes::{get_option_quotes, get_spot_price};
use crate::trading::types::Side;

/// Risk reversal defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskReversalConfig {
    pub default_symbol: String,
    pub expiry_choice: ExpiryChoice,
    /// Strikes on each side of the in-the-money strike
    pub strike_radius: usize,
    pub default_quantity: Decimal,
}

impl Default for RiskReversalConfig {
    fn default() -> Self {
        Self {
            default_symbol: "TQQQ".to_string(),
            expiry_choice: ExpiryChoice::Long,
            strike_radius: 3,
            default_quantity: Decimal::ONE,
        }
    }
}

/// Expiry bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ExpiryChoice {
    /// Expires today
    ZeroDte,
    /// 45 to 99 days out
    Medium,
    /// 100 or more days out
    Long,
}

impl ExpiryChoice {
    pub fn label(self) -> &'static str {
        match self {
            ExpiryChoice::ZeroDte => "0-DTE (today)",
            ExpiryChoice::Medium => "45+ to <100 DTE",
            ExpiryChoice::Long => "100+ DTE",
        }
    }

    pub fn accepts(self, today: NaiveDate, expiry: NaiveDate) -> bool {
        match self {
            ExpiryChoice::ZeroDte => expiry == today,
            ExpiryChoice::Medium => {
                expiry >= today + ChronoDuration::days(45) && expiry <= today + ChronoDuration::days(99)
            }
            ExpiryChoice::Long => expiry >= today + ChronoDuration::days(100),
        }
    }
}

impl TryFrom<u8> for ExpiryChoice {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ExpiryChoice::ZeroDte),
            1 => Ok(ExpiryChoice::Medium),
            2 => Ok(ExpiryChoice::Long),
            other => Err(format!("expiry choice must be 0, 1 or 2, got {other}")),
        }
    }
}

impl From<ExpiryChoice> for u8 {
    fn from(choice: ExpiryChoice) -> Self {
        match choice {
            ExpiryChoice::ZeroDte => 0,
            ExpiryChoice::Medium => 1,
            ExpiryChoice::Long => 2,
        }
    }
}

impl FromStr for ExpiryChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code: u8 = s.trim().parse().map_err(|_| format!("invalid expiry choice '{s}'"))?;
        ExpiryChoice::try_from(code)
    }
}

impl fmt::Display for ExpiryChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Earliest listed expiry in the chosen bucket
pub fn select_expiry(expirations: &[NaiveDate], today: NaiveDate, choice: ExpiryChoice) -> Option<NaiveDate> {
    expirations
        .iter()
        .copied()
        .filter(|e| choice.accepts(today, *e))
        .min()
}

/// Which sides are listed at each strike
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListedSides {
    pub put: bool,
    pub call: bool,
}

/// Distinct expirations in the chain
pub fn chain_expirations(chain: &[OptionChainItem]) -> Vec<NaiveDate> {
    let set: BTreeSet<NaiveDate> = chain
        .iter()
        .filter_map(|item| NaiveDate::parse_from_str(&item.expiration_date, "%Y-%m-%d").ok())
        .collect();
    set.into_iter().collect()
}

/// Strikes listed for one expiry
pub fn strikes_for_expiry(chain: &[OptionChainItem], expiry: NaiveDate) -> BTreeMap<Decimal, ListedSides> {
    let expiry = expiry.format("%Y-%m-%d").to_string();
    let mut strikes: BTreeMap<Decimal, ListedSides> = BTreeMap::new();
    for item in chain.iter().filter(|i| i.expiration_date == expiry) {
        let Ok(option_type) = OptionType::from_str(&item.option_type) else {
            warn!("Skipping chain row with option type {:?}", item.option_type);
            continue;
        };
        let sides = strikes.entry(item.strike_price.normalize()).or_default();
        match option_type {
            OptionType::Put => sides.put = true,
            OptionType::Call => sides.call = true,
        }
    }
    strikes
}

/// A priced plan for one underlying
#[derive(Debug, Clone, Serialize)]
pub struct RiskReversalPlan {
    pub symbol: String,
    pub expiry: NaiveDate,
    pub spot: Decimal,
    pub itm_strike: Decimal,
    /// Sorted by NAT, most debit first
    pub table: Vec<SpreadPrices>,
    pub suggested_strike: Option<Decimal>,
    pub buying_power: Option<Decimal>,
}

impl RiskReversalPlan {
    /// Lines for the terminal
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "[{}] Risk Reversal (Expiry: {}) | Spot ${:.2} | ITM strike {}",
                self.symbol, self.expiry, self.spot, self.itm_strike
            ),
            match self.buying_power {
                Some(bp) => format!("Account Buying Power: ${bp:.2}"),
                None => "Account Buying Power: <unavailable>".to_string(),
            },
        ];
        for row in &self.table {
            lines.push(format!(
                "  {:>8}  NAT: {:<10} MID: {:<10} OPP: {:<10} bearish ${:.2}",
                row.strike,
                NetPrice(row.nat).to_string(),
                NetPrice(row.mid).to_string(),
                NetPrice(row.opp).to_string(),
                row.bearish_width
            ));
        }
        match self.suggested_strike {
            Some(s) => lines.push(format!("Suggested strike: ${s}")),
            None => lines.push("No strikes with both sides quoted".to_string()),
        }
        lines
    }
}

/// Fetch chain and quotes and price the strike window.
/// `strikes` overrides the default window; unknown strikes are dropped.
pub async fn build_plan<B>(
    broker: &B,
    symbol: &str,
    choice: ExpiryChoice,
    today: NaiveDate,
    radius: usize,
    strikes: Option<&[Decimal]>,
) -> Result<RiskReversalPlan, TradingError>
where
    B: BrokerApi + ?Sized,
{
    let symbol = symbol.trim().to_uppercase();
    let spot = get_spot_price(broker, &symbol).await?;

    let chain = broker.option_chain(&symbol).await?;
    let expiry = select_expiry(&chain_expirations(&chain), today, choice).ok_or_else(|| {
        TradingError::QuoteUnavailable {
            symbol: symbol.clone(),
            reason: format!("no expiration for {}", choice.label()),
        }
    })?;
    info!("Selected expiry ({}): {}", choice.label(), expiry);

    let listed = strikes_for_expiry(&chain, expiry);
    let all_strikes: Vec<Decimal> = listed.keys().copied().collect();
    let itm = itm_strike(&all_strikes, spot).ok_or_else(|| TradingError::QuoteUnavailable {
        symbol: symbol.clone(),
        reason: format!("no strike below spot ${spot}"),
    })?;

    let targets: Vec<Decimal> = match strikes {
        Some(requested) => {
            let known: Vec<Decimal> = requested
                .iter()
                .map(|s| s.normalize())
                .filter(|s| listed.contains_key(s))
                .collect();
            if known.len() < requested.len() {
                warn!("Ignoring strikes not listed for {}", expiry);
            }
            if known.is_empty() {
                strike_window(&all_strikes, itm, radius)
            } else {
                known
            }
        }
        None => strike_window(&all_strikes, itm, radius),
    };

    let mut legs: Vec<(Decimal, String, String)> = Vec::new();
    for strike in targets {
        let sides = listed.get(&strike).copied().unwrap_or_default();
        if !(sides.put && sides.call) {
            continue;
        }
        let put = build_occ_symbol(&symbol, expiry, OptionType::Put, strike)?;
        let call = build_occ_symbol(&symbol, expiry, OptionType::Call, strike)?;
        legs.push((strike, put, call));
    }

    let occ_symbols: Vec<String> = legs
        .iter()
        .flat_map(|(_, put, call)| [put.clone(), call.clone()])
        .collect();
    let quotes = get_option_quotes(broker, &occ_symbols).await?;

    let rows: Vec<StrikeQuotes> = legs
        .iter()
        .map(|(strike, put, call)| StrikeQuotes {
            strike: *strike,
            put: quotes.get(put).copied().unwrap_or_default(),
            call: quotes.get(call).copied().unwrap_or_default(),
        })
        .collect();
    let table = price_table(&rows);
    let suggested_strike = suggest_strike(&table);

    let buying_power = match get_buying_power(broker).await {
        Ok(bp) => bp,
        Err(e) => {
            warn!("Could not fetch buying power: {}", e);
            None
        }
    };

    Ok(RiskReversalPlan {
        symbol,
        expiry,
        spot,
        itm_strike: itm,
        table,
        suggested_strike,
        buying_power,
    })
}

/// Order parameters chosen from a plan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskReversalOrder {
    pub strike: Decimal,
    /// `Buy` is bullish (short put, long call)
    pub direction: Side,
    pub contracts: Decimal,
    /// Net price: positive credit, negative debit; `None` is a market order
    pub limit: Option<Decimal>,
}

/// Submit the structure and track it. Returns `None` in dry-run mode.
pub async fn execute_risk_reversal<B>(
    broker: &B,
    submitter: &OrderSubmitter<B>,
    plan: &RiskReversalPlan,
    order: &RiskReversalOrder,
    tracker: &TrackerConfig,
) -> Result<Option<FillOutcome>, TradingError>
where
    B: BrokerApi + ?Sized,
{
    if !plan.table.iter().any(|row| row.strike == order.strike) {
        warn!("Strike {} was not in the priced window", order.strike);
    }
    let request = risk_reversal_request(
        &plan.symbol,
        plan.expiry,
        order.strike,
        order.direction,
        order.contracts,
        order.limit,
    )?;
    let Some(handle) = submitter.submit(&request).await? else {
        return Ok(None);
    };
    info!("Option order submitted! ID: {}", handle);
    Ok(Some(track_order(broker, handle, order.contracts, tracker.clone()).await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AccountBalance, MarketDataItem, MockBrokerApi};
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn chain_row(expiry: &str, strike: &str, option_type: &str) -> OptionChainItem {
        serde_json::from_value(json!({
            "symbol": "x",
            "expiration-date": expiry,
            "strike-price": strike,
            "option-type": option_type,
            "underlying-symbol": "TQQQ"
        }))
        .unwrap()
    }

    #[test]
    fn test_expiry_buckets() {
        let today = date(2025, 10, 1);
        let listed = [date(2025, 10, 1), date(2025, 11, 21), date(2025, 12, 19), date(2026, 1, 16), date(2026, 3, 20)];
        assert_eq!(select_expiry(&listed, today, ExpiryChoice::ZeroDte), Some(date(2025, 10, 1)));
        // Nov 21 is 51 days out, Dec 19 is 79
        assert_eq!(select_expiry(&listed, today, ExpiryChoice::Medium), Some(date(2025, 11, 21)));
        // Jan 16 is 107 days out
        assert_eq!(select_expiry(&listed, today, ExpiryChoice::Long), Some(date(2026, 1, 16)));
        assert_eq!(select_expiry(&listed[1..], today, ExpiryChoice::ZeroDte), None);
    }

    #[test]
    fn test_expiry_choice_parsing() {
        assert_eq!("1".parse::<ExpiryChoice>().unwrap(), ExpiryChoice::Medium);
        assert!("3".parse::<ExpiryChoice>().is_err());
        let cfg: RiskReversalConfig = serde_json::from_value(json!({ "expiry_choice": 0 })).unwrap();
        assert_eq!(cfg.expiry_choice, ExpiryChoice::ZeroDte);
    }

    #[test]
    fn test_chain_grouping() {
        let chain = vec![
            chain_row("2026-01-16", "50.0", "P"),
            chain_row("2026-01-16", "50", "C"),
            chain_row("2026-01-16", "55", "C"),
            chain_row("2026-03-20", "50", "P"),
        ];
        assert_eq!(chain_expirations(&chain), vec![date(2026, 1, 16), date(2026, 3, 20)]);
        let strikes = strikes_for_expiry(&chain, date(2026, 1, 16));
        assert_eq!(strikes[&dec!(50)], ListedSides { put: true, call: true });
        assert_eq!(strikes[&dec!(55)], ListedSides { put: false, call: true });
    }

    #[tokio::test]
    async fn test_build_plan_prices_window() {
        let mut broker = MockBrokerApi::new();
        broker.expect_market_data().returning(|equities, options| {
            if !equities.is_empty() {
                return Ok(vec![serde_json::from_value::<MarketDataItem>(
                    json!({ "symbol": "TQQQ", "mid": "51.30" }),
                )
                .unwrap()]);
            }
            Ok(options
                .iter()
                .map(|sym| {
                    let strike = &sym[13..];
                    let is_put = sym.as_bytes()[12] == b'P';
                    let (bid, ask) = match (strike, is_put) {
                        ("00050000", true) => ("2.00", "2.20"),
                        ("00050000", false) => ("1.90", "2.10"),
                        ("00048000", true) => ("1.00", "1.10"),
                        ("00048000", false) => ("3.00", "3.20"),
                        (_, true) => ("3.00", "3.20"),
                        (_, false) => ("1.00", "1.10"),
                    };
                    serde_json::from_value(json!({ "symbol": sym, "bid": bid, "ask": ask })).unwrap()
                })
                .collect())
        });
        broker.expect_option_chain().returning(|_| {
            let mut rows = Vec::new();
            for strike in ["48", "50", "52"] {
                rows.push(chain_row("2026-01-16", strike, "P"));
                rows.push(chain_row("2026-01-16", strike, "C"));
            }
            Ok(rows)
        });
        broker.expect_balances().returning(|| {
            Ok(AccountBalance {
                account_number: None,
                cash_balance: Some(dec!(100)),
                buying_power: Some(dec!(25000)),
                net_liquidating_value: None,
            })
        });

        let plan = build_plan(&broker, "tqqq", ExpiryChoice::Long, date(2025, 10, 1), 3, None)
            .await
            .unwrap();
        assert_eq!(plan.expiry, date(2026, 1, 16));
        assert_eq!(plan.itm_strike, dec!(50));
        assert_eq!(plan.table.len(), 3);
        assert_eq!(plan.table[0].strike, dec!(48));
        assert_eq!(plan.suggested_strike, Some(dec!(50)));
        assert_eq!(plan.buying_power, Some(dec!(25000)));
    }

    #[tokio::test]
    async fn test_execute_dry_run_returns_none() {
        let mut broker = MockBrokerApi::new();
        broker.expect_create_order().never();
        let broker = std::sync::Arc::new(broker);
        let submitter = OrderSubmitter::new(
            std::sync::Arc::clone(&broker),
            crate::trading::simulation::TradingMode::DryRun,
        );
        let plan = RiskReversalPlan {
            symbol: "TQQQ".to_string(),
            expiry: date(2026, 1, 16),
            spot: dec!(51.3),
            itm_strike: dec!(50),
            table: Vec::new(),
            suggested_strike: None,
            buying_power: None,
        };
        let order = RiskReversalOrder {
            strike: dec!(50),
            direction: Side::Buy,
            contracts: dec!(1),
            limit: Some(dec!(0.10)),
        };

        let outcome = execute_risk_reversal(broker.as_ref(), &submitter, &plan, &order, &TrackerConfig::default())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }
}
