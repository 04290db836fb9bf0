//! Risk reversal quote arithmetic
//!
//! Prices are quoted for the bullish structure (short put, long call).
//! Positive means a credit to the account, negative a debit.
//!
//! - NAT: sell the put at its bid, buy the call at its ask
//! - MID: put mid minus call mid
//! - OPP: sell the put at its ask, buy the call at its bid

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::trading::quotes::BidAsk;

/// Put and call quotes at one strike
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrikeQuotes {
    pub strike: Decimal,
    pub put: BidAsk,
    pub call: BidAsk,
}

/// Net prices for one strike
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpreadPrices {
    pub strike: Decimal,
    pub nat: Decimal,
    pub mid: Decimal,
    pub opp: Decimal,
    /// Put bid + call ask
    pub bullish_width: Decimal,
    /// Call bid + put ask
    pub bearish_width: Decimal,
}

impl SpreadPrices {
    pub fn from_quotes(q: &StrikeQuotes) -> Self {
        Self {
            strike: q.strike,
            nat: q.put.bid - q.call.ask,
            mid: q.put.mid() - q.call.mid(),
            opp: q.put.ask - q.call.bid,
            bullish_width: q.put.bid + q.call.ask,
            bearish_width: q.call.bid + q.put.ask,
        }
    }
}

/// A net price with its credit/debit label, e.g. `0.12 cr`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetPrice(pub Decimal);

impl fmt::Display for NetPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.0 > Decimal::ZERO { "cr" } else { "db" };
        write!(f, "{:.2} {}", self.0.abs().round_dp(2), label)
    }
}

/// Price every strike and sort from most debit to most credit at NAT
pub fn price_table(rows: &[StrikeQuotes]) -> Vec<SpreadPrices> {
    let mut table: Vec<SpreadPrices> = rows.iter().map(SpreadPrices::from_quotes).collect();
    table.sort_by(|a, b| a.nat.cmp(&b.nat).then(a.strike.cmp(&b.strike)));
    table
}

/// First strike in table order with a MID credit, else the first strike
pub fn suggest_strike(table: &[SpreadPrices]) -> Option<Decimal> {
    table
        .iter()
        .find(|row| row.mid > Decimal::ZERO)
        .or_else(|| table.first())
        .map(|row| row.strike)
}

/// Highest strike strictly below spot
pub fn itm_strike(strikes: &[Decimal], spot: Decimal) -> Option<Decimal> {
    strikes.iter().copied().filter(|s| *s < spot).max()
}

/// Strikes within `radius` places of `center` in sorted order
pub fn strike_window(strikes: &[Decimal], center: Decimal, radius: usize) -> Vec<Decimal> {
    let mut sorted = strikes.to_vec();
    sorted.sort();
    sorted.dedup();
    let Some(idx) = sorted.iter().position(|s| *s == center) else {
        return Vec::new();
    };
    let start = idx.saturating_sub(radius);
    let end = (idx + radius + 1).min(sorted.len());
    sorted[start..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quotes(strike: Decimal, pb: Decimal, pa: Decimal, cb: Decimal, ca: Decimal) -> StrikeQuotes {
        StrikeQuotes {
            strike,
            put: BidAsk { bid: pb, ask: pa },
            call: BidAsk { bid: cb, ask: ca },
        }
    }

    #[test]
    fn test_nat_mid_opp() {
        let p = SpreadPrices::from_quotes(&quotes(dec!(50), dec!(2.00), dec!(2.20), dec!(1.80), dec!(2.10)));
        assert_eq!(p.nat, dec!(-0.10));
        assert_eq!(p.mid, dec!(0.15));
        assert_eq!(p.opp, dec!(0.40));
        assert_eq!(p.bullish_width, dec!(4.10));
        assert_eq!(p.bearish_width, dec!(4.00));
    }

    #[test]
    fn test_missing_side_zeroes_mid() {
        let p = SpreadPrices::from_quotes(&quotes(dec!(50), dec!(0), dec!(2.20), dec!(1.80), dec!(2.00)));
        assert_eq!(p.mid, dec!(-1.90));
    }

    #[test]
    fn test_table_sorted_by_nat_and_suggestion() {
        let table = price_table(&[
            quotes(dec!(48), dec!(1.00), dec!(1.10), dec!(3.00), dec!(3.20)),
            quotes(dec!(52), dec!(3.00), dec!(3.20), dec!(1.00), dec!(1.10)),
            quotes(dec!(50), dec!(2.00), dec!(2.20), dec!(1.90), dec!(2.10)),
        ]);
        let order: Vec<Decimal> = table.iter().map(|r| r.strike).collect();
        assert_eq!(order, vec![dec!(48), dec!(50), dec!(52)]);
        // 48 mid = 1.05 - 3.10 < 0, 50 mid = 2.10 - 2.00 > 0
        assert_eq!(suggest_strike(&table), Some(dec!(50)));
    }

    #[test]
    fn test_suggestion_falls_back_to_first() {
        let table = price_table(&[
            quotes(dec!(60), dec!(0.5), dec!(0.6), dec!(2), dec!(2.2)),
            quotes(dec!(55), dec!(0.2), dec!(0.3), dec!(3), dec!(3.3)),
        ]);
        assert_eq!(suggest_strike(&table), Some(dec!(55)));
        assert_eq!(suggest_strike(&[]), None);
    }

    #[test]
    fn test_itm_strike_and_window() {
        let strikes: Vec<Decimal> = (40..=60).step_by(2).map(Decimal::from).collect();
        let itm = itm_strike(&strikes, dec!(51.3)).unwrap();
        assert_eq!(itm, dec!(50));
        assert_eq!(
            strike_window(&strikes, itm, 3),
            vec![dec!(44), dec!(46), dec!(48), dec!(50), dec!(52), dec!(54), dec!(56)]
        );
        assert_eq!(strike_window(&strikes, dec!(40), 3), vec![dec!(40), dec!(42), dec!(44), dec!(46)]);
        assert_eq!(itm_strike(&strikes, dec!(40)), None);
    }

    #[test]
    fn test_net_price_label() {
        assert_eq!(NetPrice(dec!(0.123)).to_string(), "0.12 cr");
        assert_eq!(NetPrice(dec!(-0.4)).to_string(), "0.40 db");
        assert_eq!(NetPrice(dec!(0)).to_string(), "0.00 db");
    }
}
