//! OCC option symbols
//!
//! Fixed-width 21 byte layout:
//!
//! | bytes  | content                                      |
//! |--------|----------------------------------------------|
//! | 0..6   | root, upper-case, left-justified, space pad  |
//! | 6..12  | expiry `YYMMDD`                              |
//! | 12     | `C` or `P`                                   |
//! | 13..21 | strike × 1000, zero-padded to 8 digits       |
//!
//! The broker matches these byte for byte; a symbol with the wrong padding
//! silently returns no quote.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::trading::errors::TradingError;

pub const OCC_SYMBOL_LEN: usize = 21;
const ROOT_WIDTH: usize = 6;
const MAX_STRIKE_THOUSANDTHS: u64 = 99_999_999;

/// Call or put
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn code(self) -> char {
        match self {
            OptionType::Call => 'C',
            OptionType::Put => 'P',
        }
    }
}

impl FromStr for OptionType {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "C" | "CALL" => Ok(OptionType::Call),
            "P" | "PUT" => Ok(OptionType::Put),
            other => Err(TradingError::InvalidSymbol {
                reason: format!("unknown option type '{other}'"),
            }),
        }
    }
}

/// Decoded OCC contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccSymbol {
    pub root: String,
    pub expiry: NaiveDate,
    pub option_type: OptionType,
    pub strike: Decimal,
}

impl OccSymbol {
    pub fn new(root: &str, expiry: NaiveDate, option_type: OptionType, strike: Decimal) -> Self {
        Self {
            root: root.trim().to_uppercase(),
            expiry,
            option_type,
            strike,
        }
    }

    /// Encode into the 21 byte wire form
    pub fn encode(&self) -> Result<String, TradingError> {
        build_occ_symbol(&self.root, self.expiry, self.option_type, self.strike)
    }

    /// Decode a 21 byte symbol
    pub fn parse(symbol: &str) -> Result<Self, TradingError> {
        if !symbol.is_ascii() || symbol.len() != OCC_SYMBOL_LEN {
            return Err(TradingError::InvalidSymbol {
                reason: format!("expected {OCC_SYMBOL_LEN} ASCII bytes, got {symbol:?}"),
            });
        }

        let root = symbol[..ROOT_WIDTH].trim_end();
        let expiry = NaiveDate::parse_from_str(&symbol[6..12], "%y%m%d").map_err(|e| {
            TradingError::InvalidSymbol {
                reason: format!("bad expiry in {symbol:?}: {e}"),
            }
        })?;
        let option_type = OptionType::from_str(&symbol[12..13])?;
        let thousandths: i64 = symbol[13..].parse().map_err(|_| TradingError::InvalidSymbol {
            reason: format!("bad strike in {symbol:?}"),
        })?;

        Ok(Self {
            root: root.to_string(),
            expiry,
            option_type,
            strike: Decimal::new(thousandths, 3).normalize(),
        })
    }
}

impl fmt::Display for OccSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.root,
            self.expiry.format("%Y-%m-%d"),
            self.strike,
            self.option_type.code()
        )
    }
}

/// Build a 21 byte OCC symbol.
///
/// Roots longer than six characters are truncated.
pub fn build_occ_symbol(
    root: &str,
    expiry: NaiveDate,
    option_type: OptionType,
    strike: Decimal,
) -> Result<String, TradingError> {
    let root = root.trim().to_ascii_uppercase();
    if root.is_empty() {
        return Err(TradingError::InvalidSymbol {
            reason: "empty root".to_string(),
        });
    }
    if !root.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '/') {
        return Err(TradingError::InvalidSymbol {
            reason: format!("root {root:?} contains unsupported characters"),
        });
    }

    let thousandths = strike * Decimal::ONE_THOUSAND;
    if strike.is_sign_negative() || thousandths.fract() != Decimal::ZERO {
        return Err(TradingError::InvalidSymbol {
            reason: format!("strike {strike} must be non-negative with at most 3 decimals"),
        });
    }
    let thousandths = thousandths
        .to_u64()
        .filter(|v| *v <= MAX_STRIKE_THOUSANDTHS)
        .ok_or_else(|| TradingError::InvalidSymbol {
            reason: format!("strike {strike} does not fit in 8 digits"),
        })?;

    let truncated: String = root.chars().take(ROOT_WIDTH).collect();
    let symbol = format!(
        "{:<width$}{}{}{:08}",
        truncated,
        expiry.format("%y%m%d"),
        option_type.code(),
        thousandths,
        width = ROOT_WIDTH
    );
    debug_assert_eq!(symbol.len(), OCC_SYMBOL_LEN);
    Ok(symbol)
}

/// Same as [`build_occ_symbol`] with a `YYYY-MM-DD` expiry and `C`/`P` type
pub fn build_occ_from_parts(
    root: &str,
    expiry: &str,
    option_type: &str,
    strike: Decimal,
) -> Result<String, TradingError> {
    let expiry = NaiveDate::parse_from_str(expiry.trim(), "%Y-%m-%d").map_err(|e| {
        TradingError::InvalidSymbol {
            reason: format!("bad expiry {expiry:?}: {e}"),
        }
    })?;
    build_occ_symbol(root, expiry, OptionType::from_str(option_type)?, strike)
}
