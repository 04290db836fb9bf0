//! Account balance and position reads

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::api::BrokerApi;
use crate::trading::errors::TradingError;
use crate::trading::types::AccountSnapshot;

/// Cash balance; negative when the account carries a margin debit
pub async fn get_cash_balance<B>(broker: &B) -> Result<Decimal, TradingError>
where
    B: BrokerApi + ?Sized,
{
    let balances = broker.balances().await?;
    balances
        .cash_balance
        .ok_or_else(|| TradingError::Api {
            kind: "missing_field",
            message: "no cash-balance in balances response".to_string(),
            transient: true,
        })
}

/// Buying power, when the broker reports it
pub async fn get_buying_power<B>(broker: &B) -> Result<Option<Decimal>, TradingError>
where
    B: BrokerApi + ?Sized,
{
    Ok(broker.balances().await?.buying_power)
}

/// Strict position read: errors when the positions call fails
pub async fn try_get_position<B>(broker: &B, symbol: &str) -> Result<Decimal, TradingError>
where
    B: BrokerApi + ?Sized,
{
    let positions = broker
        .positions()
        .await
        .map_err(|e| TradingError::PositionUnavailable {
            symbol: symbol.to_string(),
            reason: e.to_string(),
        })?;

    let qty = positions
        .iter()
        .filter(|p| p.symbol.eq_ignore_ascii_case(symbol))
        .map(|p| p.signed_quantity())
        .sum();
    Ok(qty)
}

/// Shares held in `symbol`.
/// Absent positions and failed calls both read as zero so trading logic can proceed.
pub async fn get_position<B>(broker: &B, symbol: &str) -> Decimal
where
    B: BrokerApi + ?Sized,
{
    match try_get_position(broker, symbol).await {
        Ok(qty) if qty.is_zero() => {
            info!("No {} position found", symbol);
            Decimal::ZERO
        }
        Ok(qty) => {
            info!("Current {} position: {} shares", symbol, qty);
            qty
        }
        Err(e) => {
            warn!("Failed to fetch positions, assuming 0 shares: {}", e);
            Decimal::ZERO
        }
    }
}

/// Cash and position for `symbol`, captured now
pub async fn snapshot<B>(broker: &B, symbol: &str) -> Result<AccountSnapshot, TradingError>
where
    B: BrokerApi + ?Sized,
{
    let cash = get_cash_balance(broker).await?;
    let position = get_position(broker, symbol).await;
    Ok(AccountSnapshot::new(symbol, cash, position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AccountBalance, ApiError, MockBrokerApi, PositionItem};
    use rust_decimal_macros::dec;

    fn position(symbol: &str, qty: &str) -> PositionItem {
        serde_json::from_value(serde_json::json!({
            "symbol": symbol,
            "quantity": qty,
            "quantity-direction": "Long"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_position_absent_is_zero() {
        let mut broker = MockBrokerApi::new();
        broker
            .expect_positions()
            .returning(|| Ok(vec![position("SPY", "3")]));

        assert_eq!(get_position(&broker, "SGOV").await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_position_failure_is_zero() {
        let mut broker = MockBrokerApi::new();
        broker.expect_positions().returning(|| {
            Err(ApiError::ApiError {
                status: 500,
                message: "boom".to_string(),
            })
        });

        assert_eq!(get_position(&broker, "SGOV").await, Decimal::ZERO);
        assert!(matches!(
            try_get_position(&broker, "SGOV").await,
            Err(TradingError::PositionUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_snapshot_reads_cash_and_position() {
        let mut broker = MockBrokerApi::new();
        broker.expect_balances().returning(|| {
            Ok(AccountBalance {
                account_number: None,
                cash_balance: Some(dec!(-42.10)),
                buying_power: None,
                net_liquidating_value: None,
            })
        });
        broker
            .expect_positions()
            .returning(|| Ok(vec![position("SGOV", "12")]));

        let snap = snapshot(&broker, "SGOV").await.unwrap();
        assert_eq!(snap.cash_balance, dec!(-42.10));
        assert_eq!(snap.position, dec!(12));
    }
}
