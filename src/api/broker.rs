//! Broker operations used by the trading components

use async_trait::async_trait;

use crate::api::models::{
    unwrap_order, AccountBalance, ItemList, MarketDataItem, OptionChainItem, OrderRecord,
    PositionItem,
};
use crate::api::session::SessionClient;
use crate::api::ApiError;

/// Account and order endpoints the strategies rely on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// Balances for the configured account
    async fn balances(&self) -> Result<AccountBalance, ApiError>;

    /// All positions for the configured account
    async fn positions(&self) -> Result<Vec<PositionItem>, ApiError>;

    /// Quotes for equities and OCC option symbols
    async fn market_data(
        &self,
        equities: &[String],
        options: &[String],
    ) -> Result<Vec<MarketDataItem>, ApiError>;

    /// Open option chain for an underlying
    async fn option_chain(&self, underlying: &str) -> Result<Vec<OptionChainItem>, ApiError>;

    /// Submit an order payload, returning the response `data`
    async fn create_order(&self, payload: &serde_json::Value) -> Result<serde_json::Value, ApiError>;

    /// Ask the broker to validate an order without routing it
    async fn preview_order(&self, payload: &serde_json::Value) -> Result<serde_json::Value, ApiError>;

    /// Current state of a submitted order
    async fn get_order(&self, order_id: &str) -> Result<OrderRecord, ApiError>;
}

#[async_trait]
impl BrokerApi for SessionClient {
    async fn balances(&self) -> Result<AccountBalance, ApiError> {
        let path = format!("/accounts/{}/balances", self.account_number());
        self.get_data(&path, &[]).await
    }

    async fn positions(&self) -> Result<Vec<PositionItem>, ApiError> {
        let path = format!("/accounts/{}/positions", self.account_number());
        let list: ItemList<PositionItem> = self.get_data(&path, &[]).await?;
        Ok(list.items)
    }

    async fn market_data(
        &self,
        equities: &[String],
        options: &[String],
    ) -> Result<Vec<MarketDataItem>, ApiError> {
        let query: Vec<(&str, String)> = equities
            .iter()
            .map(|s| ("equity", s.clone()))
            .chain(options.iter().map(|s| ("equity-option", s.clone())))
            .collect();
        let list: ItemList<MarketDataItem> = self.get_data("/market-data/by-type", &query).await?;
        Ok(list.items)
    }

    async fn option_chain(&self, underlying: &str) -> Result<Vec<OptionChainItem>, ApiError> {
        let path = format!("/option-chains/{}", underlying);
        let list: ItemList<OptionChainItem> = self
            .get_data(&path, &[("include-closed", "false".to_string())])
            .await?;
        Ok(list.items)
    }

    async fn create_order(&self, payload: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
        let path = format!("/accounts/{}/orders", self.account_number());
        self.post_untruncated(&path, payload).await
    }

    async fn preview_order(&self, payload: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
        let path = format!("/accounts/{}/orders/dry-run", self.account_number());
        self.post_untruncated(&path, payload).await
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderRecord, ApiError> {
        let path = format!("/accounts/{}/orders/{}", self.account_number(), order_id);
        let data: serde_json::Value = self.get_data(&path, &[]).await?;
        Ok(unwrap_order(data)?)
    }
}
