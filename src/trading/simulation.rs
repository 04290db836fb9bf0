//! Dry-run mode
//! Orders are built and logged but never sent

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;

/// Trading mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TradingMode {
    /// Orders go to the broker
    #[default]
    Live,
    /// Log only, no orders leave the process
    DryRun,
}

impl TradingMode {
    pub fn from_flag(dry_run: bool) -> Self {
        if dry_run {
            TradingMode::DryRun
        } else {
            TradingMode::Live
        }
    }

    /// Check if live trading
    pub fn is_live(&self) -> bool {
        matches!(self, TradingMode::Live)
    }

    /// Check if dry run
    pub fn is_dry_run(&self) -> bool {
        matches!(self, TradingMode::DryRun)
    }
}

/// Order that would have been submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryRunOrder {
    pub summary: String,
    pub payload: serde_json::Value,
    pub timestamp: String,
}

/// Collects dry-run orders for the end-of-run summary
#[derive(Debug, Default)]
pub struct DryRunRecorder {
    orders: Mutex<Vec<DryRunOrder>>,
}

impl DryRunRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log an order that was not sent
    pub fn record(&self, summary: String, payload: serde_json::Value) {
        info!("[DRY RUN] Would place {}", summary);
        info!("[DRY RUN] Payload: {}", payload);
        let order = DryRunOrder {
            summary,
            payload,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.orders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(order);
    }

    /// Recorded orders, oldest first
    pub fn orders(&self) -> Vec<DryRunOrder> {
        self.orders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self) -> usize {
        self.orders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Save recorded orders as pretty JSON
    pub fn save_to_file(&self, filepath: &str) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(&self.orders())?;
        std::fs::write(filepath, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_flag() {
        assert!(TradingMode::from_flag(true).is_dry_run());
        assert!(TradingMode::from_flag(false).is_live());
        assert_eq!(TradingMode::default(), TradingMode::Live);
    }

    #[test]
    fn test_recorder_keeps_orders() {
        let recorder = DryRunRecorder::new();
        recorder.record("Buy 3 SGOV".to_string(), serde_json::json!({"order-type": "Market"}));
        assert_eq!(recorder.count(), 1);
        assert_eq!(recorder.orders()[0].summary, "Buy 3 SGOV");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dry_run.json");
        recorder.save_to_file(path.to_str().unwrap()).unwrap();
        let saved: Vec<DryRunOrder> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.len(), 1);
    }
}
