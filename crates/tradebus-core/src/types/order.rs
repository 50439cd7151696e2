//! Broker order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Side;

/// A bracket order request: market entry with an attached stop-loss and
/// optional take-profit leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BracketOrder {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub stop_loss_price: Decimal,
    pub take_profit_price: Option<Decimal>,
    /// Deterministic id supplied by the caller so a dedup-capable broker
    /// rejects accidental resubmission after an unknown-outcome timeout.
    pub client_order_id: String,
}

impl BracketOrder {
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
        stop_loss_price: Decimal,
    ) -> Self {
        let symbol = symbol.into();
        let client_order_id = format!("tradebus-{symbol}-{side}");
        Self {
            symbol,
            side,
            quantity,
            stop_loss_price,
            take_profit_price: None,
            client_order_id,
        }
    }

    pub fn with_take_profit(mut self, price: Decimal) -> Self {
        self.take_profit_price = Some(price);
        self
    }

    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = id.into();
        self
    }
}

/// Broker-side state of a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Accepted but not yet filled
    Open,
    /// Completely filled at the given average price
    Filled { price: Decimal },
    /// Rejected by the broker
    Rejected { reason: String },
    /// Cancelled or expired broker-side
    Cancelled,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderState::Open)
    }
}

/// Audit record of an observed fill, appended by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub signal_id: i64,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub executed_at: DateTime<Utc>,
}
