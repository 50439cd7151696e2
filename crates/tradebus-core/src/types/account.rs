//! Account state fetched from the broker gateway.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A point-in-time view of the trading account.
///
/// Fetched fresh per sizing decision and never persisted; the gateway is
/// the source of truth for equity and buying power.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub equity: Decimal,
    pub cash: Decimal,
    pub buying_power: Decimal,
}

impl AccountSnapshot {
    /// Snapshot of an all-cash account.
    pub fn with_equity(equity: Decimal) -> Self {
        Self {
            equity,
            cash: equity,
            buying_power: equity,
        }
    }
}
