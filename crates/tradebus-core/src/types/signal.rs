//! Signal lifecycle types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Trade side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

/// Lifecycle status of a signal.
///
/// Happy path: `Pending -> Sized -> Submitted -> Executed`. A signal can be
/// rejected by risk sizing, expired before sizing, or failed by the broker.
/// Claims are not statuses: a claimed row keeps its status and is marked via
/// `claimed_by`/`claimed_at` on the row itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    /// Inserted by the generator, awaiting risk sizing
    Pending,
    /// Sized and priced, awaiting order submission
    Sized,
    /// Order submitted to the broker, awaiting reconciliation
    Submitted,
    /// Order filled
    Executed,
    /// Broker rejected or cancelled the order
    Failed,
    /// Risk sizing declined the trade
    Rejected,
    /// Went stale before sizing
    Expired,
}

impl SignalStatus {
    /// Check if the status is terminal (immutable once reached).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SignalStatus::Executed
                | SignalStatus::Failed
                | SignalStatus::Rejected
                | SignalStatus::Expired
        )
    }

    /// An open signal blocks new inserts for the same `(symbol, side)`.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Pending => "PENDING",
            SignalStatus::Sized => "SIZED",
            SignalStatus::Submitted => "SUBMITTED",
            SignalStatus::Executed => "EXECUTED",
            SignalStatus::Failed => "FAILED",
            SignalStatus::Rejected => "REJECTED",
            SignalStatus::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SignalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(SignalStatus::Pending),
            "SIZED" => Ok(SignalStatus::Sized),
            "SUBMITTED" => Ok(SignalStatus::Submitted),
            "EXECUTED" => Ok(SignalStatus::Executed),
            "FAILED" => Ok(SignalStatus::Failed),
            "REJECTED" => Ok(SignalStatus::Rejected),
            "EXPIRED" => Ok(SignalStatus::Expired),
            other => Err(format!("unknown signal status: {other}")),
        }
    }
}

/// A candidate trade moving through the pipeline, as stored in the signals
/// table. Every mutation bumps `version`; writers must CAS on the version
/// they read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Row id, monotonic
    pub id: i64,
    /// Symbol traded
    pub symbol: String,
    /// Buy or sell
    pub side: Side,
    /// Current lifecycle status
    pub status: SignalStatus,
    /// Price observed when the signal was generated
    pub entry_price_hint: Decimal,
    /// Position size in units, set by the sizer
    pub size: Option<Decimal>,
    /// Stop-loss price, set by the sizer
    pub stop_loss_price: Option<Decimal>,
    /// Take-profit price, set by the sizer
    pub take_profit_price: Option<Decimal>,
    /// Broker order id, stamped during submission
    pub broker_order_id: Option<String>,
    /// Fill price, recorded by the reconciler
    pub fill_price: Option<Decimal>,
    /// Reason for a reject/failure/expiry
    pub last_error: Option<String>,
    /// Claimant holding the current lease, if any
    pub claimed_by: Option<String>,
    /// When the current lease was taken
    pub claimed_at: Option<DateTime<Utc>>,
    /// When the signal was created
    pub created_at: DateTime<Utc>,
    /// When the signal was last written
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter
    pub version: i64,
}

impl Signal {
    /// Check whether a claimant currently holds the row.
    pub fn is_claimed(&self) -> bool {
        self.claimed_by.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A new signal candidate, before insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalDraft {
    pub symbol: String,
    pub side: Side,
    pub entry_price_hint: Decimal,
}

impl SignalDraft {
    pub fn new(symbol: impl Into<String>, side: Side, entry_price_hint: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            entry_price_hint,
        }
    }
}

/// Field updates applied when a claimed signal transitions.
///
/// `None` fields keep their stored value, so a patch never clears data laid
/// down by an earlier stage.
#[derive(Debug, Clone, Default)]
pub struct TransitionPatch {
    pub size: Option<Decimal>,
    pub stop_loss_price: Option<Decimal>,
    pub take_profit_price: Option<Decimal>,
    pub broker_order_id: Option<String>,
    pub fill_price: Option<Decimal>,
    pub last_error: Option<String>,
}

impl TransitionPatch {
    /// Patch for a `Pending -> Sized` transition.
    pub fn sized(size: Decimal, stop_loss_price: Decimal, take_profit_price: Decimal) -> Self {
        Self {
            size: Some(size),
            stop_loss_price: Some(stop_loss_price),
            take_profit_price: Some(take_profit_price),
            ..Default::default()
        }
    }

    /// Patch for a `Sized -> Submitted` transition.
    pub fn submitted(broker_order_id: impl Into<String>) -> Self {
        Self {
            broker_order_id: Some(broker_order_id.into()),
            ..Default::default()
        }
    }

    /// Patch for a `Submitted -> Executed` transition.
    pub fn executed(fill_price: Decimal) -> Self {
        Self {
            fill_price: Some(fill_price),
            ..Default::default()
        }
    }

    /// Patch carrying only a reason, for rejects/failures/expiry.
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            last_error: Some(reason.into()),
            ..Default::default()
        }
    }
}
