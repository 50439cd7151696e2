//! Core data types for the pipeline.

mod account;
mod market;
mod order;
mod signal;

pub use account::AccountSnapshot;
pub use market::{AvgSentiment, IndicatorSnapshot, SentimentScore};
pub use order::{BracketOrder, OrderState, TradeRecord};
pub use signal::{Side, Signal, SignalDraft, SignalStatus, TransitionPatch};
