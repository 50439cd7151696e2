//! Risk management for the pipeline.
//!
//! Position sizing is a pure function of the account snapshot, the signal,
//! and the configured risk parameters, so every sizing decision can be
//! replayed in tests.

mod sizing;

pub use sizing::{size_position, RiskParams, SizingOutcome};
