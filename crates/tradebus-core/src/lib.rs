//! Core types and traits for the tradebus pipeline.
//!
//! This crate provides the foundational building blocks including:
//! - The signal lifecycle types (Signal, SignalStatus, Side)
//! - Market snapshot and account types
//! - The broker gateway trait
//! - The pipeline error taxonomy

pub mod types;
pub mod traits;
pub mod error;

pub use error::{GatewayError, PipelineError, PipelineResult, StoreError};
pub use types::*;
pub use traits::*;
