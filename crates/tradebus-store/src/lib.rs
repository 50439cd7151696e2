//! Durable store access layer.
//!
//! The store is the only communication channel between pipeline stages:
//! signal rows advance through their lifecycle via a claim-lease protocol
//! with optimistic version CAS, so concurrent stage processes never
//! double-process a row and a crashed claimant's work is retried after its
//! lease expires.

mod db;
mod market;
mod retry;
mod signals;
mod trades;

pub use db::Store;
