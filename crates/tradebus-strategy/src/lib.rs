//! Signal generation predicates.
//!
//! Strategies are pure: they look at the latest indicator snapshot and the
//! trailing sentiment average and either produce a signal draft or stay
//! quiet. All store access happens in the engine stage that drives them.

mod mean_reversion;

pub use mean_reversion::{MeanReversion, MeanReversionParams};
