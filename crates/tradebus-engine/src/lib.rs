//! Polling stages and the scheduling harness.
//!
//! Each stage (generator, sizer, executor, reconciler) runs as an
//! independent task on its own interval with no shared in-memory state;
//! every piece of coordination lives in the store. The harness applies the
//! stale-claim sweep before each tick and classifies all errors before any
//! of them can escape a stage loop.

mod executor;
mod generator;
mod harness;
mod reconciler;
mod sizer;

pub use executor::ExecutorStage;
pub use generator::GeneratorStage;
pub use harness::{run_stage, Stage, StageSchedule};
pub use reconciler::ReconcilerStage;
pub use sizer::SizerStage;
