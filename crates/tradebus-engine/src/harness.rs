//! Uniform scheduling harness for polling stages.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use tradebus_core::{GatewayError, PipelineResult};
use tradebus_store::Store;

/// A polling pipeline stage.
///
/// A tick does a bounded amount of work and returns; errors are classified
/// by the harness and never stop the loop.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn tick(&self) -> PipelineResult<()>;
}

/// Per-stage scheduling parameters.
#[derive(Debug, Clone, Copy)]
pub struct StageSchedule {
    /// How often the stage polls for work
    pub poll_interval: Duration,
    /// How long a claim may be held before the sweep reverts it
    pub claim_lease: chrono::Duration,
}

/// Drive a stage forever: sweep stale claims, tick, classify, repeat.
///
/// Every stage runs the sweep on every cycle, so crashed claimants recover
/// without a dedicated janitor process.
pub async fn run_stage(stage: Arc<dyn Stage>, store: Store, schedule: StageSchedule) {
    info!(
        stage = stage.name(),
        interval_secs = schedule.poll_interval.as_secs(),
        "stage started"
    );

    let mut interval = tokio::time::interval(schedule.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match store.release_stale_claims(schedule.claim_lease).await {
            Ok(_) => {}
            Err(e) if e.is_transient() => {
                debug!(stage = stage.name(), error = %e, "lease sweep deferred")
            }
            Err(e) => error!(stage = stage.name(), error = %e, "lease sweep failed"),
        }

        if let Err(e) = stage.tick().await {
            if e.is_transient() {
                warn!(stage = stage.name(), error = %e, "transient failure, retrying next cycle");
            } else {
                error!(stage = stage.name(), error = %e, "stage tick failed");
            }
        }
    }
}

/// Wrap a gateway call in an explicit timeout. A timeout is an unknown
/// outcome, not a failure of the signal being processed.
pub(crate) async fn gateway_call<T, F>(limit: Duration, fut: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout(limit)),
    }
}
