//! Order executor stage.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use tradebus_core::{
    BracketOrder, BrokerGateway, GatewayError, OrderState, PipelineResult, Signal, SignalStatus,
    TransitionPatch,
};
use tradebus_store::Store;

use crate::harness::{gateway_call, Stage};

/// Claims SIZED signals and submits bracket orders.
///
/// At-most-once submission rests on two guards: the broker order id is
/// stamped on the row before the SUBMITTED commit, and orders carry a
/// deterministic client order id derived from the signal id. A claimant
/// that finds a stamped id re-queries the order instead of resubmitting.
pub struct ExecutorStage {
    store: Store,
    gateway: Arc<dyn BrokerGateway>,
    gateway_timeout: std::time::Duration,
    claimant: String,
}

impl ExecutorStage {
    pub fn new(
        store: Store,
        gateway: Arc<dyn BrokerGateway>,
        gateway_timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            gateway_timeout,
            claimant: format!("executor-{}", Uuid::new_v4()),
        }
    }

    /// Finish a signal whose previous claimant submitted an order but
    /// crashed before committing SUBMITTED.
    async fn recover(&self, signal: &Signal, order_id: &str) -> PipelineResult<()> {
        match gateway_call(self.gateway_timeout, self.gateway.get_order_state(order_id)).await {
            Ok(state) => {
                info!(
                    id = signal.id,
                    order_id,
                    ?state,
                    "recovered partially submitted signal"
                );
                let (status, patch) = match state {
                    OrderState::Rejected { reason } => {
                        (SignalStatus::Failed, TransitionPatch::reason(reason))
                    }
                    OrderState::Cancelled => (
                        SignalStatus::Failed,
                        TransitionPatch::reason("order cancelled at broker"),
                    ),
                    // Open or already filled: the reconciler takes it from
                    // SUBMITTED.
                    _ => (SignalStatus::Submitted, TransitionPatch::default()),
                };
                self.store
                    .commit_transition(signal.id, signal.version, status, &patch)
                    .await?;
                Ok(())
            }
            Err(GatewayError::OrderNotFound(_)) => {
                self.store
                    .commit_transition(
                        signal.id,
                        signal.version,
                        SignalStatus::Failed,
                        &TransitionPatch::reason("recorded broker order not found"),
                    )
                    .await?;
                Ok(())
            }
            Err(e) => {
                self.store.release_claim(signal.id, signal.version).await?;
                if e.is_transient() {
                    Ok(())
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn submit(&self, signal: &Signal) -> PipelineResult<()> {
        let (Some(size), Some(stop_loss_price)) = (signal.size, signal.stop_loss_price) else {
            warn!(id = signal.id, "sized signal missing size or stop, failing it");
            self.store
                .commit_transition(
                    signal.id,
                    signal.version,
                    SignalStatus::Failed,
                    &TransitionPatch::reason("sized signal missing size or stop"),
                )
                .await?;
            return Ok(());
        };

        let mut order = BracketOrder::new(&signal.symbol, signal.side, size, stop_loss_price)
            .with_client_order_id(format!("tradebus-{}", signal.id));
        if let Some(take_profit) = signal.take_profit_price {
            order = order.with_take_profit(take_profit);
        }

        match gateway_call(self.gateway_timeout, self.gateway.submit_bracket_order(&order)).await {
            Ok(order_id) => {
                let stamped = self
                    .store
                    .record_broker_order(signal.id, signal.version, &order_id)
                    .await?;
                self.store
                    .commit_transition(
                        stamped.id,
                        stamped.version,
                        SignalStatus::Submitted,
                        &TransitionPatch::default(),
                    )
                    .await?;
                info!(
                    id = signal.id,
                    symbol = %signal.symbol,
                    %order_id,
                    "bracket order submitted"
                );
                Ok(())
            }
            Err(GatewayError::OrderRejected(reason)) => {
                self.store
                    .commit_transition(
                        signal.id,
                        signal.version,
                        SignalStatus::Failed,
                        &TransitionPatch::reason(format!("broker rejected order: {reason}")),
                    )
                    .await?;
                warn!(id = signal.id, symbol = %signal.symbol, %reason, "order rejected at submission");
                Ok(())
            }
            Err(e) if e.is_transient() => {
                // Unknown outcome: the order may or may not exist broker
                // side. Keep the claim and let the lease expire; the next
                // attempt resubmits under the same client order id, which
                // the broker deduplicates.
                warn!(
                    id = signal.id,
                    error = %e,
                    "submission outcome unknown, leaving claim for lease expiry"
                );
                Ok(())
            }
            Err(e) => {
                self.store.release_claim(signal.id, signal.version).await?;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl Stage for ExecutorStage {
    fn name(&self) -> &'static str {
        "executor"
    }

    async fn tick(&self) -> PipelineResult<()> {
        while let Some(signal) = self
            .store
            .claim_next(SignalStatus::Sized, &self.claimant)
            .await?
        {
            match signal.broker_order_id.clone() {
                Some(order_id) => self.recover(&signal, &order_id).await?,
                None => self.submit(&signal).await?,
            }
        }
        Ok(())
    }
}
