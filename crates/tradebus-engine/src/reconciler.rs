//! Execution reconciliation stage.
//!
//! Decoupled from order submission so a slow broker never blocks new
//! sizing: this stage only watches SUBMITTED rows and settles them into
//! EXECUTED or FAILED as the broker reports fills.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use tradebus_core::{
    BrokerGateway, GatewayError, OrderState, PipelineResult, SignalStatus, TradeRecord,
    TransitionPatch,
};
use tradebus_store::Store;

use crate::harness::{gateway_call, Stage};

/// Claims SUBMITTED signals and reconciles them against broker order state.
pub struct ReconcilerStage {
    store: Store,
    gateway: Arc<dyn BrokerGateway>,
    gateway_timeout: std::time::Duration,
    claimant: String,
}

impl ReconcilerStage {
    pub fn new(
        store: Store,
        gateway: Arc<dyn BrokerGateway>,
        gateway_timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            gateway_timeout,
            claimant: format!("reconciler-{}", Uuid::new_v4()),
        }
    }
}

#[async_trait]
impl Stage for ReconcilerStage {
    fn name(&self) -> &'static str {
        "reconciler"
    }

    async fn tick(&self) -> PipelineResult<()> {
        // Orders still open at the broker keep their claim until the drain
        // finishes. Releasing them immediately would make the oldest open
        // row claimable again and starve everything behind it.
        let mut still_open: Vec<(i64, i64)> = Vec::new();
        let result = self.drain(&mut still_open).await;

        for (id, version) in still_open {
            if let Err(e) = self.store.release_claim(id, version).await {
                warn!(id, error = %e, "failed to release open-order claim");
            }
        }
        result
    }
}

impl ReconcilerStage {
    async fn drain(&self, still_open: &mut Vec<(i64, i64)>) -> PipelineResult<()> {
        while let Some(signal) = self
            .store
            .claim_next(SignalStatus::Submitted, &self.claimant)
            .await?
        {
            let Some(order_id) = signal.broker_order_id.clone() else {
                warn!(id = signal.id, "submitted signal has no broker order id, failing it");
                self.store
                    .commit_transition(
                        signal.id,
                        signal.version,
                        SignalStatus::Failed,
                        &TransitionPatch::reason("submitted signal missing broker order id"),
                    )
                    .await?;
                continue;
            };

            match gateway_call(self.gateway_timeout, self.gateway.get_order_state(&order_id)).await
            {
                Ok(OrderState::Open) => {
                    still_open.push((signal.id, signal.version));
                }
                Ok(OrderState::Filled { price }) => {
                    let trade = TradeRecord {
                        signal_id: signal.id,
                        symbol: signal.symbol.clone(),
                        side: signal.side,
                        quantity: signal.size.unwrap_or(Decimal::ZERO),
                        price,
                        executed_at: Utc::now(),
                    };
                    if let Err(e) = self.store.record_trade(&trade).await {
                        error!(id = signal.id, error = %e, "failed to record trade");
                    }

                    self.store
                        .commit_transition(
                            signal.id,
                            signal.version,
                            SignalStatus::Executed,
                            &TransitionPatch::executed(price),
                        )
                        .await?;
                    info!(
                        id = signal.id,
                        symbol = %signal.symbol,
                        %price,
                        "order filled, signal executed"
                    );
                }
                Ok(OrderState::Rejected { reason }) => {
                    self.store
                        .commit_transition(
                            signal.id,
                            signal.version,
                            SignalStatus::Failed,
                            &TransitionPatch::reason(reason.clone()),
                        )
                        .await?;
                    warn!(id = signal.id, symbol = %signal.symbol, %reason, "order rejected");
                }
                Ok(OrderState::Cancelled) => {
                    self.store
                        .commit_transition(
                            signal.id,
                            signal.version,
                            SignalStatus::Failed,
                            &TransitionPatch::reason("order cancelled at broker"),
                        )
                        .await?;
                    warn!(id = signal.id, symbol = %signal.symbol, "order cancelled");
                }
                Err(GatewayError::OrderNotFound(_)) => {
                    self.store
                        .commit_transition(
                            signal.id,
                            signal.version,
                            SignalStatus::Failed,
                            &TransitionPatch::reason("broker order not found"),
                        )
                        .await?;
                    warn!(id = signal.id, %order_id, "broker order not found");
                }
                Err(e) => {
                    self.store.release_claim(signal.id, signal.version).await?;
                    if e.is_transient() {
                        return Ok(());
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}
