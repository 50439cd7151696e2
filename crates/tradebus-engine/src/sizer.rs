//! Risk sizer stage.

use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use tradebus_core::{
    BrokerGateway, PipelineResult, SignalStatus, TransitionPatch,
};
use tradebus_risk::{size_position, RiskParams, SizingOutcome};
use tradebus_store::Store;

use crate::harness::{gateway_call, Stage};

/// Claims PENDING signals, sizes them against current equity, and commits
/// SIZED or REJECTED. Stale signals are expired before any claiming.
pub struct SizerStage {
    store: Store,
    gateway: Arc<dyn BrokerGateway>,
    params: RiskParams,
    max_signal_age: Duration,
    gateway_timeout: std::time::Duration,
    claimant: String,
}

impl SizerStage {
    pub fn new(
        store: Store,
        gateway: Arc<dyn BrokerGateway>,
        params: RiskParams,
        max_signal_age: Duration,
        gateway_timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            params,
            max_signal_age,
            gateway_timeout,
            claimant: format!("sizer-{}", Uuid::new_v4()),
        }
    }
}

#[async_trait]
impl Stage for SizerStage {
    fn name(&self) -> &'static str {
        "sizer"
    }

    async fn tick(&self) -> PipelineResult<()> {
        let expired = self.store.expire_stale_pending(self.max_signal_age).await?;
        if expired > 0 {
            info!(expired, "expired stale pending signals");
        }

        while let Some(signal) = self
            .store
            .claim_next(SignalStatus::Pending, &self.claimant)
            .await?
        {
            // Equity is fetched fresh per decision; the gateway is the
            // source of truth for the account.
            let account = match gateway_call(self.gateway_timeout, self.gateway.get_account()).await
            {
                Ok(account) => account,
                Err(e) => {
                    warn!(id = signal.id, error = %e, "account fetch failed, releasing claim");
                    self.store.release_claim(signal.id, signal.version).await?;
                    if e.is_transient() {
                        return Ok(());
                    }
                    return Err(e.into());
                }
            };

            match size_position(
                signal.side,
                signal.entry_price_hint,
                account.equity,
                &self.params,
            ) {
                SizingOutcome::Sized {
                    size,
                    stop_loss_price,
                    take_profit_price,
                } => {
                    self.store
                        .commit_transition(
                            signal.id,
                            signal.version,
                            SignalStatus::Sized,
                            &TransitionPatch::sized(size, stop_loss_price, take_profit_price),
                        )
                        .await?;
                    info!(
                        id = signal.id,
                        symbol = %signal.symbol,
                        %size,
                        stop = %stop_loss_price,
                        "signal sized"
                    );
                }
                SizingOutcome::Rejected { reason } => {
                    self.store
                        .commit_transition(
                            signal.id,
                            signal.version,
                            SignalStatus::Rejected,
                            &TransitionPatch::reason(reason.clone()),
                        )
                        .await?;
                    info!(id = signal.id, symbol = %signal.symbol, %reason, "signal rejected");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tradebus_core::{AccountSnapshot, BracketOrder, GatewayError, OrderState, Side, SignalDraft};
    use tradebus_gateway::PaperGateway;

    /// Gateway whose account endpoint always times out.
    struct UnreachableGateway;

    #[async_trait]
    impl BrokerGateway for UnreachableGateway {
        async fn get_account(&self) -> Result<AccountSnapshot, GatewayError> {
            Err(GatewayError::Timeout(std::time::Duration::from_secs(10)))
        }

        async fn submit_bracket_order(&self, _: &BracketOrder) -> Result<String, GatewayError> {
            Err(GatewayError::Timeout(std::time::Duration::from_secs(10)))
        }

        async fn get_order_state(&self, _: &str) -> Result<OrderState, GatewayError> {
            Err(GatewayError::Timeout(std::time::Duration::from_secs(10)))
        }

        fn name(&self) -> &str {
            "Unreachable"
        }
    }

    async fn store_with_pending(entry: rust_decimal::Decimal) -> (Store, i64) {
        let store = Store::open_in_memory().await.unwrap();
        let id = store
            .insert_signal(&SignalDraft::new("AAPL", Side::Buy, entry))
            .await
            .unwrap();
        (store, id)
    }

    fn sizer(store: &Store, gateway: Arc<dyn BrokerGateway>, max_age: Duration) -> SizerStage {
        SizerStage::new(
            store.clone(),
            gateway,
            RiskParams::default(),
            max_age,
            std::time::Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_sizes_pending_signal() {
        let (store, id) = store_with_pending(dec!(50.00)).await;
        let gateway = Arc::new(PaperGateway::new(dec!(100000)));

        sizer(&store, gateway, Duration::minutes(60))
            .tick()
            .await
            .unwrap();

        let signal = store.get_signal(id).await.unwrap();
        assert_eq!(signal.status, SignalStatus::Sized);
        assert_eq!(signal.size, Some(dec!(400)));
        assert_eq!(signal.stop_loss_price, Some(dec!(47.500)));
        assert_eq!(signal.take_profit_price, Some(dec!(55.0000)));
        assert!(!signal.is_claimed());
    }

    #[tokio::test]
    async fn test_rejects_unaffordable_signal() {
        let (store, id) = store_with_pending(dec!(50.00)).await;
        let gateway = Arc::new(PaperGateway::new(dec!(100)));

        sizer(&store, gateway, Duration::minutes(60))
            .tick()
            .await
            .unwrap();

        let signal = store.get_signal(id).await.unwrap();
        assert_eq!(signal.status, SignalStatus::Rejected);
        assert!(signal.last_error.is_some());
        assert!(signal.size.is_none());
    }

    #[tokio::test]
    async fn test_stale_pending_expires_before_sizing() {
        let (store, id) = store_with_pending(dec!(50.00)).await;
        let gateway = Arc::new(PaperGateway::new(dec!(100000)));

        sizer(&store, gateway, Duration::zero())
            .tick()
            .await
            .unwrap();

        let signal = store.get_signal(id).await.unwrap();
        assert_eq!(signal.status, SignalStatus::Expired);
    }

    #[tokio::test]
    async fn test_gateway_timeout_releases_claim() {
        let (store, id) = store_with_pending(dec!(50.00)).await;

        sizer(&store, Arc::new(UnreachableGateway), Duration::minutes(60))
            .tick()
            .await
            .unwrap();

        // Not sized, not failed, not claimed: retried on a later cycle.
        let signal = store.get_signal(id).await.unwrap();
        assert_eq!(signal.status, SignalStatus::Pending);
        assert!(!signal.is_claimed());
        assert!(signal.last_error.is_none());
    }
}
