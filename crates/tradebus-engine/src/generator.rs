//! Signal generator stage.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, info};

use tradebus_core::{PipelineResult, StoreError};
use tradebus_store::Store;
use tradebus_strategy::{MeanReversion, MeanReversionParams};

use crate::harness::Stage;

/// Evaluates the strategy predicate per symbol and inserts PENDING signals.
pub struct GeneratorStage {
    store: Store,
    strategy: MeanReversion,
    symbols: Vec<String>,
    sentiment_window: Duration,
}

impl GeneratorStage {
    pub fn new(
        store: Store,
        symbols: Vec<String>,
        params: MeanReversionParams,
        sentiment_window: Duration,
    ) -> Self {
        Self {
            store,
            strategy: MeanReversion::new(params),
            symbols,
            sentiment_window,
        }
    }
}

#[async_trait]
impl Stage for GeneratorStage {
    fn name(&self) -> &'static str {
        "generator"
    }

    async fn tick(&self) -> PipelineResult<()> {
        let cutoff = Utc::now() - self.sentiment_window;

        for symbol in &self.symbols {
            let Some(snapshot) = self.store.latest_indicator(symbol).await? else {
                continue;
            };
            let sentiment = self.store.average_sentiment_since(symbol, cutoff).await?;

            let Some(draft) = self.strategy.evaluate(&snapshot, &sentiment) else {
                continue;
            };

            match self.store.insert_signal(&draft).await {
                Ok(id) => info!(
                    id,
                    symbol = %draft.symbol,
                    side = %draft.side,
                    entry = %draft.entry_price_hint,
                    "signal generated"
                ),
                // An open signal for the pair already exists; suppression is
                // the normal case, not an error.
                Err(StoreError::Conflict { .. }) => {
                    debug!(symbol = %draft.symbol, "open signal exists, suppressed")
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
