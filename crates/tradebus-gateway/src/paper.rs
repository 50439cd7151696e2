//! Paper gateway for tests and dry runs.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use tradebus_core::{
    AccountSnapshot, BracketOrder, BrokerGateway, GatewayError, OrderState,
};

struct Inner {
    account: AccountSnapshot,
    orders: HashMap<String, OrderState>,
    by_client_id: HashMap<String, String>,
    market_prices: HashMap<String, Decimal>,
    submit_count: u64,
    instant_fill: bool,
}

/// In-memory broker simulation.
///
/// Orders stay `Open` until a test drives them with [`fill_order`] /
/// [`reject_order`] / [`cancel_order`], or instant-fill is enabled and a
/// market price is known for the symbol. Submission is idempotent on
/// `client_order_id`, mirroring brokers that deduplicate client ids.
///
/// [`fill_order`]: PaperGateway::fill_order
/// [`reject_order`]: PaperGateway::reject_order
/// [`cancel_order`]: PaperGateway::cancel_order
#[derive(Clone)]
pub struct PaperGateway {
    inner: Arc<Mutex<Inner>>,
}

impl PaperGateway {
    /// Create a paper gateway backed by an all-cash account.
    pub fn new(equity: Decimal) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                account: AccountSnapshot::with_equity(equity),
                orders: HashMap::new(),
                by_client_id: HashMap::new(),
                market_prices: HashMap::new(),
                submit_count: 0,
                instant_fill: false,
            })),
        }
    }

    /// Fill new orders immediately at the symbol's market price.
    pub fn with_instant_fill(self) -> Self {
        self.inner.lock().unwrap().instant_fill = true;
        self
    }

    /// Set the simulated market price for a symbol.
    pub fn set_market_price(&self, symbol: impl Into<String>, price: Decimal) {
        self.inner
            .lock()
            .unwrap()
            .market_prices
            .insert(symbol.into(), price);
    }

    /// Fill an open order at the given price.
    pub fn fill_order(&self, broker_order_id: &str, price: Decimal) {
        self.set_state(broker_order_id, OrderState::Filled { price });
    }

    /// Reject an open order.
    pub fn reject_order(&self, broker_order_id: &str, reason: impl Into<String>) {
        self.set_state(
            broker_order_id,
            OrderState::Rejected {
                reason: reason.into(),
            },
        );
    }

    /// Cancel an open order.
    pub fn cancel_order(&self, broker_order_id: &str) {
        self.set_state(broker_order_id, OrderState::Cancelled);
    }

    /// Number of distinct orders accepted so far.
    pub fn submitted_count(&self) -> u64 {
        self.inner.lock().unwrap().submit_count
    }

    fn set_state(&self, broker_order_id: &str, state: OrderState) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(slot) = inner.orders.get_mut(broker_order_id) {
            *slot = state;
        }
    }
}

#[async_trait]
impl BrokerGateway for PaperGateway {
    async fn get_account(&self) -> Result<AccountSnapshot, GatewayError> {
        Ok(self.inner.lock().unwrap().account.clone())
    }

    async fn submit_bracket_order(&self, order: &BracketOrder) -> Result<String, GatewayError> {
        let mut inner = self.inner.lock().unwrap();

        // Resubmitting the same client order id returns the original order
        // instead of creating a duplicate.
        if let Some(existing) = inner.by_client_id.get(&order.client_order_id) {
            return Ok(existing.clone());
        }

        let id = Uuid::new_v4().to_string();
        let state = match inner.market_prices.get(&order.symbol) {
            Some(price) if inner.instant_fill => OrderState::Filled { price: *price },
            _ => OrderState::Open,
        };

        inner.orders.insert(id.clone(), state);
        inner
            .by_client_id
            .insert(order.client_order_id.clone(), id.clone());
        inner.submit_count += 1;
        Ok(id)
    }

    async fn get_order_state(&self, broker_order_id: &str) -> Result<OrderState, GatewayError> {
        self.inner
            .lock()
            .unwrap()
            .orders
            .get(broker_order_id)
            .cloned()
            .ok_or_else(|| GatewayError::OrderNotFound(broker_order_id.to_string()))
    }

    fn name(&self) -> &str {
        "Paper Gateway"
    }
}
