//! Broker gateway trait definition.

use crate::error::GatewayError;
use crate::types::{AccountSnapshot, BracketOrder, OrderState};
use async_trait::async_trait;

/// Trait for broker integrations.
///
/// The gateway may be slow, rate-limited, or transiently unavailable;
/// callers apply their own timeouts and treat a timeout as an unknown
/// outcome, not a failure.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Get current account equity and buying power.
    async fn get_account(&self) -> Result<AccountSnapshot, GatewayError>;

    /// Submit a bracket order.
    ///
    /// # Returns
    /// The broker-assigned order id.
    async fn submit_bracket_order(&self, order: &BracketOrder) -> Result<String, GatewayError>;

    /// Get the current state of a previously submitted order.
    async fn get_order_state(&self, broker_order_id: &str) -> Result<OrderState, GatewayError>;

    /// Get the gateway name.
    fn name(&self) -> &str;
}
