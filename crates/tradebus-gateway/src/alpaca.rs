//! Alpaca gateway for paper and live trading.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tradebus_core::{
    AccountSnapshot, BracketOrder, BrokerGateway, GatewayError, OrderState, Side,
};

/// Alpaca API configuration.
#[derive(Debug, Clone)]
pub struct AlpacaConfig {
    pub api_key: String,
    pub api_secret: String,
    pub paper: bool,
}

impl AlpacaConfig {
    /// Create config directly with key and secret.
    pub fn new(api_key: String, api_secret: String, paper: bool) -> Self {
        Self {
            api_key,
            api_secret,
            paper,
        }
    }

    /// Load from environment variables.
    pub fn from_env() -> Result<Self, GatewayError> {
        let api_key = std::env::var("ALPACA_API_KEY")
            .map_err(|_| GatewayError::Authentication("ALPACA_API_KEY not set".into()))?;
        let api_secret = std::env::var("ALPACA_API_SECRET")
            .map_err(|_| GatewayError::Authentication("ALPACA_API_SECRET not set".into()))?;
        let paper = std::env::var("ALPACA_PAPER")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        Ok(Self {
            api_key,
            api_secret,
            paper,
        })
    }

    pub fn base_url(&self) -> &str {
        if self.paper {
            "https://paper-api.alpaca.markets"
        } else {
            "https://api.alpaca.markets"
        }
    }
}

/// Alpaca API response types
#[derive(Debug, Deserialize)]
struct AlpacaAccount {
    cash: String,
    buying_power: String,
    equity: String,
}

#[derive(Debug, Deserialize)]
struct AlpacaOrder {
    id: String,
    status: String,
    filled_avg_price: Option<String>,
}

#[derive(Debug, Serialize)]
struct StopLossLeg {
    stop_price: String,
}

#[derive(Debug, Serialize)]
struct TakeProfitLeg {
    limit_price: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest {
    symbol: String,
    qty: String,
    side: String,
    #[serde(rename = "type")]
    order_type: String,
    time_in_force: String,
    order_class: String,
    client_order_id: String,
    stop_loss: StopLossLeg,
    #[serde(skip_serializing_if = "Option::is_none")]
    take_profit: Option<TakeProfitLeg>,
}

/// Alpaca gateway client.
pub struct AlpacaGateway {
    config: AlpacaConfig,
    client: Client,
}

impl AlpacaGateway {
    /// Create a new Alpaca gateway client.
    pub fn new(config: AlpacaConfig) -> Result<Self, GatewayError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "APCA-API-KEY-ID",
            header::HeaderValue::from_str(&config.api_key)
                .map_err(|e| GatewayError::Authentication(e.to_string()))?,
        );
        headers.insert(
            "APCA-API-SECRET-KEY",
            header::HeaderValue::from_str(&config.api_secret)
                .map_err(|e| GatewayError::Authentication(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self, GatewayError> {
        let config = AlpacaConfig::from_env()?;
        Self::new(config)
    }

    /// Fetch an order by the client order id we stamped on submission.
    /// Used when a resubmit bounces off the broker's duplicate check.
    async fn find_by_client_order_id(&self, client_order_id: &str) -> Result<String, GatewayError> {
        let url = format!("{}/v2/orders:by_client_order_id", self.config.base_url());
        let resp = self
            .client
            .get(&url)
            .query(&[("client_order_id", client_order_id)])
            .send()
            .await
            .map_err(request_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let order: AlpacaOrder = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(order.id)
    }
}

#[async_trait]
impl BrokerGateway for AlpacaGateway {
    async fn get_account(&self) -> Result<AccountSnapshot, GatewayError> {
        let url = format!("{}/v2/account", self.config.base_url());

        let resp = self.client.get(&url).send().await.map_err(request_error)?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let account: AlpacaAccount = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        Ok(AccountSnapshot {
            equity: parse_money("equity", &account.equity)?,
            cash: parse_money("cash", &account.cash)?,
            buying_power: parse_money("buying_power", &account.buying_power)?,
        })
    }

    async fn submit_bracket_order(&self, order: &BracketOrder) -> Result<String, GatewayError> {
        let url = format!("{}/v2/orders", self.config.base_url());

        let create_req = CreateOrderRequest {
            symbol: order.symbol.clone(),
            qty: order.quantity.to_string(),
            side: match order.side {
                Side::Buy => "buy".to_string(),
                Side::Sell => "sell".to_string(),
            },
            order_type: "market".to_string(),
            time_in_force: "gtc".to_string(),
            order_class: "bracket".to_string(),
            client_order_id: order.client_order_id.clone(),
            stop_loss: StopLossLeg {
                stop_price: order.stop_loss_price.to_string(),
            },
            take_profit: order.take_profit_price.map(|p| TakeProfitLeg {
                limit_price: p.to_string(),
            }),
        };

        debug!("Submitting bracket order: {:?}", create_req);

        let resp = self
            .client
            .post(&url)
            .json(&create_req)
            .send()
            .await
            .map_err(request_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();

            // A duplicate client_order_id means a previous attempt already
            // reached the broker; hand back that order instead of failing.
            if status == StatusCode::UNPROCESSABLE_ENTITY && text.contains("client_order_id") {
                info!(
                    client_order_id = %order.client_order_id,
                    "duplicate client order id, looking up existing order"
                );
                return self.find_by_client_order_id(&order.client_order_id).await;
            }
            return Err(status_error(status, &text));
        }

        let created: AlpacaOrder = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        info!(
            "Bracket order submitted: {} {} {} stop {}",
            order.side, order.quantity, order.symbol, order.stop_loss_price
        );
        Ok(created.id)
    }

    async fn get_order_state(&self, broker_order_id: &str) -> Result<OrderState, GatewayError> {
        let url = format!("{}/v2/orders/{}", self.config.base_url(), broker_order_id);

        let resp = self.client.get(&url).send().await.map_err(request_error)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::OrderNotFound(broker_order_id.to_string()));
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let order: AlpacaOrder = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        order_state_from(&order)
    }

    fn name(&self) -> &str {
        if self.config.paper {
            "Alpaca Paper"
        } else {
            "Alpaca Live"
        }
    }
}

fn order_state_from(order: &AlpacaOrder) -> Result<OrderState, GatewayError> {
    match order.status.as_str() {
        "filled" => {
            let raw = order.filled_avg_price.as_deref().ok_or_else(|| {
                GatewayError::InvalidResponse(format!("order {} filled without price", order.id))
            })?;
            Ok(OrderState::Filled {
                price: parse_money("filled_avg_price", raw)?,
            })
        }
        "rejected" => Ok(OrderState::Rejected {
            reason: "rejected by broker".to_string(),
        }),
        "canceled" | "expired" => Ok(OrderState::Cancelled),
        _ => Ok(OrderState::Open),
    }
}

fn parse_money(field: &str, raw: &str) -> Result<Decimal, GatewayError> {
    raw.parse()
        .map_err(|e| GatewayError::InvalidResponse(format!("{field} {raw:?}: {e}")))
}

fn request_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout(std::time::Duration::from_secs(30))
    } else {
        GatewayError::Connection(e.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> GatewayError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            GatewayError::Authentication(format!("{status}: {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited { retry_after_secs: 1 },
        StatusCode::UNPROCESSABLE_ENTITY => GatewayError::OrderRejected(body.to_string()),
        s if s.is_server_error() => GatewayError::ServerError(format!("{status}: {body}")),
        _ => GatewayError::InvalidResponse(format!("{status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(status: &str, price: Option<&str>) -> AlpacaOrder {
        AlpacaOrder {
            id: "o-1".to_string(),
            status: status.to_string(),
            filled_avg_price: price.map(str::to_string),
        }
    }

    #[test]
    fn test_order_state_mapping() {
        assert_eq!(
            order_state_from(&order("filled", Some("50.12"))).unwrap(),
            OrderState::Filled { price: dec!(50.12) }
        );
        assert_eq!(
            order_state_from(&order("canceled", None)).unwrap(),
            OrderState::Cancelled
        );
        assert!(matches!(
            order_state_from(&order("rejected", None)).unwrap(),
            OrderState::Rejected { .. }
        ));
        assert_eq!(
            order_state_from(&order("partially_filled", None)).unwrap(),
            OrderState::Open
        );
        assert!(order_state_from(&order("filled", None)).is_err());
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "nope"),
            GatewayError::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "boom"),
            GatewayError::ServerError(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient"),
            GatewayError::OrderRejected(_)
        ));
    }

    #[test]
    fn test_base_url_follows_paper_flag() {
        let paper = AlpacaConfig::new("k".into(), "s".into(), true);
        assert!(paper.base_url().contains("paper-api"));
        let live = AlpacaConfig::new("k".into(), "s".into(), false);
        assert!(!live.base_url().contains("paper-api"));
    }
}
