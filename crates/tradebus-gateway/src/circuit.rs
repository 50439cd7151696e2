//! Circuit breaker for a misbehaving gateway.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use tradebus_core::{
    AccountSnapshot, BracketOrder, BrokerGateway, GatewayError, OrderState,
};

#[derive(Debug)]
struct BreakerState {
    consecutive_criticals: u32,
    opened_at: Option<Instant>,
}

/// Wraps a gateway and halts traffic after repeated critical failures
/// (authentication, server errors).
///
/// Once open, calls fail fast with [`GatewayError::CircuitOpen`] until the
/// cooldown elapses; the next call is then let through as a probe, and its
/// outcome closes or re-opens the circuit.
pub struct CircuitBreaker<G> {
    inner: G,
    threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl<G: BrokerGateway> CircuitBreaker<G> {
    pub fn new(inner: G, threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner,
            threshold,
            cooldown,
            state: Mutex::new(BreakerState {
                consecutive_criticals: 0,
                opened_at: None,
            }),
        }
    }

    /// Whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().opened_at.is_some()
    }

    fn check(&self) -> Result<(), GatewayError> {
        let state = self.state.lock().unwrap();
        match state.opened_at {
            Some(opened) if opened.elapsed() < self.cooldown => Err(GatewayError::CircuitOpen),
            // Cooldown elapsed: let this call through as a probe.
            _ => Ok(()),
        }
    }

    fn observe<T>(&self, result: Result<T, GatewayError>) -> Result<T, GatewayError> {
        let mut state = self.state.lock().unwrap();
        match &result {
            Ok(_) => {
                if state.opened_at.is_some() || state.consecutive_criticals > 0 {
                    info!(gateway = self.inner.name(), "gateway recovered, circuit closed");
                }
                state.consecutive_criticals = 0;
                state.opened_at = None;
            }
            Err(e) if e.is_critical() => {
                state.consecutive_criticals += 1;
                warn!(
                    gateway = self.inner.name(),
                    failures = state.consecutive_criticals,
                    threshold = self.threshold,
                    "critical gateway failure"
                );
                if state.consecutive_criticals >= self.threshold {
                    if state.opened_at.is_none() {
                        error!(
                            gateway = self.inner.name(),
                            "circuit breaker tripped, halting gateway traffic"
                        );
                    }
                    state.opened_at = Some(Instant::now());
                }
            }
            Err(_) => {}
        }
        result
    }
}

#[async_trait]
impl<G: BrokerGateway> BrokerGateway for CircuitBreaker<G> {
    async fn get_account(&self) -> Result<AccountSnapshot, GatewayError> {
        self.check()?;
        let result = self.inner.get_account().await;
        self.observe(result)
    }

    async fn submit_bracket_order(&self, order: &BracketOrder) -> Result<String, GatewayError> {
        self.check()?;
        let result = self.inner.submit_bracket_order(order).await;
        self.observe(result)
    }

    async fn get_order_state(&self, broker_order_id: &str) -> Result<OrderState, GatewayError> {
        self.check()?;
        let result = self.inner.get_order_state(broker_order_id).await;
        self.observe(result)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Gateway that fails every call with a scripted error.
    struct FailingGateway {
        calls: AtomicU32,
        error: fn() -> GatewayError,
    }

    #[async_trait]
    impl BrokerGateway for FailingGateway {
        async fn get_account(&self) -> Result<AccountSnapshot, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.error)())
        }

        async fn submit_bracket_order(&self, _: &BracketOrder) -> Result<String, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.error)())
        }

        async fn get_order_state(&self, _: &str) -> Result<OrderState, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.error)())
        }

        fn name(&self) -> &str {
            "Failing Gateway"
        }
    }

    fn auth_failure() -> GatewayError {
        GatewayError::Authentication("bad key".into())
    }

    #[tokio::test]
    async fn test_trips_after_threshold_and_fails_fast() {
        let inner = FailingGateway {
            calls: AtomicU32::new(0),
            error: auth_failure,
        };
        let breaker = CircuitBreaker::new(inner, 3, Duration::from_secs(300));

        for _ in 0..3 {
            let err = breaker.get_account().await.unwrap_err();
            assert!(matches!(err, GatewayError::Authentication(_)));
        }
        assert!(breaker.is_open());

        // Open circuit short-circuits without touching the inner gateway.
        let err = breaker.get_account().await.unwrap_err();
        assert!(matches!(err, GatewayError::CircuitOpen));
        assert_eq!(breaker.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_noncritical_errors_do_not_trip() {
        let inner = FailingGateway {
            calls: AtomicU32::new(0),
            error: || GatewayError::Timeout(Duration::from_secs(5)),
        };
        let breaker = CircuitBreaker::new(inner, 3, Duration::from_secs(300));

        for _ in 0..10 {
            let err = breaker.get_account().await.unwrap_err();
            assert!(matches!(err, GatewayError::Timeout(_)));
        }
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn test_probe_after_cooldown_closes_circuit() {
        let inner = crate::PaperGateway::new(dec!(100000));
        let breaker = CircuitBreaker::new(inner, 1, Duration::from_millis(0));

        // Force the circuit open by hand-feeding a critical observation.
        breaker.observe::<()>(Err(auth_failure())).unwrap_err();
        assert!(breaker.is_open());

        // Zero cooldown: the next call is a probe and succeeds.
        breaker.get_account().await.unwrap();
        assert!(!breaker.is_open());
    }
}
