//! Position sizing algorithm.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tradebus_core::Side;

/// Risk parameters consumed by the sizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParams {
    /// Fraction of equity risked per trade
    pub risk_fraction: Decimal,
    /// Stop distance as a fraction of the entry price
    pub stop_loss_fraction: Decimal,
    /// Take-profit distance as a fraction of the entry price
    pub take_profit_fraction: Decimal,
    /// Cap on position value as a fraction of equity
    pub max_allocation_fraction: Decimal,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            risk_fraction: dec!(0.01),
            stop_loss_fraction: dec!(0.05),
            take_profit_fraction: dec!(0.10),
            max_allocation_fraction: dec!(0.20),
        }
    }
}

impl RiskParams {
    /// Validate the parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.risk_fraction <= Decimal::ZERO || self.risk_fraction >= Decimal::ONE {
            return Err("risk_fraction must be in (0, 1)".into());
        }
        if self.stop_loss_fraction <= Decimal::ZERO || self.stop_loss_fraction >= Decimal::ONE {
            return Err("stop_loss_fraction must be in (0, 1)".into());
        }
        if self.take_profit_fraction <= Decimal::ZERO {
            return Err("take_profit_fraction must be positive".into());
        }
        if self.max_allocation_fraction <= Decimal::ZERO
            || self.max_allocation_fraction > Decimal::ONE
        {
            return Err("max_allocation_fraction must be in (0, 1]".into());
        }
        Ok(())
    }
}

/// Outcome of a sizing decision.
#[derive(Debug, Clone, PartialEq)]
pub enum SizingOutcome {
    /// Trade is viable at the given size and bracket prices
    Sized {
        size: Decimal,
        stop_loss_price: Decimal,
        take_profit_price: Decimal,
    },
    /// Trade is not viable within the risk caps
    Rejected { reason: String },
}

/// Size a position from current equity and the signal's entry price hint.
///
/// `size = floor(equity * risk_fraction / stop_distance)`, then capped so
/// the position value never exceeds `equity * max_allocation_fraction`.
/// Whole units only; a size below one unit rejects the trade.
pub fn size_position(side: Side, entry: Decimal, equity: Decimal, params: &RiskParams) -> SizingOutcome {
    if entry <= Decimal::ZERO {
        return SizingOutcome::Rejected {
            reason: format!("entry price hint {entry} is not positive"),
        };
    }
    if equity <= Decimal::ZERO {
        return SizingOutcome::Rejected {
            reason: format!("account equity {equity} is not positive"),
        };
    }

    let risk_amount = equity * params.risk_fraction;
    let stop_distance = entry * params.stop_loss_fraction;

    let mut size = (risk_amount / stop_distance).floor();

    let max_value = equity * params.max_allocation_fraction;
    if size * entry > max_value {
        size = (max_value / entry).floor();
    }

    if size < Decimal::ONE {
        return SizingOutcome::Rejected {
            reason: format!(
                "cannot afford one unit of {entry} within risk caps (equity {equity})"
            ),
        };
    }

    // Stop goes below the entry for longs and above for shorts; the target
    // is mirrored.
    let (stop_loss_price, take_profit_price) = match side {
        Side::Buy => (
            entry - stop_distance,
            entry * (Decimal::ONE + params.take_profit_fraction),
        ),
        Side::Sell => (
            entry + stop_distance,
            entry * (Decimal::ONE - params.take_profit_fraction),
        ),
    };

    SizingOutcome::Sized {
        size,
        stop_loss_price,
        take_profit_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_sizing() {
        // equity 100000, risk 1% -> 1000 at risk; entry 50.00 with a 5%
        // stop -> 2.50 per unit -> 400 units; allocation cap 20% -> 20000,
        // and 400 * 50 = 20000 binds exactly.
        let params = RiskParams::default();
        let outcome = size_position(Side::Buy, dec!(50.00), dec!(100000), &params);

        match outcome {
            SizingOutcome::Sized {
                size,
                stop_loss_price,
                take_profit_price,
            } => {
                assert_eq!(size, dec!(400));
                assert_eq!(stop_loss_price, dec!(47.500));
                assert_eq!(take_profit_price, dec!(55.0000));
            }
            SizingOutcome::Rejected { reason } => panic!("unexpected reject: {reason}"),
        }
    }

    #[test]
    fn test_allocation_cap_reduces_size() {
        let params = RiskParams {
            risk_fraction: dec!(0.02),
            stop_loss_fraction: dec!(0.01),
            take_profit_fraction: dec!(0.10),
            max_allocation_fraction: dec!(0.10),
        };
        // Uncapped: 2000 / 0.50 = 4000 units = 200000 value. Cap: 10000
        // value -> 200 units.
        let outcome = size_position(Side::Buy, dec!(50.00), dec!(100000), &params);
        match outcome {
            SizingOutcome::Sized { size, .. } => assert_eq!(size, dec!(200)),
            SizingOutcome::Rejected { reason } => panic!("unexpected reject: {reason}"),
        }
    }

    #[test]
    fn test_rejects_when_below_one_unit() {
        let params = RiskParams::default();
        // 1% of 100 equity = 1.00 at risk; stop distance 2.50 -> 0 units.
        let outcome = size_position(Side::Buy, dec!(50.00), dec!(100), &params);
        assert!(matches!(outcome, SizingOutcome::Rejected { .. }));
    }

    #[test]
    fn test_rejects_nonpositive_inputs() {
        let params = RiskParams::default();
        assert!(matches!(
            size_position(Side::Buy, dec!(0), dec!(100000), &params),
            SizingOutcome::Rejected { .. }
        ));
        assert!(matches!(
            size_position(Side::Buy, dec!(50), dec!(0), &params),
            SizingOutcome::Rejected { .. }
        ));
    }

    #[test]
    fn test_short_side_mirrors_bracket() {
        let params = RiskParams::default();
        let outcome = size_position(Side::Sell, dec!(100.00), dec!(100000), &params);
        match outcome {
            SizingOutcome::Sized {
                stop_loss_price,
                take_profit_price,
                ..
            } => {
                assert_eq!(stop_loss_price, dec!(105.0000));
                assert_eq!(take_profit_price, dec!(90.0000));
            }
            SizingOutcome::Rejected { reason } => panic!("unexpected reject: {reason}"),
        }
    }

    #[test]
    fn test_sizing_is_deterministic() {
        let params = RiskParams::default();
        let a = size_position(Side::Buy, dec!(73.21), dec!(250000), &params);
        let b = size_position(Side::Buy, dec!(73.21), dec!(250000), &params);
        assert_eq!(a, b);
    }

    #[test]
    fn test_params_validation() {
        assert!(RiskParams::default().validate().is_ok());

        let bad = RiskParams {
            risk_fraction: dec!(0),
            ..RiskParams::default()
        };
        assert!(bad.validate().is_err());

        let bad = RiskParams {
            max_allocation_fraction: dec!(1.5),
            ..RiskParams::default()
        };
        assert!(bad.validate().is_err());
    }
}
