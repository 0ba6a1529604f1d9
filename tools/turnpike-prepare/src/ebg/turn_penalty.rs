//! Turn penalty cost model - OSRM-compatible sigmoid-based turn costs
//!
//! The factory asks a [`TurnPenaltyFunction`] for the cost of every turn it
//! emits. The built-in [`SigmoidTurnPenalty`] implements the car.lua formula:
//! - Sigmoid function mapping the deviation from straight to a penalty
//! - turn_penalty = 7.5 seconds (max)
//! - turn_bias = 1.075 (right-turn preference for right-hand traffic)
//!
//! Reference: https://github.com/Project-OSRM/osrm-backend/blob/master/profiles/car.lua

use serde::{Deserialize, Serialize};

/// A turn penalty callback failed; the turn is costed with 0
#[derive(Debug, thiserror::Error)]
pub enum PenaltyEvaluationError {
    #[error("turn penalty for deviation {deviation} is not finite")]
    NonFinite { deviation: f64 },

    #[error("turn penalty {value} for deviation {deviation} does not fit a weight")]
    OutOfRange { deviation: f64, value: f64 },

    #[error("turn penalty callback failed: {0}")]
    Callback(String),
}

/// Cost of a turn in deciseconds.
///
/// `deviation` is `180 - angle`: 0 drives straight on, positive values turn
/// right, negative values turn left, ±180 is a U-turn.
pub trait TurnPenaltyFunction {
    fn turn_penalty(&self, deviation: f64) -> Result<i32, PenaltyEvaluationError>;
}

impl<F> TurnPenaltyFunction for F
where
    F: Fn(f64) -> Result<i32, PenaltyEvaluationError>,
{
    fn turn_penalty(&self, deviation: f64) -> Result<i32, PenaltyEvaluationError> {
        self(deviation)
    }
}

/// Profiles without a turn function
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTurnPenalty;

impl TurnPenaltyFunction for NoTurnPenalty {
    fn turn_penalty(&self, _deviation: f64) -> Result<i32, PenaltyEvaluationError> {
        Ok(0)
    }
}

/// Turn penalty configuration (mode-specific, OSRM-compatible)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TurnPenaltyConfig {
    /// Maximum turn penalty in deciseconds (OSRM: 7.5s = 75 ds)
    pub turn_penalty_ds: u32,

    /// Turn bias for asymmetric left/right costs (OSRM: 1.075)
    /// >1.0 = prefer right turns (right-hand traffic countries)
    pub turn_bias: f64,
}

impl TurnPenaltyConfig {
    /// Car mode turn penalties - matches OSRM car.lua
    pub fn car() -> Self {
        Self {
            turn_penalty_ds: 75, // 7.5 seconds (OSRM default)
            turn_bias: 1.075,    // Slight right-turn preference
        }
    }

    /// Bike mode turn penalties
    pub fn bike() -> Self {
        Self {
            turn_penalty_ds: 40, // 4 seconds max
            turn_bias: 1.4,      // Bikes prefer right turns more
        }
    }
}

/// OSRM's sigmoid formula from car.lua:
///
/// ```lua
/// penalty = turn_penalty / (1 + math.exp(-((13 / turn_bias) * -turn.angle/180 - 6.5*turn_bias)))
/// ```
/// - ~0 going straight
/// - cheap right turns, expensive left turns (bias > 1)
#[derive(Debug, Clone, Copy)]
pub struct SigmoidTurnPenalty {
    config: TurnPenaltyConfig,
}

impl SigmoidTurnPenalty {
    pub fn new(config: TurnPenaltyConfig) -> Self {
        Self { config }
    }
}

impl TurnPenaltyFunction for SigmoidTurnPenalty {
    fn turn_penalty(&self, deviation: f64) -> Result<i32, PenaltyEvaluationError> {
        if !deviation.is_finite() {
            return Err(PenaltyEvaluationError::NonFinite { deviation });
        }
        if self.config.turn_penalty_ds == 0 {
            return Ok(0);
        }

        let turn_bias = self.config.turn_bias;
        // Positive deviation = right turn, so the angle is negated
        let exponent = -((13.0 / turn_bias) * (-deviation / 180.0) - 6.5 * turn_bias);
        let sigmoid = 1.0 / (1.0 + exponent.exp());
        let value = (self.config.turn_penalty_ds as f64 * sigmoid).round();

        if !value.is_finite() {
            return Err(PenaltyEvaluationError::NonFinite { deviation });
        }
        if value < i32::MIN as f64 || value > i32::MAX as f64 {
            return Err(PenaltyEvaluationError::OutOfRange { deviation, value });
        }
        Ok(value as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_osrm_sigmoid_penalties() {
        let penalty = SigmoidTurnPenalty::new(TurnPenaltyConfig::car());

        // Straight: ~0 penalty
        let straight = penalty.turn_penalty(0.0).unwrap();
        assert!(straight < 10, "straight should be ~0, got {}ds", straight);

        // 90 degree right turn: very low penalty (~0) in right-hand traffic
        let right = penalty.turn_penalty(90.0).unwrap();
        assert!(right < 10, "90° right should be ~0, got {}ds", right);

        // 90 degree left turn: ~2s (crossing traffic)
        let left = penalty.turn_penalty(-90.0).unwrap();
        assert!((15..=30).contains(&left), "90° left should be ~2s, got {}ds", left);
    }

    #[test]
    fn test_left_right_asymmetry() {
        let penalty = SigmoidTurnPenalty::new(TurnPenaltyConfig::bike());
        let right = penalty.turn_penalty(135.0).unwrap();
        let left = penalty.turn_penalty(-135.0).unwrap();
        assert!(
            left > right,
            "left turn ({}ds) should cost more than right turn ({}ds)",
            left,
            right
        );
    }

    #[test]
    fn test_non_finite_input_fails() {
        let penalty = SigmoidTurnPenalty::new(TurnPenaltyConfig::car());
        assert!(matches!(
            penalty.turn_penalty(f64::NAN),
            Err(PenaltyEvaluationError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_zero_penalty_config() {
        let penalty = SigmoidTurnPenalty::new(TurnPenaltyConfig {
            turn_penalty_ds: 0,
            turn_bias: 1.075,
        });
        assert_eq!(penalty.turn_penalty(-120.0).unwrap(), 0);
    }

    #[test]
    fn test_closures_are_penalty_functions() {
        let flat = |_deviation: f64| -> Result<i32, PenaltyEvaluationError> { Ok(12) };
        assert_eq!(flat.turn_penalty(33.0).unwrap(), 12);
        assert_eq!(NoTurnPenalty.turn_penalty(-90.0).unwrap(), 0);
    }
}
