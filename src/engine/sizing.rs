#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Current martingale size and depth.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingState {
    /// Size of the next trade.
    pub current_size: f64,
    /// Consecutive losing closes since the last win.
    pub recovery_level: u32,
}

/// Doubling-on-loss, reset-on-win sizing bounded by a maximum size.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingPolicy {
    initial_size: f64,
    multiplier: f64,
    max_size: f64,
}

impl SizingPolicy {
    /// Creates a sizing policy.
    ///
    /// ### Arguments
    /// * `initial_size` - Size after a win and at start.
    /// * `multiplier` - Growth factor applied after a loss (e.g. 2.0 doubles).
    /// * `max_size` - Cap on the size.
    pub fn new(initial_size: f64, multiplier: f64, max_size: f64) -> Result<Self> {
        if initial_size <= 0.0 || !initial_size.is_finite() {
            return Err(Error::NegZeroSize(initial_size));
        }
        if multiplier < 1.0 || !multiplier.is_finite() {
            return Err(Error::InvalidMultiplier(multiplier));
        }
        if max_size < initial_size || max_size.is_nan() {
            return Err(Error::MaxSizeBelowInitial(initial_size, max_size));
        }
        Ok(Self {
            initial_size,
            multiplier,
            max_size,
        })
    }

    /// Returns the initial size.
    pub fn initial_size(&self) -> f64 {
        self.initial_size
    }

    /// Returns the loss multiplier.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Returns the size cap.
    pub fn max_size(&self) -> f64 {
        self.max_size
    }

    /// State before any trade.
    pub fn initial_state(&self) -> SizingState {
        SizingState {
            current_size: self.initial_size,
            recovery_level: 0,
        }
    }

    /// Next state after a trade closed with `pnl`.
    ///
    /// A breakeven close (`pnl == 0`) counts as a loss.
    pub fn on_trade_closed(&self, pnl: f64, prior: SizingState) -> SizingState {
        if pnl > 0.0 {
            self.initial_state()
        } else {
            SizingState {
                current_size: (prior.current_size * self.multiplier).min(self.max_size),
                recovery_level: prior.recovery_level + 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_doubles_and_win_resets() {
        let policy = SizingPolicy::new(10.0, 2.0, 1000.0).unwrap();
        let state = policy.initial_state();

        let state = policy.on_trade_closed(-100.0, state);
        assert_eq!(state.current_size, 20.0);
        assert_eq!(state.recovery_level, 1);

        let state = policy.on_trade_closed(-5.0, state);
        assert_eq!(state.current_size, 40.0);
        assert_eq!(state.recovery_level, 2);

        let state = policy.on_trade_closed(0.01, state);
        assert_eq!(state, policy.initial_state());
    }

    #[test]
    fn breakeven_is_a_loss() {
        let policy = SizingPolicy::new(10.0, 2.0, 1000.0).unwrap();
        let state = policy.on_trade_closed(0.0, policy.initial_state());
        assert_eq!(state.current_size, 20.0);
        assert_eq!(state.recovery_level, 1);
    }

    #[test]
    fn size_is_capped() {
        let policy = SizingPolicy::new(10.0, 2.0, 50.0).unwrap();
        let mut state = policy.initial_state();
        for _ in 0..5 {
            state = policy.on_trade_closed(-1.0, state);
        }
        assert_eq!(state.current_size, 50.0);
        assert_eq!(state.recovery_level, 5);
    }

    #[test]
    fn invalid_policies() {
        assert!(matches!(SizingPolicy::new(0.0, 2.0, 10.0), Err(Error::NegZeroSize(_))));
        assert!(matches!(SizingPolicy::new(1.0, 0.5, 10.0), Err(Error::InvalidMultiplier(_))));
        assert!(matches!(
            SizingPolicy::new(10.0, 2.0, 5.0),
            Err(Error::MaxSizeBelowInitial(_, _))
        ));
    }
}
