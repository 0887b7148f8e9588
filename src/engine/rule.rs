#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::PercentCalculus;
use crate::engine::{Bar, Position, PositionSide};

/// Rule deciding when an open position is closed.
///
/// Every variant is symmetric (the same threshold acts as stop-loss and take-profit)
/// and is parameterised by the threshold the calibrator tunes.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExitRule {
    /// Close when `|unrealized pnl| >= threshold × size` (cash per unit held).
    #[default]
    CashThresholdMartingale,
    /// Close when the price moved at least `threshold` points from entry.
    FixedPointThreshold,
    /// Close when the price moved at least `threshold` percent from entry.
    PercentageThreshold,
}

impl ExitRule {
    /// Returns `true` when `position` must be closed at `price`. Always `false` when flat.
    pub fn should_close(&self, position: &Position, price: f64, threshold: f64) -> bool {
        if position.is_flat() {
            return false;
        }
        match self {
            Self::CashThresholdMartingale => position.unrealized_pnl(price).abs() >= threshold * position.size(),
            Self::FixedPointThreshold => (price - position.entry_price()).abs() >= threshold,
            Self::PercentageThreshold => position.entry_price().change(price).abs() >= threshold,
        }
    }
}

/// How entries are chosen while the sizing policy is recovering from losses.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecoveryEntry {
    /// Always follow the fast/slow signal comparison.
    #[default]
    FollowSignal,
    /// While recovering, enter opposite to the last closed trade regardless of signals.
    ReverseLast,
}

impl RecoveryEntry {
    /// Side to open on `bar`, if any.
    pub fn entry_side(&self, bar: &Bar, recovery_level: u32, last_side: Option<PositionSide>) -> Option<PositionSide> {
        match (self, last_side) {
            (Self::ReverseLast, Some(side)) if recovery_level > 0 => Some(side.reverse()),
            _ => bar.signal(),
        }
    }
}
