use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{ClosedPosition, PositionSide};

/// One completed round trip. Appended once at close and never mutated.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeRecord {
    /// Time the position was opened.
    pub entry_time: DateTime<Utc>,
    /// Time the position was closed.
    pub exit_time: DateTime<Utc>,
    /// Side held.
    pub direction: PositionSide,
    /// Size held.
    pub size: f64,
    /// Recovery depth the trade was sized at (0 for a trade following a win).
    pub recovery_level_at_close: u32,
    /// Threshold in force when the exit rule fired.
    pub threshold_used: f64,
    /// Entry price.
    pub entry_price: f64,
    /// Exit price.
    pub exit_price: f64,
    /// Realized profit and loss.
    pub pnl: f64,
    /// Cash right after the close was booked.
    pub equity_after: f64,
}

impl TradeRecord {
    pub(crate) fn new(
        closed: ClosedPosition,
        exit_time: DateTime<Utc>,
        recovery_level: u32,
        threshold: f64,
        equity_after: f64,
    ) -> Self {
        Self {
            entry_time: closed.entry_time,
            exit_time,
            direction: closed.side,
            size: closed.size,
            recovery_level_at_close: recovery_level,
            threshold_used: threshold,
            entry_price: closed.entry_price,
            exit_price: closed.exit_price,
            pnl: closed.pnl,
            equity_after,
        }
    }

    /// Returns `true` for a strictly profitable trade.
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}
