use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Direction of an open position.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionSide {
    /// Profits when the price rises.
    Long,
    /// Profits when the price falls.
    Short,
}

impl PositionSide {
    /// Returns the opposite side.
    pub fn reverse(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

/// A position that has just been closed.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedPosition {
    /// Side that was held.
    pub side: PositionSide,
    /// Size that was held.
    pub size: f64,
    /// Price the position was opened at.
    pub entry_price: f64,
    /// Time the position was opened at.
    pub entry_time: DateTime<Utc>,
    /// Price the position was closed at.
    pub exit_price: f64,
    /// Realized profit and loss in currency units.
    pub pnl: f64,
}

/// Tracks the single open position of a simulation, or its absence.
///
/// There is no hedging nor pyramiding: opening while a position is held fails.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    side: Option<PositionSide>,
    size: f64,
    entry_price: f64,
    entry_time: Option<DateTime<Utc>>,
}

impl Position {
    /// Returns a flat tracker.
    pub fn flat() -> Self {
        Self::default()
    }

    /// Returns the side held, `None` when flat.
    pub fn side(&self) -> Option<PositionSide> {
        self.side
    }

    /// Returns `true` when no position is held.
    pub fn is_flat(&self) -> bool {
        self.side.is_none()
    }

    /// Returns the size held (0 when flat).
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Returns the entry price (0 when flat).
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Returns the entry time, `None` when flat.
    pub fn entry_time(&self) -> Option<DateTime<Utc>> {
        self.entry_time
    }

    /// Opens a position.
    ///
    /// ### Errors
    /// `InvalidState` if a position is already open; `InvalidPrice`/`NegZeroSize` on bad inputs.
    pub fn open(&mut self, side: PositionSide, price: f64, time: DateTime<Utc>, size: f64) -> Result<()> {
        if self.side.is_some() {
            return Err(Error::InvalidState("cannot open: a position is already open"));
        }
        if price <= 0.0 || !price.is_finite() {
            return Err(Error::InvalidPrice(price));
        }
        if size <= 0.0 || !size.is_finite() {
            return Err(Error::NegZeroSize(size));
        }
        self.side = Some(side);
        self.size = size;
        self.entry_price = price;
        self.entry_time = Some(time);
        Ok(())
    }

    /// Mark-to-market P&L at `current_price`, 0 when flat.
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        match self.side {
            Some(PositionSide::Long) => (current_price - self.entry_price) * self.size,
            Some(PositionSide::Short) => (self.entry_price - current_price) * self.size,
            None => 0.0,
        }
    }

    /// Closes the position at `exit_price` and resets the tracker to flat.
    ///
    /// ### Errors
    /// `InvalidState` if already flat.
    pub fn close(&mut self, exit_price: f64) -> Result<ClosedPosition> {
        let (Some(side), Some(entry_time)) = (self.side, self.entry_time) else {
            return Err(Error::InvalidState("cannot close: no position is open"));
        };
        if exit_price <= 0.0 || !exit_price.is_finite() {
            return Err(Error::InvalidPrice(exit_price));
        }
        let closed = ClosedPosition {
            side,
            size: self.size,
            entry_price: self.entry_price,
            entry_time,
            exit_price,
            pnl: self.unrealized_pnl(exit_price),
        };
        *self = Self::flat();
        Ok(closed)
    }
}
