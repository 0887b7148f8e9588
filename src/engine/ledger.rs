#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Cash account of a simulation.
///
/// Only realized P&L moves the cash; open positions are never marked to market here.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashLedger {
    // Starting capital, used for reset and net P&L
    initial_cash: f64,
    // Current cash
    cash: f64,
    // Fraction of cash a single position may use
    max_usage: f64,
}

impl CashLedger {
    /// Creates a new ledger with the given starting capital.
    /// Negative or zero capital is rejected.
    pub fn new(cash: f64) -> Result<Self> {
        if cash <= 0.0 || !cash.is_finite() {
            return Err(Error::NegZeroBalance(cash));
        }

        Ok(Self {
            cash,
            max_usage: 1.0,
            initial_cash: cash,
        })
    }

    /// Caps the notional of a single position at `max_usage × cash`.
    pub fn with_max_usage(mut self, max_usage: f64) -> Result<Self> {
        if max_usage <= 0.0 || max_usage > 1.0 || !max_usage.is_finite() {
            return Err(Error::InvalidCapitalUsage(max_usage));
        }
        self.max_usage = max_usage;
        Ok(self)
    }

    /// Returns the starting capital.
    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    /// Returns the current cash. May be negative after a ruinous loss.
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Returns `cash - initial_cash`.
    pub fn net_pnl(&self) -> f64 {
        self.cash - self.initial_cash
    }

    /// Full-notional affordability check: `price × size <= cash × max_usage`.
    pub fn can_afford(&self, price: f64, size: f64) -> bool {
        price * size <= self.cash * self.max_usage
    }

    /// Books the realized P&L of one closed trade. Not clamped.
    pub fn apply_realized_pnl(&mut self, amount: f64) {
        self.cash += amount;
    }

    /// Resets the ledger to its starting capital.
    pub fn reset(&mut self) {
        self.cash = self.initial_cash;
    }
}

#[cfg(test)]
#[test]
fn new_ledger_valid_balance() {
    let ledger = CashLedger::new(100.0).unwrap();
    assert_eq!(ledger.cash(), 100.0);
    assert_eq!(ledger.initial_cash(), 100.0);
    assert_eq!(ledger.net_pnl(), 0.0);
}

#[cfg(test)]
#[test]
fn new_ledger_invalid_balance() {
    let result = CashLedger::new(0.0);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));

    let result = CashLedger::new(-10.0);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));
}

#[cfg(test)]
#[test]
fn can_afford_full_notional() {
    let ledger = CashLedger::new(1000.0).unwrap();
    assert!(ledger.can_afford(100.0, 10.0));
    assert!(!ledger.can_afford(100.0, 10.01));
}

#[cfg(test)]
#[test]
fn can_afford_with_usage_cap() {
    let ledger = CashLedger::new(1000.0).unwrap().with_max_usage(0.9).unwrap();
    assert!(ledger.can_afford(90.0, 10.0));
    assert!(!ledger.can_afford(100.0, 10.0));

    assert!(matches!(
        CashLedger::new(1000.0).unwrap().with_max_usage(1.5),
        Err(Error::InvalidCapitalUsage(_))
    ));
}

#[cfg(test)]
#[test]
fn realized_pnl_may_go_negative() {
    let mut ledger = CashLedger::new(100.0).unwrap();
    ledger.apply_realized_pnl(-150.0);
    assert_eq!(ledger.cash(), -50.0);
    assert_eq!(ledger.net_pnl(), -150.0);
    assert!(!ledger.can_afford(1.0, 1.0));
}

#[cfg(test)]
#[test]
fn reset_ledger() {
    let mut ledger = CashLedger::new(100.0).unwrap();
    ledger.apply_realized_pnl(25.0);
    assert_eq!(ledger.cash(), 125.0);
    ledger.reset();
    assert_eq!(ledger.cash(), 100.0);
}
