//! Core simulation components.
//!
//! This module provides the fundamental types for a single-instrument simulation:
//! - `Bar`: close price plus precomputed fast/slow trend signals.
//! - `Position`: the one open position (or none) and its mark-to-market P&L.
//! - `CashLedger`: cash balance and the capital-sufficiency check.
//! - `SizingPolicy`: martingale sizing (grow on loss, reset on win).
//! - `ExitRule` / `RecoveryEntry`: when to close and which side to reopen.
//! - `Simulator`: the per-bar state machine tying them together.

mod bar;
mod ledger;
mod position;
mod rule;
mod simulator;
mod sizing;
mod trade;

pub use bar::*;
pub use ledger::*;
pub use position::*;
pub use rule::*;
pub use simulator::*;
pub use sizing::*;
pub use trade::*;
