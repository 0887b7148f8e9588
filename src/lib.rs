//! # WFBT: Walk-Forward BackTest of a martingale trend strategy
//!
//! **WFBT** simulates a single-instrument trend-following strategy with martingale position sizing
//! on historical bars, and periodically re-estimates its exit threshold by grid search over a
//! trailing window of past data only.
//!
//! ## Core Components
//! | Component   | Description                                                                                     |
//! |-------------|-------------------------------------------------------------------------------------------------|
//! | **`Bar`** | Close price plus precomputed fast/slow trend signals for a single time period.               |
//! | **`Position`** | The one open position (long or short) or none.                                            |
//! | **`CashLedger`** | Tracks cash and checks that a new position is affordable.                               |
//! | **`SizingPolicy`** | Martingale sizing: multiply on loss, reset on win, capped.                            |
//! | **`Simulator`** | Per-bar state machine; also runs a fixed-threshold pass over a window.                   |
//! | **`Calibrator`** | Grid search over candidate thresholds with a median-biased selection.                   |
//! | **`WalkForward`** | The driver: recalibrates every cadence, then trades forward with the new threshold.    |
//! | **`Metrics`** | Win rate, profit factor, max drawdown and recovery depth of a run.                          |
//!
//! ## Exit rules
//! | Rule                          | Closes when                                                          |
//! |-------------------------------|----------------------------------------------------------------------|
//! | **CashThresholdMartingale**   | `abs(unrealized P&L) >= threshold × size` (default)                  |
//! | **FixedPointThreshold**       | `abs(close - entry) >= threshold`                                    |
//! | **PercentageThreshold**       | `abs(close - entry) / entry × 100 >= threshold`                      |
//!
//! ## Getting Started
//! ```rust
//! use std::sync::Arc;
//!
//! use wfbt_rs::prelude::*;
//! use chrono::{DateTime, Duration};
//!
//! let t0 = DateTime::default();
//! let bars = (0..72)
//!     .map(|i| {
//!         BarBuilder::builder()
//!             .time(t0 + Duration::hours(i))
//!             .close(100.0 + ((i * 7) % 11) as f64)
//!             .fast(if (i / 6) % 2 == 0 { 1.0 } else { 0.0 })
//!             .slow(0.5)
//!             .build()
//!     })
//!     .collect::<Result<Vec<_>>>()
//!     .unwrap();
//!
//! let config = WalkForwardConfig::default()
//!     .params(SimulationParams::default().initial_cash(10_000.0).initial_size(1.0).max_size(64.0))
//!     .lookback(Duration::hours(24))
//!     .grid(ThresholdGrid::new(1.0, 5.0, 1.0).unwrap());
//!
//! let report = WalkForward::new(Arc::from_iter(bars), config).unwrap().run().unwrap();
//! for (time, threshold) in report.threshold_history() {
//!     println!("{time}: {threshold}");
//! }
//! println!("net P&L: {:.2}", report.net_pnl());
//!
//! #[cfg(feature = "metrics")]
//! println!("{}", Metrics::from(&report));
//! ```
//!
//! ## Integrations
//! | Crate          | Purpose                                                                                     |
//! |----------------|---------------------------------------------------------------------------------------------|
//! | [`rayon`](https://crates.io/crates/rayon) | Parallel evaluation of the candidate thresholds.                                 |
//! | [`serde`](https://crates.io/crates/serde) | Load bars and configurations, serialize reports.                                 |
//! | [`tracing`](https://crates.io/crates/tracing) | Structured logs of closes, calibrations and skipped entries.                 |
//!
//! ## License
//! MIT
#![warn(missing_docs)]

/// Core simulation components: bars, position, cash ledger, sizing and the simulator.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// JSON loading helpers.
#[cfg(feature = "serde")]
pub mod utils;

/// Performance metrics: drawdown, profit factor, win rate, etc.
#[cfg(feature = "metrics")]
pub mod metrics;

/// Threshold calibration by grid search.
pub mod optimizer;

/// The walk-forward driver.
pub mod walk_forward;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::*;
    pub use crate::engine::*;
    pub use crate::errors::*;
    pub use crate::optimizer::*;
    pub use crate::walk_forward::*;

    #[cfg(feature = "metrics")]
    pub use crate::metrics::*;

    #[cfg(feature = "serde")]
    pub use crate::utils::*;
}

use std::ops::{Div, Mul, Sub};

/// Trait for performing percentage-based calculations.
pub trait PercentCalculus<Rhs = Self> {
    /// Calculates the percentage change between two values.
    ///
    /// ### Arguments
    /// * `new` - The new value to compare with.
    ///
    /// ### Returns
    /// The percentage change from the original value to the new value.
    fn change(self, new: Rhs) -> Self;
}

impl PercentCalculus for f64 {
    fn change(self, new: Self) -> Self {
        new.sub(self).div(self).mul(100.0)
    }
}
