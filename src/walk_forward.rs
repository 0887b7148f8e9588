//! Walk-forward driver.
//!
//! Advances bar by bar over the whole series with one persistent [`Simulator`].
//! Every `cadence` of bar time it re-estimates the exit threshold with the
//! [`Calibrator`] over the trailing `lookback` window, using only bars strictly
//! before the current one, then applies the threshold going forward.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{Bar, SimulationParams, Simulator, TradeRecord, check_ordered, lookback_window};
use crate::errors::{Error, Result};
use crate::optimizer::{Calibrator, ThresholdGrid};

/// Configuration of a walk-forward run.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkForwardConfig {
    /// Parameters of the live simulation and of every calibration sub-run.
    pub params: SimulationParams,
    /// Length of the trailing calibration window.
    #[cfg_attr(feature = "serde", serde(with = "crate::utils::duration_secs"))]
    pub lookback: Duration,
    /// Time between calibrations, the lookback when unset.
    #[cfg_attr(feature = "serde", serde(with = "crate::utils::opt_duration_secs"))]
    pub cadence: Option<Duration>,
    /// Candidate thresholds.
    pub grid: ThresholdGrid,
    /// Threshold in force until the first successful calibration.
    pub initial_threshold: f64,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            params: SimulationParams::default(),
            lookback: Duration::days(30),
            cadence: None,
            grid: ThresholdGrid::default(),
            initial_threshold: 2.0,
        }
    }
}

impl WalkForwardConfig {
    /// Sets the simulation parameters.
    pub fn params(mut self, params: SimulationParams) -> Self {
        self.params = params;
        self
    }

    /// Sets the lookback window length.
    pub fn lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    /// Sets the calibration cadence.
    pub fn cadence(mut self, cadence: Duration) -> Self {
        self.cadence = Some(cadence);
        self
    }

    /// Sets the candidate grid.
    pub fn grid(mut self, grid: ThresholdGrid) -> Self {
        self.grid = grid;
        self
    }

    /// Sets the threshold used before the first calibration.
    pub fn initial_threshold(mut self, threshold: f64) -> Self {
        self.initial_threshold = threshold;
        self
    }

    /// Time between calibrations: the cadence if set, the lookback otherwise.
    pub fn cadence_period(&self) -> Duration {
        self.cadence.unwrap_or(self.lookback)
    }

    /// Checks every field.
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        self.grid.validate()?;
        if self.lookback <= Duration::zero() || self.cadence_period() <= Duration::zero() {
            return Err(Error::NegZeroDuration);
        }
        if self.initial_threshold <= 0.0 || !self.initial_threshold.is_finite() {
            return Err(Error::NegZeroThreshold(self.initial_threshold));
        }
        Ok(())
    }

    /// Reads a configuration from a JSON file. Missing fields take their default.
    #[cfg(feature = "serde")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let config: Self = crate::utils::read_json(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Threshold currently applied by the driver and when it was last re-estimated.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationState {
    /// Threshold applied to exits.
    pub current_threshold: f64,
    /// Time of the last calibration attempt (the first bar before any).
    pub last_calibration_time: DateTime<Utc>,
}

/// Result of one calibration trigger.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationOutcome {
    /// A new threshold was selected.
    Calibrated {
        /// Selected threshold.
        threshold: f64,
    },
    /// No threshold could be selected; the previous one stays in force.
    Skipped {
        /// Why the calibrator failed.
        reason: String,
        /// Threshold kept.
        kept_threshold: f64,
    },
}

/// One calibration trigger.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationEvent {
    /// Bar time that triggered the calibration.
    pub time: DateTime<Utc>,
    /// Number of bars in the lookback window.
    pub window_bars: usize,
    /// What happened.
    pub outcome: CalibrationOutcome,
}

impl CalibrationEvent {
    /// Threshold in force after this event.
    pub fn threshold(&self) -> f64 {
        match self.outcome {
            CalibrationOutcome::Calibrated { threshold } => threshold,
            CalibrationOutcome::Skipped { kept_threshold, .. } => kept_threshold,
        }
    }

    /// Returns `true` when the calibration was skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, CalibrationOutcome::Skipped { .. })
    }
}

/// Output of a walk-forward run.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardReport {
    initial_cash: f64,
    trades: Vec<TradeRecord>,
    equity_curve: Vec<f64>,
    calibrations: Vec<CalibrationEvent>,
    unaffordable_entries: usize,
    final_state: CalibrationState,
}

impl WalkForwardReport {
    /// Returns the starting capital.
    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    /// Completed round trips in close order.
    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    /// Cash after each bar, same length and order as the bars.
    pub fn equity_curve(&self) -> &[f64] {
        &self.equity_curve
    }

    /// Every calibration trigger, including skipped ones.
    pub fn calibrations(&self) -> &[CalibrationEvent] {
        &self.calibrations
    }

    /// `(time, threshold)` for every successful calibration.
    pub fn threshold_history(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.calibrations.iter().filter_map(|event| match event.outcome {
            CalibrationOutcome::Calibrated { threshold } => Some((event.time, threshold)),
            CalibrationOutcome::Skipped { .. } => None,
        })
    }

    /// Bars on which the simulator was flat but could not afford the next size.
    pub fn unaffordable_entries(&self) -> usize {
        self.unaffordable_entries
    }

    /// Calibration state after the last bar.
    pub fn final_state(&self) -> CalibrationState {
        self.final_state
    }

    /// Cash after the last bar.
    pub fn final_cash(&self) -> f64 {
        self.equity_curve.last().copied().unwrap_or(self.initial_cash)
    }

    /// Realized P&L over the run.
    pub fn net_pnl(&self) -> f64 {
        self.final_cash() - self.initial_cash
    }
}

/// Walk-forward simulation with periodic threshold recalibration.
#[derive(Debug, Clone)]
pub struct WalkForward {
    data: Arc<[Bar]>,
    config: WalkForwardConfig,
    calibrator: Calibrator,
}

impl WalkForward {
    /// Creates a walk-forward run over `data`, which must be strictly ordered by time.
    ///
    /// ### Example
    /// ```rust
    /// use std::sync::Arc;
    ///
    /// use wfbt_rs::prelude::*;
    /// use chrono::{DateTime, Duration};
    ///
    /// let t0 = DateTime::default();
    /// let bars = (0..48)
    ///     .map(|i| Bar::try_from((t0 + Duration::hours(i), 100.0 + (i % 5) as f64, 1.0, 0.0)).unwrap())
    ///     .collect::<Vec<_>>();
    /// let config = WalkForwardConfig::default()
    ///     .params(SimulationParams::default().initial_size(10.0))
    ///     .lookback(Duration::hours(12));
    ///
    /// let report = WalkForward::new(Arc::from_iter(bars), config).unwrap().run().unwrap();
    /// assert_eq!(report.equity_curve().len(), 48);
    /// ```
    pub fn new(data: Arc<[Bar]>, config: WalkForwardConfig) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::BarDataEmpty);
        }
        check_ordered(&data)?;
        config.validate()?;
        let calibrator = Calibrator::with_grid(config.params, &config.grid)?;
        Ok(Self {
            data,
            config,
            calibrator,
        })
    }

    /// Returns an iterator over the bars.
    pub fn bars(&self) -> std::slice::Iter<'_, Bar> {
        self.data.iter()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &WalkForwardConfig {
        &self.config
    }

    /// Runs the whole series.
    ///
    /// ### Errors
    /// Structural errors (`InvalidState`) abort the run. Calibration input errors do not:
    /// they are recorded as skipped calibrations and the previous threshold is kept.
    pub fn run(&self) -> Result<WalkForwardReport> {
        let bars = &self.data[..];
        let lookback = self.config.lookback;
        let cadence = self.config.cadence_period();

        let mut simulator = Simulator::new(self.config.params)?;
        let mut state = CalibrationState {
            current_threshold: self.config.initial_threshold,
            last_calibration_time: bars[0].time(),
        };
        let mut trades = Vec::new();
        let mut calibrations = Vec::new();
        let mut equity_curve = Vec::with_capacity(bars.len());
        let mut unaffordable_entries = 0;

        for (index, bar) in bars.iter().enumerate() {
            let now = bar.time();

            if now >= state.last_calibration_time + cadence {
                let window = lookback_window(&bars[..index], now, lookback);
                let outcome = match self.calibrator.select(window) {
                    Ok(threshold) => {
                        tracing::info!(time = %now, window = window.len(), threshold, "threshold calibrated");
                        state.current_threshold = threshold;
                        CalibrationOutcome::Calibrated { threshold }
                    }
                    Err(err) if err.is_calibration_input() => {
                        tracing::warn!(
                            time = %now,
                            window = window.len(),
                            kept = state.current_threshold,
                            "calibration skipped: {err}"
                        );
                        CalibrationOutcome::Skipped {
                            reason: err.to_string(),
                            kept_threshold: state.current_threshold,
                        }
                    }
                    Err(err) => return Err(err),
                };
                state.last_calibration_time = now;
                calibrations.push(CalibrationEvent {
                    time: now,
                    window_bars: window.len(),
                    outcome,
                });
            }

            let step = simulator.step(bar, state.current_threshold)?;
            if let Some(trade) = step.closed {
                trades.push(trade);
            }
            if step.unaffordable {
                unaffordable_entries += 1;
                tracing::warn!(
                    time = %now,
                    price = bar.close(),
                    size = simulator.sizing().current_size,
                    cash = simulator.ledger().cash(),
                    "entry skipped: insufficient cash"
                );
            }
            equity_curve.push(simulator.ledger().cash());
        }

        Ok(WalkForwardReport {
            initial_cash: self.config.params.initial_cash,
            trades,
            equity_curve,
            calibrations,
            unaffordable_entries,
            final_state: state,
        })
    }
}
