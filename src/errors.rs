pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The bar data provided is empty. Simulation requires at least one bar.
    #[error("Bar data is empty: simulation requires at least one bar")]
    BarDataEmpty,

    /// Bar times are not strictly increasing (duplicate or out-of-order timestamp at this index).
    #[error("Bars must be strictly ordered by time (violated at index {0})")]
    UnorderedBars(usize),

    /// A required field was not set on a builder.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A price is not positive or not finite.
    #[error("Price must be positive and finite (got: {0})")]
    InvalidPrice(f64),

    /// A trend-signal value is not finite.
    #[error("Signal must be finite (got: {0})")]
    InvalidSignal(f64),

    /// The initial or current balance is not positive. Trading requires a positive balance.
    #[error("Balance must be positive (got: {0})")]
    NegZeroBalance(f64),

    /// The position size is not positive.
    #[error("Size must be positive (got: {0})")]
    NegZeroSize(f64),

    /// The recovery multiplier must be at least 1.
    #[error("Multiplier must be >= 1 (got: {0})")]
    InvalidMultiplier(f64),

    /// The maximum size is lower than the initial size.
    #[error("Maximum size ({1}) is lower than the initial size ({0})")]
    MaxSizeBelowInitial(f64, f64),

    /// The threshold is not positive.
    #[error("Threshold must be positive (got: {0})")]
    NegZeroThreshold(f64),

    /// The capital usage ratio is outside `(0, 1]`.
    #[error("Capital usage must be in (0, 1] (got: {0})")]
    InvalidCapitalUsage(f64),

    /// The candidate threshold grid is malformed.
    #[error("Invalid threshold grid: start {start}, end {end}, step {step}")]
    InvalidGrid {
        /// First candidate.
        start: f64,
        /// Last candidate (inclusive).
        end: f64,
        /// Spacing between candidates.
        step: f64,
    },

    /// A lookback or cadence duration is not positive.
    #[error("Duration must be positive")]
    NegZeroDuration,

    /// An operation was invoked against a position in the wrong phase.
    /// This is a driver bug and aborts the run.
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    /// The lookback window handed to the calibrator holds no bars.
    #[error("Calibration input error: lookback window is empty")]
    EmptyLookbackWindow,

    /// Every candidate threshold was infeasible over the lookback window.
    #[error("Calibration input error: none of the {0} candidate thresholds is feasible")]
    NoFeasibleThreshold(usize),

    /// I/O error occurred.
    // utils.rs
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error occurred.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` when the calibrator could not produce a threshold from its input.
    ///
    /// The walk-forward driver records these as skipped calibrations instead of aborting.
    pub fn is_calibration_input(&self) -> bool {
        matches!(self, Self::EmptyLookbackWindow | Self::NoFeasibleThreshold(_))
    }
}

#[cfg(test)]
#[test]
fn calibration_input_kinds() {
    assert!(Error::EmptyLookbackWindow.is_calibration_input());
    assert!(Error::NoFeasibleThreshold(3).is_calibration_input());
    assert!(!Error::InvalidState("flat").is_calibration_input());
    assert!(!Error::BarDataEmpty.is_calibration_input());
}
