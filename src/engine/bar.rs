use chrono::{DateTime, Duration, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::PositionSide;
use crate::errors::{Error, Result};

/// One time-sampled price observation with its precomputed trend signals.
///
/// Bars are immutable once built. A series must be strictly ordered by `time`;
/// loading and validating the series is the caller's job.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    time: DateTime<Utc>,
    close: f64,
    fast: f64,
    slow: f64,
}

impl Bar {
    /// Returns the bar timestamp.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Returns the close price.
    pub fn close(&self) -> f64 {
        self.close
    }

    /// Returns the fast trend-signal value.
    pub fn fast(&self) -> f64 {
        self.fast
    }

    /// Returns the slow trend-signal value.
    pub fn slow(&self) -> f64 {
        self.slow
    }

    /// Returns the side the signals favour, or `None` when they are equal.
    pub fn signal(&self) -> Option<PositionSide> {
        if self.fast > self.slow {
            Some(PositionSide::Long)
        } else if self.fast < self.slow {
            Some(PositionSide::Short)
        } else {
            None
        }
    }

    /// Checks the close price is positive and both signals are finite.
    pub fn validate(&self) -> Result<()> {
        if self.close <= 0.0 || !self.close.is_finite() {
            return Err(Error::InvalidPrice(self.close));
        }
        if !self.fast.is_finite() {
            return Err(Error::InvalidSignal(self.fast));
        }
        if !self.slow.is_finite() {
            return Err(Error::InvalidSignal(self.slow));
        }
        Ok(())
    }
}

impl TryFrom<(DateTime<Utc>, f64, f64, f64)> for Bar {
    type Error = Error;

    fn try_from((time, close, fast, slow): (DateTime<Utc>, f64, f64, f64)) -> Result<Self> {
        BarBuilder::builder().time(time).close(close).fast(fast).slow(slow).build()
    }
}

/// Builder for [`Bar`].
#[derive(Debug, Default)]
pub struct BarBuilder {
    time: Option<DateTime<Utc>>,
    close: Option<f64>,
    fast: Option<f64>,
    slow: Option<f64>,
}

impl BarBuilder {
    /// Starts a new builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the bar timestamp.
    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Sets the close price.
    pub fn close(mut self, close: f64) -> Self {
        self.close = Some(close);
        self
    }

    /// Sets the fast trend-signal value.
    pub fn fast(mut self, fast: f64) -> Self {
        self.fast = Some(fast);
        self
    }

    /// Sets the slow trend-signal value.
    pub fn slow(mut self, slow: f64) -> Self {
        self.slow = Some(slow);
        self
    }

    /// Validates the fields and builds the bar.
    pub fn build(self) -> Result<Bar> {
        let time = self.time.ok_or(Error::MissingField("time"))?;
        let close = self.close.ok_or(Error::MissingField("close"))?;
        let fast = self.fast.ok_or(Error::MissingField("fast"))?;
        let slow = self.slow.ok_or(Error::MissingField("slow"))?;

        let bar = Bar {
            time,
            close,
            fast,
            slow,
        };
        bar.validate()?;
        Ok(bar)
    }
}

/// Checks that `bars` is strictly ordered by time.
///
/// ### Errors
/// `UnorderedBars` with the index of the first bar not later than its predecessor.
pub fn check_ordered(bars: &[Bar]) -> Result<()> {
    match bars.windows(2).position(|pair| pair[1].time <= pair[0].time) {
        Some(index) => Err(Error::UnorderedBars(index + 1)),
        None => Ok(()),
    }
}

/// Returns the bars with `now - lookback <= time < now`.
///
/// `bars` must be ordered by time. The bar stamped `now` is never included.
pub fn lookback_window(bars: &[Bar], now: DateTime<Utc>, lookback: Duration) -> &[Bar] {
    let start = now - lookback;
    let from = bars.partition_point(|b| b.time < start);
    let to = bars.partition_point(|b| b.time < now);
    &bars[from..to.max(from)]
}
