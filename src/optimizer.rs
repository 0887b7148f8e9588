//! Threshold calibration by exhaustive grid search.
//!
//! The `Calibrator` runs one independent simulation per candidate threshold over a
//! lookback window, ranks the outcomes and selects a threshold with a median-biased rule:
//! only the upper half of the ranking (median included) is eligible, and among the best
//! outcomes of that half the widest threshold wins.
//! With the `optimizer` feature the candidates are evaluated in parallel.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{Bar, RunSummary, SimulationParams, Simulator};
use crate::errors::{Error, Result};

#[cfg(feature = "optimizer")]
use rayon::prelude::*;

/// Upper bound on the number of candidates of a [`ThresholdGrid`].
pub const MAX_GRID_POINTS: usize = 10_000;

/// Evenly spaced candidate thresholds over a closed interval.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdGrid {
    start: f64,
    end: f64,
    step: f64,
}

impl Default for ThresholdGrid {
    fn default() -> Self {
        Self {
            start: 0.1,
            end: 5.0,
            step: 0.5,
        }
    }
}

impl ThresholdGrid {
    /// Creates a grid `start, start + step, ...` up to `end` inclusive.
    pub fn new(start: f64, end: f64, step: f64) -> Result<Self> {
        let grid = Self { start, end, step };
        grid.validate()?;
        Ok(grid)
    }

    /// Checks that the grid yields between one and [`MAX_GRID_POINTS`] positive candidates.
    pub fn validate(&self) -> Result<()> {
        self.count().map(|_| ())
    }

    /// Number of candidates.
    ///
    /// ### Errors
    /// `InvalidGrid` when the bounds are not positive and finite, or the grid is too dense.
    pub fn count(&self) -> Result<usize> {
        let Self { start, end, step } = *self;
        let invalid = Error::InvalidGrid { start, end, step };
        if !(start > 0.0 && end >= start && step > 0.0 && end.is_finite() && step.is_finite()) {
            return Err(invalid);
        }
        // tolerance keeps `end` when (end - start) / step is integral up to rounding
        let intervals = ((end - start) / step + 1e-9).floor();
        if !intervals.is_finite() || intervals >= MAX_GRID_POINTS as f64 {
            return Err(invalid);
        }
        Ok(intervals as usize + 1)
    }

    /// Returns every candidate in ascending order.
    ///
    /// ### Errors
    /// Same as [`ThresholdGrid::count`].
    pub fn values(&self) -> Result<Vec<f64>> {
        let count = self.count()?;
        Ok((0..count).map(|i| self.start + self.step * i as f64).collect())
    }
}

/// Outcome of one candidate threshold.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    /// Candidate threshold.
    pub threshold: f64,
    /// Net P&L over the window, or the infeasible sentinel.
    pub net_pnl: f64,
    /// Closed trades.
    pub trades: usize,
    /// Winning closed trades.
    pub wins: usize,
    /// `false` when the pass aborted on an unaffordable entry.
    pub feasible: bool,
}

impl GridPoint {
    fn new(threshold: f64, summary: RunSummary) -> Self {
        Self {
            threshold,
            net_pnl: summary.net_pnl,
            trades: summary.trades,
            wins: summary.wins,
            feasible: summary.feasible,
        }
    }

    /// Win rate in percent, 0 without trades.
    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            return 0.0;
        }
        self.wins as f64 / self.trades as f64 * 100.0
    }
}

/// Grid outcomes ranked from worst to best.
///
/// Infeasible points rank below every feasible one, whatever their P&L.
/// Ties on P&L are ordered by threshold.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct GridReport {
    points: Vec<GridPoint>,
}

impl From<Vec<GridPoint>> for GridReport {
    fn from(mut points: Vec<GridPoint>) -> Self {
        points.sort_by(|a, b| {
            a.feasible
                .cmp(&b.feasible)
                .then(a.net_pnl.total_cmp(&b.net_pnl))
                .then(a.threshold.total_cmp(&b.threshold))
        });
        Self { points }
    }
}

impl GridReport {
    /// Returns the ranked points.
    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    /// Index of the median point: `floor(count / 2)`.
    pub fn median_index(&self) -> usize {
        self.points.len() / 2
    }

    /// Returns the median point, `None` for an empty grid.
    pub fn median(&self) -> Option<&GridPoint> {
        self.points.get(self.median_index())
    }

    /// Points from the median to the best.
    pub fn upper_half(&self) -> &[GridPoint] {
        &self.points[self.median_index()..]
    }

    /// Number of feasible points.
    pub fn feasible_count(&self) -> usize {
        self.points.iter().filter(|p| p.feasible).count()
    }

    /// Threshold chosen from the feasible points of the upper half: the best net P&L,
    /// ties going to the widest threshold.
    ///
    /// ### Errors
    /// `NoFeasibleThreshold` when no point is feasible.
    pub fn selected(&self) -> Result<f64> {
        self.upper_half()
            .iter()
            .filter(|p| p.feasible)
            .max_by(|a, b| a.net_pnl.total_cmp(&b.net_pnl).then(a.threshold.total_cmp(&b.threshold)))
            .map(|p| p.threshold)
            .ok_or(Error::NoFeasibleThreshold(self.points.len()))
    }
}

/// Grid-search calibrator for the exit threshold.
#[derive(Debug, Clone)]
pub struct Calibrator {
    params: SimulationParams,
    candidates: Vec<f64>,
}

impl Calibrator {
    /// Creates a calibrator over explicit candidates.
    ///
    /// ### Arguments
    /// * `params` - Parameters of every sub-run (fresh cash and sizing each time).
    /// * `candidates` - Positive candidate thresholds.
    pub fn new(params: SimulationParams, candidates: Vec<f64>) -> Result<Self> {
        params.validate()?;
        if let Some(&bad) = candidates.iter().find(|&&c| c <= 0.0 || !c.is_finite()) {
            return Err(Error::NegZeroThreshold(bad));
        }
        Ok(Self { params, candidates })
    }

    /// Creates a calibrator over the values of `grid`.
    pub fn with_grid(params: SimulationParams, grid: &ThresholdGrid) -> Result<Self> {
        Self::new(params, grid.values()?)
    }

    /// Returns the candidates.
    pub fn candidates(&self) -> &[f64] {
        &self.candidates
    }

    /// Runs every candidate over `bars` and ranks the outcomes.
    ///
    /// ### Errors
    /// `EmptyLookbackWindow` when `bars` is empty.
    pub fn evaluate(&self, bars: &[Bar]) -> Result<GridReport> {
        if bars.is_empty() {
            return Err(Error::EmptyLookbackWindow);
        }
        let points = self.run_candidates(bars)?;
        tracing::debug!(
            window = bars.len(),
            candidates = points.len(),
            feasible = points.iter().filter(|p| p.feasible).count(),
            "grid evaluated"
        );
        Ok(GridReport::from(points))
    }

    /// Selects a threshold from `bars`.
    ///
    /// ### Errors
    /// `EmptyLookbackWindow` or `NoFeasibleThreshold`; both are calibration input errors.
    pub fn select(&self, bars: &[Bar]) -> Result<f64> {
        self.evaluate(bars)?.selected()
    }

    fn point(simulator: &mut Simulator, bars: &[Bar], threshold: f64) -> Result<GridPoint> {
        simulator.pass(bars, threshold).map(|summary| GridPoint::new(threshold, summary))
    }

    #[cfg(feature = "optimizer")]
    fn run_candidates(&self, bars: &[Bar]) -> Result<Vec<GridPoint>> {
        let num_cpus = num_cpus::get();
        let chunk_size = self.candidates.len().div_ceil(num_cpus).max(1);

        self.candidates
            .par_chunks(chunk_size)
            .map::<_, Result<_>>(|par_candidates| {
                let mut simulator = Simulator::new(self.params)?;
                let mut local_results = Vec::with_capacity(par_candidates.len());
                for &threshold in par_candidates {
                    local_results.push(Self::point(&mut simulator, bars, threshold)?);
                }
                Ok(local_results)
            })
            .collect::<Result<Vec<_>>>()
            .map(|chunks| chunks.into_iter().flatten().collect())
    }

    #[cfg(not(feature = "optimizer"))]
    fn run_candidates(&self, bars: &[Bar]) -> Result<Vec<GridPoint>> {
        let mut simulator = Simulator::new(self.params)?;
        self.candidates
            .iter()
            .map(|&threshold| Self::point(&mut simulator, bars, threshold))
            .collect()
    }
}
