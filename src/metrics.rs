//! Performance metrics of a walk-forward run.
//!
//! This module provides tools to calculate:
//! - Win rate
//! - Profit factor
//! - Max drawdown of the equity curve
//! - Deepest recovery level reached by the martingale sizing
//!
//! It needs to enable `metrics` feature to use it.

use std::fmt;

use crate::engine::TradeRecord;
use crate::walk_forward::WalkForwardReport;

/// Key performance indicators computed from a [`WalkForwardReport`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    initial_cash: f64,
    final_cash: f64,
    trades: Vec<TradeRecord>,
    equity_curve: Vec<f64>,
    calibrations: usize,
    skipped_calibrations: usize,
    unaffordable_entries: usize,
}

impl From<&WalkForwardReport> for Metrics {
    fn from(report: &WalkForwardReport) -> Self {
        Self {
            initial_cash: report.initial_cash(),
            final_cash: report.final_cash(),
            trades: report.trades().to_vec(),
            equity_curve: report.equity_curve().to_vec(),
            calibrations: report.calibrations().len(),
            skipped_calibrations: report.calibrations().iter().filter(|e| e.is_skipped()).count(),
            unaffordable_entries: report.unaffordable_entries(),
        }
    }
}

impl Metrics {
    /// Creates metrics from closed trades and an equity curve.
    pub fn new(trades: Vec<TradeRecord>, equity_curve: Vec<f64>, initial_cash: f64) -> Self {
        Self {
            initial_cash,
            final_cash: equity_curve.last().copied().unwrap_or(initial_cash),
            trades,
            equity_curve,
            calibrations: 0,
            skipped_calibrations: 0,
            unaffordable_entries: 0,
        }
    }

    /// Returns the starting capital.
    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    /// Returns the cash after the last bar.
    pub fn final_cash(&self) -> f64 {
        self.final_cash
    }

    /// Returns the realized profits and losses.
    pub fn pnl(&self) -> f64 {
        self.final_cash - self.initial_cash
    }

    /// Returns the number of closed trades.
    pub fn total_trades(&self) -> usize {
        self.trades.len()
    }

    /// Returns the number of strictly profitable trades.
    pub fn winning_trades(&self) -> usize {
        self.trades.iter().filter(|t| t.is_win()).count()
    }

    /// Returns the number of non-profitable trades.
    pub fn losing_trades(&self) -> usize {
        self.total_trades() - self.winning_trades()
    }

    /// Computes the win rate as a percentage of winning trades.
    pub fn win_rate(&self) -> f64 {
        if self.trades.is_empty() {
            return 0.0;
        }
        (self.winning_trades() as f64 / self.total_trades() as f64) * 100.0
    }

    /// Computes the profit factor: gross profits over gross losses.
    pub fn profit_factor(&self) -> f64 {
        let mut total_gains = 0.0;
        let mut total_losses = 0.0;

        for trade in &self.trades {
            if trade.pnl > 0.0 {
                total_gains += trade.pnl;
            } else {
                total_losses += trade.pnl.abs();
            }
        }

        if total_losses == 0.0 {
            return f64::INFINITY;
        }

        total_gains / total_losses
    }

    /// Computes the maximum drawdown of the equity curve as a percentage.
    pub fn max_drawdown(&self) -> f64 {
        let mut max_peak = self.initial_cash;
        let mut max_drawdown = 0.0;

        for &cash in &self.equity_curve {
            if cash > max_peak {
                max_peak = cash;
            }
            let drawdown = (max_peak - cash) / max_peak;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        max_drawdown * 100.0
    }

    /// Deepest recovery level a trade was sized at.
    pub fn max_recovery_level(&self) -> u32 {
        self.trades.iter().map(|t| t.recovery_level_at_close).max().unwrap_or(0)
    }

    /// Largest size held.
    pub fn max_size(&self) -> f64 {
        self.trades.iter().map(|t| t.size).fold(0.0, f64::max)
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Walk-Forward Metrics ===")?;
        writeln!(f, "Initial Cash: {:.2}", self.initial_cash)?;
        writeln!(f, "Final Cash: {:.2}", self.final_cash)?;
        writeln!(f, "Profit & Loss (P&L): {:.2}", self.pnl())?;
        #[allow(clippy::writeln_empty_string)]
        writeln!(f, "")?;
        writeln!(
            f,
            "Trades: {} ({} won, {} lost)",
            self.total_trades(),
            self.winning_trades(),
            self.losing_trades()
        )?;
        writeln!(f, "Win Rate: {:.2}%", self.win_rate())?;
        writeln!(f, "Profit Factor: {:.2}", self.profit_factor())?;
        writeln!(f, "Max Drawdown: {:.2}%", self.max_drawdown())?;
        writeln!(f, "Max Recovery Level: {}", self.max_recovery_level())?;
        writeln!(f, "Max Size: {:.2}", self.max_size())?;
        #[allow(clippy::writeln_empty_string)]
        writeln!(f, "")?;
        writeln!(
            f,
            "Calibrations: {} ({} skipped)",
            self.calibrations, self.skipped_calibrations
        )?;
        writeln!(f, "Unaffordable Entries: {}", self.unaffordable_entries)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::engine::{Bar, PositionSide, SimulationParams};
    use crate::walk_forward::{WalkForward, WalkForwardConfig};

    fn trade(pnl: f64, level: u32, size: f64) -> TradeRecord {
        let time: DateTime<Utc> = DateTime::default();
        TradeRecord {
            entry_time: time,
            exit_time: time,
            direction: PositionSide::Long,
            size,
            recovery_level_at_close: level,
            threshold_used: 1.0,
            entry_price: 100.0,
            exit_price: 100.0 + pnl / size,
            pnl,
            equity_after: 0.0,
        }
    }

    #[test]
    fn max_drawdown() {
        let metrics = Metrics::new(vec![], vec![10_000.0, 12_000.0, 9_000.0, 11_000.0], 10_000.0);
        // (12000 - 9000) / 12000
        assert_eq!(metrics.max_drawdown(), 25.0);
    }

    #[test]
    fn max_drawdown_flat_curve() {
        let metrics = Metrics::new(vec![], vec![], 10_000.0);
        assert_eq!(metrics.max_drawdown(), 0.0);
        assert_eq!(metrics.final_cash(), 10_000.0);
    }

    #[test]
    fn profit_factor() {
        let metrics = Metrics::new(vec![trade(20.0, 1, 2.0), trade(-10.0, 0, 1.0)], vec![], 10_000.0);
        assert_eq!(metrics.profit_factor(), 2.0);
    }

    #[test]
    fn profit_factor_no_losses() {
        let metrics = Metrics::new(vec![trade(20.0, 0, 1.0)], vec![], 10_000.0);
        assert_eq!(metrics.profit_factor(), f64::INFINITY);
    }

    #[test]
    fn breakeven_counts_as_loss() {
        let metrics = Metrics::new(vec![trade(20.0, 0, 1.0), trade(0.0, 0, 1.0)], vec![], 10_000.0);
        assert_eq!(metrics.winning_trades(), 1);
        assert_eq!(metrics.losing_trades(), 1);
        assert_eq!(metrics.win_rate(), 50.0);
    }

    #[test]
    fn win_rate_no_trades() {
        let metrics = Metrics::new(vec![], vec![], 10_000.0);
        assert_eq!(metrics.win_rate(), 0.0);
    }

    #[test]
    fn recovery_depth() {
        let trades = vec![trade(-10.0, 0, 1.0), trade(-20.0, 1, 2.0), trade(70.0, 2, 4.0)];
        let metrics = Metrics::new(trades, vec![], 10_000.0);
        assert_eq!(metrics.max_recovery_level(), 2);
        assert_eq!(metrics.max_size(), 4.0);
    }

    #[test]
    fn from_report() {
        let t0: DateTime<Utc> = DateTime::default();
        let bars = [(100.0, 1.0, 0.0), (90.0, 1.0, 0.0), (80.0, 0.0, 1.0)]
            .iter()
            .enumerate()
            .map(|(i, &(c, fast, slow))| Bar::try_from((t0 + Duration::hours(i as i64), c, fast, slow)).unwrap())
            .collect::<Arc<[Bar]>>();
        let config = WalkForwardConfig::default()
            .params(SimulationParams::default().initial_size(10.0))
            .lookback(Duration::days(1))
            .initial_threshold(5.0);
        let report = WalkForward::new(bars, config).unwrap().run().unwrap();
        let metrics = Metrics::from(&report);

        assert_eq!(metrics.total_trades(), 2);
        assert_eq!(metrics.pnl(), -300.0);
        assert_eq!(metrics.profit_factor(), 0.0);
        assert_eq!(metrics.max_recovery_level(), 1);
        assert!(metrics.to_string().contains("Trades: 2 (0 won, 2 lost)"));
    }
}
