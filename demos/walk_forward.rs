//! # Walk-forward martingale backtest
//!
//! Recalibrates the exit threshold every week over the previous two weeks of bars,
//! then trades forward with it. Run with `RUST_LOG=debug` to see every close.
mod utils;

use std::sync::Arc;

use chrono::Duration;
use wfbt_rs::prelude::*;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    utils::init_tracing();

    let bars = Arc::from_iter(utils::example_bars()?);
    let params = SimulationParams::default()
        .initial_cash(10_000.0)
        .initial_size(1.0)
        .multiplier(2.0)
        .max_size(64.0);
    let config = WalkForwardConfig::default()
        .params(params)
        .lookback(Duration::weeks(2))
        .cadence(Duration::weeks(1))
        .grid(ThresholdGrid::new(0.1, 5.0, 0.5)?)
        .initial_threshold(2.0);

    let report = WalkForward::new(bars, config)?.run()?;

    println!("\nCALIBRATIONS");
    for event in report.calibrations() {
        match &event.outcome {
            CalibrationOutcome::Calibrated { threshold } => {
                println!("{} | {:>4} bars | threshold {threshold:.2}", event.time, event.window_bars)
            }
            CalibrationOutcome::Skipped { reason, kept_threshold } => {
                println!("{} | skipped ({reason}), keeping {kept_threshold:.2}", event.time)
            }
        }
    }

    println!("\nLAST TRADES");
    for trade in report.trades().iter().rev().take(5) {
        println!(
            "{} {:?} size {:.0} level {} | {:.2} -> {:.2} | pnl {:.2} | cash {:.2}",
            trade.exit_time,
            trade.direction,
            trade.size,
            trade.recovery_level_at_close,
            trade.entry_price,
            trade.exit_price,
            trade.pnl,
            trade.equity_after
        );
    }

    println!("\n{}", Metrics::from(&report));
    Ok(())
}
