//! # Threshold grid search
//!
//! Evaluates every candidate threshold over the last two weeks of bars and prints the ranking,
//! marking the median row and the selected threshold.
mod utils;

use chrono::Duration;
use wfbt_rs::prelude::*;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    utils::init_tracing();

    let bars = utils::example_bars()?;
    let now = bars.last().map(|b| b.time()).ok_or(Error::BarDataEmpty)?;
    let window = lookback_window(&bars, now, Duration::weeks(2));

    let params = SimulationParams::default()
        .initial_cash(10_000.0)
        .initial_size(1.0)
        .max_size(64.0);
    let calibrator = Calibrator::with_grid(params, &ThresholdGrid::new(0.1, 5.0, 0.25)?)?;
    let report = calibrator.evaluate(window)?;

    println!("\nGRID OVER {} BARS (worst to best)", window.len());
    for (i, point) in report.points().iter().enumerate() {
        let pnl = if point.feasible {
            format!("{:>10.2}", point.net_pnl)
        } else {
            format!("{:>10}", "infeasible")
        };
        let marker = if i == report.median_index() { "<- median" } else { "" };
        println!(
            "{:>5.2} | {pnl} | {:>3} trades | {:>6.2}% won {marker}",
            point.threshold,
            point.trades,
            point.win_rate()
        );
    }

    println!("\nSELECTED THRESHOLD: {:.2}", report.selected()?);
    Ok(())
}
