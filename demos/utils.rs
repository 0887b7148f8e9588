use std::error::Error;

use chrono::{DateTime, Duration};
use ta::{Next, indicators::ExponentialMovingAverage};
use tracing_subscriber::EnvFilter;
use wfbt_rs::engine::{Bar, BarBuilder};

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Generates deterministic hourly bars with fast/slow EMA signals.
pub fn generate_sample_bars(max: i32, seed: i32, base_price: f64) -> Result<Vec<Bar>, Box<dyn Error>> {
    let mut fast = ExponentialMovingAverage::new(12)?;
    let mut slow = ExponentialMovingAverage::new(26)?;
    let start = DateTime::default();

    (0..=max)
        .map(|i| -> Result<Bar, Box<dyn Error>> {
            // slow drift, a daily cycle and a faster wobble
            let trend = 0.02 * i as f64;
            let cycle = 4.0 * (i as f64 * std::f64::consts::TAU / 24.0 + seed as f64).sin();
            let wobble = 1.5 * (i as f64 * 0.7 + seed as f64 * 2.0).sin();
            let close = base_price + trend + cycle + wobble;

            let bar = BarBuilder::builder()
                .time(start + Duration::hours(i as i64))
                .close(close)
                .fast(fast.next(close))
                .slow(slow.next(close))
                .build()?;
            Ok(bar)
        })
        .collect()
}

pub fn example_bars() -> Result<Vec<Bar>, Box<dyn Error>> {
    // three months of hourly bars
    generate_sample_bars(24 * 90, 42, 100.0)
}
