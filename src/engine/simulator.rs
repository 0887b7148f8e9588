#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::*;
use crate::errors::Result;

/// Net P&L returned by [`Simulator::run`] when an entry could not be afforded.
///
/// It flags an infeasible parameter set and must never be averaged with real outcomes.
pub const INFEASIBLE_PNL: f64 = f64::MIN;

/// Parameters shared by every simulation pass.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    /// Starting capital.
    pub initial_cash: f64,
    /// Size of the first trade and of every trade after a win.
    pub initial_size: f64,
    /// Size growth factor after a losing close.
    pub multiplier: f64,
    /// Cap on the size.
    pub max_size: f64,
    /// Fraction of cash a single position may use, in `(0, 1]`.
    pub max_capital_usage: f64,
    /// When to close an open position.
    pub exit_rule: ExitRule,
    /// How to pick the entry side while recovering.
    pub recovery_entry: RecoveryEntry,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            initial_cash: 100_000.0,
            initial_size: 100.0,
            multiplier: 2.0,
            max_size: 6_400.0,
            max_capital_usage: 1.0,
            exit_rule: ExitRule::default(),
            recovery_entry: RecoveryEntry::default(),
        }
    }
}

impl SimulationParams {
    /// Sets the starting capital.
    pub fn initial_cash(mut self, cash: f64) -> Self {
        self.initial_cash = cash;
        self
    }

    /// Sets the initial size.
    pub fn initial_size(mut self, size: f64) -> Self {
        self.initial_size = size;
        self
    }

    /// Sets the loss multiplier.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the size cap.
    pub fn max_size(mut self, size: f64) -> Self {
        self.max_size = size;
        self
    }

    /// Sets the capital usage ratio.
    pub fn max_capital_usage(mut self, usage: f64) -> Self {
        self.max_capital_usage = usage;
        self
    }

    /// Sets the exit rule.
    pub fn exit_rule(mut self, rule: ExitRule) -> Self {
        self.exit_rule = rule;
        self
    }

    /// Sets the recovery entry mode.
    pub fn recovery_entry(mut self, entry: RecoveryEntry) -> Self {
        self.recovery_entry = entry;
        self
    }

    /// Checks every field.
    pub fn validate(&self) -> Result<()> {
        self.ledger()?;
        self.policy()?;
        Ok(())
    }

    fn ledger(&self) -> Result<CashLedger> {
        CashLedger::new(self.initial_cash)?.with_max_usage(self.max_capital_usage)
    }

    fn policy(&self) -> Result<SizingPolicy> {
        SizingPolicy::new(self.initial_size, self.multiplier, self.max_size)
    }
}

/// What happened during one [`Simulator::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Step {
    /// Trade closed on this bar.
    pub closed: Option<TradeRecord>,
    /// Side opened on this bar.
    pub opened: Option<PositionSide>,
    /// The simulator was flat and could not afford the next size.
    pub unaffordable: bool,
}

/// Outcome of a complete single-threshold pass.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// `final cash - initial cash`, or [`INFEASIBLE_PNL`].
    pub net_pnl: f64,
    /// Closed trades before the end (or the abort).
    pub trades: usize,
    /// Strictly profitable closed trades.
    pub wins: usize,
    /// `false` when the run aborted on an unaffordable entry.
    pub feasible: bool,
}

/// Per-bar position state machine: one position, one cash ledger, one sizing state.
///
/// [`Simulator::run`] drives a private instance over a window with a fixed threshold;
/// the walk-forward driver owns a persistent one and changes the threshold over time.
#[derive(Debug, Clone)]
pub struct Simulator {
    params: SimulationParams,
    policy: SizingPolicy,
    position: Position,
    sizing: SizingState,
    ledger: CashLedger,
    last_side: Option<PositionSide>,
}

impl Simulator {
    /// Creates a flat simulator holding the starting capital.
    pub fn new(params: SimulationParams) -> Result<Self> {
        let policy = params.policy()?;
        Ok(Self {
            params,
            policy,
            position: Position::flat(),
            sizing: policy.initial_state(),
            ledger: params.ledger()?,
            last_side: None,
        })
    }

    /// Returns the parameters.
    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Returns the current position.
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Returns the current sizing state.
    pub fn sizing(&self) -> SizingState {
        self.sizing
    }

    /// Returns the cash ledger.
    pub fn ledger(&self) -> &CashLedger {
        &self.ledger
    }

    /// Processes one bar.
    ///
    /// 1. If a position is open and the exit rule fires at the close price, the position is
    ///    closed, its P&L booked and the sizing state updated.
    /// 2. If flat, the next size must be affordable at the close price; when it is, the
    ///    entry side (if any) is opened.
    ///
    /// ### Errors
    /// `InvalidState` if the position tracker is driven out of phase.
    pub fn step(&mut self, bar: &Bar, threshold: f64) -> Result<Step> {
        let price = bar.close();
        let mut step = Step::default();

        if self.params.exit_rule.should_close(&self.position, price, threshold) {
            let recovery_level = self.sizing.recovery_level;
            let closed = self.position.close(price)?;
            self.ledger.apply_realized_pnl(closed.pnl);
            self.sizing = self.policy.on_trade_closed(closed.pnl, self.sizing);
            self.last_side = Some(closed.side);

            let trade = TradeRecord::new(closed, bar.time(), recovery_level, threshold, self.ledger.cash());
            tracing::debug!(
                time = %bar.time(),
                pnl = trade.pnl,
                cash = trade.equity_after,
                next_size = self.sizing.current_size,
                recovery_level = self.sizing.recovery_level,
                "position closed"
            );
            step.closed = Some(trade);
        }

        if self.position.is_flat() {
            let size = self.sizing.current_size;
            if !self.ledger.can_afford(price, size) {
                step.unaffordable = true;
                return Ok(step);
            }
            let side = self
                .params
                .recovery_entry
                .entry_side(bar, self.sizing.recovery_level, self.last_side);
            if let Some(side) = side {
                self.position.open(side, price, bar.time(), size)?;
                step.opened = Some(side);
            }
        }

        Ok(step)
    }

    /// Resets the simulator, then runs it over `bars` with a fixed `threshold` and summarizes it.
    ///
    /// The pass stops at the first unaffordable entry and reports itself infeasible.
    /// A position still open at the end is ignored: only realized P&L counts.
    pub fn pass(&mut self, bars: &[Bar], threshold: f64) -> Result<RunSummary> {
        self.reset();
        let mut trades = 0;
        let mut wins = 0;

        for bar in bars {
            let step = self.step(bar, threshold)?;
            if let Some(trade) = step.closed {
                trades += 1;
                if trade.is_win() {
                    wins += 1;
                }
            }
            if step.unaffordable {
                return Ok(RunSummary {
                    net_pnl: INFEASIBLE_PNL,
                    trades,
                    wins,
                    feasible: false,
                });
            }
        }

        Ok(RunSummary {
            net_pnl: self.ledger.net_pnl(),
            trades,
            wins,
            feasible: true,
        })
    }

    /// Summary of a fresh pass over `bars` with a fixed `threshold`. See [`Simulator::pass`].
    pub fn evaluate(bars: &[Bar], threshold: f64, params: &SimulationParams) -> Result<RunSummary> {
        Self::new(*params)?.pass(bars, threshold)
    }

    /// Net P&L of a fresh pass over `bars` with a fixed `threshold`, or [`INFEASIBLE_PNL`].
    ///
    /// ### Example
    /// ```rust
    /// use wfbt_rs::prelude::*;
    /// use chrono::{DateTime, Duration};
    ///
    /// let t0 = DateTime::default();
    /// let bars = vec![
    ///     Bar::try_from((t0, 100.0, 1.0, 0.0)).unwrap(),
    ///     Bar::try_from((t0 + Duration::hours(1), 110.0, 1.0, 0.0)).unwrap(),
    /// ];
    /// let params = SimulationParams::default().initial_cash(10_000.0).initial_size(10.0);
    /// let pnl = Simulator::run(&bars, 5.0, &params).unwrap();
    /// assert_eq!(pnl, 100.0);
    /// ```
    pub fn run(bars: &[Bar], threshold: f64, params: &SimulationParams) -> Result<f64> {
        Self::evaluate(bars, threshold, params).map(|summary| summary.net_pnl)
    }

    /// Resets the simulator to flat with the starting capital.
    pub fn reset(&mut self) {
        self.position = Position::flat();
        self.sizing = self.policy.initial_state();
        self.ledger.reset();
        self.last_side = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::errors::Error;

    fn t(i: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_secs(1515151515).unwrap() + Duration::minutes(30 * i)
    }

    fn bars(rows: &[(f64, f64, f64)]) -> Vec<Bar> {
        rows.iter()
            .enumerate()
            .map(|(i, &(close, fast, slow))| Bar::try_from((t(i as i64), close, fast, slow)).unwrap())
            .collect()
    }

    fn params() -> SimulationParams {
        SimulationParams::default()
            .initial_cash(100_000.0)
            .initial_size(10.0)
            .multiplier(2.0)
            .max_size(1_000.0)
    }

    #[test]
    fn scenario_loss_then_recovery_trace() {
        let data = bars(&[(100.0, 1.0, 0.0), (90.0, 1.0, 0.0), (80.0, 0.0, 1.0)]);
        let mut sim = Simulator::new(params()).unwrap();

        // t0: flat, long signal, 100 × 10 affordable
        let step = sim.step(&data[0], 5.0).unwrap();
        assert_eq!(step.opened, Some(PositionSide::Long));
        assert!(step.closed.is_none());
        assert_eq!(sim.position().entry_price(), 100.0);
        assert_eq!(sim.ledger().cash(), 100_000.0);

        // t1: (90 - 100) × 10 = -100, |-100| >= 5 × 10
        let step = sim.step(&data[1], 5.0).unwrap();
        let trade = step.closed.unwrap();
        assert_eq!(trade.pnl, -100.0);
        assert_eq!(trade.equity_after, 99_900.0);
        assert_eq!(trade.recovery_level_at_close, 0);
        assert_eq!(trade.size, 10.0);
        assert_eq!(sim.sizing().current_size, 20.0);
        assert_eq!(sim.sizing().recovery_level, 1);
        // flat again on the same bar, signal still long: reopen at 90 with size 20
        assert_eq!(step.opened, Some(PositionSide::Long));
        assert_eq!(sim.position().size(), 20.0);

        // t2: (80 - 90) × 20 = -200, |-200| >= 5 × 20
        let step = sim.step(&data[2], 5.0).unwrap();
        let trade = step.closed.unwrap();
        assert_eq!(trade.pnl, -200.0);
        assert_eq!(trade.equity_after, 99_700.0);
        assert_eq!(trade.recovery_level_at_close, 1);
        assert_eq!(sim.sizing().current_size, 40.0);
        assert_eq!(sim.sizing().recovery_level, 2);
        // fast 0 < slow 1: short
        assert_eq!(step.opened, Some(PositionSide::Short));
        assert_eq!(sim.position().entry_price(), 80.0);
        assert_eq!(sim.position().size(), 40.0);

        // the open short is not reflected in cash
        assert_eq!(sim.ledger().cash(), 99_700.0);
    }

    #[test]
    fn scenario_run_net_pnl() {
        let data = bars(&[(100.0, 1.0, 0.0), (90.0, 1.0, 0.0), (80.0, 0.0, 1.0)]);
        let summary = Simulator::evaluate(&data, 5.0, &params()).unwrap();
        assert!(summary.feasible);
        assert_eq!(summary.net_pnl, -300.0);
        assert_eq!(summary.trades, 2);
        assert_eq!(summary.wins, 0);
    }

    #[test]
    fn scenario_win_resets_size() {
        let data = bars(&[(100.0, 1.0, 0.0), (90.0, 1.0, 0.0), (100.0, 1.0, 0.0)]);
        let mut sim = Simulator::new(params()).unwrap();
        for bar in &data {
            sim.step(bar, 5.0).unwrap();
        }
        // loss of 100 on size 10, then long 20 @ 90 closed at 100 for +200
        assert_eq!(sim.ledger().cash(), 100_100.0);
        assert_eq!(sim.sizing(), SizingState {
            current_size: 10.0,
            recovery_level: 0
        });
    }

    #[test]
    fn scenario_no_signal_opens_nothing() {
        let data = bars(&[(100.0, 1.0, 1.0), (101.0, 2.0, 2.0)]);
        let mut sim = Simulator::new(params()).unwrap();
        for bar in &data {
            let step = sim.step(bar, 5.0).unwrap();
            assert!(step.opened.is_none());
            assert!(!step.unaffordable);
        }
        assert!(sim.position().is_flat());
    }

    #[test]
    fn scenario_infeasible_on_first_bar() {
        let data = bars(&[(100.0, 1.0, 0.0), (100.0, 1.0, 0.0)]);
        let params = params().initial_cash(500.0);
        let summary = Simulator::evaluate(&data, 5.0, &params).unwrap();
        assert!(!summary.feasible);
        assert_eq!(summary.net_pnl, INFEASIBLE_PNL);
        assert_eq!(Simulator::run(&data, 5.0, &params).unwrap(), INFEASIBLE_PNL);
    }

    #[test]
    fn scenario_infeasible_after_losses() {
        // 1_500 cash: 100 × 10 affordable, then 90 × 20 = 1_800 is not
        let data = bars(&[(100.0, 1.0, 0.0), (90.0, 1.0, 0.0), (95.0, 1.0, 0.0)]);
        let params = params().initial_cash(1_500.0);
        let summary = Simulator::evaluate(&data, 5.0, &params).unwrap();
        assert!(!summary.feasible);
        assert_eq!(summary.trades, 1);
    }

    #[test]
    fn scenario_affordability_checked_without_signal() {
        let data = bars(&[(100.0, 1.0, 1.0)]);
        let params = params().initial_cash(500.0);
        assert_eq!(Simulator::run(&data, 5.0, &params).unwrap(), INFEASIBLE_PNL);
    }

    #[test]
    fn scenario_open_position_is_not_counted() {
        let data = bars(&[(100.0, 1.0, 0.0), (102.0, 1.0, 0.0)]);
        assert_eq!(Simulator::run(&data, 5.0, &params()).unwrap(), 0.0);
    }

    #[test]
    fn scenario_reverse_last_recovery() {
        let data = bars(&[(100.0, 1.0, 0.0), (90.0, 1.0, 0.0), (80.0, 1.0, 0.0)]);
        let params = params().recovery_entry(RecoveryEntry::ReverseLast);
        let mut sim = Simulator::new(params).unwrap();
        sim.step(&data[0], 5.0).unwrap();
        let step = sim.step(&data[1], 5.0).unwrap();
        // long lost: enter short with size 20 despite the long signal
        assert_eq!(step.opened, Some(PositionSide::Short));
        let step = sim.step(&data[2], 5.0).unwrap();
        // (90 - 80) × 20 = +200
        assert_eq!(step.closed.unwrap().pnl, 200.0);
        assert_eq!(sim.ledger().cash(), 100_100.0);
    }

    #[test]
    fn scenario_runs_are_independent() {
        let data = bars(&[(100.0, 1.0, 0.0), (90.0, 1.0, 0.0), (80.0, 0.0, 1.0)]);
        let first = Simulator::run(&data, 5.0, &params()).unwrap();
        let second = Simulator::run(&data, 5.0, &params()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reused_simulator_matches_fresh_runs() {
        let data = bars(&[(100.0, 1.0, 0.0), (90.0, 1.0, 0.0), (80.0, 0.0, 1.0), (95.0, 0.0, 1.0)]);
        let mut sim = Simulator::new(params()).unwrap();
        for threshold in [5.0, 1.0, 20.0, 5.0] {
            let reused = sim.pass(&data, threshold).unwrap();
            let fresh = Simulator::evaluate(&data, threshold, &params()).unwrap();
            assert_eq!(reused, fresh);
        }
    }

    #[test]
    fn reset_simulator() {
        let data = bars(&[(100.0, 1.0, 0.0), (90.0, 1.0, 0.0)]);
        let mut sim = Simulator::new(params()).unwrap();
        for bar in &data {
            sim.step(bar, 5.0).unwrap();
        }
        sim.reset();
        assert!(sim.position().is_flat());
        assert_eq!(sim.ledger().cash(), 100_000.0);
        assert_eq!(sim.sizing().recovery_level, 0);
    }

    #[test]
    fn invalid_params() {
        assert!(matches!(
            Simulator::new(params().initial_cash(0.0)),
            Err(Error::NegZeroBalance(_))
        ));
        assert!(matches!(
            Simulator::new(params().multiplier(0.5)),
            Err(Error::InvalidMultiplier(_))
        ));
        assert!(params().max_capital_usage(0.0).validate().is_err());
    }
}
