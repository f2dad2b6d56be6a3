//! Bankroll simulator.
//!
//! Replays a user's settled bets in date order under a fractional-Kelly
//! policy and produces a day-indexed bankroll curve. The stored Kelly value
//! is always full Kelly; the policy scale is applied here at replay time.
//!
//! Bets on the same date compound sequentially on the running bankroll.
//! Pending bets contribute nothing until they are settled.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::backtesting::results::{win_rate_pct, BankrollTracker, SimulationSummary};
use crate::db::ledger::{BetRecord, BettingLedger, LedgerQuery, Outcome};
use crate::error::{BettingError, Result};
use crate::risk::kelly::{validate_scale, FULL_KELLY, HALF_KELLY};
use crate::risk::odds::AmericanOdds;

/// One settled bet applied to the bankroll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankrollStep {
    pub date: NaiveDate,
    pub team: String,
    pub odds: AmericanOdds,
    pub outcome: Outcome,
    /// `kelly / 100 * scale`.
    pub stake_fraction: Decimal,
    pub stake: Decimal,
    pub pnl: Decimal,
    pub bankroll: Decimal,
    pub profit_rate: Decimal,
}

/// End-of-day bankroll after every settled bet on that date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyBankroll {
    pub bankroll: Decimal,
    /// Cumulative, relative to the initial bankroll.
    pub profit_rate: Decimal,
    /// That day's settled bets only.
    pub win_rate: Decimal,
    pub wins: u32,
    pub losses: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankrollState {
    pub initial_bankroll: Decimal,
    pub current_bankroll: Decimal,
    pub kelly_scale: f64,
    pub daily: BTreeMap<NaiveDate, DailyBankroll>,
    pub steps: Vec<BankrollStep>,
    pub summary: SimulationSummary,
}

impl BankrollState {
    pub fn profit_rate(&self) -> Decimal {
        self.summary.roi_pct
    }

    /// Bankroll for every calendar day in `[from, to]`.
    ///
    /// Days without settlements carry the previous bankroll forward; days
    /// before the first settlement report the initial bankroll.
    pub fn curve(&self, from: NaiveDate, to: NaiveDate) -> Vec<(NaiveDate, Decimal)> {
        let mut carried = self
            .daily
            .range(..from)
            .next_back()
            .map(|(_, day)| day.bankroll)
            .unwrap_or(self.initial_bankroll);

        from.iter_days()
            .take_while(|day| *day <= to)
            .map(|day| {
                if let Some(entry) = self.daily.get(&day) {
                    carried = entry.bankroll;
                }
                (day, carried)
            })
            .collect()
    }
}

/// A bankroll policy: starting amount and fractional-Kelly scale.
#[derive(Debug, Clone)]
pub struct BankrollSimulator {
    initial_bankroll: Decimal,
    kelly_scale: f64,
}

impl BankrollSimulator {
    pub fn new(initial_bankroll: Decimal, kelly_scale: f64) -> Result<Self> {
        if initial_bankroll <= Decimal::ZERO {
            return Err(BettingError::InvalidBankroll(initial_bankroll));
        }
        Ok(Self {
            initial_bankroll,
            kelly_scale: validate_scale(kelly_scale)?,
        })
    }

    pub fn full_kelly(initial_bankroll: Decimal) -> Result<Self> {
        Self::new(initial_bankroll, FULL_KELLY)
    }

    pub fn half_kelly(initial_bankroll: Decimal) -> Result<Self> {
        Self::new(initial_bankroll, HALF_KELLY)
    }

    pub fn initial_bankroll(&self) -> Decimal {
        self.initial_bankroll
    }

    pub fn kelly_scale(&self) -> f64 {
        self.kelly_scale
    }

    pub fn simulate(&self, ledger: &BettingLedger, user: &str) -> Result<BankrollState> {
        let records = ledger.query(&LedgerQuery::for_user(user));
        let state = self.replay(&records)?;

        info!(
            user,
            scale = self.kelly_scale,
            settled = state.steps.len(),
            initial = %state.initial_bankroll,
            bankroll = %state.current_bankroll,
            "Bankroll simulation complete"
        );
        Ok(state)
    }

    /// Replay records that are already in date order.
    pub fn replay(&self, records: &[BetRecord]) -> Result<BankrollState> {
        let mut tracker = BankrollTracker::new(self.initial_bankroll);
        let mut daily: BTreeMap<NaiveDate, DailyBankroll> = BTreeMap::new();
        let mut steps = Vec::new();

        for record in records {
            let Some(outcome) = record.outcome() else {
                continue;
            };

            let stake_fraction = self.stake_fraction(record)?;
            let stake = tracker
                .bankroll()
                .checked_mul(stake_fraction)
                .ok_or(BettingError::BankrollOverflow)?;

            let pnl = match outcome {
                Outcome::Win => {
                    let profit = stake
                        .checked_mul(record.odds.profit_multiplier_decimal())
                        .ok_or(BettingError::BankrollOverflow)?;
                    tracker.record_win(profit)?;
                    profit
                }
                Outcome::Lose => {
                    tracker.record_loss(stake)?;
                    -stake
                }
            };

            let bankroll = tracker.bankroll();
            let rate = tracker.profit_rate()?;
            debug!(date = %record.date, team = %record.team, %outcome, %stake, %pnl, %bankroll, "Applied bet");

            let day = daily.entry(record.date).or_insert(DailyBankroll {
                bankroll,
                profit_rate: rate,
                win_rate: Decimal::ZERO,
                wins: 0,
                losses: 0,
            });
            match outcome {
                Outcome::Win => day.wins += 1,
                Outcome::Lose => day.losses += 1,
            }
            day.bankroll = bankroll;
            day.profit_rate = rate;
            day.win_rate = win_rate_pct(day.wins.into(), day.losses.into());

            steps.push(BankrollStep {
                date: record.date,
                team: record.team.clone(),
                odds: record.odds,
                outcome,
                stake_fraction,
                stake,
                pnl,
                bankroll,
                profit_rate: rate,
            });
        }

        Ok(BankrollState {
            initial_bankroll: self.initial_bankroll,
            current_bankroll: tracker.bankroll(),
            kelly_scale: self.kelly_scale,
            daily,
            steps,
            summary: tracker.finalize()?,
        })
    }

    fn stake_fraction(&self, record: &BetRecord) -> Result<Decimal> {
        if !(0.0..=100.0).contains(&record.kelly) {
            return Err(BettingError::InvalidStoredKelly {
                date: record.date,
                team: record.team.clone(),
                kelly: record.kelly,
            });
        }
        stake_fraction(record.date, &record.team, record.kelly / 100.0 * self.kelly_scale)
    }
}

/// Convert a bankroll fraction to `Decimal`, rejecting anything that would
/// stake more than the whole bankroll.
pub(crate) fn stake_fraction(date: NaiveDate, team: &str, fraction: f64) -> Result<Decimal> {
    let invalid = || BettingError::InvalidStake {
        date,
        team: team.to_string(),
        fraction,
    };
    if !(0.0..=1.0).contains(&fraction) {
        return Err(invalid());
    }
    Decimal::from_f64(fraction).ok_or_else(invalid)
}

/// Replay `ledger.query(user)` under the given policy.
pub fn simulate(
    ledger: &BettingLedger,
    user: &str,
    initial_bankroll: Decimal,
    kelly_scale: f64,
) -> Result<BankrollState> {
    BankrollSimulator::new(initial_bankroll, kelly_scale)?.simulate(ledger, user)
}

pub fn replay(records: &[BetRecord], initial_bankroll: Decimal, kelly_scale: f64) -> Result<BankrollState> {
    BankrollSimulator::new(initial_bankroll, kelly_scale)?.replay(records)
}

/// Percentage of that day's settled bets that won; zero when none settled.
pub fn win_rate(ledger: &BettingLedger, user: &str, date: NaiveDate) -> Decimal {
    let (wins, losses) = ledger
        .query(&LedgerQuery::for_user(user).between(date, date))
        .iter()
        .filter_map(BetRecord::outcome)
        .fold((0u64, 0u64), |(w, l), outcome| match outcome {
            Outcome::Win => (w + 1, l),
            Outcome::Lose => (w, l + 1),
        });
    win_rate_pct(wins, losses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ledger::BetResult;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, d).unwrap()
    }

    fn bet(d: u32, team: &str, odds: i32, kelly: f64, result: BetResult) -> BetRecord {
        let mut record = BetRecord::pending(day(d), team, AmericanOdds::new(odds).unwrap(), kelly, "seoyeon");
        record.result = result;
        record
    }

    fn close(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.000001)
    }

    #[test]
    fn test_win_then_loss() {
        let records = vec![
            bet(1, "Boston Celtics", 150, 10.0, BetResult::Win),
            bet(2, "Denver Nuggets", -200, 20.0, BetResult::Lose),
        ];
        let state = replay(&records, dec!(1000), FULL_KELLY).unwrap();

        // 1000 + 100 * 1.5 = 1150, then 1150 - 230 = 920
        assert!(close(state.daily[&day(1)].bankroll, dec!(1150)));
        assert!(close(state.current_bankroll, dec!(920)));
        assert!(close(state.profit_rate(), dec!(-8)));
        assert_eq!(state.steps.len(), 2);
        assert_eq!(state.summary.wins, 1);
        assert_eq!(state.summary.losses, 1);
    }

    #[test]
    fn test_half_kelly_scales_stake() {
        let records = vec![bet(1, "Boston Celtics", 100, 20.0, BetResult::Win)];
        let full = replay(&records, dec!(1000), FULL_KELLY).unwrap();
        let half = replay(&records, dec!(1000), HALF_KELLY).unwrap();

        assert!(close(full.current_bankroll, dec!(1200)));
        assert!(close(half.current_bankroll, dec!(1100)));
    }

    #[test]
    fn test_same_day_bets_compound() {
        let records = vec![
            bet(3, "Boston Celtics", 100, 50.0, BetResult::Lose),
            bet(3, "Miami Heat", 100, 50.0, BetResult::Lose),
        ];
        let state = replay(&records, dec!(1000), FULL_KELLY).unwrap();

        // 1000 -> 500 -> 250, not 1000 -> 0
        assert!(close(state.current_bankroll, dec!(250)));
        let d = &state.daily[&day(3)];
        assert_eq!((d.wins, d.losses), (0, 2));
        assert_eq!(d.win_rate, Decimal::ZERO);
        assert!(close(d.profit_rate, dec!(-75)));
    }

    #[test]
    fn test_pending_bets_are_skipped() {
        let records = vec![
            bet(1, "Boston Celtics", 150, 10.0, BetResult::Pending),
            bet(2, "Miami Heat", 150, 10.0, BetResult::Pending),
        ];
        let state = replay(&records, dec!(1000), FULL_KELLY).unwrap();
        assert_eq!(state.current_bankroll, dec!(1000));
        assert!(state.daily.is_empty());
        assert!(state.steps.is_empty());
    }

    #[test]
    fn test_simulate_is_deterministic() {
        let ledger = BettingLedger::from_records(vec![
            bet(1, "Boston Celtics", 135, 13.7, BetResult::Win),
            bet(1, "Miami Heat", -115, 4.2, BetResult::Lose),
            bet(2, "Utah Jazz", 240, 7.9, BetResult::Win),
        ]);
        let a = simulate(&ledger, "seoyeon", dec!(100000), HALF_KELLY).unwrap();
        let b = simulate(&ledger, "seoyeon", dec!(100000), HALF_KELLY).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_simulate_filters_user() {
        let mut other = bet(1, "Boston Celtics", 150, 10.0, BetResult::Win);
        other.user = "minji".to_string();
        let ledger = BettingLedger::from_records(vec![other]);

        let state = simulate(&ledger, "seoyeon", dec!(1000), FULL_KELLY).unwrap();
        assert_eq!(state.current_bankroll, dec!(1000));
    }

    #[test]
    fn test_win_rate_per_day() {
        let ledger = BettingLedger::from_records(vec![
            bet(1, "Boston Celtics", 150, 10.0, BetResult::Win),
            bet(1, "Miami Heat", 150, 10.0, BetResult::Lose),
            bet(1, "Utah Jazz", 150, 10.0, BetResult::Pending),
            bet(2, "Utah Jazz", 150, 10.0, BetResult::Pending),
        ]);
        assert_eq!(win_rate(&ledger, "seoyeon", day(1)), dec!(50));
        assert_eq!(win_rate(&ledger, "seoyeon", day(2)), Decimal::ZERO);
        assert_eq!(win_rate(&ledger, "seoyeon", day(9)), Decimal::ZERO);
    }

    #[test]
    fn test_curve_forward_fills() {
        let records = vec![
            bet(2, "Boston Celtics", 100, 10.0, BetResult::Win),
            bet(4, "Miami Heat", 100, 10.0, BetResult::Lose),
        ];
        let state = replay(&records, dec!(1000), FULL_KELLY).unwrap();
        let curve = state.curve(day(1), day(5));

        let values: Vec<Decimal> = curve.iter().map(|(_, b)| *b).collect();
        assert_eq!(curve.len(), 5);
        assert_eq!(values[0], dec!(1000));
        assert!(close(values[1], dec!(1100)));
        assert!(close(values[2], dec!(1100)));
        assert!(close(values[3], dec!(990)));
        assert!(close(values[4], dec!(990)));

        // Starting mid-history picks up the last known bankroll.
        let tail = state.curve(day(3), day(3));
        assert!(close(tail[0].1, dec!(1100)));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            BankrollSimulator::new(Decimal::ZERO, FULL_KELLY),
            Err(BettingError::InvalidBankroll(_))
        ));
        assert!(matches!(
            BankrollSimulator::new(dec!(1000), -1.0),
            Err(BettingError::InvalidKellyScale(_))
        ));

        let records = vec![bet(1, "Boston Celtics", 150, 140.0, BetResult::Win)];
        assert!(matches!(
            replay(&records, dec!(1000), FULL_KELLY),
            Err(BettingError::InvalidStoredKelly { .. })
        ));
    }

    #[test]
    fn test_runaway_bankroll_is_an_error() {
        let ledger = BettingLedger::from_records(
            (1..=20)
                .map(|d| bet(d, "Detroit Pistons", 10000, 50.0, BetResult::Win))
                .collect(),
        );
        assert!(matches!(
            simulate(&ledger, "seoyeon", dec!(100000), FULL_KELLY),
            Err(BettingError::BankrollOverflow)
        ));
    }

    #[test]
    fn test_stake_above_bankroll_is_rejected() {
        let records = vec![bet(1, "Boston Celtics", 150, 80.0, BetResult::Lose)];
        let err = replay(&records, dec!(1000), 2.0).unwrap_err();
        assert!(matches!(err, BettingError::InvalidStake { fraction, .. } if fraction > 1.0));

        // Exactly the whole bankroll is allowed and leaves nothing.
        let records = vec![bet(1, "Boston Celtics", 150, 50.0, BetResult::Lose)];
        let state = replay(&records, dec!(1000), 2.0).unwrap();
        assert_eq!(state.current_bankroll, Decimal::ZERO);
    }

    #[test]
    fn test_insertion_order_across_dates_is_irrelevant() {
        let ordered = vec![
            bet(1, "Boston Celtics", 150, 10.0, BetResult::Win),
            bet(1, "Miami Heat", -120, 8.0, BetResult::Lose),
            bet(2, "Utah Jazz", 240, 6.0, BetResult::Win),
            bet(3, "Denver Nuggets", -200, 20.0, BetResult::Lose),
        ];
        let shuffled = vec![
            ordered[3].clone(),
            ordered[0].clone(),
            ordered[2].clone(),
            ordered[1].clone(),
        ];

        let a = simulate(&BettingLedger::from_records(ordered.clone()), "seoyeon", dec!(1000), HALF_KELLY).unwrap();
        let b = simulate(&BettingLedger::from_records(shuffled), "seoyeon", dec!(1000), HALF_KELLY).unwrap();
        assert_eq!(a, b);

        // Within a date, insertion order is the replay order.
        let swapped = vec![
            ordered[1].clone(),
            ordered[0].clone(),
            ordered[2].clone(),
            ordered[3].clone(),
        ];
        let c = simulate(&BettingLedger::from_records(swapped), "seoyeon", dec!(1000), HALF_KELLY).unwrap();
        assert_ne!(a.steps, c.steps);
        assert_eq!(c.steps[0].team, "Miami Heat");
        assert!(close(a.current_bankroll, c.current_bankroll));
    }
}
