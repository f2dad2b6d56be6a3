//! Losing-streak and staking-risk analysis.
//!
//! Settled picks are bucketed by model confidence, scanned for runs of
//! consecutive losses, and replayed under martingale and fractional-Kelly
//! staking to show what surviving the worst run would have cost.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::backtesting::results::{win_rate_pct, BankrollTracker};
use crate::backtesting::simulator::stake_fraction;
use crate::db::ledger::{BetRecord, Outcome};
use crate::error::{BettingError, Result};
use crate::risk::ev::validate_probability;
use crate::risk::kelly::{validate_scale, KellySizing};

/// Confidence ranges, split at ascending boundaries.
///
/// `[0.6, 0.7]` yields `< 0.6`, `[0.6, 0.7)` and `>= 0.7`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceBuckets {
    boundaries: Vec<f64>,
}

impl ConfidenceBuckets {
    pub fn new(boundaries: Vec<f64>) -> Result<Self> {
        if boundaries.is_empty() {
            return Err(BettingError::InvalidBuckets(
                "at least one boundary is required".to_string(),
            ));
        }
        if let Some(b) = boundaries.iter().find(|b| !(**b > 0.0 && **b < 1.0)) {
            return Err(BettingError::InvalidBuckets(format!(
                "boundary {b} is outside (0, 1)"
            )));
        }
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(BettingError::InvalidBuckets(format!(
                "boundaries must be strictly ascending: {boundaries:?}"
            )));
        }
        Ok(Self { boundaries })
    }

    pub fn len(&self) -> usize {
        self.boundaries.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn index_of(&self, probability: f64) -> usize {
        self.boundaries.iter().take_while(|b| probability >= **b).count()
    }

    pub fn label(&self, index: usize) -> String {
        let last = self.boundaries.len();
        match index {
            0 => format!("< {}", self.boundaries[0]),
            i if i >= last => format!(">= {}", self.boundaries[last - 1]),
            i => format!("[{}, {})", self.boundaries[i - 1], self.boundaries[i]),
        }
    }

    /// Split picks into one group per bucket, preserving order.
    pub fn partition<'a>(&self, picks: &'a [SettledPick]) -> Vec<Vec<&'a SettledPick>> {
        let mut groups = vec![Vec::new(); self.len()];
        for pick in picks {
            groups[self.index_of(pick.probability)].push(pick);
        }
        groups
    }
}

/// A settled bet with the model confidence it was placed at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettledPick {
    pub date: NaiveDate,
    pub team: String,
    pub opponent: Option<String>,
    pub probability: f64,
    pub decimal_odds: f64,
    pub outcome: Outcome,
}

impl SettledPick {
    /// `None` for pending records and records without a stored probability.
    pub fn from_record(record: &BetRecord) -> Option<Self> {
        Some(Self {
            date: record.date,
            team: record.team.clone(),
            opponent: None,
            probability: record.probability?,
            decimal_odds: record.odds.to_decimal(),
            outcome: record.outcome()?,
        })
    }

    fn net_odds(&self) -> Result<Decimal> {
        if !self.decimal_odds.is_finite() || self.decimal_odds <= 1.0 {
            return Err(BettingError::InvalidDecimalOdds(self.decimal_odds));
        }
        Decimal::from_f64(self.decimal_odds - 1.0)
            .ok_or(BettingError::InvalidDecimalOdds(self.decimal_odds))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LosingStreak {
    pub length: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Runs of consecutive losses, in date order.
///
/// Ties on date keep input order. A run still open at the end of the scan
/// is reported.
pub fn losing_streaks<'a, I>(picks: I) -> Vec<LosingStreak>
where
    I: IntoIterator<Item = &'a SettledPick>,
{
    let mut ordered: Vec<&SettledPick> = picks.into_iter().collect();
    ordered.sort_by_key(|p| p.date);

    let mut streaks = Vec::new();
    let mut current: Option<LosingStreak> = None;

    for pick in ordered {
        match pick.outcome {
            Outcome::Lose => match current.as_mut() {
                Some(run) => {
                    run.length += 1;
                    run.end = pick.date;
                }
                None => {
                    current = Some(LosingStreak {
                        length: 1,
                        start: pick.date,
                        end: pick.date,
                    })
                }
            },
            Outcome::Win => streaks.extend(current.take()),
        }
    }
    streaks.extend(current);
    streaks
}

/// Bankroll needed to keep doubling (or multiplying) through `max_streak`
/// straight losses: `initial_bet * (m^n - 1) / (m - 1)`.
///
/// A multiplier of exactly one is flat staking, `initial_bet * n`.
pub fn martingale_required_capital(
    max_streak: u32,
    initial_bet: Decimal,
    multiplier: Decimal,
) -> Result<Decimal> {
    if multiplier <= Decimal::ZERO {
        return Err(BettingError::InvalidMultiplier(multiplier));
    }
    let overflow = || BettingError::CapitalOverflow { streak: max_streak };

    if multiplier == Decimal::ONE {
        warn!(max_streak, %initial_bet, "Martingale multiplier is 1, using flat staking");
        return initial_bet
            .checked_mul(Decimal::from(max_streak))
            .ok_or_else(overflow);
    }

    let mut power = Decimal::ONE;
    for _ in 0..max_streak {
        power = power.checked_mul(multiplier).ok_or_else(overflow)?;
    }

    initial_bet
        .checked_mul(power - Decimal::ONE)
        .and_then(|total| total.checked_div(multiplier - Decimal::ONE))
        .ok_or_else(overflow)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MartingaleStep {
    pub date: NaiveDate,
    pub stake: Decimal,
    pub pnl: Decimal,
    pub cumulative: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MartingaleReplay {
    pub total_profit: Decimal,
    /// Lowest cumulative result reached, as a positive amount.
    pub worst_loss: Decimal,
    pub max_stake: Decimal,
    pub steps: Vec<MartingaleStep>,
}

/// Replay picks in order, multiplying the stake after every loss and
/// resetting it after every win.
pub fn martingale_replay<'a, I>(picks: I, initial_bet: Decimal, multiplier: Decimal) -> Result<MartingaleReplay>
where
    I: IntoIterator<Item = &'a SettledPick>,
{
    if multiplier <= Decimal::ZERO {
        return Err(BettingError::InvalidMultiplier(multiplier));
    }

    let mut stake = initial_bet;
    let mut cumulative = Decimal::ZERO;
    let mut worst = Decimal::ZERO;
    let mut max_stake = Decimal::ZERO;
    let mut steps = Vec::new();

    for (i, pick) in picks.into_iter().enumerate() {
        max_stake = max_stake.max(stake);
        let pnl = match pick.outcome {
            Outcome::Win => stake
                .checked_mul(pick.net_odds()?)
                .ok_or(BettingError::BankrollOverflow)?,
            Outcome::Lose => -stake,
        };
        cumulative = cumulative
            .checked_add(pnl)
            .ok_or(BettingError::BankrollOverflow)?;
        worst = worst.min(cumulative);
        steps.push(MartingaleStep {
            date: pick.date,
            stake,
            pnl,
            cumulative,
        });

        stake = match pick.outcome {
            Outcome::Win => initial_bet,
            Outcome::Lose => stake
                .checked_mul(multiplier)
                .ok_or(BettingError::CapitalOverflow { streak: i as u32 + 1 })?,
        };
    }

    Ok(MartingaleReplay {
        total_profit: cumulative,
        worst_loss: -worst,
        max_stake,
        steps,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KellyReplay {
    pub initial_bankroll: Decimal,
    pub final_bankroll: Decimal,
    pub profit: Decimal,
    pub max_drawdown_pct: Decimal,
    pub path: Vec<(NaiveDate, Decimal)>,
}

/// Replay picks staking `scale` times full Kelly of the running bankroll.
pub fn fractional_kelly_replay<'a, I>(picks: I, initial_bankroll: Decimal, scale: f64) -> Result<KellyReplay>
where
    I: IntoIterator<Item = &'a SettledPick>,
{
    let scale = validate_scale(scale)?;
    let mut tracker = BankrollTracker::new(initial_bankroll);
    let mut path = Vec::new();

    for pick in picks {
        let probability = validate_probability(pick.probability)?;
        let pct = KellySizing::from_decimal_odds(pick.decimal_odds, probability)?.scaled_pct(scale)?;
        let fraction = stake_fraction(pick.date, &pick.team, pct / 100.0)?;
        let stake = tracker
            .bankroll()
            .checked_mul(fraction)
            .ok_or(BettingError::BankrollOverflow)?;

        match pick.outcome {
            Outcome::Win => {
                let profit = stake
                    .checked_mul(pick.net_odds()?)
                    .ok_or(BettingError::BankrollOverflow)?;
                tracker.record_win(profit)?;
            }
            Outcome::Lose => tracker.record_loss(stake)?,
        }
        path.push((pick.date, tracker.bankroll()));
    }

    let summary = tracker.finalize()?;
    Ok(KellyReplay {
        initial_bankroll,
        final_bankroll: summary.final_bankroll,
        profit: summary.total_pnl,
        max_drawdown_pct: summary.max_drawdown_pct,
        path,
    })
}

/// Everything known about one confidence bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketReport {
    pub label: String,
    pub bets: usize,
    pub wins: u64,
    pub losses: u64,
    pub win_rate: Decimal,
    pub streaks: Vec<LosingStreak>,
    pub longest_streak: u32,
    pub multiplier: Decimal,
    pub required_capital: Decimal,
    pub martingale: MartingaleReplay,
    pub kelly: KellyReplay,
}

impl fmt::Display for BucketReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Confidence {} ---", self.label)?;
        writeln!(
            f,
            "Bets: {} ({}W / {}L, {:.1}% win rate)",
            self.bets, self.wins, self.losses, self.win_rate
        )?;
        match self.streaks.iter().max_by_key(|s| s.length) {
            Some(worst) => writeln!(
                f,
                "Losing streaks: {} | Longest: {} ({} to {})",
                self.streaks.len(),
                worst.length,
                worst.start,
                worst.end
            )?,
            None => writeln!(f, "Losing streaks: none")?,
        }
        writeln!(
            f,
            "Martingale x{}: required capital {:.0}, profit {:.0}, worst loss {:.0}",
            self.multiplier,
            self.required_capital,
            self.martingale.total_profit,
            self.martingale.worst_loss
        )?;
        write!(
            f,
            "Fractional Kelly: {:.0} -> {:.0} (max drawdown {:.1}%)",
            self.kelly.initial_bankroll, self.kelly.final_bankroll, self.kelly.max_drawdown_pct
        )
    }
}

/// Per-bucket streak and staking analysis.
#[derive(Debug, Clone)]
pub struct StreakAnalyzer {
    buckets: ConfidenceBuckets,
    initial_bet: Decimal,
    /// One multiplier per bucket, lowest confidence first.
    multipliers: Vec<Decimal>,
    kelly_bankroll: Decimal,
    kelly_scale: f64,
}

impl StreakAnalyzer {
    pub fn new(
        buckets: ConfidenceBuckets,
        initial_bet: Decimal,
        multipliers: Vec<Decimal>,
        kelly_bankroll: Decimal,
        kelly_scale: f64,
    ) -> Result<Self> {
        if multipliers.len() != buckets.len() {
            return Err(BettingError::InvalidBuckets(format!(
                "{} buckets but {} martingale multipliers",
                buckets.len(),
                multipliers.len()
            )));
        }
        if let Some(m) = multipliers.iter().find(|m| **m <= Decimal::ZERO) {
            return Err(BettingError::InvalidMultiplier(*m));
        }
        if kelly_bankroll <= Decimal::ZERO {
            return Err(BettingError::InvalidBankroll(kelly_bankroll));
        }
        Ok(Self {
            buckets,
            initial_bet,
            multipliers,
            kelly_bankroll,
            kelly_scale: validate_scale(kelly_scale)?,
        })
    }

    pub fn buckets(&self) -> &ConfidenceBuckets {
        &self.buckets
    }

    pub fn report(&self, picks: &[SettledPick]) -> Result<Vec<BucketReport>> {
        let mut ordered = picks.to_vec();
        ordered.sort_by_key(|p| p.date);

        let mut reports = Vec::with_capacity(self.buckets.len());
        for (index, group) in self.buckets.partition(&ordered).into_iter().enumerate() {
            let multiplier = self.multipliers[index];
            let wins = group.iter().filter(|p| p.outcome == Outcome::Win).count() as u64;
            let losses = group.len() as u64 - wins;

            let streaks = losing_streaks(group.iter().copied());
            let longest_streak = streaks.iter().map(|s| s.length).max().unwrap_or(0);

            let report = BucketReport {
                label: self.buckets.label(index),
                bets: group.len(),
                wins,
                losses,
                win_rate: win_rate_pct(wins, losses),
                longest_streak,
                multiplier,
                required_capital: martingale_required_capital(longest_streak, self.initial_bet, multiplier)?,
                martingale: martingale_replay(group.iter().copied(), self.initial_bet, multiplier)?,
                kelly: fractional_kelly_replay(group.iter().copied(), self.kelly_bankroll, self.kelly_scale)?,
                streaks,
            };

            info!(
                bucket = %report.label,
                bets = report.bets,
                longest_streak,
                required_capital = %report.required_capital,
                "Bucket analysed"
            );
            reports.push(report);
        }
        Ok(reports)
    }
}
