//! Betting decision engine.
//!
//! Turns a model probability and a posted moneyline into a go/no-go decision.
//! A side is accepted only when both expected value and full Kelly are
//! strictly positive; everything else is rejected outright.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::db::ledger::{BetRecord, BettingLedger};
use crate::decision::summary::DecisionSummary;
use crate::error::{BettingError, Result};
use crate::market::models::{Matchup, MatchupKey, Side};
use crate::risk::ev::{expected_value, validate_probability};
use crate::risk::kelly::{validate_scale, KellySizing, HALF_KELLY};
use crate::risk::odds::AmericanOdds;

/// An accepted bet, before it becomes a ledger record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub matchup: MatchupKey,
    pub team: String,
    pub side: Side,
    pub american_odds: AmericanOdds,
    pub win_probability: f64,
    pub decimal_odds: f64,
    pub expected_value: f64,
    /// Full-Kelly percentage, unrounded.
    pub kelly_fraction: f64,
}

impl Recommendation {
    pub fn to_record(&self, user: &str) -> BetRecord {
        BetRecord::pending(
            self.matchup.date,
            self.team.clone(),
            self.american_odds,
            self.kelly_fraction,
            user,
        )
        .with_probability(self.win_probability)
    }
}

/// A side that was not evaluated because its moneyline is missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSide {
    pub team: String,
    pub side: Side,
    pub reason: String,
}

/// Both sides of one game after evaluation.
#[derive(Debug, Clone)]
pub struct MatchupDecision {
    pub matchup: Matchup,
    pub accepted: Vec<Recommendation>,
    pub skipped: Vec<SkippedSide>,
}

/// Result of one decision pass over a day's slate.
#[derive(Debug, Clone)]
pub struct DecisionRun {
    pub date: NaiveDate,
    pub user: String,
    pub decisions: Vec<MatchupDecision>,
    pub summaries: Vec<DecisionSummary>,
}

impl DecisionRun {
    pub fn accepted(&self) -> impl Iterator<Item = &Recommendation> {
        self.decisions.iter().flat_map(|d| d.accepted.iter())
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted().count()
    }
}

pub struct BettingDecisionEngine {
    /// Scale used for the half-Kelly column of the run summary.
    half_kelly_scale: f64,
}

impl Default for BettingDecisionEngine {
    fn default() -> Self {
        Self {
            half_kelly_scale: HALF_KELLY,
        }
    }
}

impl BettingDecisionEngine {
    pub fn new(half_kelly_scale: f64) -> Result<Self> {
        Ok(Self {
            half_kelly_scale: validate_scale(half_kelly_scale)?,
        })
    }

    pub fn half_kelly_scale(&self) -> f64 {
        self.half_kelly_scale
    }

    /// Evaluate one side of one game.
    ///
    /// Invalid probabilities or odds are returned as errors, never coerced.
    /// `Ok(None)` means the side was evaluated and rejected.
    pub fn decide(
        &self,
        matchup: &MatchupKey,
        side: Side,
        probability: f64,
        american_odds: i32,
    ) -> Result<Option<Recommendation>> {
        let probability = validate_probability(probability)?;
        let odds = AmericanOdds::new(american_odds)?;

        let ev = expected_value(probability, odds)?;
        let kelly = KellySizing::compute(odds, probability)?;
        let team = matchup.team(side);

        if ev > 0.0 && kelly.has_edge() {
            debug!(team = %team, odds = %odds, probability, ev, kelly = kelly.full_pct, "Side accepted");
            Ok(Some(Recommendation {
                matchup: matchup.clone(),
                team: team.to_string(),
                side,
                american_odds: odds,
                win_probability: probability,
                decimal_odds: odds.to_decimal(),
                expected_value: ev,
                kelly_fraction: kelly.full_pct,
            }))
        } else {
            debug!(team = %team, odds = %odds, probability, ev, kelly_raw = kelly.raw, "Side rejected");
            Ok(None)
        }
    }

    /// Evaluate home and away independently. Both may be accepted.
    pub fn evaluate_matchup(&self, matchup: &Matchup) -> Result<MatchupDecision> {
        let mut accepted = Vec::new();
        let mut skipped = Vec::new();

        for side in Side::BOTH {
            let probability = matchup.forecast.win_probability(side);
            let team = matchup.key.team(side).to_string();

            let Some(moneyline) = matchup.odds.moneyline(side) else {
                let reason = BettingError::MissingOdds { team: team.clone() };
                info!(matchup = %matchup.key, side = %side, "{reason}, skipping side");
                skipped.push(SkippedSide {
                    team,
                    side,
                    reason: reason.to_string(),
                });
                continue;
            };

            if let Some(rec) = self.decide(&matchup.key, side, probability, moneyline)? {
                accepted.push(rec);
            }
        }

        Ok(MatchupDecision {
            matchup: matchup.clone(),
            accepted,
            skipped,
        })
    }

    /// Run a full day's slate and replace that day's ledger entries.
    ///
    /// Every matchup is evaluated before the ledger is touched, so an invalid
    /// input aborts the run with the previous day's records intact. An empty
    /// slate, or a matchup dated for another day, is rejected the same way.
    pub fn run_day(
        &self,
        ledger: &BettingLedger,
        date: NaiveDate,
        user: &str,
        matchups: &[Matchup],
    ) -> Result<DecisionRun> {
        if matchups.is_empty() {
            return Err(BettingError::EmptySlate { date });
        }
        if let Some(stray) = matchups.iter().find(|m| m.key.date != date) {
            return Err(BettingError::DateMismatch {
                expected: date,
                found: stray.key.date,
                team: format!("{} vs {}", stray.key.home, stray.key.away),
            });
        }

        let mut decisions = Vec::with_capacity(matchups.len());
        let mut summaries = Vec::with_capacity(matchups.len());

        for matchup in matchups {
            summaries.push(DecisionSummary::build(matchup, self.half_kelly_scale)?);
            decisions.push(self.evaluate_matchup(matchup)?);
        }

        let records: Vec<BetRecord> = decisions
            .iter()
            .flat_map(|d| d.accepted.iter())
            .map(|rec| rec.to_record(user))
            .collect();
        let accepted = records.len();

        ledger.replace_day(date, records)?;

        info!(
            date = %date,
            user,
            games = decisions.len(),
            accepted,
            "Decision run complete"
        );

        Ok(DecisionRun {
            date,
            user: user.to_string(),
            decisions,
            summaries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ledger::{BetResult, Outcome};
    use crate::market::models::{GameForecast, GameOdds, MoneylineQuote};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 5).unwrap()
    }

    fn key() -> MatchupKey {
        MatchupKey::new(date(), "Brooklyn Nets", "Memphis Grizzlies")
    }

    fn matchup(p_home: f64, home: Option<i32>, away: Option<i32>) -> Matchup {
        Matchup {
            key: key(),
            forecast: GameForecast {
                home_win_probability: p_home,
                over_probability: None,
            },
            odds: GameOdds {
                home: MoneylineQuote { moneyline: home },
                away: MoneylineQuote { moneyline: away },
                over_under: None,
            },
        }
    }

    #[test]
    fn test_accepts_positive_ev_underdog() {
        let engine = BettingDecisionEngine::default();
        let rec = engine
            .decide(&key(), Side::Home, 0.65, 150)
            .unwrap()
            .expect("should accept");

        assert_eq!(rec.team, "Brooklyn Nets");
        assert_eq!(rec.decimal_odds, 2.5);
        assert!((rec.expected_value - 0.625).abs() < 1e-12);
        assert!((rec.kelly_fraction - 41.666_666_666_666).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_negative_ev_favorite() {
        let engine = BettingDecisionEngine::default();
        assert!(engine.decide(&key(), Side::Home, 0.60, -200).unwrap().is_none());
    }

    #[test]
    fn test_rejects_zero_edge() {
        // Even money at exactly 50%: EV and Kelly are both zero.
        let engine = BettingDecisionEngine::default();
        assert!(engine.decide(&key(), Side::Away, 0.5, 100).unwrap().is_none());
    }

    #[test]
    fn test_invalid_inputs_propagate() {
        let engine = BettingDecisionEngine::default();
        assert!(matches!(
            engine.decide(&key(), Side::Home, 0.65, 50),
            Err(BettingError::InvalidOdds(50))
        ));
        assert!(matches!(
            engine.decide(&key(), Side::Home, 1.2, 150),
            Err(BettingError::InvalidProbability(_))
        ));
    }

    #[test]
    fn test_both_sides_can_be_accepted() {
        // Both lines are generous: home 55% at +120, away 45% at +150.
        let engine = BettingDecisionEngine::default();
        let decision = engine
            .evaluate_matchup(&matchup(0.55, Some(120), Some(150)))
            .unwrap();
        assert_eq!(decision.accepted.len(), 2);
        assert!(decision.skipped.is_empty());
    }

    #[test]
    fn test_missing_moneyline_skips_only_that_side() {
        let engine = BettingDecisionEngine::default();
        let decision = engine
            .evaluate_matchup(&matchup(0.65, Some(150), None))
            .unwrap();
        assert_eq!(decision.accepted.len(), 1);
        assert_eq!(decision.accepted[0].side, Side::Home);
        assert_eq!(decision.skipped.len(), 1);
        assert_eq!(decision.skipped[0].side, Side::Away);
        assert!(decision.skipped[0].reason.contains("Memphis Grizzlies"));
    }

    #[test]
    fn test_run_day_writes_pending_records() {
        let engine = BettingDecisionEngine::default();
        let ledger = BettingLedger::in_memory();
        let run = engine
            .run_day(&ledger, date(), "jaehoon", &[matchup(0.65, Some(150), Some(-180))])
            .unwrap();

        assert_eq!(run.accepted_count(), 1);
        assert_eq!(run.summaries.len(), 1);

        let bets = ledger.snapshot();
        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].team, "Brooklyn Nets");
        assert_eq!(bets[0].result, BetResult::Pending);
        assert_eq!(bets[0].user, "jaehoon");
        assert_eq!(bets[0].probability, Some(0.65));
    }

    #[test]
    fn test_run_day_rerun_replaces() {
        let engine = BettingDecisionEngine::default();
        let ledger = BettingLedger::in_memory();
        let slate = [matchup(0.65, Some(150), Some(-180))];

        engine.run_day(&ledger, date(), "jaehoon", &slate).unwrap();
        engine.run_day(&ledger, date(), "jaehoon", &slate).unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_run_day_invalid_input_leaves_ledger_untouched() {
        let engine = BettingDecisionEngine::default();
        let ledger = BettingLedger::in_memory();
        engine
            .run_day(&ledger, date(), "jaehoon", &[matchup(0.65, Some(150), None)])
            .unwrap();

        let bad = [matchup(0.65, Some(150), None), matchup(0.65, Some(20), None)];
        assert!(engine.run_day(&ledger, date(), "jaehoon", &bad).is_err());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_run_day_rejects_off_date_matchups() {
        let engine = BettingDecisionEngine::default();
        let ledger = BettingLedger::in_memory();
        engine
            .run_day(&ledger, date(), "jaehoon", &[matchup(0.65, Some(150), None)])
            .unwrap();
        ledger.settle(date(), "Brooklyn Nets", Outcome::Win).unwrap();

        let mut tomorrow = matchup(0.65, Some(150), None);
        tomorrow.key.date = date().succ_opt().unwrap();
        let err = engine
            .run_day(&ledger, date(), "jaehoon", &[matchup(0.65, Some(150), None), tomorrow])
            .unwrap_err();
        assert!(matches!(
            err,
            BettingError::DateMismatch { expected, found, .. }
                if expected == date() && found == date().succ_opt().unwrap()
        ));

        let bets = ledger.snapshot();
        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].result, BetResult::Win);
    }

    #[test]
    fn test_run_day_rejects_empty_slate() {
        let engine = BettingDecisionEngine::default();
        let ledger = BettingLedger::in_memory();
        engine
            .run_day(&ledger, date(), "jaehoon", &[matchup(0.65, Some(150), None)])
            .unwrap();

        assert!(matches!(
            engine.run_day(&ledger, date(), "jaehoon", &[]),
            Err(BettingError::EmptySlate { .. })
        ));
        assert_eq!(ledger.len(), 1);
    }
}
