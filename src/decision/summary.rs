//! Per-game decision summaries for dashboards.
//!
//! This is the presentation boundary: probabilities and Kelly percentages
//! are rounded to one decimal and EV to two here, and nowhere upstream.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::market::models::{Matchup, Side, TotalSide};
use crate::risk::ev::{expected_value, validate_probability};
use crate::risk::kelly::KellySizing;
use crate::risk::odds::{round_for_display, AmericanOdds};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinPrediction {
    pub team: String,
    pub probability_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverUnderPrediction {
    pub side: TotalSide,
    pub line: f64,
    pub probability_pct: f64,
}

/// One row of the decision-run summary.
///
/// Kelly and EV describe the predicted winner and are `None` when that
/// side's moneyline has not been posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSummary {
    pub teams: String,
    pub win_prediction: WinPrediction,
    pub ou_prediction: Option<OverUnderPrediction>,
    pub kelly_pct: Option<f64>,
    pub half_kelly_pct: Option<f64>,
    pub expected_value: Option<f64>,
}

impl DecisionSummary {
    pub fn build(matchup: &Matchup, half_kelly_scale: f64) -> Result<Self> {
        let p_home = validate_probability(matchup.forecast.home_win_probability)?;
        let winner = if p_home > 0.5 { Side::Home } else { Side::Away };
        let win_probability = matchup.forecast.win_probability(winner);

        let ou_prediction = match (matchup.forecast.over_probability, matchup.odds.over_under) {
            (Some(p_over), Some(quote)) => {
                let p_over = validate_probability(p_over)?;
                let (side, p) = if p_over > 0.5 {
                    (TotalSide::Over, p_over)
                } else {
                    (TotalSide::Under, 1.0 - p_over)
                };
                Some(OverUnderPrediction {
                    side,
                    line: quote.line,
                    probability_pct: round_for_display(p * 100.0, 1),
                })
            }
            _ => None,
        };

        let (kelly_pct, half_kelly_pct, ev) = match matchup.odds.moneyline(winner) {
            Some(moneyline) => {
                let odds = AmericanOdds::new(moneyline)?;
                let sizing = KellySizing::compute(odds, win_probability)?;
                let ev = expected_value(win_probability, odds)?;
                (
                    Some(round_for_display(sizing.full_pct, 1)),
                    Some(round_for_display(sizing.scaled_pct(half_kelly_scale)?, 1)),
                    Some(round_for_display(ev, 2)),
                )
            }
            None => (None, None, None),
        };

        Ok(Self {
            teams: format!("{} vs {}", matchup.key.home, matchup.key.away),
            win_prediction: WinPrediction {
                team: matchup.key.team(winner).to_string(),
                probability_pct: round_for_display(win_probability * 100.0, 1),
            },
            ou_prediction,
            kelly_pct,
            half_kelly_pct,
            expected_value: ev,
        })
    }
}

/// The whole slate, as written to the predictions file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReport {
    pub date: NaiveDate,
    pub games: Vec<DecisionSummary>,
}

impl DecisionReport {
    pub fn new(date: NaiveDate, games: Vec<DecisionSummary>) -> Self {
        Self { date, games }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BettingError;
    use crate::market::models::{GameForecast, GameOdds, MatchupKey, MoneylineQuote, OverUnderQuote};

    fn matchup(p_home: f64, p_over: Option<f64>, home: Option<i32>, away: Option<i32>) -> Matchup {
        Matchup {
            key: MatchupKey::new(
                NaiveDate::from_ymd_opt(2024, 11, 21).unwrap(),
                "Memphis Grizzlies",
                "Philadelphia 76ers",
            ),
            forecast: GameForecast {
                home_win_probability: p_home,
                over_probability: p_over,
            },
            odds: GameOdds {
                home: MoneylineQuote { moneyline: home },
                away: MoneylineQuote { moneyline: away },
                over_under: Some(OverUnderQuote {
                    line: 224.5,
                    moneyline_equivalent: Some(-110),
                }),
            },
        }
    }

    #[test]
    fn test_home_favorite_summary() {
        let summary = DecisionSummary::build(&matchup(0.65, Some(0.42), Some(150), Some(-180)), 0.5)
            .unwrap();

        assert_eq!(summary.teams, "Memphis Grizzlies vs Philadelphia 76ers");
        assert_eq!(summary.win_prediction.team, "Memphis Grizzlies");
        assert_eq!(summary.win_prediction.probability_pct, 65.0);
        assert_eq!(summary.kelly_pct, Some(41.7));
        assert_eq!(summary.half_kelly_pct, Some(20.8));
        assert_eq!(summary.expected_value, Some(0.63));

        let ou = summary.ou_prediction.unwrap();
        assert_eq!(ou.side, TotalSide::Under);
        assert_eq!(ou.line, 224.5);
        assert_eq!(ou.probability_pct, 58.0);
    }

    #[test]
    fn test_away_pick_with_missing_moneyline() {
        let summary = DecisionSummary::build(&matchup(0.3, None, Some(-250), None), 0.5).unwrap();
        assert_eq!(summary.win_prediction.team, "Philadelphia 76ers");
        assert_eq!(summary.win_prediction.probability_pct, 70.0);
        assert_eq!(summary.kelly_pct, None);
        assert_eq!(summary.expected_value, None);
        assert_eq!(summary.ou_prediction, None);
    }

    #[test]
    fn test_negative_ev_pick_reports_zero_kelly() {
        let summary = DecisionSummary::build(&matchup(0.6, None, Some(-200), Some(170)), 0.5).unwrap();
        assert_eq!(summary.kelly_pct, Some(0.0));
        assert_eq!(summary.expected_value, Some(-0.1));
    }

    #[test]
    fn test_invalid_probability_rejected() {
        assert!(matches!(
            DecisionSummary::build(&matchup(1.4, None, Some(150), None), 0.5),
            Err(BettingError::InvalidProbability(_))
        ));
    }

    #[test]
    fn test_serialized_field_names() {
        let summary = DecisionSummary::build(&matchup(0.65, Some(0.6), Some(150), Some(-180)), 0.5)
            .unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["winPrediction"]["probabilityPct"], 65.0);
        assert_eq!(json["ouPrediction"]["side"], "OVER");
        assert!(json.get("halfKellyPct").is_some());
        assert!(json.get("expectedValue").is_some());
    }
}
