//! Historical pick loading for streak analysis.
//!
//! Loads settled picks from a results sheet exported as CSV. Each row is one
//! pick the model made on one game, with the decimal odds it was taken at.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::Path;

use crate::backtesting::streaks::SettledPick;
use crate::db::ledger::Outcome;

/// Load picks from a CSV file.
///
/// Expected CSV columns: date, home, away, pick, probability, decimal_odds,
/// result. Dates are ISO (`2024-11-05`); results are `win` or `lose`.
pub fn load_history_csv(path: &Path) -> Result<Vec<SettledPick>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_history(&content))
}

/// Parse CSV text. Malformed lines are skipped with a warning.
pub fn parse_history(content: &str) -> Vec<SettledPick> {
    let mut picks = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if i == 0 {
            continue; // Skip header
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_csv_line(line) {
            Ok(pick) => picks.push(pick),
            Err(e) => {
                tracing::warn!(line = i + 1, error = %e, "Skipping malformed CSV line");
            }
        }
    }
    picks
}

fn parse_csv_line(line: &str) -> Result<SettledPick> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 7 {
        anyhow::bail!("Expected 7 CSV columns, got {}", fields.len());
    }

    let date = NaiveDate::parse_from_str(fields[0], "%Y-%m-%d")
        .with_context(|| format!("Invalid date: {}", fields[0]))?;

    let (home, away, team) = (fields[1], fields[2], fields[3]);
    let opponent = if team == home {
        away
    } else if team == away {
        home
    } else {
        anyhow::bail!("Pick {team} is neither {home} nor {away}");
    };

    let probability: f64 = fields[4]
        .parse()
        .with_context(|| format!("Invalid probability: {}", fields[4]))?;
    if !(0.0..=1.0).contains(&probability) {
        anyhow::bail!("Probability out of range: {probability}");
    }

    let decimal_odds: f64 = fields[5]
        .parse()
        .with_context(|| format!("Invalid decimal_odds: {}", fields[5]))?;
    if !decimal_odds.is_finite() || decimal_odds <= 1.0 {
        anyhow::bail!("Decimal odds must exceed 1.0: {decimal_odds}");
    }

    let outcome: Outcome = fields[6].parse().map_err(anyhow::Error::msg)?;

    Ok(SettledPick {
        date,
        team: team.to_string(),
        opponent: Some(opponent.to_string()),
        probability,
        decimal_odds,
        outcome,
    })
}
