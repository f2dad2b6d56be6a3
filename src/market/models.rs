use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Team identifier as published by the odds provider (e.g. "Boston Celtics").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(String);

impl TeamId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TeamId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one game. Home and away are distinct fields, so the same two
/// teams meeting with reversed venues never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchupKey {
    pub date: NaiveDate,
    pub home: TeamId,
    pub away: TeamId,
}

impl MatchupKey {
    pub fn new(date: NaiveDate, home: impl Into<String>, away: impl Into<String>) -> Self {
        Self {
            date,
            home: TeamId::new(home),
            away: TeamId::new(away),
        }
    }

    pub fn team(&self, side: Side) -> &TeamId {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }
}

impl fmt::Display for MatchupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {} ({})", self.home, self.away, self.date)
    }
}

/// Moneyline side of a two-outcome market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Home, Side::Away];
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => write!(f, "HOME"),
            Self::Away => write!(f, "AWAY"),
        }
    }
}

/// Side of the totals market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TotalSide {
    Over,
    Under,
}

impl fmt::Display for TotalSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Over => write!(f, "OVER"),
            Self::Under => write!(f, "UNDER"),
        }
    }
}

/// A posted moneyline. `None` means "not posted yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneylineQuote {
    #[serde(default)]
    pub moneyline: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverUnderQuote {
    pub line: f64,
    #[serde(default)]
    pub moneyline_equivalent: Option<i32>,
}

/// Odds for one matchup as returned by the odds provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOdds {
    #[serde(default)]
    pub home: MoneylineQuote,
    #[serde(default)]
    pub away: MoneylineQuote,
    #[serde(default)]
    pub over_under: Option<OverUnderQuote>,
}

impl GameOdds {
    pub fn moneyline(&self, side: Side) -> Option<i32> {
        match side {
            Side::Home => self.home.moneyline,
            Side::Away => self.away.moneyline,
        }
    }
}

/// Classifier output for one matchup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameForecast {
    /// P(home win).
    pub home_win_probability: f64,
    /// P(over), when the totals model ran.
    #[serde(default)]
    pub over_probability: Option<f64>,
}

impl GameForecast {
    /// Probability for one side of a strictly binary moneyline market.
    pub fn win_probability(&self, side: Side) -> f64 {
        match side {
            Side::Home => self.home_win_probability,
            Side::Away => 1.0 - self.home_win_probability,
        }
    }
}

/// Everything the decision engine needs for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matchup {
    #[serde(flatten)]
    pub key: MatchupKey,
    #[serde(flatten)]
    pub forecast: GameForecast,
    #[serde(default)]
    pub odds: GameOdds,
}
