//! Error types for the betting engine.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::db::ledger::BetResult;

pub type Result<T> = std::result::Result<T, BettingError>;

#[derive(Error, Debug)]
pub enum BettingError {
    #[error("invalid American odds {0}: must be >= 100 or <= -100")]
    InvalidOdds(i32),

    #[error("invalid decimal odds {0}: must be finite and greater than 1.0")]
    InvalidDecimalOdds(f64),

    #[error("invalid probability {0}: must be within [0, 1]")]
    InvalidProbability(f64),

    #[error("invalid Kelly scale {0}: must be finite and non-negative")]
    InvalidKellyScale(f64),

    #[error("stored Kelly {kelly} for {team} on {date} is outside 0-100")]
    InvalidStoredKelly {
        date: NaiveDate,
        team: String,
        kelly: f64,
    },

    #[error("invalid bankroll {0}: must be positive")]
    InvalidBankroll(Decimal),

    #[error("stake fraction {fraction} for {team} on {date} is outside [0, 1]")]
    InvalidStake {
        date: NaiveDate,
        team: String,
        fraction: f64,
    },

    #[error("bankroll arithmetic overflowed")]
    BankrollOverflow,

    #[error("no matchups to decide for {date}")]
    EmptySlate { date: NaiveDate },

    /// Moneyline not posted yet. Non-fatal: the side is skipped.
    #[error("no moneyline posted for {team}")]
    MissingOdds { team: String },

    #[error("no bet found for {team} on {date}")]
    BetNotFound { date: NaiveDate, team: String },

    #[error("bet on {team} for {date} is already settled as {result}")]
    AlreadySettled {
        date: NaiveDate,
        team: String,
        result: BetResult,
    },

    #[error("record for {team} is dated {found}, expected {expected}")]
    DateMismatch {
        expected: NaiveDate,
        found: NaiveDate,
        team: String,
    },

    #[error("invalid confidence buckets: {0}")]
    InvalidBuckets(String),

    #[error("invalid martingale multiplier {0}: must be positive")]
    InvalidMultiplier(Decimal),

    #[error("martingale capital overflows after a streak of {streak}")]
    CapitalOverflow { streak: u32 },

    #[error("timed out after {waited_ms}ms waiting for ledger lock {path}")]
    LockTimeout { path: String, waited_ms: u64 },

    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BettingError {
    /// Errors that skip a single side instead of aborting a decision run.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::MissingOdds { .. })
    }
}
