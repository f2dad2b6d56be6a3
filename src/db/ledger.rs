//! The betting ledger: every bet the engine has recommended, per user and
//! date, with its settlement state.
//!
//! The ledger is the only owner of [`BetRecord`]s. Decision runs call
//! [`BettingLedger::replace_day`] once per date, which makes re-running a day
//! idempotent. Settlement moves a record out of `pending` exactly once.

use std::fmt;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::store::{LedgerStore, LockSettings};
use crate::error::{BettingError, Result};
use crate::risk::odds::AmericanOdds;

/// Settlement state of a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetResult {
    Pending,
    Win,
    Lose,
}

impl BetResult {
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for BetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Win => write!(f, "win"),
            Self::Lose => write!(f, "lose"),
        }
    }
}

/// Final result of a game from the bettor's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
}

impl From<Outcome> for BetResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Win => Self::Win,
            Outcome::Lose => Self::Lose,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        BetResult::from(*self).fmt(f)
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" | "w" => Ok(Self::Win),
            "lose" | "loss" | "l" => Ok(Self::Lose),
            other => Err(format!("unknown outcome '{other}' (expected win or lose)")),
        }
    }
}

/// One persisted bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    pub date: NaiveDate,
    pub team: String,
    pub odds: AmericanOdds,
    /// Full-Kelly stake as a percentage of bankroll (0–100), unrounded.
    pub kelly: f64,
    pub result: BetResult,
    /// Bankroll owner this bet is attributed to.
    pub user: String,
    /// Model win probability at decision time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

impl BetRecord {
    pub fn pending(
        date: NaiveDate,
        team: impl Into<String>,
        odds: AmericanOdds,
        kelly: f64,
        user: impl Into<String>,
    ) -> Self {
        Self {
            date,
            team: team.into(),
            odds,
            kelly,
            result: BetResult::Pending,
            user: user.into(),
            probability: None,
        }
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = Some(probability);
        self
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.result {
            BetResult::Pending => None,
            BetResult::Win => Some(Outcome::Win),
            BetResult::Lose => Some(Outcome::Lose),
        }
    }
}

/// Read-side filter. Both date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    pub user: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl LedgerQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
            ..Self::default()
        }
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    fn matches(&self, record: &BetRecord) -> bool {
        self.user.as_deref().map_or(true, |u| record.user == u)
            && self.from.map_or(true, |from| record.date >= from)
            && self.to.map_or(true, |to| record.date <= to)
    }
}

pub struct BettingLedger {
    records: RwLock<Vec<BetRecord>>,
    store: Option<LedgerStore>,
}

impl BettingLedger {
    /// A ledger that lives only in memory.
    pub fn in_memory() -> Self {
        Self::from_records(Vec::new())
    }

    pub fn from_records(records: Vec<BetRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            store: None,
        }
    }

    /// Open a file-backed ledger. A missing file starts an empty ledger.
    pub fn open(path: impl Into<PathBuf>, lock: LockSettings) -> Result<Self> {
        let store = LedgerStore::new(path, lock);
        let records = store.load()?;
        info!(path = %store.path().display(), bets = records.len(), "Ledger opened");
        Ok(Self {
            records: RwLock::new(records),
            store: Some(store),
        })
    }

    /// Remove every record dated `date`, then insert `records`.
    ///
    /// All-or-nothing: on any error neither the in-memory ledger nor the
    /// backing file changes.
    pub fn replace_day(&self, date: NaiveDate, records: Vec<BetRecord>) -> Result<()> {
        if let Some(bad) = records.iter().find(|r| r.date != date) {
            return Err(BettingError::DateMismatch {
                expected: date,
                found: bad.date,
                team: bad.team.clone(),
            });
        }

        let inserted = records.len();
        let removed = self.write(|bets| {
            let before = bets.len();
            bets.retain(|r| r.date != date);
            let removed = before - bets.len();
            bets.extend(records);
            Ok(removed)
        })?;

        info!(date = %date, removed, inserted, "Ledger day replaced");
        Ok(())
    }

    /// Record the final result for the bets on `team` dated `date`.
    ///
    /// Every user who backed that team is settled together. Fails with
    /// [`BettingError::BetNotFound`] when nothing matches and with
    /// [`BettingError::AlreadySettled`] when any match has left `pending`;
    /// in both cases nothing changes.
    pub fn settle(&self, date: NaiveDate, team: &str, outcome: Outcome) -> Result<Vec<BetRecord>> {
        let settled = self.write(|bets| {
            let mut matched = bets
                .iter_mut()
                .filter(|r| r.date == date && r.team == team)
                .peekable();

            if matched.peek().is_none() {
                return Err(BettingError::BetNotFound {
                    date,
                    team: team.to_string(),
                });
            }

            let matched: Vec<&mut BetRecord> = matched.collect();
            if let Some(done) = matched.iter().find(|r| r.result.is_settled()) {
                return Err(BettingError::AlreadySettled {
                    date,
                    team: team.to_string(),
                    result: done.result,
                });
            }

            Ok(matched
                .into_iter()
                .map(|r| {
                    r.result = outcome.into();
                    r.clone()
                })
                .collect::<Vec<_>>())
        });

        match &settled {
            Ok(records) => info!(
                date = %date,
                team,
                result = %outcome,
                bets = records.len(),
                "Bet settled"
            ),
            Err(e) => warn!(date = %date, team, error = %e, "Settlement rejected"),
        }
        settled
    }

    /// Records matching `query`, ordered by date (insertion order within a date).
    pub fn query(&self, query: &LedgerQuery) -> Vec<BetRecord> {
        let bets = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<BetRecord> = bets.iter().filter(|r| query.matches(r)).cloned().collect();
        out.sort_by_key(|r| r.date);
        out
    }

    /// Every record, date ordered.
    pub fn snapshot(&self) -> Vec<BetRecord> {
        self.query(&LedgerQuery::all())
    }

    /// Unsettled bets, date ordered.
    pub fn pending(&self) -> Vec<BetRecord> {
        let mut out = self.snapshot();
        out.retain(|r| !r.result.is_settled());
        out
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-read the backing file to pick up writes from other processes.
    pub fn refresh(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let fresh = store.load()?;
        *self.records.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(())
    }

    /// Read-modify-write under both the in-process and the file lock.
    ///
    /// `op` works on a copy; the copy is persisted and swapped in only when
    /// `op` and the save both succeed.
    fn write<T>(&self, op: impl FnOnce(&mut Vec<BetRecord>) -> Result<T>) -> Result<T> {
        let mut current = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let _file_lock = self.store.as_ref().map(LedgerStore::lock).transpose()?;

        let mut working = match &self.store {
            Some(store) => store.load()?,
            None => current.clone(),
        };

        let out = op(&mut working)?;

        if let Some(store) = &self.store {
            store.save(&working)?;
        }
        debug!(bets = working.len(), "Ledger write committed");
        *current = working;
        Ok(out)
    }
}
