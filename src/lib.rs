//! NBA moneyline betting decisions, bet ledger and bankroll simulation.
//!
//! Probabilities and odds come from outside; this crate decides which sides
//! to back, sizes them with Kelly, records them in a ledger, and replays the
//! settled ledger to produce bankroll curves and streak-risk reports.

pub mod backtesting;
pub mod config;
pub mod db;
pub mod decision;
pub mod error;
pub mod market;
pub mod monitoring;
pub mod risk;

pub use error::{BettingError, Result};
