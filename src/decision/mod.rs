//! Betting decisions: per-side admission control and run summaries.

pub mod engine;
pub mod summary;

pub use engine::{BettingDecisionEngine, DecisionRun, MatchupDecision, Recommendation, SkippedSide};
pub use summary::{DecisionReport, DecisionSummary};
