//! Replaying settled bets: bankroll curves, losing streaks and staking risk.

pub mod historical;
pub mod results;
pub mod simulator;
pub mod streaks;

pub use results::{BankrollTracker, SimulationSummary};
pub use simulator::{BankrollSimulator, BankrollState, BankrollStep, DailyBankroll};
pub use streaks::{
    BucketReport, ConfidenceBuckets, LosingStreak, SettledPick, StreakAnalyzer,
};
