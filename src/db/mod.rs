pub mod ledger;
pub mod store;

pub use ledger::{BetRecord, BetResult, BettingLedger, LedgerQuery, Outcome};
pub use store::{LedgerStore, LockSettings};
