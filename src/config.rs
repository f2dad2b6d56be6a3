use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::backtesting::simulator::BankrollSimulator;
use crate::backtesting::streaks::{ConfidenceBuckets, StreakAnalyzer};
use crate::db::ledger::BettingLedger;
use crate::db::store::LockSettings;
use crate::decision::engine::BettingDecisionEngine;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const CONFIG_PATH_VAR: &str = "BETTING_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub decision: DecisionConfig,
    pub simulation: SimulationConfig,
    pub analysis: AnalysisConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    pub path: PathBuf,
    pub lock_timeout_ms: u64,
    pub stale_lock_seconds: u64,
    pub default_user: String,
}

impl LedgerConfig {
    pub fn lock_settings(&self) -> LockSettings {
        LockSettings {
            timeout: Duration::from_millis(self.lock_timeout_ms),
            stale_after: Duration::from_secs(self.stale_lock_seconds),
        }
    }

    pub fn open(&self) -> Result<BettingLedger> {
        BettingLedger::open(&self.path, self.lock_settings())
            .with_context(|| format!("Failed to open ledger {}", self.path.display()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecisionConfig {
    pub half_kelly_scale: f64,
}

impl DecisionConfig {
    pub fn engine(&self) -> Result<BettingDecisionEngine> {
        BettingDecisionEngine::new(self.half_kelly_scale).context("Invalid [decision] config")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    pub initial_bankroll: Decimal,
    pub kelly_scale: f64,
    /// Bankrolls reported by `simulate` when no user is given.
    pub users: Vec<String>,
}

impl SimulationConfig {
    pub fn simulator(&self) -> Result<BankrollSimulator> {
        BankrollSimulator::new(self.initial_bankroll, self.kelly_scale)
            .context("Invalid [simulation] config")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub bucket_boundaries: Vec<f64>,
    pub martingale_initial_bet: Decimal,
    /// One per bucket, lowest confidence first.
    pub martingale_multipliers: Vec<Decimal>,
    pub kelly_bankroll: Decimal,
    pub kelly_scale: f64,
}

impl AnalysisConfig {
    pub fn analyzer(&self) -> Result<StreakAnalyzer> {
        let buckets = ConfidenceBuckets::new(self.bucket_boundaries.clone())
            .context("Invalid [analysis] bucket boundaries")?;
        StreakAnalyzer::new(
            buckets,
            self.martingale_initial_bet,
            self.martingale_multipliers.clone(),
            self.kelly_bankroll,
            self.kelly_scale,
        )
        .context("Invalid [analysis] config")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    #[serde(default)]
    pub json: bool,
}

impl AppConfig {
    /// Load from `$BETTING_CONFIG`, falling back to config/default.toml.
    /// A `.env` file is read first if present.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }
}
