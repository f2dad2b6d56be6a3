//! Bankroll result tracking and analysis.
//!
//! Tracks running bankroll, peak, max drawdown, win rate and profit factor
//! across a replay of settled bets.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::fmt;

use crate::error::{BettingError, Result};

const PROFIT_FACTOR_CAP: Decimal = dec!(999.99);

/// Aggregated results from a bankroll replay. Rates are percentages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub settled_bets: u64,
    pub wins: u64,
    pub losses: u64,
    pub win_rate: Decimal,
    pub initial_bankroll: Decimal,
    pub final_bankroll: Decimal,
    pub peak_bankroll: Decimal,
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
    pub total_pnl: Decimal,
    pub roi_pct: Decimal,
    pub profit_factor: Decimal,
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "=== Bankroll Simulation ===\n\
             Bets: {} ({}W / {}L, {:.1}% win rate)\n\
             Bankroll: {:.0} -> {:.0} (P&L {:.0}, ROI {:.1}%)\n\
             Peak: {:.0} | Max Drawdown: {:.0} ({:.1}%)\n\
             Profit Factor: {:.2}",
            self.settled_bets,
            self.wins,
            self.losses,
            self.win_rate,
            self.initial_bankroll,
            self.final_bankroll,
            self.total_pnl,
            self.roi_pct,
            self.peak_bankroll,
            self.max_drawdown,
            self.max_drawdown_pct,
            self.profit_factor,
        )
    }
}

/// Tracks running state during a replay.
#[derive(Debug, Clone)]
pub struct BankrollTracker {
    initial_bankroll: Decimal,
    bankroll: Decimal,
    peak_bankroll: Decimal,
    max_drawdown: Decimal,
    max_drawdown_pct: Decimal,
    wins: u64,
    losses: u64,
    gross_profit: Decimal,
    gross_loss: Decimal,
}

impl BankrollTracker {
    pub fn new(initial_bankroll: Decimal) -> Self {
        Self {
            initial_bankroll,
            bankroll: initial_bankroll,
            peak_bankroll: initial_bankroll,
            max_drawdown: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            wins: 0,
            losses: 0,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
        }
    }

    /// Apply a winning bet. On overflow the tracker is left unchanged.
    pub fn record_win(&mut self, profit: Decimal) -> Result<()> {
        let gross_profit = self
            .gross_profit
            .checked_add(profit)
            .ok_or(BettingError::BankrollOverflow)?;
        let bankroll = self
            .bankroll
            .checked_add(profit)
            .ok_or(BettingError::BankrollOverflow)?;

        self.wins += 1;
        self.gross_profit = gross_profit;
        self.apply(bankroll);
        Ok(())
    }

    /// Apply a losing bet. On overflow the tracker is left unchanged.
    pub fn record_loss(&mut self, stake: Decimal) -> Result<()> {
        let gross_loss = self
            .gross_loss
            .checked_add(stake)
            .ok_or(BettingError::BankrollOverflow)?;
        let bankroll = self
            .bankroll
            .checked_sub(stake)
            .ok_or(BettingError::BankrollOverflow)?;

        self.losses += 1;
        self.gross_loss = gross_loss;
        self.apply(bankroll);
        Ok(())
    }

    fn apply(&mut self, bankroll: Decimal) {
        self.bankroll = bankroll;

        if self.bankroll > self.peak_bankroll {
            self.peak_bankroll = self.bankroll;
        }
        let drawdown = self.peak_bankroll - self.bankroll;
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
        if self.peak_bankroll > Decimal::ZERO {
            let pct = drawdown / self.peak_bankroll * dec!(100);
            if pct > self.max_drawdown_pct {
                self.max_drawdown_pct = pct;
            }
        }
    }

    pub fn bankroll(&self) -> Decimal {
        self.bankroll
    }

    pub fn initial_bankroll(&self) -> Decimal {
        self.initial_bankroll
    }

    /// Cumulative return on the initial bankroll, in percent.
    pub fn profit_rate(&self) -> Result<Decimal> {
        profit_rate(self.initial_bankroll, self.bankroll)
    }

    pub fn finalize(&self) -> Result<SimulationSummary> {
        let settled_bets = self.wins + self.losses;

        let profit_factor = if self.gross_loss > Decimal::ZERO {
            self.gross_profit
                .checked_div(self.gross_loss)
                .unwrap_or(PROFIT_FACTOR_CAP)
        } else if self.gross_profit > Decimal::ZERO {
            PROFIT_FACTOR_CAP // No losses
        } else {
            Decimal::ZERO
        };

        Ok(SimulationSummary {
            settled_bets,
            wins: self.wins,
            losses: self.losses,
            win_rate: win_rate_pct(self.wins, self.losses),
            initial_bankroll: self.initial_bankroll,
            final_bankroll: self.bankroll,
            peak_bankroll: self.peak_bankroll,
            max_drawdown: self.max_drawdown,
            max_drawdown_pct: self.max_drawdown_pct,
            total_pnl: self
                .bankroll
                .checked_sub(self.initial_bankroll)
                .ok_or(BettingError::BankrollOverflow)?,
            roi_pct: self.profit_rate()?,
            profit_factor,
        })
    }
}

/// `(current - initial) / initial * 100`; zero for a non-positive initial.
pub fn profit_rate(initial: Decimal, current: Decimal) -> Result<Decimal> {
    if initial <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    current
        .checked_sub(initial)
        .and_then(|gain| gain.checked_div(initial))
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .ok_or(BettingError::BankrollOverflow)
}

/// Wins as a percentage of settled bets; zero when nothing settled.
pub fn win_rate_pct(wins: u64, losses: u64) -> Decimal {
    let total = wins + losses;
    if total == 0 {
        Decimal::ZERO
    } else {
        Decimal::from(wins) / Decimal::from(total) * dec!(100)
    }
}
