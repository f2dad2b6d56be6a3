//! Kelly Criterion bet sizing.
//!
//! Computes the fraction of bankroll to stake on a moneyline bet, clamped at
//! zero (we only ever back a side, never fade it) and scaled by an explicit
//! fractional-Kelly multiplier.
//!
//! # Formula
//! ```text
//! b = decimal_odds - 1
//! raw = (b * p - (1 - p)) / b
//! fraction_pct = max(raw, 0) * 100 * scale
//! ```
//!
//! The clamp is applied before scaling. Values are never rounded here; the
//! simulator needs the unrounded stake.

use crate::error::{BettingError, Result};
use crate::risk::ev::validate_probability;
use crate::risk::odds::AmericanOdds;

pub const FULL_KELLY: f64 = 1.0;
pub const HALF_KELLY: f64 = 0.5;

/// Full Kelly sizing for one side of a market.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KellySizing {
    /// Signed Kelly fraction before clamping (negative means no edge).
    pub raw: f64,
    /// `max(raw, 0)` as a percentage of bankroll.
    pub full_pct: f64,
}

impl KellySizing {
    pub fn compute(odds: AmericanOdds, probability: f64) -> Result<Self> {
        Self::from_net_odds(odds.profit_multiplier(), probability)
    }

    /// Sizing from decimal odds, as carried by historical result sheets.
    pub fn from_decimal_odds(decimal_odds: f64, probability: f64) -> Result<Self> {
        if !decimal_odds.is_finite() || decimal_odds <= 1.0 {
            return Err(BettingError::InvalidDecimalOdds(decimal_odds));
        }
        Self::from_net_odds(decimal_odds - 1.0, probability)
    }

    fn from_net_odds(b: f64, probability: f64) -> Result<Self> {
        let p = validate_probability(probability)?;
        let raw = (b * p - (1.0 - p)) / b;

        Ok(Self {
            raw,
            full_pct: raw.max(0.0) * 100.0,
        })
    }

    /// Percentage of bankroll under a fractional-Kelly policy.
    pub fn scaled_pct(&self, scale: f64) -> Result<f64> {
        Ok(self.full_pct * validate_scale(scale)?)
    }

    /// Whether there is any edge to back.
    pub fn has_edge(&self) -> bool {
        self.full_pct > 0.0
    }
}

/// Kelly stake as a percentage of bankroll (0–100), never negative.
///
/// `scale` is 1.0 for full Kelly, 0.5 for half Kelly, or any other
/// non-negative multiplier.
pub fn kelly_fraction(odds: AmericanOdds, probability: f64, scale: f64) -> Result<f64> {
    KellySizing::compute(odds, probability)?.scaled_pct(scale)
}

pub fn validate_scale(scale: f64) -> Result<f64> {
    if scale.is_finite() && scale >= 0.0 {
        Ok(scale)
    } else {
        Err(BettingError::InvalidKellyScale(scale))
    }
}
