//! American/decimal odds conversion.
//!
//! American odds are signed integers: `+150` pays 150 profit per 100 staked,
//! `-200` needs 200 staked to profit 100. Decimal odds are the total payout
//! multiple of the stake, so they are always greater than 1.0.
//!
//! Conversions keep full `f64` precision. Rounding belongs at presentation
//! boundaries only (see [`round_for_display`]).

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BettingError, Result};

/// Validated American odds: `>= 100` or `<= -100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct AmericanOdds(i32);

impl AmericanOdds {
    pub fn new(value: i32) -> Result<Self> {
        if value >= 100 || value <= -100 {
            Ok(Self(value))
        } else {
            Err(BettingError::InvalidOdds(value))
        }
    }

    pub fn value(self) -> i32 {
        self.0
    }

    pub fn is_underdog(self) -> bool {
        self.0 > 0
    }

    /// Decimal odds (stake included).
    pub fn to_decimal(self) -> f64 {
        self.profit_multiplier() + 1.0
    }

    /// Net profit per unit staked on a win (decimal odds minus one).
    pub fn profit_multiplier(self) -> f64 {
        if self.0 > 0 {
            f64::from(self.0) / 100.0
        } else {
            100.0 / f64::from(self.0.unsigned_abs())
        }
    }

    /// Exact profit multiplier for bankroll arithmetic.
    pub fn profit_multiplier_decimal(self) -> Decimal {
        let hundred = Decimal::ONE_HUNDRED;
        if self.0 > 0 {
            Decimal::from(self.0) / hundred
        } else {
            hundred / Decimal::from(self.0.unsigned_abs())
        }
    }
}

impl TryFrom<i32> for AmericanOdds {
    type Error = BettingError;

    fn try_from(value: i32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AmericanOdds> for i32 {
    fn from(odds: AmericanOdds) -> Self {
        odds.0
    }
}

impl fmt::Display for AmericanOdds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 > 0 {
            write!(f, "+{}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Convert raw American odds to decimal odds.
///
/// Fails with [`BettingError::InvalidOdds`] for values in `(-100, 100)`,
/// which includes zero.
pub fn american_to_decimal(american_odds: i32) -> Result<f64> {
    AmericanOdds::new(american_odds).map(AmericanOdds::to_decimal)
}

/// Convert decimal odds back to the nearest whole American odds.
///
/// Decimal odds of exactly 2.0 map to `+100` (even money).
pub fn decimal_to_american(decimal_odds: f64) -> Result<AmericanOdds> {
    if !decimal_odds.is_finite() || decimal_odds <= 1.0 {
        return Err(BettingError::InvalidDecimalOdds(decimal_odds));
    }

    let profit = decimal_odds - 1.0;
    let american = if decimal_odds >= 2.0 {
        (profit * 100.0).round()
    } else {
        (-100.0 / profit).round()
    };

    if american > f64::from(i32::MAX) || american < f64::from(i32::MIN) {
        return Err(BettingError::InvalidDecimalOdds(decimal_odds));
    }

    AmericanOdds::new(american as i32)
}

/// Round for display only. Never feed the result back into a calculation.
pub fn round_for_display(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}
