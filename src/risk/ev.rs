//! Expected value of a moneyline bet.

use crate::error::{BettingError, Result};
use crate::risk::odds::AmericanOdds;

/// Reject NaN and anything outside `[0, 1]`.
pub fn validate_probability(probability: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&probability) {
        Ok(probability)
    } else {
        Err(BettingError::InvalidProbability(probability))
    }
}

/// Expected profit per unit staked.
///
/// ```text
/// ev = p * (decimal - 1) - (1 - p)
/// ```
///
/// Ranges over `(-1, +inf)`; positive means the bet is favorable.
pub fn expected_value(probability: f64, odds: AmericanOdds) -> Result<f64> {
    let p = validate_probability(probability)?;
    Ok(p * odds.profit_multiplier() - (1.0 - p))
}

/// Win probability at which the bet breaks even: `1 / decimal`.
pub fn break_even_probability(odds: AmericanOdds) -> f64 {
    1.0 / odds.to_decimal()
}
