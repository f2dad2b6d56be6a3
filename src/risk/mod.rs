//! Odds conversion, expected value and Kelly sizing.

pub mod ev;
pub mod kelly;
pub mod odds;

pub use ev::{break_even_probability, expected_value, validate_probability};
pub use kelly::{kelly_fraction, KellySizing, FULL_KELLY, HALF_KELLY};
pub use odds::{american_to_decimal, decimal_to_american, round_for_display, AmericanOdds};
