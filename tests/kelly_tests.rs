//! Property tests for odds conversion, expected value, Kelly sizing and
//! the ledger's day replacement.

use chrono::NaiveDate;
use proptest::prelude::*;

use courtside_edge::db::ledger::{BetRecord, BettingLedger};
use courtside_edge::risk::ev::{break_even_probability, expected_value};
use courtside_edge::risk::kelly::{kelly_fraction, FULL_KELLY, HALF_KELLY};
use courtside_edge::risk::odds::{american_to_decimal, decimal_to_american, AmericanOdds};

fn valid_odds() -> impl Strategy<Value = i32> {
    prop_oneof![-10_000i32..=-100, 100i32..=10_000]
}

fn odds(value: i32) -> AmericanOdds {
    AmericanOdds::new(value).unwrap()
}

// ── Odds conversion ─────────────────────────────────────────

proptest! {
    /// Longer odds never pay less.
    #[test]
    fn decimal_odds_monotonic(a in valid_odds(), b in valid_odds()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let (d_lo, d_hi) = (american_to_decimal(lo).unwrap(), american_to_decimal(hi).unwrap());
        prop_assert!(d_lo <= d_hi, "{lo} -> {d_lo} but {hi} -> {d_hi}");
        prop_assert!(d_lo >= 1.01 - 1e-12);
    }

    /// Whole American odds survive a round trip through decimal odds.
    /// `-100` is excluded: it is even money and comes back as `+100`.
    #[test]
    fn american_decimal_round_trip(o in prop_oneof![-10_000i32..=-101, 100i32..=10_000]) {
        let back = decimal_to_american(american_to_decimal(o).unwrap()).unwrap();
        prop_assert_eq!(back.value(), o);
    }

    #[test]
    fn invalid_odds_rejected(o in -99i32..=99) {
        prop_assert!(american_to_decimal(o).is_err());
    }
}

// ── Expected value ──────────────────────────────────────────

proptest! {
    /// At the break-even probability the bet is worth nothing.
    #[test]
    fn break_even_has_zero_ev(o in valid_odds()) {
        let p = break_even_probability(odds(o));
        let ev = expected_value(p, odds(o)).unwrap();
        prop_assert!(ev.abs() < 1e-9, "odds {o}: ev {ev} at p {p}");
    }

    /// EV rises with probability for fixed odds.
    #[test]
    fn ev_increases_with_probability(o in valid_odds(), p in 0.0f64..0.9, dp in 0.01f64..0.1) {
        let low = expected_value(p, odds(o)).unwrap();
        let high = expected_value(p + dp, odds(o)).unwrap();
        prop_assert!(high > low);
    }
}

// ── Kelly sizing ────────────────────────────────────────────

proptest! {
    /// Half Kelly is exactly half of full Kelly, including the clamp.
    #[test]
    fn half_kelly_is_half(o in valid_odds(), p in 0.0f64..=1.0) {
        let full = kelly_fraction(odds(o), p, FULL_KELLY).unwrap();
        let half = kelly_fraction(odds(o), p, HALF_KELLY).unwrap();
        prop_assert_eq!(half, full / 2.0);
    }

    #[test]
    fn full_kelly_within_bankroll(o in valid_odds(), p in 0.0f64..=1.0) {
        let full = kelly_fraction(odds(o), p, FULL_KELLY).unwrap();
        prop_assert!(full >= 0.0);
        prop_assert!(full <= 100.0 + 1e-9);
    }

    /// Kelly is positive exactly when the probability beats break-even.
    #[test]
    fn kelly_edge_matches_ev_sign(o in valid_odds(), p in 0.0f64..=1.0) {
        let ev = expected_value(p, odds(o)).unwrap();
        let kelly = kelly_fraction(odds(o), p, FULL_KELLY).unwrap();
        if ev > 1e-9 {
            prop_assert!(kelly > 0.0);
        }
        if ev < -1e-9 {
            prop_assert_eq!(kelly, 0.0);
        }
    }
}

// ── Ledger ──────────────────────────────────────────────────

fn day_records(date: NaiveDate) -> impl Strategy<Value = Vec<BetRecord>> {
    prop::collection::vec((0usize..6, valid_odds(), 0.0f64..60.0), 0..8).prop_map(move |rows| {
        rows.into_iter()
            .map(|(team, o, kelly)| {
                BetRecord::pending(date, format!("Team {team}"), odds(o), kelly, "default")
            })
            .collect()
    })
}

proptest! {
    /// Replacing a day twice with the same records equals replacing once.
    #[test]
    fn replace_day_idempotent(records in day_records(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())) {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let other = BetRecord::pending(
            NaiveDate::from_ymd_opt(2025, 1, 14).unwrap(),
            "Team 9",
            odds(120),
            5.0,
            "default",
        );

        let once = BettingLedger::from_records(vec![other.clone()]);
        once.replace_day(date, records.clone()).unwrap();

        let twice = BettingLedger::from_records(vec![other]);
        twice.replace_day(date, records.clone()).unwrap();
        twice.replace_day(date, records.clone()).unwrap();

        prop_assert_eq!(once.snapshot(), twice.snapshot());
        prop_assert_eq!(twice.len(), records.len() + 1);
    }
}
