//! FSRS v4 core formulas
//!
//! Pure functions over `f64`. Every function here is total: out-of-range
//! inputs are defended with `clamp`/`min`/`max` rather than reported.

use chrono::{DateTime, Utc};

use super::scheduler::Rating;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default FSRS v4 weights (generic preset)
pub const FSRS4_WEIGHTS: [f64; 17] = [
    0.4, 0.6, 2.4, 5.8, // w0-w3: initial stability per rating
    4.93, 0.94, // w4-w5: initial difficulty
    0.86, 0.01, // w6-w7: difficulty step and mean reversion
    1.49, 0.14, 0.94, // w8-w10: recall stability
    2.18, 0.05, 0.34, 1.26, // w11-w14: forget stability
    0.29, 2.61, // w15-w16: hard penalty, easy bonus
];

/// Default target retention probability
pub const DEFAULT_RETENTION: f64 = 0.9;

/// Default longest interval, in days (100 years)
pub const DEFAULT_MAXIMUM_INTERVAL: i32 = 36500;

pub const MIN_DIFFICULTY: f64 = 1.0;
pub const MAX_DIFFICULTY: f64 = 10.0;

/// Floor applied to pre-review stability before it is used as a divisor
/// or raised to a negative power.
pub const MIN_STABILITY: f64 = 0.01;

/// Forgetting curve scale: R = (1 + t / (FACTOR * S))^-1
const CURVE_FACTOR: f64 = 9.0;

// ============================================================================
// DIFFICULTY
// ============================================================================

/// Clamp a difficulty value into [1, 10]
#[inline]
pub fn clamp_difficulty(d: f64) -> f64 {
    if d.is_nan() {
        return MIN_DIFFICULTY;
    }
    d.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

/// Initial difficulty for a new card: D0 = w4 - w5 * (G - 3)
pub fn initial_difficulty(w: &[f64; 17], rating: Rating) -> f64 {
    clamp_difficulty(w[4] - w[5] * (rating.as_f64() - 3.0))
}

/// Difficulty after a review, with mean reversion toward `w4`
///
/// D' = clamp(D - w6 * (G - 3))
/// D'' = clamp(D' + w7 * (w4 - D'))
pub fn next_difficulty(w: &[f64; 17], difficulty: f64, rating: Rating) -> f64 {
    let stepped = clamp_difficulty(difficulty - w[6] * (rating.as_f64() - 3.0));
    clamp_difficulty(stepped + w[7] * (w[4] - stepped))
}

// ============================================================================
// STABILITY
// ============================================================================

/// Initial stability for a new card: S0 = w[G - 1]
pub fn initial_stability(w: &[f64; 17], rating: Rating) -> f64 {
    w[rating.index()].max(0.0)
}

/// Stability after a successful recall (Hard, Good or Easy)
pub fn next_recall_stability(
    w: &[f64; 17],
    difficulty: f64,
    stability: f64,
    retrievability: f64,
    rating: Rating,
) -> f64 {
    let s = stability.max(MIN_STABILITY);
    let hard_penalty = if rating == Rating::Hard { w[15] } else { 1.0 };
    let easy_bonus = if rating == Rating::Easy { w[16] } else { 1.0 };

    let growth = w[8].exp()
        * (11.0 - difficulty)
        * s.powf(-w[9])
        * ((w[10] * (1.0 - retrievability)).exp() - 1.0)
        * hard_penalty
        * easy_bonus;

    (s * (1.0 + growth)).max(0.0)
}

/// Stability after a lapse; never exceeds the pre-lapse stability
pub fn next_forget_stability(
    w: &[f64; 17],
    difficulty: f64,
    stability: f64,
    retrievability: f64,
) -> f64 {
    let s = stability.max(MIN_STABILITY);
    let forgotten = w[11]
        * difficulty.powf(-w[12])
        * ((s + 1.0).powf(w[13]) - 1.0)
        * (w[14] * (1.0 - retrievability)).exp();

    forgotten.min(s).max(0.0)
}

// ============================================================================
// RETRIEVABILITY & INTERVALS
// ============================================================================

/// Probability of recall after `elapsed_days` given `stability`
///
/// R = (1 + t / (9 * S))^-1
pub fn retrievability(elapsed_days: f64, stability: f64) -> f64 {
    let s = stability.max(MIN_STABILITY);
    let t = elapsed_days.max(0.0);
    (1.0 + t / (CURVE_FACTOR * s)).powi(-1)
}

/// Interval in days that brings recall probability down to `request_retention`
///
/// I = clamp(round(S * 9 * (1/R - 1)), 1, maximum_interval)
pub fn next_interval(stability: f64, request_retention: f64, maximum_interval: i32) -> i32 {
    let raw = stability * CURVE_FACTOR * (1.0 / request_retention - 1.0);
    let upper = maximum_interval.max(1);
    if !raw.is_finite() {
        return if raw.is_nan() { 1 } else { upper };
    }
    (raw.round() as i64).clamp(1, upper as i64) as i32
}

/// Whole days from `from` to `to`; negative spans (clock skew) collapse to 0
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i32 {
    let days = (to - from).num_days();
    days.clamp(0, i32::MAX as i64) as i32
}

// ============================================================================
// TESTS
// ============================================================================
