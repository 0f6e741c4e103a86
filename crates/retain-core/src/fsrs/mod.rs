//! FSRS (Free Spaced Repetition Scheduler) Module
//!
//! FSRS v4 with 17 weights. Memory is modelled by two variables:
//! - Stability (S): days until recall probability falls to 90%
//! - Difficulty (D): intrinsic hardness on a 1-10 scale, mean-reverting
//!
//! Reference: https://github.com/open-spaced-repetition/fsrs4anki
//!
//! ## Core Formulas:
//! - Retrievability: R = (1 + t / (9 * S))^-1
//! - Interval: I = S * 9 * (1/R_target - 1), clamped to [1, maximum_interval]

mod algorithm;
mod scheduler;

pub use algorithm::{
    clamp_difficulty,
    days_between,
    initial_difficulty,
    initial_stability,
    next_difficulty,
    next_forget_stability,
    next_interval,
    next_recall_stability,
    // Core functions
    retrievability,
    DEFAULT_MAXIMUM_INTERVAL,
    DEFAULT_RETENTION,
    // Constants
    FSRS4_WEIGHTS,
    MAX_DIFFICULTY,
    MIN_DIFFICULTY,
    MIN_STABILITY,
};

pub use scheduler::{
    FSRSParameters, FSRSScheduler, FSRSState, InvalidRating, LearningState, PreviewResults,
    Rating, RatingMap, ReviewLog, SchedulingInfo,
};
