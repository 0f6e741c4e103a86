//! FSRS Scheduler
//!
//! Maps (current state, rating, now) to the next state plus the review log
//! entry for that review. The scheduler holds only immutable parameters, so
//! every call is a pure function of its inputs.

use std::ops::{Index, IndexMut};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::algorithm::{
    days_between, initial_difficulty, initial_stability, next_difficulty, next_forget_stability,
    next_interval, next_recall_stability, retrievability, DEFAULT_MAXIMUM_INTERVAL,
    DEFAULT_RETENTION, FSRS4_WEIGHTS,
};

// ============================================================================
// RATING
// ============================================================================

/// Recall quality reported by the user for one review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    /// Forgot the item
    Again = 1,
    /// Recalled with serious difficulty
    Hard = 2,
    /// Recalled after some hesitation
    Good = 3,
    /// Perfect recall
    Easy = 4,
}

/// A rating value outside 1..=4 was supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid rating: {0} (expected 1=Again, 2=Hard, 3=Good, 4=Easy)")]
pub struct InvalidRating(pub i32);

impl Rating {
    /// All ratings in ascending order
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// Parse the external 1-4 encoding
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Rating::Again),
            2 => Some(Rating::Hard),
            3 => Some(Rating::Good),
            4 => Some(Rating::Easy),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub(crate) fn as_f64(self) -> f64 {
        self as i32 as f64
    }

    /// Zero-based position (Again = 0 .. Easy = 3)
    pub fn index(self) -> usize {
        self as usize - 1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Again => "again",
            Rating::Hard => "hard",
            Rating::Good => "good",
            Rating::Easy => "easy",
        }
    }

    /// Whether this rating counts as a failed recall
    pub fn is_lapse(self) -> bool {
        self == Rating::Again
    }
}

impl TryFrom<i32> for Rating {
    type Error = InvalidRating;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Rating::from_i32(value).ok_or(InvalidRating(value))
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rating::Again => write!(f, "Again"),
            Rating::Hard => write!(f, "Hard"),
            Rating::Good => write!(f, "Good"),
            Rating::Easy => write!(f, "Easy"),
        }
    }
}

// ============================================================================
// RATING MAP
// ============================================================================

/// Fixed-size map with exactly one value per [`Rating`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingMap<T> {
    values: [T; 4],
}

impl<T> RatingMap<T> {
    /// Build a map by calling `f` once for every rating
    pub fn from_fn(mut f: impl FnMut(Rating) -> T) -> Self {
        Self {
            values: Rating::ALL.map(&mut f),
        }
    }

    pub fn get(&self, rating: Rating) -> &T {
        &self.values[rating.index()]
    }

    /// Iterate `(rating, value)` pairs from Again to Easy
    pub fn iter(&self) -> impl Iterator<Item = (Rating, &T)> {
        Rating::ALL.into_iter().zip(self.values.iter())
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> RatingMap<U> {
        RatingMap {
            values: self.values.map(f),
        }
    }

    /// Take ownership of the value for one rating, dropping the rest
    pub fn into_value(self, rating: Rating) -> T {
        let [again, hard, good, easy] = self.values;
        match rating {
            Rating::Again => again,
            Rating::Hard => hard,
            Rating::Good => good,
            Rating::Easy => easy,
        }
    }
}

impl<T> Index<Rating> for RatingMap<T> {
    type Output = T;

    fn index(&self, rating: Rating) -> &T {
        self.get(rating)
    }
}

impl<T> IndexMut<Rating> for RatingMap<T> {
    fn index_mut(&mut self, rating: Rating) -> &mut T {
        &mut self.values[rating.index()]
    }
}

// ============================================================================
// LEARNING STATE
// ============================================================================

/// Position of a card in the learning state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningState {
    /// Never reviewed
    #[default]
    New,
    /// First steps after introduction
    Learning,
    /// Graduated; scheduled by stability
    Review,
    /// Lapsed from Review, being relearned
    Relearning,
}

impl LearningState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningState::New => "new",
            LearningState::Learning => "learning",
            LearningState::Review => "review",
            LearningState::Relearning => "relearning",
        }
    }

    /// Parse from the storage representation
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "new" => Some(LearningState::New),
            "learning" => Some(LearningState::Learning),
            "review" => Some(LearningState::Review),
            "relearning" => Some(LearningState::Relearning),
            _ => None,
        }
    }
}

impl std::fmt::Display for LearningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PARAMETERS
// ============================================================================

/// Global algorithm parameters, fixed for the lifetime of a scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FSRSParameters {
    /// The 17 model weights
    pub w: [f64; 17],
    /// Target probability of recall when a card comes due
    pub request_retention: f64,
    /// Longest interval the scheduler will assign, in days
    pub maximum_interval: i32,
}

impl Default for FSRSParameters {
    fn default() -> Self {
        Self {
            w: FSRS4_WEIGHTS,
            request_retention: DEFAULT_RETENTION,
            maximum_interval: DEFAULT_MAXIMUM_INTERVAL,
        }
    }
}

impl FSRSParameters {
    /// Check the parameters are usable; returns a description of the first problem
    pub fn validate(&self) -> Result<(), String> {
        if let Some((i, w)) = self.w.iter().enumerate().find(|(_, w)| !w.is_finite()) {
            return Err(format!("weight w[{}] is not finite: {}", i, w));
        }
        if !(self.request_retention > 0.0 && self.request_retention < 1.0) {
            return Err(format!(
                "request retention must be in (0, 1), got {}",
                self.request_retention
            ));
        }
        if !(1..=DEFAULT_MAXIMUM_INTERVAL).contains(&self.maximum_interval) {
            return Err(format!(
                "maximum interval must be between 1 and {} days, got {}",
                DEFAULT_MAXIMUM_INTERVAL, self.maximum_interval
            ));
        }
        Ok(())
    }
}

// ============================================================================
// STATE & LOG
// ============================================================================

/// Scheduling state of a single card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FSRSState {
    /// Days until recall probability decays to ~90%
    pub stability: f64,
    /// Intrinsic difficulty, 1 (easy) to 10 (hard)
    pub difficulty: f64,
    /// Days since the previous review, as of the last scheduling
    pub elapsed_days: i32,
    /// Interval assigned at the last scheduling
    pub scheduled_days: i32,
    /// Total reviews
    pub reps: i32,
    /// Total Again ratings
    pub lapses: i32,
    pub state: LearningState,
    /// Next review instant
    pub due: DateTime<Utc>,
    /// Instant of the most recent review
    pub last_review: Option<DateTime<Utc>>,
}

impl FSRSState {
    /// Fresh state for a card entering the pool at `now`
    pub fn new_at(now: DateTime<Utc>) -> Self {
        Self {
            stability: 0.0,
            difficulty: 0.0,
            elapsed_days: 0,
            scheduled_days: 0,
            reps: 0,
            lapses: 0,
            state: LearningState::New,
            due: now,
            last_review: None,
        }
    }

    /// Whether the card is due at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }
}

/// Record of one review event, as produced by the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLog {
    pub rating: Rating,
    /// Interval assigned by this review
    pub scheduled_days: i32,
    /// Days since the previous review
    pub elapsed_days: i32,
    /// State of the card before this review
    pub state: LearningState,
    /// When the review happened
    pub review: DateTime<Utc>,
}

/// Result of scheduling one rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingInfo {
    pub state: FSRSState,
    pub log: ReviewLog,
}

/// Outcomes for all four ratings
pub type PreviewResults = RatingMap<SchedulingInfo>;

// ============================================================================
// SCHEDULER
// ============================================================================

/// FSRS v4 scheduler
#[derive(Debug, Clone, Default)]
pub struct FSRSScheduler {
    params: FSRSParameters,
}

impl FSRSScheduler {
    pub fn new(params: FSRSParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FSRSParameters {
        &self.params
    }

    /// Schedule every rating for `current` at `now`
    pub fn schedule(&self, current: &FSRSState, now: DateTime<Utc>) -> PreviewResults {
        RatingMap::from_fn(|rating| self.review(current, rating, now))
    }

    /// Predicted `scheduled_days` for every rating
    pub fn preview_intervals(&self, current: &FSRSState, now: DateTime<Utc>) -> RatingMap<i32> {
        self.schedule(current, now)
            .map(|info| info.state.scheduled_days)
    }

    /// Whole days since the last review, 0 for never-reviewed cards
    pub fn days_since_review(&self, last_review: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i32 {
        last_review.map_or(0, |last| days_between(last, now))
    }

    /// Schedule a single rating
    pub fn review(&self, current: &FSRSState, rating: Rating, now: DateTime<Utc>) -> SchedulingInfo {
        let w = &self.params.w;
        let elapsed_days = self.days_since_review(current.last_review, now);

        let (stability, difficulty, state, scheduled_days) = match current.state {
            LearningState::New => {
                let state = if rating.is_lapse() {
                    LearningState::Learning
                } else {
                    LearningState::Review
                };
                (
                    initial_stability(w, rating),
                    initial_difficulty(w, rating),
                    state,
                    0,
                )
            }
            LearningState::Learning | LearningState::Relearning => match rating {
                Rating::Good | Rating::Easy => (
                    current.stability,
                    current.difficulty,
                    LearningState::Review,
                    self.interval_for(current.stability),
                ),
                Rating::Again | Rating::Hard => {
                    (current.stability, current.difficulty, current.state, 0)
                }
            },
            LearningState::Review => {
                let r = retrievability(elapsed_days as f64, current.stability);
                let difficulty = next_difficulty(w, current.difficulty, rating);

                if rating.is_lapse() {
                    let stability =
                        next_forget_stability(w, current.difficulty, current.stability, r);
                    (stability, difficulty, LearningState::Relearning, 0)
                } else {
                    let stability =
                        next_recall_stability(w, current.difficulty, current.stability, r, rating);
                    (
                        stability,
                        difficulty,
                        LearningState::Review,
                        self.interval_for(stability),
                    )
                }
            }
        };

        let scheduled_days = if state == LearningState::Review {
            scheduled_days.max(1)
        } else {
            scheduled_days
        };

        let lapses = if rating.is_lapse() {
            current.lapses.saturating_add(1)
        } else {
            current.lapses
        };

        let next = FSRSState {
            stability,
            difficulty,
            elapsed_days,
            scheduled_days,
            reps: current.reps.saturating_add(1),
            lapses,
            state,
            due: now
                .checked_add_signed(Duration::days(i64::from(scheduled_days)))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            last_review: Some(now),
        };

        SchedulingInfo {
            log: ReviewLog {
                rating,
                scheduled_days,
                elapsed_days,
                state: current.state,
                review: now,
            },
            state: next,
        }
    }

    fn interval_for(&self, stability: f64) -> i32 {
        next_interval(
            stability,
            self.params.request_retention,
            self.params.maximum_interval,
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
