//! Review Queue Policy
//!
//! Chooses which cards a session presents and in what order.
//!
//! Eligible: not suspended, and either New or due at `now`.
//! Order: Review-state cards first, then ascending due, then id.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::fsrs::LearningState;
use crate::memory::Card;

/// Batch size used by playlist-style sessions that page through the queue
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Selection predicate
pub fn is_eligible(card: &Card, now: DateTime<Utc>) -> bool {
    card.is_available(now)
}

/// Total order over eligible cards
pub fn queue_order(a: &Card, b: &Card) -> Ordering {
    let rank = |card: &Card| u8::from(card.fsrs.state != LearningState::Review);

    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.fsrs.due.cmp(&b.fsrs.due))
        .then_with(|| a.id.cmp(&b.id))
}

/// Select one window of the review queue
pub fn select_for_review<I>(cards: I, now: DateTime<Utc>, limit: usize, offset: usize) -> Vec<Card>
where
    I: IntoIterator<Item = Card>,
{
    let mut eligible: Vec<Card> = cards
        .into_iter()
        .filter(|card| is_eligible(card, now))
        .collect();
    eligible.sort_by(queue_order);

    eligible.into_iter().skip(offset).take(limit).collect()
}
