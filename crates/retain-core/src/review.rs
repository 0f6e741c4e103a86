//! Review Orchestrator
//!
//! Runs one review end to end: rating validation, scheduling, leech
//! classification and the atomic commit of card + log. Commits are
//! optimistic; a stale write reloads the card and replays the whole step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::fsrs::{FSRSScheduler, InvalidRating, PreviewResults, Rating, RatingMap, ReviewLog};
use crate::leech::{self, FixLeech, LeechPolicy};
use crate::memory::Card;
use crate::storage::{CardStore, StorageError};

// ============================================================================
// TYPES
// ============================================================================

/// Review error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error(transparent)]
    InvalidRating(#[from] InvalidRating),
    /// Every commit attempt lost to a concurrent writer
    #[error("Card {id} kept changing underneath the review; gave up after {attempts} attempts")]
    StaleCardWrite { id: String, attempts: u32 },
    #[error("Card not found: {0}")]
    MissingCard(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result of a single review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    /// The card after the review
    pub card: Card,
    pub log: ReviewLog,
    /// The card was flagged (and suspended) by this review
    pub became_leech: bool,
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Drives reviews and leech remediation against a [`CardStore`]
pub struct ReviewOrchestrator<S: CardStore> {
    store: S,
    scheduler: FSRSScheduler,
    leech: LeechPolicy,
    max_commit_attempts: u32,
}

impl<S: CardStore> ReviewOrchestrator<S> {
    pub fn new(store: S, config: &EngineConfig) -> Self {
        Self {
            store,
            scheduler: FSRSScheduler::new(config.parameters.clone()),
            leech: config.leech,
            max_commit_attempts: config.max_commit_attempts.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scheduler(&self) -> &FSRSScheduler {
        &self.scheduler
    }

    /// Apply a rating to a card without touching the store
    pub fn evaluate(&self, card: &Card, rating: Rating, now: DateTime<Utc>) -> ReviewOutcome {
        let info = self.scheduler.review(&card.fsrs, rating, now);

        let mut next = card.clone();
        next.fsrs = info.state;
        next.updated_at = now;

        let became_leech = self.leech.inspect(&mut next, rating);

        tracing::debug!(
            card_id = %card.id,
            %rating,
            from = %card.fsrs.state,
            to = %next.fsrs.state,
            scheduled_days = next.fsrs.scheduled_days,
            became_leech,
            "Review evaluated"
        );

        ReviewOutcome {
            card: next,
            log: info.log,
            became_leech,
        }
    }

    /// Record a review for `card_id` with the external 1-4 rating
    pub fn process_result(
        &self,
        card_id: &str,
        rating: i32,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, ReviewError> {
        let rating = Rating::try_from(rating)?;

        let outcome = self.commit_with_retry(card_id, |card| {
            let outcome = self.evaluate(&card, rating, now);
            let stored = self.store.commit_review(&outcome.card, &outcome.log)?;
            Ok(ReviewOutcome {
                card: stored,
                ..outcome
            })
        })?;

        tracing::info!(
            card_id,
            %rating,
            state = %outcome.card.fsrs.state,
            scheduled_days = outcome.card.fsrs.scheduled_days,
            "Review committed"
        );
        if outcome.became_leech {
            tracing::info!(
                card_id,
                lapses = outcome.card.fsrs.lapses,
                reps = outcome.card.fsrs.reps,
                "Card suspended as leech"
            );
        }

        Ok(outcome)
    }

    /// Interval each rating would produce
    pub fn predict_intervals(&self, card: &Card, now: DateTime<Utc>) -> RatingMap<i32> {
        self.scheduler.preview_intervals(&card.fsrs, now)
    }

    /// Full scheduling outcome of each rating for a stored card
    pub fn preview(&self, card_id: &str, now: DateTime<Utc>) -> Result<PreviewResults, ReviewError> {
        let card = self.load(card_id)?;
        Ok(self.scheduler.schedule(&card.fsrs, now))
    }

    pub fn fix_leech(&self, card_id: &str, fix: FixLeech) -> Result<Card, ReviewError> {
        let card = self.commit_with_retry(card_id, |card| {
            self.store.save_card(&leech::fix_leech(&card, fix.clone()))
        })?;
        tracing::info!(card_id, "Leech fixed");
        Ok(card)
    }

    pub fn suspend_forever(&self, card_id: &str) -> Result<Card, ReviewError> {
        let card = self.commit_with_retry(card_id, |card| {
            self.store.save_card(&leech::suspend_forever(&card))
        })?;
        tracing::info!(card_id, "Card suspended");
        Ok(card)
    }

    pub fn unsuspend(&self, card_id: &str) -> Result<Card, ReviewError> {
        let card = self.commit_with_retry(card_id, |card| {
            self.store.save_card(&leech::unsuspend(&card))
        })?;
        tracing::info!(card_id, "Card unsuspended");
        Ok(card)
    }

    /// One window of the review queue
    pub fn due_cards(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Card>, ReviewError> {
        Ok(self.store.fetch_due_and_new(now, limit, offset)?)
    }

    pub fn leeches(&self) -> Result<Vec<Card>, ReviewError> {
        Ok(self.store.list_leeches()?)
    }

    fn load(&self, card_id: &str) -> Result<Card, ReviewError> {
        self.store
            .load_card(card_id)?
            .ok_or_else(|| ReviewError::MissingCard(card_id.to_string()))
    }

    /// Load, transform and write a card, reloading on stale writes
    fn commit_with_retry<T, F>(&self, card_id: &str, mut step: F) -> Result<T, ReviewError>
    where
        F: FnMut(Card) -> Result<T, StorageError>,
    {
        for attempt in 1..=self.max_commit_attempts {
            let card = self.load(card_id)?;

            match step(card) {
                Ok(value) => return Ok(value),
                Err(StorageError::StaleWrite {
                    expected, found, ..
                }) => {
                    tracing::warn!(
                        card_id,
                        attempt,
                        expected,
                        found,
                        "Stale card write, retrying against fresh state"
                    );
                }
                Err(StorageError::NotFound(id)) => return Err(ReviewError::MissingCard(id)),
                Err(e) => return Err(e.into()),
            }
        }

        Err(ReviewError::StaleCardWrite {
            id: card_id.to_string(),
            attempts: self.max_commit_attempts,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
