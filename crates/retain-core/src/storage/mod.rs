//! Storage Module
//!
//! The review engine talks to persistence through [`CardStore`]. The
//! bundled implementation is SQLite-based with:
//! - Versioned schema migrations
//! - Optimistic concurrency on card rows
//! - Card update + review log append in one transaction

mod migrations;
mod sqlite;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::fsrs::ReviewLog;
use crate::memory::Card;

pub use migrations::{Migration, MIGRATIONS};
pub use sqlite::{ReviewLogRecord, Result, Storage, StorageError};

/// Persistence contract required by the review orchestrator
///
/// Writes are optimistic: the card passed to [`CardStore::save_card`] or
/// [`CardStore::commit_review`] carries the `version` it was read at, and
/// the write fails with [`StorageError::StaleWrite`] if the stored row has
/// moved on since.
pub trait CardStore {
    /// Eligible cards for a session window, in queue order
    fn fetch_due_and_new(&self, now: DateTime<Utc>, limit: usize, offset: usize)
    -> Result<Vec<Card>>;

    fn load_card(&self, id: &str) -> Result<Option<Card>>;

    /// Persist a card; returns the stored row with its new version
    fn save_card(&self, card: &Card) -> Result<Card>;

    /// Persist the reviewed card and append its log entry atomically
    fn commit_review(&self, card: &Card, log: &ReviewLog) -> Result<Card>;

    /// Flagged leeches, most lapses first
    fn list_leeches(&self) -> Result<Vec<Card>>;
}

impl<T: CardStore + ?Sized> CardStore for &T {
    fn fetch_due_and_new(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Card>> {
        (**self).fetch_due_and_new(now, limit, offset)
    }

    fn load_card(&self, id: &str) -> Result<Option<Card>> {
        (**self).load_card(id)
    }

    fn save_card(&self, card: &Card) -> Result<Card> {
        (**self).save_card(card)
    }

    fn commit_review(&self, card: &Card, log: &ReviewLog) -> Result<Card> {
        (**self).commit_review(card, log)
    }

    fn list_leeches(&self) -> Result<Vec<Card>> {
        (**self).list_leeches()
    }
}

impl<T: CardStore + ?Sized> CardStore for Arc<T> {
    fn fetch_due_and_new(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Card>> {
        (**self).fetch_due_and_new(now, limit, offset)
    }

    fn load_card(&self, id: &str) -> Result<Option<Card>> {
        (**self).load_card(id)
    }

    fn save_card(&self, card: &Card) -> Result<Card> {
        (**self).save_card(card)
    }

    fn commit_review(&self, card: &Card, log: &ReviewLog) -> Result<Card> {
        (**self).commit_review(card, log)
    }

    fn list_leeches(&self) -> Result<Vec<Card>> {
        (**self).list_leeches()
    }
}
