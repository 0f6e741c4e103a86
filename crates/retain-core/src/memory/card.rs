//! Card - The fundamental unit of review
//!
//! Each card carries:
//! - Opaque learnable content (prompt, mnemonic, example sentences)
//! - FSRS scheduling state
//! - Leech and suspension flags
//! - An optimistic-concurrency version

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fsrs::{FSRSState, LearningState};

// ============================================================================
// CARD
// ============================================================================

/// A learnable item with its scheduling state
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// The item being learned (word, phrase, question)
    pub content: String,
    /// Memory aid shown alongside the content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
    /// Example sentences
    #[serde(default)]
    pub examples: Vec<String>,

    // ========== FSRS State ==========
    #[serde(flatten)]
    pub fsrs: FSRSState,

    // ========== Leech Handling ==========
    /// Failed often enough to be pulled from the queue for remediation
    pub is_leech: bool,
    /// Excluded from the review queue
    pub is_suspended: bool,

    // ========== Bookkeeping ==========
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented by every persisted write
    pub version: i64,
}

impl Card {
    /// Create a new, never-reviewed card that is immediately available
    pub fn new(content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            mnemonic: None,
            examples: vec![],
            fsrs: FSRSState::new_at(now),
            is_leech: false,
            is_suspended: false,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn state(&self) -> LearningState {
        self.fsrs.state
    }

    pub fn is_new(&self) -> bool {
        self.fsrs.state == LearningState::New
    }

    /// Whether the card may appear in a review session at `now`
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        !self.is_suspended && (self.is_new() || self.fsrs.is_due(now))
    }

    /// Share of reviews that were lapses (0.0 for unreviewed cards)
    pub fn failure_rate(&self) -> f64 {
        if self.fsrs.reps <= 0 {
            0.0
        } else {
            self.fsrs.lapses as f64 / self.fsrs.reps as f64
        }
    }
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Input for adding a card to the learning pool
///
/// Uses `deny_unknown_fields` so malformed imports fail loudly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewCard {
    pub content: String,
    #[serde(default)]
    pub mnemonic: Option<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl NewCard {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Materialize the card at `now`
    pub fn into_card(self, now: DateTime<Utc>) -> Card {
        let mut card = Card::new(self.content, now);
        card.mnemonic = self.mnemonic;
        card.examples = self.examples;
        card
    }
}

// ============================================================================
// TESTS
// ============================================================================
