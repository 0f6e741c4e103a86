//! Memory module - Core types and data structures
//!
//! Cards with their FSRS scheduling state, plus aggregate statistics
//! over the learning pool.

mod card;

pub use card::{Card, NewCard};

use serde::{Deserialize, Serialize};

// ============================================================================
// POOL STATISTICS
// ============================================================================

/// Counters over the whole learning pool
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardStats {
    /// Total number of cards
    pub total_cards: i64,
    /// Cards never reviewed
    pub new_cards: i64,
    pub learning_cards: i64,
    pub review_cards: i64,
    pub relearning_cards: i64,
    /// Non-suspended, non-new cards whose due instant has passed
    pub due_cards: i64,
    /// Cards flagged as leeches
    pub leech_cards: i64,
    /// Cards excluded from the queue (includes suspended leeches)
    pub suspended_cards: i64,
    /// Number of review log entries
    pub total_reviews: i64,
}

impl CardStats {
    /// Cards that have been reviewed at least once
    pub fn learned_cards(&self) -> i64 {
        self.total_cards - self.new_cards
    }
}
