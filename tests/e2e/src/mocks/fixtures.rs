//! Test Data Factory
//!
//! Provides utilities for generating realistic test data:
//! - Cards in specific scheduling states
//! - Leeches and near-leeches
//! - Pre-built queue scenarios for ordering assertions

use chrono::{DateTime, Duration, TimeZone, Utc};
use retain_core::{Card, LearningState, Storage};
use std::collections::HashMap;

/// Factory for creating test data
///
/// Cards are built unpersisted; the `create_*` helpers also insert them.
///
/// # Example
///
/// ```rust,ignore
/// let storage = Storage::new(Some(path))?;
/// let now = TestDataFactory::fixed_now();
///
/// let card = TestDataFactory::create_card(&storage, "der Apfel", now);
/// let scenario = TestDataFactory::create_queue_scenario(&storage, now);
/// ```
pub struct TestDataFactory;

/// Scenario containing related test data
#[derive(Debug)]
pub struct TestScenario {
    /// IDs of created cards, in insertion order
    pub card_ids: Vec<String>,
    /// Description of the scenario
    pub description: String,
    /// Metadata for test assertions
    pub metadata: HashMap<String, String>,
}

impl TestScenario {
    /// Look up a card id recorded under `key`
    pub fn id(&self, key: &str) -> &str {
        self.metadata
            .get(key)
            .map(String::as_str)
            .unwrap_or_else(|| panic!("scenario has no card '{}'", key))
    }
}

impl TestDataFactory {
    /// A whole-second instant, so stored timestamps compare exactly
    pub fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    // ========================================================================
    // CARD BUILDERS
    // ========================================================================

    /// Graduated card due at `due`, last reviewed five days before
    pub fn review_card(content: &str, due: DateTime<Utc>) -> Card {
        let mut card = Card::new(content, due - Duration::days(30));
        card.fsrs.state = LearningState::Review;
        card.fsrs.stability = 5.0;
        card.fsrs.difficulty = 5.0;
        card.fsrs.scheduled_days = 5;
        card.fsrs.reps = 3;
        card.fsrs.due = due;
        card.fsrs.last_review = Some(due - Duration::days(5));
        card
    }

    /// Review card one Again away from becoming a leech (reps=5, lapses=1)
    pub fn struggling_card(content: &str, now: DateTime<Utc>) -> Card {
        let mut card = Self::review_card(content, now);
        card.fsrs.stability = 3.0;
        card.fsrs.difficulty = 7.5;
        card.fsrs.reps = 5;
        card.fsrs.lapses = 1;
        card
    }

    /// Flagged and suspended leech with the given lapse count
    pub fn leech_card(content: &str, lapses: i32, now: DateTime<Utc>) -> Card {
        let mut card = Self::review_card(content, now - Duration::days(1));
        card.fsrs.state = LearningState::Relearning;
        card.fsrs.reps = lapses * 2;
        card.fsrs.lapses = lapses;
        card.is_leech = true;
        card.is_suspended = true;
        card
    }

    // ========================================================================
    // PERSISTED HELPERS
    // ========================================================================

    /// Insert a new card introduced at `now`
    pub fn create_card(storage: &Storage, content: &str, now: DateTime<Utc>) -> Card {
        let card = Card::new(content, now);
        storage.insert_card(&card).expect("Failed to insert card");
        card
    }

    /// Insert any prepared card
    pub fn insert(storage: &Storage, card: Card) -> Card {
        storage.insert_card(&card).expect("Failed to insert card");
        card
    }

    /// Three due reviews, two new cards and assorted ineligible cards
    ///
    /// Metadata keys: `due_1`..`due_3` (ascending due), `new_1`, `new_2`
    /// (ascending due), `future`, `suspended`, `leech`.
    pub fn create_queue_scenario(storage: &Storage, now: DateTime<Utc>) -> TestScenario {
        let cards = [
            ("new_2", Card::new("die Zwiebel", now - Duration::hours(1))),
            ("due_3", Self::review_card("der Knoblauch", now - Duration::minutes(1))),
            ("future", Self::review_card("die Gurke", now + Duration::days(2))),
            ("new_1", Card::new("die Kartoffel", now - Duration::days(1))),
            ("due_1", Self::review_card("der Lauch", now - Duration::days(2))),
            ("suspended", {
                let mut card = Self::review_card("der Spargel", now - Duration::days(9));
                card.is_suspended = true;
                card
            }),
            ("due_2", Self::review_card("die Möhre", now - Duration::hours(6))),
            ("leech", Self::leech_card("der Rettich", 7, now)),
        ];

        let mut card_ids = Vec::new();
        let mut metadata = HashMap::new();
        for (key, card) in cards {
            let card = Self::insert(storage, card);
            metadata.insert(key.to_string(), card.id.clone());
            card_ids.push(card.id);
        }

        TestScenario {
            card_ids,
            description: "3 due reviews, 2 new, 1 future, 1 suspended, 1 leech".to_string(),
            metadata,
        }
    }
}
