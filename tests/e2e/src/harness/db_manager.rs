//! Test Database Manager
//!
//! Provides isolated database instances for testing:
//! - Temporary databases that are automatically cleaned up
//! - Pre-seeded databases with cards in every learning state
//! - Extra handles on the same file to play concurrent writers

use chrono::{DateTime, Utc};
use retain_core::{Card, EngineConfig, ReviewOrchestrator, Storage};
use std::path::PathBuf;
use tempfile::TempDir;

use crate::mocks::TestDataFactory;

/// Manager for test databases
///
/// Creates isolated database instances for each test to prevent interference.
/// Automatically cleans up temporary databases when dropped.
///
/// # Example
///
/// ```rust,ignore
/// let db = TestDatabaseManager::new_temp();
///
/// // Use the storage
/// db.storage.add_card(NewCard::new("der Apfel"));
///
/// // Database is automatically deleted when `db` goes out of scope
/// ```
pub struct TestDatabaseManager {
    /// The storage instance
    pub storage: Storage,
    /// Temporary directory (kept alive to prevent premature deletion)
    _temp_dir: Option<TempDir>,
    /// Path to the database file
    db_path: PathBuf,
}

impl TestDatabaseManager {
    /// Create a new test database in a temporary directory
    ///
    /// The database is automatically deleted when the manager is dropped.
    pub fn new_temp() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test_retain.db");

        let storage = Storage::new(Some(db_path.clone())).expect("Failed to create test storage");

        Self {
            storage,
            _temp_dir: Some(temp_dir),
            db_path,
        }
    }

    /// Create a test database at a specific path
    ///
    /// The database is NOT automatically deleted.
    pub fn new_at_path(path: PathBuf) -> Self {
        let storage = Storage::new(Some(path.clone())).expect("Failed to create test storage");

        Self {
            storage,
            _temp_dir: None,
            db_path: path,
        }
    }

    /// Get the database path
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Open another independent handle on the same database file
    pub fn second_handle(&self) -> Storage {
        Storage::new(Some(self.db_path.clone())).expect("Failed to open second handle")
    }

    /// Orchestrator over this database with default configuration
    pub fn engine(&self) -> ReviewOrchestrator<&Storage> {
        ReviewOrchestrator::new(&self.storage, &EngineConfig::default())
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.card_count() == 0
    }

    /// Get the number of cards in the database
    pub fn card_count(&self) -> i64 {
        self.storage
            .get_stats(Utc::now())
            .map(|s| s.total_cards)
            .unwrap_or(0)
    }

    // ========================================================================
    // SEEDING METHODS
    // ========================================================================

    /// Seed the database with never-reviewed cards introduced at `now`
    pub fn seed_new_cards(&self, count: usize, now: DateTime<Utc>) -> Vec<String> {
        (0..count)
            .map(|i| {
                let card = Card::new(format!("Neues Wort {:03}", i), now);
                self.insert(card)
            })
            .collect()
    }

    /// Seed with Review-state cards that fell due one minute apart before `now`
    pub fn seed_due_reviews(&self, count: usize, now: DateTime<Utc>) -> Vec<String> {
        (0..count)
            .map(|i| {
                let due = now - chrono::Duration::minutes((count - i) as i64);
                let card = TestDataFactory::review_card(&format!("Fälliges Wort {:03}", i), due);
                self.insert(card)
            })
            .collect()
    }

    /// One card in each learning state plus a suspended leech
    pub fn seed_with_learning_states(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut ids = Vec::new();

        ids.push(self.insert(Card::new("neu", now)));

        let mut learning = Card::new("lernend", now - chrono::Duration::days(1));
        learning.fsrs.state = retain_core::LearningState::Learning;
        learning.fsrs.reps = 1;
        learning.fsrs.lapses = 1;
        learning.fsrs.stability = 0.4;
        learning.fsrs.difficulty = 6.8;
        learning.fsrs.due = now - chrono::Duration::days(1);
        learning.fsrs.last_review = Some(now - chrono::Duration::days(1));
        ids.push(self.insert(learning));

        ids.push(self.insert(TestDataFactory::review_card("gelernt", now + chrono::Duration::days(3))));

        let mut relearning = TestDataFactory::review_card("vergessen", now - chrono::Duration::hours(2));
        relearning.fsrs.state = retain_core::LearningState::Relearning;
        relearning.fsrs.lapses = 1;
        ids.push(self.insert(relearning));

        ids.push(self.insert(TestDataFactory::leech_card("Egel", 6, now)));

        ids
    }

    fn insert(&self, card: Card) -> String {
        self.storage.insert_card(&card).expect("Failed to insert card");
        card.id
    }
}
