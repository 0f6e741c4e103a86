//! Concurrent writers against one database
//!
//! Independent handles and threads racing on the same card rows. No review
//! may be lost and no log row may exist without its card update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use chrono::{DateTime, Utc};
use retain_core::{
    Card, CardStore, EngineConfig, LearningState, Rating, ReviewLog, ReviewOrchestrator, Storage,
    StorageError,
};
use retain_e2e_tests::{TestDataFactory, TestDatabaseManager};

/// Store whose first commit loses a race against a rival handle
struct RacingStore<'a> {
    inner: &'a Storage,
    rival: &'a Storage,
    raced: AtomicBool,
}

impl RacingStore<'_> {
    fn race(&self, id: &str) -> retain_core::Result<()> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            if let Some(fresh) = self.rival.get_card(id)? {
                self.rival.save_card(&fresh)?;
            }
        }
        Ok(())
    }
}

impl CardStore for RacingStore<'_> {
    fn fetch_due_and_new(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> retain_core::Result<Vec<Card>> {
        self.inner.fetch_due_and_new(now, limit, offset)
    }

    fn load_card(&self, id: &str) -> retain_core::Result<Option<Card>> {
        self.inner.load_card(id)
    }

    fn save_card(&self, card: &Card) -> retain_core::Result<Card> {
        self.race(&card.id)?;
        self.inner.save_card(card)
    }

    fn commit_review(&self, card: &Card, log: &ReviewLog) -> retain_core::Result<Card> {
        self.race(&card.id)?;
        self.inner.commit_review(card, log)
    }

    fn list_leeches(&self) -> retain_core::Result<Vec<Card>> {
        self.inner.list_leeches()
    }
}

fn patient_config() -> EngineConfig {
    EngineConfig {
        max_commit_attempts: 1000,
        ..Default::default()
    }
}

#[test]
fn test_stale_write_between_handles() {
    let db = TestDatabaseManager::new_temp();
    let other = db.second_handle();
    let now = TestDataFactory::fixed_now();
    let card = TestDataFactory::create_card(&db.storage, "der Wettlauf", now);

    // Both handles read version 0
    let seen_by_a = db.storage.load_card(&card.id).unwrap().unwrap();
    let seen_by_b = other.load_card(&card.id).unwrap().unwrap();

    let engine = db.engine();
    let a = engine.evaluate(&seen_by_a, Rating::Good, now);
    let b = engine.evaluate(&seen_by_b, Rating::Again, now);

    let committed = db.storage.commit_review(&a.card, &a.log).unwrap();
    assert_eq!(committed.version, 1);

    let err = other.commit_review(&b.card, &b.log).unwrap_err();
    assert!(matches!(
        err,
        StorageError::StaleWrite { expected: 0, found: 1, .. }
    ));

    // Loser left no trace
    let stored = other.load_card(&card.id).unwrap().unwrap();
    assert_eq!(stored.fsrs.state, LearningState::Review);
    assert_eq!(stored.fsrs.lapses, 0);
    let logs = db.storage.get_review_logs(&card.id, 10).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log.rating, Rating::Good);
}

#[test]
fn test_orchestrator_retries_after_losing_race() {
    let db = TestDatabaseManager::new_temp();
    let rival = db.second_handle();
    let now = TestDataFactory::fixed_now();
    let card = TestDataFactory::insert(
        &db.storage,
        TestDataFactory::review_card("die Wiederholung", now),
    );

    let store = RacingStore {
        inner: &db.storage,
        rival: &rival,
        raced: AtomicBool::new(false),
    };
    let engine = ReviewOrchestrator::new(store, &EngineConfig::default());

    let outcome = engine.process_result(&card.id, 3, now).unwrap();
    // Rival bumped to 1, the retried review to 2
    assert_eq!(outcome.card.version, 2);
    assert_eq!(outcome.card.fsrs.reps, card.fsrs.reps + 1);
    assert_eq!(db.storage.get_review_logs(&card.id, 10).unwrap().len(), 1);
}

#[test]
fn test_single_attempt_surfaces_stale_write() {
    let db = TestDatabaseManager::new_temp();
    let rival = db.second_handle();
    let now = TestDataFactory::fixed_now();
    let card = TestDataFactory::create_card(&db.storage, "einmal", now);

    let store = RacingStore {
        inner: &db.storage,
        rival: &rival,
        raced: AtomicBool::new(false),
    };
    let config = EngineConfig {
        max_commit_attempts: 1,
        ..Default::default()
    };
    let engine = ReviewOrchestrator::new(store, &config);

    let err = engine.process_result(&card.id, 3, now).unwrap_err();
    assert!(matches!(
        err,
        retain_core::ReviewError::StaleCardWrite { attempts: 1, .. }
    ));
    assert!(db.storage.get_review_logs(&card.id, 10).unwrap().is_empty());
}

#[test]
fn test_parallel_reviews_on_distinct_cards() {
    let db = TestDatabaseManager::new_temp();
    let now = TestDataFactory::fixed_now();
    let ids = db.seed_new_cards(8, now);
    let config = patient_config();

    thread::scope(|scope| {
        for id in &ids {
            let storage = &db.storage;
            let config = &config;
            scope.spawn(move || {
                let engine = ReviewOrchestrator::new(storage, config);
                let mut at = now;
                for _ in 0..5 {
                    let outcome = engine.process_result(id, 3, at).unwrap();
                    at = outcome.card.fsrs.due;
                }
            });
        }
    });

    for id in &ids {
        let card = db.storage.get_card(id).unwrap().unwrap();
        assert_eq!(card.fsrs.reps, 5);
        assert_eq!(card.version, 5);
        assert_eq!(db.storage.get_review_logs(id, 100).unwrap().len(), 5);
    }
    assert_eq!(db.storage.get_stats(now).unwrap().total_reviews, 40);
}

#[test]
fn test_contended_card_keeps_every_review() {
    let db = TestDatabaseManager::new_temp();
    let now = TestDataFactory::fixed_now();
    let card = TestDataFactory::create_card(&db.storage, "umkämpft", now);
    let config = patient_config();

    thread::scope(|scope| {
        for _ in 0..4 {
            let storage = &db.storage;
            let config = &config;
            let id = card.id.as_str();
            scope.spawn(move || {
                let engine = ReviewOrchestrator::new(storage, config);
                for _ in 0..5 {
                    engine.process_result(id, 3, now).unwrap();
                }
            });
        }
    });

    let stored = db.storage.get_card(&card.id).unwrap().unwrap();
    assert_eq!(stored.fsrs.reps, 20);
    assert_eq!(stored.version, 20);
    assert_eq!(db.storage.get_review_logs(&card.id, 100).unwrap().len(), 20);
}

#[test]
fn test_second_handle_sees_committed_reviews() {
    let db = TestDatabaseManager::new_temp();
    let now = TestDataFactory::fixed_now();
    let card = TestDataFactory::create_card(&db.storage, "sichtbar", now);

    db.engine().process_result(&card.id, 4, now).unwrap();

    let other = db.second_handle();
    let seen = other.get_card(&card.id).unwrap().unwrap();
    assert_eq!(seen.version, 1);
    assert_eq!(seen.fsrs.state, LearningState::Review);
    assert_eq!(other.get_review_logs(&card.id, 10).unwrap().len(), 1);
}
