//! SQLite Storage Implementation
//!
//! Card rows and the append-only review log, with optimistic concurrency on
//! card writes.

use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

use super::CardStore;
use crate::fsrs::{FSRSState, LearningState, Rating, ReviewLog};
use crate::memory::{Card, CardStats, NewCard};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// Card not found
    #[error("Card not found: {0}")]
    NotFound(String),
    /// The row changed since it was read
    #[error("Stale write for card {id}: expected version {expected}, found {found}")]
    StaleWrite {
        id: String,
        expected: i64,
        found: i64,
    },
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid timestamp
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// JSON column error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// A persisted review log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLogRecord {
    /// Row id, increasing in insertion order
    pub id: i64,
    pub card_id: String,
    #[serde(flatten)]
    pub log: ReviewLog,
}

// ============================================================================
// STORAGE
// ============================================================================

/// SQLite-backed card store
///
/// Uses separate reader/writer connections for interior mutability.
/// All methods take `&self`, making Storage `Send + Sync` so callers can
/// share an `Arc<Storage>` across threads.
pub struct Storage {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    path: PathBuf,
}

impl Storage {
    /// Apply PRAGMAs and optional encryption to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        // Apply encryption key if SQLCipher is enabled and key is provided
        #[cfg(feature = "encryption")]
        {
            if let Ok(key) = std::env::var("RETAIN_ENCRYPTION_KEY") {
                if !key.is_empty() {
                    conn.pragma_update(None, "key", &key)?;
                }
            }
        }

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA temp_store = MEMORY;",
        )?;

        Ok(())
    }

    /// Default database location in the platform data directory
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "retain", "core").ok_or_else(|| {
            StorageError::Init("Could not determine project directories".to_string())
        })?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;
        // Restrict directory permissions to owner-only on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            let _ = std::fs::set_permissions(data_dir, perms);
        }
        Ok(data_dir.join("retain.db"))
    }

    /// Open (or create) the database at `db_path`, or at the default location
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => Self::default_path()?,
        };

        let writer_conn = Connection::open(&path)?;

        // Restrict database file permissions to owner-only on Unix
        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn)?;

        // Apply migrations on writer only
        let applied = super::migrations::apply_migrations(&writer_conn)?;
        if applied > 0 {
            tracing::debug!(applied, path = %path.display(), "Schema migrated");
        }

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            path,
        })
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    // ========================================================================
    // CARDS
    // ========================================================================

    /// Add a new card to the learning pool, available immediately
    pub fn add_card(&self, input: NewCard) -> Result<Card> {
        let card = input.into_card(Utc::now());
        self.insert_card(&card)?;
        self.get_card(&card.id)?
            .ok_or_else(|| StorageError::NotFound(card.id.clone()))
    }

    /// Insert a fully-formed card (imports, fixtures)
    pub fn insert_card(&self, card: &Card) -> Result<()> {
        let examples_json = serde_json::to_string(&card.examples)?;

        let writer = self.writer.lock()
            .map_err(|_| StorageError::Init("Writer lock poisoned".into()))?;
        writer.execute(
            "INSERT INTO cards (
                id, content, mnemonic, examples, created_at, updated_at,
                stability, difficulty, elapsed_days, scheduled_days, reps, lapses,
                state, due, last_review, is_leech, is_suspended, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                card.id,
                card.content,
                card.mnemonic,
                examples_json,
                to_sql_timestamp(card.created_at),
                to_sql_timestamp(card.updated_at),
                card.fsrs.stability,
                card.fsrs.difficulty,
                card.fsrs.elapsed_days,
                card.fsrs.scheduled_days,
                card.fsrs.reps,
                card.fsrs.lapses,
                card.fsrs.state.as_str(),
                to_sql_timestamp(card.fsrs.due),
                card.fsrs.last_review.map(to_sql_timestamp),
                card.is_leech,
                card.is_suspended,
                card.version,
            ],
        )?;

        tracing::debug!(card_id = %card.id, state = %card.fsrs.state, "Card inserted");
        Ok(())
    }

    /// Get a card by ID
    pub fn get_card(&self, id: &str) -> Result<Option<Card>> {
        let reader = self.reader.lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare("SELECT * FROM cards WHERE id = ?1")?;

        let card = stmt
            .query_row(params![id], |row| Self::row_to_card(row))
            .optional()?;
        Ok(card)
    }

    /// Parse RFC3339 timestamp
    fn parse_timestamp(value: &str, field_name: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(StorageError::InvalidTimestamp(format!(
                        "{} '{}': {}",
                        field_name, value, e
                    ))),
                )
            })
    }

    fn parse_state(value: &str) -> rusqlite::Result<LearningState> {
        LearningState::parse_name(value).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Unknown card state '{}'", value),
                )),
            )
        })
    }

    /// Convert a row to Card
    fn row_to_card(row: &rusqlite::Row) -> rusqlite::Result<Card> {
        let examples_json: String = row.get("examples")?;
        let examples: Vec<String> = serde_json::from_str(&examples_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(StorageError::Serialization(e)),
            )
        })?;

        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        let due: String = row.get("due")?;
        let last_review: Option<String> = row.get("last_review")?;
        let state: String = row.get("state")?;

        let last_review = match last_review {
            Some(s) => Some(Self::parse_timestamp(&s, "last_review")?),
            None => None,
        };

        Ok(Card {
            id: row.get("id")?,
            content: row.get("content")?,
            mnemonic: row.get("mnemonic")?,
            examples,
            fsrs: FSRSState {
                stability: row.get("stability")?,
                difficulty: row.get("difficulty")?,
                elapsed_days: row.get("elapsed_days")?,
                scheduled_days: row.get("scheduled_days")?,
                reps: row.get("reps")?,
                lapses: row.get("lapses")?,
                state: Self::parse_state(&state)?,
                due: Self::parse_timestamp(&due, "due")?,
                last_review,
            },
            is_leech: row.get("is_leech")?,
            is_suspended: row.get("is_suspended")?,
            created_at: Self::parse_timestamp(&created_at, "created_at")?,
            updated_at: Self::parse_timestamp(&updated_at, "updated_at")?,
            version: row.get("version")?,
        })
    }

    fn query_cards(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Card>> {
        let reader = self.reader.lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(sql)?;

        let cards = stmt.query_map(params, |row| Self::row_to_card(row))?;

        let mut result = Vec::new();
        for card in cards {
            result.push(card?);
        }
        Ok(result)
    }

    /// Version-checked UPDATE inside an open transaction
    fn update_card_in(tx: &Transaction<'_>, card: &Card, now: DateTime<Utc>) -> Result<()> {
        let examples_json = serde_json::to_string(&card.examples)?;

        let changed = tx.execute(
            "UPDATE cards SET
                content = ?1,
                mnemonic = ?2,
                examples = ?3,
                updated_at = ?4,
                stability = ?5,
                difficulty = ?6,
                elapsed_days = ?7,
                scheduled_days = ?8,
                reps = ?9,
                lapses = ?10,
                state = ?11,
                due = ?12,
                last_review = ?13,
                is_leech = ?14,
                is_suspended = ?15,
                version = version + 1
            WHERE id = ?16 AND version = ?17",
            params![
                card.content,
                card.mnemonic,
                examples_json,
                to_sql_timestamp(now),
                card.fsrs.stability,
                card.fsrs.difficulty,
                card.fsrs.elapsed_days,
                card.fsrs.scheduled_days,
                card.fsrs.reps,
                card.fsrs.lapses,
                card.fsrs.state.as_str(),
                to_sql_timestamp(card.fsrs.due),
                card.fsrs.last_review.map(to_sql_timestamp),
                card.is_leech,
                card.is_suspended,
                card.id,
                card.version,
            ],
        )?;

        if changed == 0 {
            let found: Option<i64> = tx
                .query_row(
                    "SELECT version FROM cards WHERE id = ?1",
                    params![card.id],
                    |row| row.get(0),
                )
                .optional()?;

            return Err(match found {
                Some(found) => StorageError::StaleWrite {
                    id: card.id.clone(),
                    expected: card.version,
                    found,
                },
                None => StorageError::NotFound(card.id.clone()),
            });
        }

        Ok(())
    }

    fn write_card(&self, card: &Card, log: Option<&ReviewLog>) -> Result<Card> {
        let mut writer = self.writer.lock()
            .map_err(|_| StorageError::Init("Writer lock poisoned".into()))?;
        let tx = writer.transaction()?;

        Self::update_card_in(&tx, card, Utc::now())?;

        if let Some(log) = log {
            tx.execute(
                "INSERT INTO review_logs (card_id, rating, scheduled_days, elapsed_days, state, reviewed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    card.id,
                    log.rating.as_i32(),
                    log.scheduled_days,
                    log.elapsed_days,
                    log.state.as_str(),
                    to_sql_timestamp(log.review),
                ],
            )?;
        }

        // Read back before commit
        let written = tx
            .query_row(
                "SELECT * FROM cards WHERE id = ?1",
                params![card.id],
                |row| Self::row_to_card(row),
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(card.id.clone()))?;

        tx.commit()?;
        Ok(written)
    }

    // ========================================================================
    // REVIEW LOG
    // ========================================================================

    /// Review history of one card, most recent first
    pub fn get_review_logs(&self, card_id: &str, limit: usize) -> Result<Vec<ReviewLogRecord>> {
        let reader = self.reader.lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))?;
        let mut stmt = reader.prepare(
            "SELECT id, card_id, rating, scheduled_days, elapsed_days, state, reviewed_at
             FROM review_logs
             WHERE card_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![card_id, to_sql_limit(limit)], |row| {
            let rating: i32 = row.get("rating")?;
            let state: String = row.get("state")?;
            let reviewed_at: String = row.get("reviewed_at")?;

            let rating = Rating::from_i32(rating).ok_or_else(|| {
                rusqlite::Error::IntegralValueOutOfRange(2, rating as i64)
            })?;

            Ok(ReviewLogRecord {
                id: row.get("id")?,
                card_id: row.get("card_id")?,
                log: ReviewLog {
                    rating,
                    scheduled_days: row.get("scheduled_days")?,
                    elapsed_days: row.get("elapsed_days")?,
                    state: Self::parse_state(&state)?,
                    review: Self::parse_timestamp(&reviewed_at, "reviewed_at")?,
                },
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // ========================================================================
    // STATISTICS
    // ========================================================================

    /// Counters over the whole pool
    pub fn get_stats(&self, now: DateTime<Utc>) -> Result<CardStats> {
        let reader = self.reader.lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))?;

        let mut stats = reader.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(state = 'new'), 0),
                COALESCE(SUM(state = 'learning'), 0),
                COALESCE(SUM(state = 'review'), 0),
                COALESCE(SUM(state = 'relearning'), 0),
                COALESCE(SUM(is_suspended = 0 AND state != 'new' AND due <= ?1), 0),
                COALESCE(SUM(is_leech = 1), 0),
                COALESCE(SUM(is_suspended = 1), 0)
             FROM cards",
            params![to_sql_timestamp(now)],
            |row| {
                Ok(CardStats {
                    total_cards: row.get(0)?,
                    new_cards: row.get(1)?,
                    learning_cards: row.get(2)?,
                    review_cards: row.get(3)?,
                    relearning_cards: row.get(4)?,
                    due_cards: row.get(5)?,
                    leech_cards: row.get(6)?,
                    suspended_cards: row.get(7)?,
                    total_reviews: 0,
                })
            },
        )?;

        stats.total_reviews =
            reader.query_row("SELECT COUNT(*) FROM review_logs", [], |row| row.get(0))?;

        Ok(stats)
    }

    /// Cards that would enter a session at `now` (due reviews plus new cards)
    pub fn count_due(&self, now: DateTime<Utc>) -> Result<i64> {
        let reader = self.reader.lock()
            .map_err(|_| StorageError::Init("Reader lock poisoned".into()))?;
        let count = reader.query_row(
            "SELECT COUNT(*) FROM cards
             WHERE is_suspended = 0
               AND (state = 'new' OR due <= ?1)",
            params![to_sql_timestamp(now)],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl CardStore for Storage {
    fn fetch_due_and_new(
        &self,
        now: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Card>> {
        self.query_cards(
            "SELECT * FROM cards
             WHERE is_suspended = 0
               AND (state = 'new' OR due <= ?1)
             ORDER BY CASE WHEN state = 'review' THEN 0 ELSE 1 END, due ASC, id ASC
             LIMIT ?2 OFFSET ?3",
            params![to_sql_timestamp(now), to_sql_limit(limit), to_sql_limit(offset)],
        )
    }

    fn load_card(&self, id: &str) -> Result<Option<Card>> {
        self.get_card(id)
    }

    fn save_card(&self, card: &Card) -> Result<Card> {
        self.write_card(card, None)
    }

    fn commit_review(&self, card: &Card, log: &ReviewLog) -> Result<Card> {
        self.write_card(card, Some(log))
    }

    fn list_leeches(&self) -> Result<Vec<Card>> {
        self.query_cards(
            "SELECT * FROM cards WHERE is_leech = 1 ORDER BY lapses DESC, id ASC",
            [],
        )
    }
}

/// Fixed-width UTC form so lexical order in SQL matches time order
fn to_sql_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_sql_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// ============================================================================
// TESTS
// ============================================================================
