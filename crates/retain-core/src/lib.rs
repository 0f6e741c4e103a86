//! # Retain Core
//!
//! Spaced-repetition scheduling engine for vocabulary and flashcard apps.
//!
//! - **FSRS v4**: 17-weight memory model (stability, difficulty, retrievability)
//! - **Leech Detection**: Cards that keep failing are flagged and suspended
//! - **Review Queue**: Due reviews first, then new material, in stable order
//! - **Optimistic Concurrency**: Versioned card rows, atomic card + log commits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use retain_core::{EngineConfig, NewCard, ReviewOrchestrator, Storage};
//! use chrono::Utc;
//!
//! // Create storage (uses default platform-specific location)
//! let storage = Storage::new(None)?;
//! let card = storage.add_card(NewCard::new("der Apfel"))?;
//!
//! let engine = ReviewOrchestrator::new(&storage, &EngineConfig::from_env()?);
//!
//! // What would each rating do?
//! let intervals = engine.predict_intervals(&card, Utc::now());
//!
//! // Record a "Good" review
//! let outcome = engine.process_result(&card.id, 3, Utc::now())?;
//! ```
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): Compile SQLite into the binary
//! - `encryption`: SQLCipher, keyed by `RETAIN_ENCRYPTION_KEY`

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod config;
pub mod fsrs;
pub mod leech;
pub mod memory;
pub mod queue;
pub mod review;
pub mod storage;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Cards
pub use memory::{Card, CardStats, NewCard};

// FSRS v4 algorithm
pub use fsrs::{
    initial_difficulty,
    initial_stability,
    next_interval,
    // Core functions for advanced usage
    retrievability,
    FSRSParameters,
    FSRSScheduler,
    FSRSState,
    InvalidRating,
    LearningState,
    PreviewResults,
    Rating,
    RatingMap,
    ReviewLog,
    SchedulingInfo,
};

// Leech handling
pub use leech::{FixLeech, LeechPolicy};

// Queue policy
pub use queue::{select_for_review, DEFAULT_BATCH_SIZE};

// Orchestration
pub use review::{ReviewError, ReviewOrchestrator, ReviewOutcome};

// Configuration
pub use config::{ConfigError, EngineConfig};

// Storage layer
pub use storage::{CardStore, Result, ReviewLogRecord, Storage, StorageError};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// FSRS algorithm version (4 = 17 weights)
pub const FSRS_VERSION: u8 = 4;

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Card, CardStore, EngineConfig, FSRSScheduler, FSRSState, FixLeech, LearningState,
        NewCard, Rating, ReviewError, ReviewOrchestrator, ReviewOutcome, Storage, StorageError,
    };
}
