//! Leech Detection
//!
//! A leech is a card that keeps failing. After an Again rating the
//! post-update counts are checked against two rules:
//!
//! - absolute: `lapses >= 5`
//! - relative: `reps > 4 && lapses / reps > 0.25`
//!
//! A newly detected leech is flagged and suspended in the same write as the
//! scheduling result. The flag is sticky: only the remediation actions in
//! this module clear it.

use serde::{Deserialize, Serialize};

use crate::fsrs::Rating;
use crate::memory::Card;

/// Thresholds for leech classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeechPolicy {
    /// Lapses at or above this count always make a leech
    pub lapse_threshold: i32,
    /// The ratio rule only applies once reps exceed this
    pub min_reps: i32,
    /// Lapse share above which a card is a leech
    pub failure_ratio: f64,
}

impl Default for LeechPolicy {
    fn default() -> Self {
        Self {
            lapse_threshold: 5,
            min_reps: 4,
            failure_ratio: 0.25,
        }
    }
}

impl LeechPolicy {
    /// Classify post-update counts
    pub fn is_leech(&self, lapses: i32, reps: i32) -> bool {
        if lapses >= self.lapse_threshold {
            return true;
        }
        reps > self.min_reps && (lapses as f64 / reps as f64) > self.failure_ratio
    }

    /// Check a freshly scheduled card and flag it if it just became a leech.
    ///
    /// Only Again ratings trigger the check, and cards already flagged are
    /// left alone. Returns whether the card was newly flagged.
    pub fn inspect(&self, card: &mut Card, rating: Rating) -> bool {
        if rating != Rating::Again || card.is_leech {
            return false;
        }
        if !self.is_leech(card.fsrs.lapses, card.fsrs.reps) {
            return false;
        }
        card.is_leech = true;
        card.is_suspended = true;
        true
    }
}

// ============================================================================
// REMEDIATION
// ============================================================================

/// Replacement content supplied when fixing a leech
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixLeech {
    /// New mnemonic; `None` keeps the current one
    pub mnemonic: Option<String>,
    /// New example sentences; `None` keeps the current ones
    pub examples: Option<Vec<String>>,
}

/// Give the card a fresh start with (optionally) better content
pub fn fix_leech(card: &Card, fix: FixLeech) -> Card {
    let mut fixed = card.clone();
    fixed.fsrs.lapses = 0;
    fixed.is_leech = false;
    fixed.is_suspended = false;
    if let Some(mnemonic) = fix.mnemonic {
        fixed.mnemonic = Some(mnemonic);
    }
    if let Some(examples) = fix.examples {
        fixed.examples = examples;
    }
    fixed
}

/// Drop the card from the leech list but keep it out of the queue
pub fn suspend_forever(card: &Card) -> Card {
    let mut suspended = card.clone();
    suspended.is_suspended = true;
    suspended.is_leech = false;
    suspended
}

/// Return a suspended card to the queue with its lapse count reset
pub fn unsuspend(card: &Card) -> Card {
    let mut restored = card.clone();
    restored.is_suspended = false;
    restored.is_leech = false;
    restored.fsrs.lapses = 0;
    restored
}
