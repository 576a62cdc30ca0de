//! crates/extractor_core/src/progress.rs
//!
//! The upsert rule for the per-user progress aggregate. A progress indicator,
//! not a ledger: the adapter applies this rule read-then-write, so concurrent
//! advances for one user can race and under-count.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::UserProgress;
use crate::steps::TERMINAL_STEP;

/// Fixed number of minutes credited to `time_in_system` per advance.
pub const SESSION_MINUTES: i32 = 5;

pub const PHASE_EXTRACTION: &str = "extraction";
pub const PHASE_PRODUCT_CREATION: &str = "product_creation";

/// Produces the next aggregate for an advance to `target_step`.
///
/// With no existing aggregate, one is created; completed-extraction and phase
/// rules key off whether the target is the terminal step. An existing
/// aggregate is merged: counters increment, the phase label and activity
/// timestamp are overwritten.
pub fn advance(
    existing: Option<UserProgress>,
    user_id: Uuid,
    target_step: i32,
    now: DateTime<Utc>,
) -> UserProgress {
    let finished = target_step == TERMINAL_STEP;
    let phase = if finished {
        PHASE_PRODUCT_CREATION
    } else {
        PHASE_EXTRACTION
    };

    match existing {
        None => UserProgress {
            user_id,
            completed_extractions: i32::from(finished),
            completed_products: 0,
            time_in_system: SESSION_MINUTES,
            achievements: Value::Array(Vec::new()),
            current_phase: phase.to_string(),
            last_active_at: now,
        },
        Some(mut progress) => {
            progress.completed_extractions += i32::from(finished);
            progress.current_phase = phase.to_string();
            progress.time_in_system += SESSION_MINUTES;
            progress.last_active_at = now;
            progress
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_advance_creates_the_aggregate() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let progress = advance(None, user_id, 4, now);
        assert_eq!(progress.user_id, user_id);
        assert_eq!(progress.completed_extractions, 0);
        assert_eq!(progress.time_in_system, SESSION_MINUTES);
        assert_eq!(progress.current_phase, PHASE_EXTRACTION);
        assert_eq!(progress.last_active_at, now);
    }

    #[test]
    fn first_advance_to_the_terminal_step_counts_a_completion() {
        let progress = advance(None, Uuid::new_v4(), TERMINAL_STEP, Utc::now());
        assert_eq!(progress.completed_extractions, 1);
        assert_eq!(progress.current_phase, PHASE_PRODUCT_CREATION);
    }

    #[test]
    fn later_advances_merge_into_the_existing_aggregate() {
        let user_id = Uuid::new_v4();
        let start = Utc::now();
        let first = advance(None, user_id, 2, start);
        let later = start + chrono::Duration::minutes(10);

        let second = advance(Some(first), user_id, 4, later);
        assert_eq!(second.completed_extractions, 0);
        assert_eq!(second.time_in_system, 2 * SESSION_MINUTES);
        assert_eq!(second.current_phase, PHASE_EXTRACTION);
        assert_eq!(second.last_active_at, later);

        let third = advance(Some(second), user_id, TERMINAL_STEP, later);
        assert_eq!(third.completed_extractions, 1);
        assert_eq!(third.time_in_system, 3 * SESSION_MINUTES);
        assert_eq!(third.current_phase, PHASE_PRODUCT_CREATION);
    }

    #[test]
    fn completions_only_increment_on_the_terminal_step() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let mut progress = advance(None, user_id, TERMINAL_STEP, now);
        progress = advance(Some(progress), user_id, 3, now);
        assert_eq!(progress.completed_extractions, 1);
        assert_eq!(progress.current_phase, PHASE_EXTRACTION);
    }
}
