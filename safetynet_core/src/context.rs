//! Shared generation state passed into every lifecycle call.

use crate::person_index::PersonIndex;
use crate::recurrence::{RecurrenceConfig, RecurrencePool};
use tracing::debug;

/// The recurrence pool and person index one generation stream owns.
///
/// Parallel workers each hold their own context; the harness merges the
/// person indexes afterwards. Nothing here is shared live.
#[derive(Debug, Clone, Default)]
pub struct GenerationContext {
    pub pool: RecurrencePool,
    pub persons: PersonIndex,
}

impl GenerationContext {
    pub fn new(recurrence: RecurrenceConfig) -> Self {
        Self {
            pool: RecurrencePool::new(recurrence),
            persons: PersonIndex::new(),
        }
    }

    /// A context that reuses existing persons but starts with an empty pool.
    pub fn with_persons(recurrence: RecurrenceConfig, persons: PersonIndex) -> Self {
        Self {
            pool: RecurrencePool::new(recurrence),
            persons,
        }
    }

    /// Clears all identities between independent runs.
    pub fn reset(&mut self) {
        debug!(
            "Resetting generation context ({} persons, {} pooled)",
            self.persons.len(),
            self.pool.len()
        );
        self.pool.reset();
        self.persons.reset();
    }
}
