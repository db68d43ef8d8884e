//! Unseeded implementation of GenContext backed by the system clock.

use crate::GenContext;
use chrono::{NaiveDateTime, Timelike, Utc};

/// Context for ad-hoc runs where reproducibility is opt-in.
///
/// The anchor is the current UTC time (truncated to whole seconds) and the
/// seed is drawn once from thread entropy. Log the seed to replay the run
/// with a `SimContext`.
#[derive(Debug, Clone)]
pub struct WallClockContext {
    anchor: NaiveDateTime,
    seed: u64,
}

impl WallClockContext {
    /// Creates a context anchored at the current time.
    pub fn new() -> Self {
        let now = Utc::now().naive_utc();
        let anchor = now.with_nanosecond(0).unwrap_or(now);
        Self {
            anchor,
            seed: rand::random(),
        }
    }
}

impl Default for WallClockContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GenContext for WallClockContext {
    fn anchor(&self) -> NaiveDateTime {
        self.anchor
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_clock_anchor_has_whole_seconds() {
        let ctx = WallClockContext::new();
        assert_eq!(ctx.anchor().nanosecond(), 0);
        assert!(ctx.window_start() < ctx.anchor());
    }

    #[test]
    fn test_derive_seed_depends_on_extension() {
        let ctx = WallClockContext::new();
        assert_ne!(ctx.derive_seed(1), ctx.derive_seed(2));
        assert_eq!(ctx.derive_seed(1), ctx.derive_seed(1));
    }
}
