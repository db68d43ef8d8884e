//! Core generation context trait for SafetyNet generators.

use chrono::{Duration, NaiveDateTime};

/// Multiplier used to spread a seed before combining it with an extension.
pub const SEED_MIX: u64 = 0x517cc1b727220a95;

/// Golden-ratio multiplier used to derive independent sub-seeds.
pub const SEED_SPREAD: u64 = 0x9e3779b97f4a7c15;

/// The central interface between generators and their environment.
///
/// Generators never read the system clock or OS entropy directly. They ask
/// the context for the anchor time and derive their RNG seeds from it.
///
/// # Implementations
///
/// - **Unseeded**: `WallClockContext` - anchor is the current UTC time,
///   seed is drawn once from thread entropy and reported for replay
/// - **Simulation**: `SimContext` (in `safetynet_sim`) - fixed anchor,
///   fixed seed, seeded ChaCha8 streams
pub trait GenContext: Send + Sync {
    /// Returns the anchor timestamp: the end of the generation window.
    ///
    /// All synthesized event times fall at or before the anchor plus the
    /// longest lifecycle that can start inside the window.
    fn anchor(&self) -> NaiveDateTime;

    /// Returns the master seed for this run.
    fn seed(&self) -> u64;

    /// Returns the length of the generation window in days.
    fn window_days(&self) -> i64 {
        730
    }

    /// Returns the start of the generation window.
    fn window_start(&self) -> NaiveDateTime {
        self.anchor() - Duration::days(self.window_days())
    }

    /// Derives a deterministic sub-seed from the master seed.
    ///
    /// # Arguments
    /// * `extension` - A value distinguishing the consumer (worker index,
    ///   phase number, ...)
    fn derive_seed(&self, extension: u64) -> u64 {
        self.seed().wrapping_mul(SEED_MIX) ^ extension.wrapping_mul(SEED_SPREAD)
    }
}
