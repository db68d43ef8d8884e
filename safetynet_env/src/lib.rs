//! SafetyNet Environment Abstraction Layer
//!
//! This crate holds the pieces every SafetyNet generator depends on but
//! that do not belong to any one record domain:
//! - The generation clock and master seed (`GenContext`)
//! - Stable identifiers for persons and records (`PersonId`, `RecordId`)
//! - The narrow error taxonomy (`GenError`)
//!
//! # Core Concept: One Seed, One Anchor
//!
//! A generation run is fully described by a 64-bit seed and an anchor
//! timestamp (the "now" at the end of the generation window). Every
//! sub-generator derives its randomness from the seed, so any dataset can
//! be regenerated byte-for-byte from its seed number.
//!
//! # Example
//!
//! ```ignore
//! use safetynet_env::{GenContext, WallClockContext};
//!
//! fn describe<Ctx: GenContext>(ctx: &Ctx) {
//!     println!("anchor={} seed={}", ctx.anchor(), ctx.seed());
//!     let worker_seed = ctx.derive_seed(3);
//! }
//! ```

mod context;
mod error;
mod types;
mod wall_clock;

pub use context::{GenContext, SEED_MIX, SEED_SPREAD};
pub use error::GenError;
pub use types::{PersonId, RecordId};
pub use wall_clock::WallClockContext;
