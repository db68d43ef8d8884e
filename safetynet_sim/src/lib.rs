//! SafetyNet deterministic generation harness
//!
//! This crate drives the `safetynet_core` generators through a complete run:
//! persons, CAD calls, EMS incidents, arrests, bookings and their follow-up
//! records, all derived from one master seed.
//!
//! # Core Principle: Producers Before Consumers
//!
//! A `GenerationWorld` runs phases in a fixed order. A phase that selects
//! parent records (bookings pick arrests, property picks CAD calls) refuses
//! to run on an empty parent collection. EMS generation is split across
//! rayon workers that each own a private recurrence pool and person index;
//! their output is merged back in worker order so the result depends only
//! on the seed and the worker count.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ProfileRunner                        │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │ GenerationWorld (SimContext + SeedProvider)        │  │
//! │  │   persons → cad → ems[w0..wn] → arrests → bookings │  │
//! │  │   → follow-up → facilities → programs → property   │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │                  │                                       │
//! │  ┌───────────────▼──────────┐   ┌─────────────────────┐  │
//! │  │ IntegritySession audit   │   │ DatasetMetrics      │  │
//! │  └──────────────────────────┘   └─────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use safetynet_sim::{ProfileId, ProfileRunner};
//!
//! let result = ProfileRunner::new(42).run(ProfileId::Smoke);
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod runner;
mod seeds;
mod world;
pub mod profiles;

pub use context::SimContext;
pub use exporter::DatasetExport;
pub use profiles::{ProfileId, RunConfig};
pub use runner::{ProfileRunner, RunResult};
pub use seeds::{Phase, SeedProvider};
pub use world::GenerationWorld;
