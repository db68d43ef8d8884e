//! SafetyNet Core - Correlated Synthetic Public-Safety Records
//!
//! The generation engine behind the harness. It addresses three problems
//! that independent random draws get wrong:
//! 1. **Incoherent attributes**: dependent fields (medication → route →
//!    dosage → unit) resolve through conditional cascades with explicit
//!    fallback tiers
//! 2. **Impossible timelines**: lifecycle stamps are synthesized as strictly
//!    increasing offsets from the call time
//! 3. **Disconnected identities**: a bounded recurrence pool reuses persons
//!    across events, and downstream jail artifacts mutate the person they
//!    reference through a timestamp-stamped person index

pub mod sampler;
pub mod timeline;
pub mod cascade;
pub mod recurrence;
pub mod records;
pub mod person_index;
pub mod context;
pub mod dataset;

pub mod population;
pub mod cad;
pub mod property;
pub mod arrest;
pub mod ems_tables;
pub mod ems;
pub mod jail_tables;
pub mod jail;

pub mod config;
pub mod integrity;
pub mod metrics;

// Re-export key types for convenience
pub use cascade::{AttributeCascade, CascadeStep, ResolvedBundle, StepResolver};
pub use config::GeneratorConfig;
pub use context::GenerationContext;
pub use dataset::Dataset;
pub use ems::{EmsLifecycle, EmsRecordSet};
pub use integrity::{IntegrityReport, IntegritySession};
pub use jail::{BookingArtifacts, JailLifecycle};
pub use metrics::DatasetMetrics;
pub use person_index::{PersonContext, PersonIndex};
pub use recurrence::{IdentityChoice, RecurrenceConfig, RecurrencePool};
pub use sampler::{ConditionalTable, DrawSource, WeightedTable};
pub use timeline::{Priority, Stage, Timeline, TimelineConfig, TimelineSynthesizer};
