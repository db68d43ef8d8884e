//! Profile runner - executes a named profile end to end.

use crate::context::SimContext;
use crate::profiles::{ProfileId, RunConfig};
use crate::world::GenerationWorld;

use safetynet_core::{Dataset, DatasetMetrics, GeneratorConfig, IntegrityReport, IntegritySession};
use safetynet_env::GenError;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Results from running a profile.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Profile that was run
    pub profile: ProfileId,

    /// Seed used
    pub seed: u64,

    /// Whether every phase succeeded and the integrity audit came back clean
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Record counts per collection
    pub counts: BTreeMap<&'static str, usize>,

    /// Integrity audit; absent when a phase failed before the audit ran
    pub integrity: Option<IntegrityReport>,

    pub metrics: Option<DatasetMetrics>,

    /// Everything generated, including partial output from a failed run
    pub dataset: Dataset,
}

/// Runs generation profiles.
pub struct ProfileRunner {
    /// Master seed
    seed: u64,

    /// Weight tables
    config: GeneratorConfig,

    /// Count multiplier applied to the profile's run shape
    scale: f64,

    /// Worker override
    workers: Option<usize>,
}

impl ProfileRunner {
    /// Creates a new runner with the built-in tables.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            config: GeneratorConfig::default(),
            scale: 1.0,
            workers: None,
        }
    }

    /// Replaces the weight tables.
    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Scales every count of the profile.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Overrides the profile's EMS worker count.
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Run shape for `profile` after scale and worker overrides.
    pub fn run_config(&self, profile: ProfileId) -> RunConfig {
        let mut run = profile.run_config();
        if (self.scale - 1.0).abs() > f64::EPSILON {
            run = run.scaled(self.scale);
        }
        if let Some(workers) = self.workers {
            run = run.with_workers(workers);
        }
        run
    }

    /// Runs a profile and returns the result.
    pub fn run(&self, profile: ProfileId) -> RunResult {
        let run = self.run_config(profile);
        info!("Starting profile: {} (seed={})", profile.name(), self.seed);
        info!(
            "  {} persons, {} CAD, {} EMS over {} workers, {} arrests, {} bookings",
            run.persons, run.cad_incidents, run.ems_incidents, run.workers, run.arrests, run.bookings
        );

        let context = Arc::new(SimContext::new(self.seed).with_window_days(run.window_days));
        let mut world = GenerationWorld::new(self.config.clone(), context);

        if let Err(e) = self.run_phases(&mut world, &run) {
            warn!("Profile {} stopped: {}", profile, e);
            let dataset = world.finish().clone();
            return RunResult {
                profile,
                seed: self.seed,
                passed: false,
                failure_reason: Some(e.to_string()),
                counts: dataset.counts(),
                integrity: None,
                metrics: None,
                dataset,
            };
        }

        let dataset = world.finish().clone();
        let mut recurrence = self.config.recurrence.clone();
        if let Some(p) = run.reuse_probability {
            recurrence = recurrence.with_reuse_probability(p);
        }
        let integrity = IntegritySession::new(recurrence).audit(&dataset);
        let metrics = DatasetMetrics::from_dataset(&dataset);

        let passed = integrity.passed();
        let failure_reason = if passed {
            info!("Profile {} passed: {} records", profile, dataset.total_records());
            None
        } else {
            warn!(
                "Profile {} failed integrity: {} violations",
                profile,
                integrity.total_violations()
            );
            integrity.first_failure()
        };

        RunResult {
            profile,
            seed: self.seed,
            passed,
            failure_reason,
            counts: dataset.counts(),
            integrity: Some(integrity),
            metrics: Some(metrics),
            dataset,
        }
    }

    /// Producers before consumers. Follow-up and programs need bookings.
    fn run_phases(&self, world: &mut GenerationWorld, run: &RunConfig) -> Result<(), GenError> {
        world.generate_persons(run.persons)?;
        world.generate_cad(run.cad_incidents)?;
        world.generate_ems(
            run.ems_incidents,
            run.workers,
            run.ems_cad_link_probability,
            run.reuse_probability,
        )?;
        world.generate_arrests(run.arrests)?;
        world.generate_bookings(run.bookings)?;
        if run.bookings > 0 {
            world.generate_follow_up()?;
        }
        world.generate_facilities()?;
        if run.bookings > 0 {
            world.generate_programs()?;
        }
        world.generate_property(run.standalone_property)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoke_profile_passes() {
        let result = ProfileRunner::new(42).run(ProfileId::Smoke);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.integrity.as_ref().map_or(false, |r| r.passed()));
        assert_eq!(result.counts["ems_incidents"], 25);
        assert_eq!(result.counts["bookings"], 8);
        assert!(result.metrics.is_some());
    }

    #[test]
    fn test_same_seed_same_dataset() {
        let runner = ProfileRunner::new(7);
        let a = runner.run(ProfileId::Smoke);
        let b = runner.run(ProfileId::Smoke);
        assert_eq!(a.dataset, b.dataset);

        let c = ProfileRunner::new(8).run(ProfileId::Smoke);
        assert_ne!(a.dataset, c.dataset);
    }

    #[test]
    fn test_scale_and_worker_overrides() {
        let runner = ProfileRunner::new(3).with_scale(0.5).with_workers(Some(3));
        let run = runner.run_config(ProfileId::Smoke);
        assert_eq!(run.persons, 10);
        assert_eq!(run.workers, 3);

        let result = runner.run(ProfileId::Smoke);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.counts["ems_incidents"], run.ems_incidents);
    }

    #[test]
    fn test_failed_phase_keeps_partial_output() {
        let mut config = GeneratorConfig::default();
        config.recurrence.max_events = 0;
        let result = ProfileRunner::new(1).with_config(config).run(ProfileId::Smoke);

        // The EMS phase rejects the recurrence config; persons and CAD survive
        assert!(!result.passed);
        assert!(result.failure_reason.is_some());
        assert!(result.integrity.is_none());
        assert_eq!(result.counts["persons"], 20);
        assert_eq!(result.counts["cad_incidents"], 15);
        assert_eq!(result.counts["ems_incidents"], 0);
    }
}
