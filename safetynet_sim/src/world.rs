//! GenerationWorld - the explicit context object for one generation run.
//!
//! Holds the configuration, the shared person index and every collection
//! produced so far. Each `generate_*` method is one phase; phases that
//! select from a parent collection check that the parent exists first and
//! fail with `EmptyCollection` otherwise. Whatever was produced before a
//! failure stays in the world and can still be exported.

use crate::context::SimContext;
use crate::seeds::{Phase, SeedProvider};

use chrono::{Duration, NaiveDateTime};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use safetynet_core::arrest::ArrestGenerator;
use safetynet_core::cad::CadGenerator;
use safetynet_core::ems::{EmsLifecycle, EmsRecordSet};
use safetynet_core::jail::JailLifecycle;
use safetynet_core::population::PopulationGenerator;
use safetynet_core::property::{PropertyGenerator, PropertyLink};
use safetynet_core::records::CadIncident;
use safetynet_core::sampler::chance;
use safetynet_core::{Dataset, GenerationContext, GeneratorConfig, PersonIndex, RecurrenceConfig};
use safetynet_env::{GenContext, GenError, PersonId};
use std::sync::Arc;
use tracing::{debug, info};

/// Output of one EMS worker partition.
struct WorkerOutput {
    records: Vec<EmsRecordSet>,
    persons: PersonIndex,
}

/// The GenerationWorld - container for one run's state.
pub struct GenerationWorld {
    /// Weight tables for every generator
    pub config: GeneratorConfig,

    /// Fixed anchor and master seed
    pub context: Arc<SimContext>,

    /// Per-phase and per-worker seeds
    pub seeds: SeedProvider,

    /// The one authoritative person index
    pub persons: PersonIndex,

    /// Collections generated so far (persons are copied in by `finish`)
    pub dataset: Dataset,

    completed: Vec<Phase>,
}

impl GenerationWorld {
    /// Creates a new world for `context` with the given tables.
    pub fn new(config: GeneratorConfig, context: Arc<SimContext>) -> Self {
        let seeds = SeedProvider::new(context.seed());
        Self {
            config,
            context,
            seeds,
            persons: PersonIndex::new(),
            dataset: Dataset::new(),
            completed: Vec::new(),
        }
    }

    /// Clears every collection so the world can run again.
    pub fn reset(&mut self) {
        debug!(
            "Resetting world ({} persons, {} records)",
            self.persons.len(),
            self.dataset.total_records()
        );
        self.persons.reset();
        self.dataset.clear();
        self.completed.clear();
    }

    pub fn completed_phases(&self) -> &[Phase] {
        &self.completed
    }

    pub fn anchor(&self) -> NaiveDateTime {
        self.context.anchor()
    }

    pub fn window_start(&self) -> NaiveDateTime {
        self.context.window_start()
    }

    fn mark(&mut self, phase: Phase, produced: usize) {
        info!("Phase {} complete: {} records", phase, produced);
        self.completed.push(phase);
    }

    // =========================================================================
    // PHASES
    // =========================================================================

    /// Base population every identity-referencing phase draws from.
    pub fn generate_persons(&mut self, count: usize) -> Result<usize, GenError> {
        let mut rng = self.seeds.phase_rng(Phase::Persons);
        let population = PopulationGenerator::new(&self.config.population);
        let today = self.context.anchor().date();
        for _ in 0..count {
            let person = population.generate_adult(&mut rng, today)?;
            self.persons.insert(person)?;
        }
        self.mark(Phase::Persons, count);
        Ok(count)
    }

    pub fn generate_cad(&mut self, count: usize) -> Result<usize, GenError> {
        if count > 0 && self.persons.is_empty() {
            return Err(GenError::EmptyCollection("persons"));
        }
        let mut rng = self.seeds.phase_rng(Phase::Cad);
        let generator = CadGenerator::new(&self.config.cad, &self.config.ems, &self.config.population);
        let (start, anchor) = (self.window_start(), self.anchor());

        let mut incidents = Vec::with_capacity(count);
        for _ in 0..count {
            incidents.push(generator.generate(&mut rng, start, anchor, &self.persons)?);
        }
        incidents.sort_by_key(|c| c.call_datetime);
        self.dataset.cad_incidents.extend(incidents);
        self.mark(Phase::Cad, count);
        Ok(count)
    }

    /// EMS incidents split across `workers` partitions.
    ///
    /// Each worker owns a private recurrence pool and person index, reads
    /// the finished CAD collection, and is merged back in worker order.
    pub fn generate_ems(
        &mut self,
        count: usize,
        workers: usize,
        cad_link_probability: f64,
        reuse_probability: Option<f64>,
    ) -> Result<usize, GenError> {
        let workers = workers.max(1);
        let mut recurrence = self.config.recurrence.clone();
        if let Some(p) = reuse_probability {
            recurrence = recurrence.with_reuse_probability(p);
        }
        recurrence.validate()?;

        let seeds = self.seeds.worker_seeds(workers);
        let shares: Vec<usize> = (0..workers)
            .map(|i| count / workers + usize::from(i < count % workers))
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| GenError::invalid_config(format!("EMS worker pool: {}", e)))?;

        let config = &self.config;
        let cad = self.dataset.cad_incidents.as_slice();
        let (start, anchor) = (self.window_start(), self.anchor());
        let outputs: Vec<Result<WorkerOutput, GenError>> = pool.install(|| {
            (0..workers)
                .into_par_iter()
                .map(|i| {
                    let mut rng = ChaCha8Rng::seed_from_u64(seeds[i]);
                    run_ems_worker(
                        &mut rng,
                        config,
                        recurrence.clone(),
                        cad,
                        shares[i],
                        cad_link_probability,
                        (start, anchor),
                    )
                })
                .collect()
        });

        let mut produced = 0;
        for (i, output) in outputs.into_iter().enumerate() {
            let output = output?;
            let merged = self.persons.merge(output.persons)?;
            debug!("EMS worker {}: {} incidents, {} new persons", i, output.records.len(), merged);
            produced += output.records.len();
            for set in output.records {
                self.dataset.ems_medications.extend(set.medications);
                self.dataset.ems_patients.extend(set.patient);
                self.dataset.ems_reports.extend(set.report);
                self.dataset.ems_incidents.push(set.incident);
            }
        }
        self.mark(Phase::Ems, produced);
        Ok(produced)
    }

    /// Arrests plus the evidence property they spawn.
    pub fn generate_arrests(&mut self, count: usize) -> Result<usize, GenError> {
        if count > 0 && self.persons.is_empty() {
            return Err(GenError::EmptyCollection("persons"));
        }
        let mut rng = self.seeds.phase_rng(Phase::Arrests);
        let generator = ArrestGenerator::new(
            &self.config.arrest,
            &self.config.population,
            PropertyGenerator::new(&self.config.property),
        );
        let (start, anchor) = (self.window_start(), self.anchor());

        for _ in 0..count {
            let (person_id, call) = generator.choose_subject(&mut rng, &self.persons, &self.dataset.cad_incidents)?;
            let set = generator.generate(&mut rng, &self.persons, person_id, call, start, anchor)?;
            self.dataset.property.extend(set.evidence);
            self.dataset.arrests.push(set.arrest);
        }
        self.mark(Phase::Arrests, count);
        Ok(count)
    }

    /// Books `count` distinct arrests, in arrest order. Arrests too close
    /// to the anchor to fit a booking are never picked.
    pub fn generate_bookings(&mut self, count: usize) -> Result<usize, GenError> {
        if count == 0 {
            self.mark(Phase::Bookings, 0);
            return Ok(0);
        }
        if self.dataset.arrests.is_empty() {
            return Err(GenError::EmptyCollection("arrests"));
        }
        let mut rng = self.seeds.phase_rng(Phase::Bookings);
        let lifecycle = JailLifecycle::new(&self.config.jail, &self.config.population);
        let anchor = self.context.anchor();

        let bookable: Vec<usize> = (0..self.dataset.arrests.len())
            .filter(|&i| lifecycle.can_book(&self.dataset.arrests[i], anchor))
            .collect();
        if bookable.is_empty() {
            return Err(GenError::EmptyCollection("bookable arrests"));
        }
        let mut chosen: Vec<usize> = index::sample(&mut rng, bookable.len(), count.min(bookable.len()))
            .into_iter()
            .map(|i| bookable[i])
            .collect();
        chosen.sort_unstable();

        for idx in chosen {
            let arrest = &self.dataset.arrests[idx];
            let booking = lifecycle.book(&mut rng, arrest, &mut self.persons, anchor)?;
            self.dataset.bookings.push(booking);
        }
        let produced = self.dataset.bookings.len();
        self.mark(Phase::Bookings, produced);
        Ok(produced)
    }

    /// Sentences, bail bonds, incidents and logs for every booking.
    pub fn generate_follow_up(&mut self) -> Result<usize, GenError> {
        if self.dataset.bookings.is_empty() {
            return Err(GenError::EmptyCollection("bookings"));
        }
        let mut rng = self.seeds.phase_rng(Phase::FollowUp);
        let lifecycle = JailLifecycle::new(&self.config.jail, &self.config.population);
        let anchor = self.context.anchor();

        let mut produced = 0;
        for booking in &self.dataset.bookings {
            let artifacts = lifecycle.follow_up(&mut rng, booking, &mut self.persons, anchor)?;
            produced += artifacts.logs.len();
            self.dataset.jail_logs.extend(artifacts.logs);
            if let Some(sentence) = artifacts.sentence {
                self.dataset.sentences.push(sentence);
                produced += 1;
            }
            if let Some(bond) = artifacts.bail_bond {
                self.dataset.bail_bonds.push(bond);
                produced += 1;
            }
            if let Some(incident) = artifacts.incident {
                self.dataset.jail_incidents.push(incident);
                produced += 1;
            }
        }
        self.mark(Phase::FollowUp, produced);
        Ok(produced)
    }

    pub fn generate_facilities(&mut self) -> Result<usize, GenError> {
        let mut rng = self.seeds.phase_rng(Phase::Facilities);
        let lifecycle = JailLifecycle::new(&self.config.jail, &self.config.population);
        let facilities = lifecycle.facilities(&mut rng)?;
        let produced = facilities.len();
        self.dataset.facilities.extend(facilities);
        self.mark(Phase::Facilities, produced);
        Ok(produced)
    }

    /// Programs enrolling persons drawn from the bookings.
    pub fn generate_programs(&mut self) -> Result<usize, GenError> {
        let mut rng = self.seeds.phase_rng(Phase::Programs);
        let lifecycle = JailLifecycle::new(&self.config.jail, &self.config.population);
        let booked: Vec<PersonId> = self.dataset.bookings.iter().map(|b| b.person_id).collect();
        let programs = lifecycle.programs(&mut rng, &booked, self.context.anchor())?;
        let produced = programs.len();
        self.dataset.programs.extend(programs);
        self.mark(Phase::Programs, produced);
        Ok(produced)
    }

    /// Found, stolen and seized property tied to CAD incidents.
    pub fn generate_property(&mut self, count: usize) -> Result<usize, GenError> {
        if count > 0 && self.dataset.cad_incidents.is_empty() {
            return Err(GenError::EmptyCollection("cad_incidents"));
        }
        let mut rng = self.seeds.phase_rng(Phase::Property);
        let generator = PropertyGenerator::new(&self.config.property);
        let owner_probability = self.config.property.owner_probability;

        for _ in 0..count {
            let call = &self.dataset.cad_incidents[rng.gen_range(0..self.dataset.cad_incidents.len())];
            let owner = if chance(&mut rng, owner_probability) {
                Some(self.persons.random_id(&mut rng)?)
            } else {
                None
            };
            let logged_at = call.call_datetime + Duration::minutes(rng.gen_range(30..=240));
            let record = generator.generate(
                &mut rng,
                PropertyLink::incident(call.cad_id, owner),
                None,
                None,
                logged_at,
            )?;
            self.dataset.property.push(record);
        }
        self.mark(Phase::Property, count);
        Ok(count)
    }

    /// Copies the person index into the dataset and returns it.
    pub fn finish(&mut self) -> &Dataset {
        self.dataset.persons = self.persons.iter().cloned().collect();
        &self.dataset
    }
}

/// One EMS partition: call times are drawn up front and sorted so every
/// identity's history grows forward in time.
fn run_ems_worker(
    rng: &mut ChaCha8Rng,
    config: &GeneratorConfig,
    recurrence: RecurrenceConfig,
    cad: &[CadIncident],
    count: usize,
    cad_link_probability: f64,
    (start, anchor): (NaiveDateTime, NaiveDateTime),
) -> Result<WorkerOutput, GenError> {
    let lifecycle = EmsLifecycle::new(&config.ems, &config.population, config.timeline.clone())?;
    let mut ctx = GenerationContext::new(recurrence);

    let span = (anchor - start).num_seconds().max(1);
    let mut calls: Vec<(NaiveDateTime, Option<&CadIncident>)> = (0..count)
        .map(|_| {
            if !cad.is_empty() && chance(rng, cad_link_probability) {
                let call = &cad[rng.gen_range(0..cad.len())];
                (call.call_datetime, Some(call))
            } else {
                (start + Duration::seconds(rng.gen_range(0..span)), None)
            }
        })
        .collect();
    calls.sort_by_key(|(at, _)| *at);

    let mut records = Vec::with_capacity(count);
    for (call_at, call) in calls {
        records.push(lifecycle.generate(rng, &mut ctx, call_at, call)?);
    }
    Ok(WorkerOutput {
        records,
        persons: ctx.persons,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world(seed: u64) -> GenerationWorld {
        GenerationWorld::new(GeneratorConfig::default(), SimContext::shared(seed))
    }

    #[test]
    fn test_world_phases_in_order() {
        let mut world = world(42);
        world.generate_persons(10).unwrap();
        world.generate_cad(8).unwrap();
        world.generate_ems(12, 2, 0.5, None).unwrap();
        world.generate_arrests(6).unwrap();
        world.generate_bookings(4).unwrap();
        world.generate_follow_up().unwrap();
        world.generate_facilities().unwrap();
        world.generate_programs().unwrap();
        world.generate_property(3).unwrap();

        let dataset = world.finish();
        assert_eq!(dataset.ems_incidents.len(), 12);
        assert_eq!(dataset.bookings.len(), 4);
        assert!(dataset.persons.len() >= 10);
        assert_eq!(world.completed_phases().len(), Phase::all().len());
    }

    #[test]
    fn test_consuming_phase_before_producer_fails() {
        let mut world = world(1);
        assert!(matches!(world.generate_cad(5), Err(GenError::EmptyCollection("persons"))));
        assert!(matches!(world.generate_bookings(5), Err(GenError::EmptyCollection("arrests"))));
        assert!(matches!(world.generate_follow_up(), Err(GenError::EmptyCollection("bookings"))));
        assert!(matches!(world.generate_programs(), Err(GenError::EmptyCollection("bookings"))));
        assert!(matches!(world.generate_property(1), Err(GenError::EmptyCollection("cad_incidents"))));
    }

    #[test]
    fn test_partial_output_survives_failure() {
        let mut world = world(2);
        world.generate_persons(5).unwrap();
        assert!(world.generate_follow_up().is_err());
        assert_eq!(world.finish().persons.len(), 5);
    }

    #[test]
    fn test_bookings_skip_arrests_at_window_end() {
        let mut world = world(4);
        world.generate_persons(5).unwrap();
        world.generate_arrests(6).unwrap();
        let anchor = world.anchor();
        for arrest in world.dataset.arrests.iter_mut().skip(1) {
            arrest.arrest_datetime = anchor - Duration::minutes(10);
        }

        assert_eq!(world.generate_bookings(4).unwrap(), 1);
        let booking = &world.dataset.bookings[0];
        assert_eq!(booking.arrest_id, world.dataset.arrests[0].arrest_id);
        assert!(booking.booking_datetime < anchor);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut world = world(3);
        world.generate_persons(5).unwrap();
        world.generate_cad(5).unwrap();
        world.reset();
        assert!(world.persons.is_empty());
        assert!(world.dataset.is_empty());
        assert!(world.completed_phases().is_empty());
    }

    #[test]
    fn test_ems_merge_is_deterministic_across_runs() {
        let run = |seed| {
            let mut world = world(seed);
            world.generate_persons(5).unwrap();
            world.generate_cad(5).unwrap();
            world.generate_ems(30, 3, 0.3, None).unwrap();
            world.finish().clone()
        };
        assert_eq!(run(9), run(9));
    }
}
