//! Recurrence Pool - Identity Reuse With Spacing Rules
//!
//! Decides, per event, whether the event gets a brand-new identity or
//! reuses one the pool has seen before. Reuse is limited by a hard cap on
//! events per identity and by a minimum spacing that grows with the
//! identity's event count, so frequent callers show a plausible cadence
//! instead of same-day repeats.
//!
//! ```text
//!   NEW ──register──► ACTIVE(1) ──record_event──► ACTIVE(n) ──n == cap──► RETIRED
//! ```
//!
//! An empty pool or an empty eligible set always falls back to a new
//! identity. Nothing in this module can stall generation.

use crate::records::Address;
use crate::sampler::WeightedTable;
use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use safetynet_env::{GenError, PersonId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// First draw of every identity choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReuseDecision {
    NewIdentity,
    ReuseExisting,
    FrequentCaller,
}

impl ReuseDecision {
    pub fn wants_reuse(&self) -> bool {
        !matches!(self, ReuseDecision::NewIdentity)
    }
}

/// Minimum days since the last event once an identity has `min_events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpacingTier {
    pub min_events: u32,
    pub min_days: i64,
}

/// Reuse probabilities, cap and spacing tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrenceConfig {
    /// Weights of the new-vs-reuse decision
    pub decision: WeightedTable<ReuseDecision>,

    /// Hard cap on events per identity
    pub max_events: u32,

    /// Spacing tiers, ascending by `min_events`
    pub spacing: Vec<SpacingTier>,

    /// Selection weight is `base_weight + weight_per_event * count`
    pub base_weight: f64,
    pub weight_per_event: f64,

    /// Event count from which an identity counts as a frequent caller
    pub frequent_threshold: u32,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            decision: WeightedTable::new(vec![
                (ReuseDecision::NewIdentity, 0.70),
                (ReuseDecision::ReuseExisting, 0.20),
                (ReuseDecision::FrequentCaller, 0.10),
            ]),
            max_events: 8,
            spacing: vec![
                SpacingTier { min_events: 0, min_days: 1 },
                SpacingTier { min_events: 1, min_days: 7 },
                SpacingTier { min_events: 2, min_days: 14 },
                SpacingTier { min_events: 4, min_days: 30 },
            ],
            base_weight: 1.0,
            weight_per_event: 0.5,
            frequent_threshold: 3,
        }
    }
}

impl RecurrenceConfig {
    /// Same defaults with a different reuse probability (split 2:1 between
    /// plain and frequent reuse).
    pub fn with_reuse_probability(mut self, p: f64) -> Self {
        let p = p.clamp(0.0, 1.0);
        self.decision = WeightedTable::new(vec![
            (ReuseDecision::NewIdentity, 1.0 - p),
            (ReuseDecision::ReuseExisting, p * 2.0 / 3.0),
            (ReuseDecision::FrequentCaller, p / 3.0),
        ]);
        self
    }

    /// Minimum spacing in days for an identity with `count` prior events.
    pub fn min_spacing_days(&self, count: u32) -> i64 {
        self.spacing
            .iter()
            .filter(|tier| tier.min_events <= count)
            .map(|tier| tier.min_days)
            .last()
            .unwrap_or(0)
    }

    pub fn selection_weight(&self, count: u32) -> f64 {
        self.base_weight + self.weight_per_event * count as f64
    }

    pub fn validate(&self) -> Result<(), GenError> {
        if self.max_events == 0 {
            return Err(GenError::invalid_config("recurrence max_events must be > 0"));
        }
        if self.decision.is_empty() {
            return Err(GenError::invalid_config("recurrence decision table is empty"));
        }
        let ascending = self
            .spacing
            .windows(2)
            .all(|w| w[0].min_events < w[1].min_events && w[0].min_days <= w[1].min_days);
        if !ascending {
            return Err(GenError::invalid_config(
                "spacing tiers must ascend in both event count and days",
            ));
        }
        if self.weight_per_event < 0.0 || self.base_weight <= 0.0 {
            return Err(GenError::invalid_config("selection weight must increase with event count"));
        }
        Ok(())
    }
}

/// Where an identity sits in its reuse lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    /// Not in the pool
    New,
    /// In the pool with `n` recorded events
    Active(u32),
    /// Reached the event cap; never reused again
    Retired,
}

/// Reusable snapshot of an identity plus its event history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceProfile {
    pub person_id: PersonId,
    pub age: u32,
    pub sex: String,
    pub race: String,
    pub weight_lbs: u32,
    pub home_address: Address,
    pub medical_history: Vec<String>,
    pub chronic_conditions: Vec<String>,
    history: Vec<NaiveDateTime>,
}

impl RecurrenceProfile {
    pub fn new(
        person_id: PersonId,
        age: u32,
        sex: impl Into<String>,
        race: impl Into<String>,
        weight_lbs: u32,
        home_address: Address,
    ) -> Self {
        Self {
            person_id,
            age,
            sex: sex.into(),
            race: race.into(),
            weight_lbs,
            home_address,
            medical_history: Vec::new(),
            chronic_conditions: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn event_count(&self) -> u32 {
        self.history.len() as u32
    }

    pub fn last_event(&self) -> Option<NaiveDateTime> {
        self.history.iter().max().copied()
    }

    pub fn history(&self) -> &[NaiveDateTime] {
        &self.history
    }
}

/// Outcome of `RecurrencePool::choose`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityChoice {
    New,
    Reuse { person_id: PersonId, prior_events: u32 },
}

/// Bounded registry of identities eligible for reuse.
#[derive(Debug, Clone, Default)]
pub struct RecurrencePool {
    config: RecurrenceConfig,
    profiles: Vec<RecurrenceProfile>,
    index: HashMap<PersonId, usize>,
}

impl RecurrencePool {
    pub fn new(config: RecurrenceConfig) -> Self {
        Self {
            config,
            profiles: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RecurrenceConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn profile(&self, id: &PersonId) -> Option<&RecurrenceProfile> {
        self.index.get(id).map(|idx| &self.profiles[*idx])
    }

    pub fn profiles(&self) -> impl Iterator<Item = &RecurrenceProfile> {
        self.profiles.iter()
    }

    pub fn min_spacing_days(&self, count: u32) -> i64 {
        self.config.min_spacing_days(count)
    }

    pub fn state(&self, id: &PersonId) -> IdentityState {
        match self.profile(id) {
            None => IdentityState::New,
            Some(p) if p.event_count() >= self.config.max_events => IdentityState::Retired,
            Some(p) => IdentityState::Active(p.event_count()),
        }
    }

    /// True when `profile` may take an event at `at`.
    pub fn is_eligible(&self, profile: &RecurrenceProfile, at: NaiveDateTime) -> bool {
        let count = profile.event_count();
        if count >= self.config.max_events {
            return false;
        }
        match profile.last_event() {
            None => true,
            Some(last) => {
                let elapsed = at - last;
                elapsed >= Duration::zero() && elapsed.num_days() >= self.min_spacing_days(count)
            }
        }
    }

    /// Decides new-vs-reuse for an event at `at`.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R, at: NaiveDateTime) -> Result<IdentityChoice, GenError> {
        if self.profiles.is_empty() {
            return Ok(IdentityChoice::New);
        }

        let decision = *self.config.decision.sample(rng)?;
        if !decision.wants_reuse() {
            return Ok(IdentityChoice::New);
        }

        let eligible: WeightedTable<usize> = self
            .profiles
            .iter()
            .enumerate()
            .filter(|(_, p)| self.is_eligible(p, at))
            .map(|(idx, p)| (idx, self.config.selection_weight(p.event_count())))
            .collect();

        if eligible.is_empty() {
            trace!("No eligible identity at {}, creating new", at);
            return Ok(IdentityChoice::New);
        }

        let profile = &self.profiles[*eligible.sample(rng)?];
        Ok(IdentityChoice::Reuse {
            person_id: profile.person_id,
            prior_events: profile.event_count(),
        })
    }

    /// Adds a new identity and records its first event at `at`.
    pub fn register(&mut self, mut profile: RecurrenceProfile, at: NaiveDateTime) -> Result<(), GenError> {
        if self.index.contains_key(&profile.person_id) {
            return Err(GenError::DuplicateIdentity(profile.person_id.to_string()));
        }
        profile.history.push(at);
        self.index.insert(profile.person_id, self.profiles.len());
        self.profiles.push(profile);
        Ok(())
    }

    /// Appends an event to an existing identity and returns its new state.
    pub fn record_event(&mut self, id: &PersonId, at: NaiveDateTime) -> Result<IdentityState, GenError> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| GenError::missing_parent("recurrence profile", id))?;
        self.profiles[idx].history.push(at);
        Ok(self.state(id))
    }

    /// Clears every identity, keeping the configuration.
    pub fn reset(&mut self) {
        self.profiles.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    fn profile(seed: u64) -> RecurrenceProfile {
        RecurrenceProfile::new(PersonId::from_seed(seed), 54, "MALE", "WHITE", 180, Address::default())
    }

    fn always_reuse() -> RecurrenceConfig {
        RecurrenceConfig::default().with_reuse_probability(1.0)
    }

    #[test]
    fn test_spacing_tiers() {
        let config = RecurrenceConfig::default();
        assert_eq!(config.min_spacing_days(0), 1);
        assert_eq!(config.min_spacing_days(1), 7);
        assert_eq!(config.min_spacing_days(3), 14);
        assert_eq!(config.min_spacing_days(4), 30);
        assert_eq!(config.min_spacing_days(7), 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_pool_is_new() {
        let pool = RecurrencePool::new(always_reuse());
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        assert_eq!(pool.choose(&mut rng, t0()).unwrap(), IdentityChoice::New);
    }

    #[test]
    fn test_spacing_violation_falls_back_to_new() {
        // Three prior events, the latest ten days before T
        let mut pool = RecurrencePool::new(always_reuse());
        let id = PersonId::from_seed(1);
        pool.register(profile(1), t0() - Duration::days(60)).unwrap();
        pool.record_event(&id, t0() - Duration::days(40)).unwrap();
        pool.record_event(&id, t0() - Duration::days(10)).unwrap();
        assert_eq!(pool.state(&id), IdentityState::Active(3));

        let at = t0() - Duration::days(2);
        assert!(!pool.is_eligible(pool.profile(&id).unwrap(), at));
        let mut rng = ChaCha8Rng::seed_from_u64(32);
        for _ in 0..50 {
            assert_eq!(pool.choose(&mut rng, at).unwrap(), IdentityChoice::New);
        }
    }

    #[test]
    fn test_stricter_tier_rejects_forty_day_history() {
        // Three events all at T-40d; a 45-day tier for 3+ events rejects T-2d
        let mut config = always_reuse();
        config.spacing = vec![
            SpacingTier { min_events: 0, min_days: 1 },
            SpacingTier { min_events: 1, min_days: 7 },
            SpacingTier { min_events: 3, min_days: 45 },
        ];
        assert!(config.validate().is_ok());

        let mut pool = RecurrencePool::new(config);
        let id = PersonId::from_seed(2);
        let last = t0() - Duration::days(40);
        pool.register(profile(2), last).unwrap();
        pool.record_event(&id, last).unwrap();
        pool.record_event(&id, last).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(33);
        assert_eq!(pool.choose(&mut rng, t0() - Duration::days(2)).unwrap(), IdentityChoice::New);
    }

    #[test]
    fn test_eligible_identity_is_reused() {
        let mut pool = RecurrencePool::new(always_reuse());
        pool.register(profile(3), t0() - Duration::days(10)).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(34);
        let choice = pool.choose(&mut rng, t0()).unwrap();
        assert_eq!(
            choice,
            IdentityChoice::Reuse {
                person_id: PersonId::from_seed(3),
                prior_events: 1
            }
        );
    }

    #[test]
    fn test_one_event_spacing_boundary() {
        // One prior event needs seven whole days
        let mut pool = RecurrencePool::new(always_reuse());
        let id = PersonId::from_seed(9);
        pool.register(profile(9), t0() - Duration::days(7)).unwrap();
        let p = pool.profile(&id).unwrap();
        assert!(pool.is_eligible(p, t0()));
        assert!(!pool.is_eligible(p, t0() - Duration::seconds(1)));

        let mut rng = ChaCha8Rng::seed_from_u64(37);
        assert_eq!(pool.choose(&mut rng, t0() - Duration::days(2)).unwrap(), IdentityChoice::New);
    }

    #[test]
    fn test_cap_retires_identity() {
        let mut config = always_reuse();
        config.max_events = 2;
        let mut pool = RecurrencePool::new(config);
        let id = PersonId::from_seed(4);
        pool.register(profile(4), t0() - Duration::days(100)).unwrap();
        assert_eq!(pool.record_event(&id, t0() - Duration::days(50)).unwrap(), IdentityState::Retired);

        let mut rng = ChaCha8Rng::seed_from_u64(35);
        assert_eq!(pool.choose(&mut rng, t0()).unwrap(), IdentityChoice::New);
    }

    #[test]
    fn test_negative_elapsed_is_ineligible() {
        let mut pool = RecurrencePool::new(always_reuse());
        pool.register(profile(5), t0()).unwrap();
        let p = pool.profile(&PersonId::from_seed(5)).unwrap();
        assert!(!pool.is_eligible(p, t0() - Duration::days(3)));
    }

    #[test]
    fn test_duplicate_register_and_unknown_record() {
        let mut pool = RecurrencePool::new(RecurrenceConfig::default());
        pool.register(profile(6), t0()).unwrap();
        assert!(matches!(
            pool.register(profile(6), t0()),
            Err(GenError::DuplicateIdentity(_))
        ));
        assert!(pool.record_event(&PersonId::from_seed(99), t0()).is_err());
        assert_eq!(pool.state(&PersonId::from_seed(99)), IdentityState::New);

        pool.reset();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_selection_favours_heavier_histories() {
        let mut pool = RecurrencePool::new(always_reuse());
        let heavy = PersonId::from_seed(7);
        pool.register(profile(7), t0() - Duration::days(400)).unwrap();
        for days in [300, 200, 100] {
            pool.record_event(&heavy, t0() - Duration::days(days)).unwrap();
        }
        pool.register(profile(8), t0() - Duration::days(400)).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(36);
        let heavy_hits = (0..4_000)
            .filter(|_| {
                matches!(pool.choose(&mut rng, t0()).unwrap(), IdentityChoice::Reuse { person_id, .. } if person_id == heavy)
            })
            .count();
        // Weights 3.0 vs 1.5
        assert!(heavy_hits > 2_300, "heavy_hits={}", heavy_hits);
    }

    proptest! {
        #[test]
        fn prop_reuse_respects_spacing(seed in any::<u64>(), steps in 10usize..80) {
            let mut pool = RecurrencePool::new(RecurrenceConfig::default().with_reuse_probability(0.8));
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut at = t0();
            for i in 0..steps {
                at += Duration::hours(rng.gen_range(1..96));
                match pool.choose(&mut rng, at).unwrap() {
                    IdentityChoice::New => pool.register(profile(seed ^ i as u64 ^ 0xabc), at).unwrap_or(()),
                    IdentityChoice::Reuse { person_id, prior_events } => {
                        let last = pool.profile(&person_id).unwrap().last_event().unwrap();
                        prop_assert!((at - last).num_days() >= pool.min_spacing_days(prior_events));
                        prop_assert!(prior_events < pool.config().max_events);
                        pool.record_event(&person_id, at).unwrap();
                    }
                }
            }
        }
    }
}
