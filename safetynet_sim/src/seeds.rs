//! Deterministic seed provider for generation phases and workers.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use safetynet_env::{SEED_MIX, SEED_SPREAD};
use std::collections::HashMap;

/// Generation phases, in the order the runner executes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Persons,
    Cad,
    Ems,
    Arrests,
    Bookings,
    FollowUp,
    Facilities,
    Programs,
    Property,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[
            Phase::Persons,
            Phase::Cad,
            Phase::Ems,
            Phase::Arrests,
            Phase::Bookings,
            Phase::FollowUp,
            Phase::Facilities,
            Phase::Programs,
            Phase::Property,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Persons => "persons",
            Phase::Cad => "cad",
            Phase::Ems => "ems",
            Phase::Arrests => "arrests",
            Phase::Bookings => "bookings",
            Phase::FollowUp => "follow_up",
            Phase::Facilities => "facilities",
            Phase::Programs => "programs",
            Phase::Property => "property",
        }
    }

    fn salt(&self) -> u64 {
        *self as u64 + 1
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Provides deterministic RNG seeds derived from one master seed.
///
/// Seeds are:
/// - Deterministic: the same master seed always yields the same streams
/// - Unique: each phase and each EMS worker gets its own stream
/// - Isolated: changing the worker count leaves other workers' seeds alone
#[derive(Debug, Clone)]
pub struct SeedProvider {
    /// Master seed
    master_seed: u64,

    /// Cache of derived worker seeds by worker index
    worker_cache: HashMap<u64, u64>,
}

impl SeedProvider {
    pub fn new(master_seed: u64) -> Self {
        Self {
            master_seed,
            worker_cache: HashMap::new(),
        }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Seed for a single-threaded phase.
    pub fn phase_seed(&self, phase: Phase) -> u64 {
        self.master_seed.wrapping_mul(SEED_MIX) ^ phase.salt().wrapping_mul(SEED_SPREAD)
    }

    pub fn phase_rng(&self, phase: Phase) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.phase_seed(phase))
    }

    /// Seed for EMS worker `worker`.
    ///
    /// `master * golden ⊕ worker * prime`, kept apart from the phase seeds
    /// by the different combination.
    pub fn worker_seed(&mut self, worker: u64) -> u64 {
        if let Some(seed) = self.worker_cache.get(&worker) {
            return *seed;
        }
        let seed = self
            .master_seed
            .wrapping_mul(SEED_SPREAD)
            .wrapping_add(worker.wrapping_mul(SEED_MIX));
        self.worker_cache.insert(worker, seed);
        seed
    }

    /// Seeds for workers `0..count`.
    pub fn worker_seeds(&mut self, count: usize) -> Vec<u64> {
        (0..count as u64).map(|id| self.worker_seed(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::Rng;

    #[test]
    fn test_deterministic_phase_seeds() {
        let provider1 = SeedProvider::new(42);
        let provider2 = SeedProvider::new(42);

        for phase in Phase::all() {
            assert_eq!(provider1.phase_seed(*phase), provider2.phase_seed(*phase));
        }
        let a: u64 = provider1.phase_rng(Phase::Cad).gen();
        let b: u64 = provider2.phase_rng(Phase::Cad).gen();
        assert_eq!(a, b);
    }

    #[test]
    fn test_phases_get_distinct_seeds() {
        let provider = SeedProvider::new(42);
        let mut seeds: Vec<u64> = Phase::all().iter().map(|p| provider.phase_seed(*p)).collect();
        seeds.sort_unstable();
        seeds.dedup();
        assert_eq!(seeds.len(), Phase::all().len());
    }

    #[test]
    fn test_different_workers_different_seeds() {
        let mut provider = SeedProvider::new(42);

        let seed0 = provider.worker_seed(0);
        let seed1 = provider.worker_seed(1);
        let seed2 = provider.worker_seed(2);

        assert_ne!(seed0, seed1);
        assert_ne!(seed1, seed2);
        assert_ne!(seed0, seed2);
    }

    #[test]
    fn test_worker_isolation() {
        // Adding more workers shouldn't change existing seeds
        let mut provider1 = SeedProvider::new(42);
        let mut provider2 = SeedProvider::new(42);

        let seeds1 = provider1.worker_seeds(3);
        let _extra = provider2.worker_seeds(10);

        for (i, seed) in seeds1.iter().enumerate() {
            assert_eq!(*seed, provider2.worker_seed(i as u64));
        }
    }

    proptest! {
        #[test]
        fn prop_worker_seeds_unique_for_any_master(master in any::<u64>(), count in 1usize..64) {
            let mut provider = SeedProvider::new(master);
            let mut seeds = provider.worker_seeds(count);
            prop_assert_eq!(seeds[0], SeedProvider::new(master).worker_seed(0));
            seeds.sort_unstable();
            seeds.dedup();
            prop_assert_eq!(seeds.len(), count);
        }
    }
}
