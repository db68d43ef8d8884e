//! Identifier types shared by every SafetyNet crate.

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable key of an identity record (a person or patient).
///
/// Uses UUIDs so partitions generated by independent workers can be merged
/// without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub Uuid);

impl PersonId {
    /// Creates a new random PersonId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic PersonId from a seed.
    pub fn from_seed(seed: u64) -> Self {
        Self(seeded_uuid(seed))
    }

    /// Draws a PersonId from a (seeded) RNG.
    pub fn from_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(random_uuid(rng))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PersonId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PersonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form for logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Key of an event or child record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Creates a new random RecordId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic RecordId from a seed.
    pub fn from_seed(seed: u64) -> Self {
        Self(seeded_uuid(seed))
    }

    /// Draws a RecordId from a (seeded) RNG.
    pub fn from_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(random_uuid(rng))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

fn seeded_uuid(seed: u64) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes[0..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
    Uuid::from_bytes(bytes)
}

fn random_uuid<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_person_id_from_seed_is_stable() {
        assert_eq!(PersonId::from_seed(7), PersonId::from_seed(7));
        assert_ne!(PersonId::from_seed(7), PersonId::from_seed(8));
    }

    #[test]
    fn test_record_id_from_rng_is_reproducible() {
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        assert_eq!(RecordId::from_rng(&mut a), RecordId::from_rng(&mut b));
        // Drawn ids are version-4 shaped
        assert_eq!(RecordId::from_rng(&mut a).as_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_display_is_short() {
        assert_eq!(PersonId::from_seed(1).to_string().len(), 8);
    }
}
