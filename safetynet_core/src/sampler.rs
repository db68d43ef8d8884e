//! Weighted Sampler - Flat and Conditional Categorical Draws
//! ==========================================================
//!
//! Every categorical field in a SafetyNet record comes out of one of two
//! table shapes:
//!
//! - `WeightedTable<T>`: a flat list of `(item, weight)` pairs. Weights do
//!   not need to sum to one; negative or non-finite weights are stored as
//!   zero. An all-zero table degrades to a uniform draw over its items.
//! - `ConditionalTable<K, T>`: weight tables keyed by a condition value,
//!   plus an optional default table.
//!
//! Conditional lookups run through a chain of resolvers, each of which
//! either yields candidates or passes:
//!
//! ```text
//!   KeyedResolver  ──miss──►  DefaultResolver  ──miss──►  UniformResolver
//!   (table[key])              (default table)              (item universe)
//! ```
//!
//! Only a table with no items at all is an error (`GenError::EmptyUniverse`).

use rand::Rng;
use safetynet_env::GenError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// FLAT TABLES
// =============================================================================

/// A discrete distribution over items of type `T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightedTable<T> {
    entries: Vec<(T, f64)>,
}

impl<T> WeightedTable<T> {
    /// Creates a table from `(item, weight)` pairs.
    pub fn new(entries: Vec<(T, f64)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(item, weight)| (item, sanitize_weight(weight)))
            .collect();
        Self { entries }
    }

    /// Creates a table giving every item the same weight.
    pub fn uniform(items: impl IntoIterator<Item = T>) -> Self {
        Self::new(items.into_iter().map(|item| (item, 1.0)).collect())
    }

    /// Number of items (including zero-weight items).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(item, weight)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&T, f64)> {
        self.entries.iter().map(|(item, weight)| (item, *weight))
    }

    /// Iterates items in table order.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(item, _)| item)
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|(_, weight)| weight).sum()
    }

    /// True when no item carries positive weight.
    pub fn is_degenerate(&self) -> bool {
        !(self.total_weight() > 0.0)
    }

    /// Draws one item with probability proportional to its weight.
    ///
    /// Zero-weight items are never returned unless every weight is zero,
    /// in which case the draw is uniform over all items.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&T, GenError> {
        if self.entries.is_empty() {
            return Err(GenError::empty_universe("weighted table has no items"));
        }

        let total = self.total_weight();
        if !(total > 0.0) || !total.is_finite() {
            let idx = rng.gen_range(0..self.entries.len());
            return Ok(&self.entries[idx].0);
        }

        let mut target = rng.gen::<f64>() * total;
        let mut last_positive = 0;
        for (idx, (item, weight)) in self.entries.iter().enumerate() {
            if *weight <= 0.0 {
                continue;
            }
            if target < *weight {
                return Ok(item);
            }
            target -= *weight;
            last_positive = idx;
        }

        // Float round-off on the final bucket
        Ok(&self.entries[last_positive].0)
    }

    /// Draws up to `k` distinct items, each draw weighted over what remains.
    ///
    /// Positive-weight items are exhausted before zero-weight items are
    /// considered, and zero-weight items are then drawn uniformly.
    pub fn sample_distinct<R: Rng + ?Sized>(&self, rng: &mut R, k: usize) -> Vec<&T> {
        let k = k.min(self.entries.len());
        let mut taken = vec![false; self.entries.len()];
        let mut picked = Vec::with_capacity(k);

        while picked.len() < k {
            let remaining_total: f64 = self
                .entries
                .iter()
                .zip(&taken)
                .filter(|(_, taken)| !**taken)
                .map(|((_, weight), _)| *weight)
                .sum();

            let idx = if remaining_total > 0.0 {
                let mut target = rng.gen::<f64>() * remaining_total;
                let mut chosen = None;
                for (idx, (_, weight)) in self.entries.iter().enumerate() {
                    if taken[idx] || *weight <= 0.0 {
                        continue;
                    }
                    chosen = Some(idx);
                    if target < *weight {
                        break;
                    }
                    target -= *weight;
                }
                chosen
            } else {
                let open: Vec<usize> = (0..self.entries.len()).filter(|i| !taken[*i]).collect();
                if open.is_empty() {
                    None
                } else {
                    Some(open[rng.gen_range(0..open.len())])
                }
            };

            match idx {
                Some(idx) => {
                    taken[idx] = true;
                    picked.push(&self.entries[idx].0);
                }
                None => break,
            }
        }

        picked
    }
}

impl<T: Clone> WeightedTable<T> {
    /// Draws one item and clones it out of the table.
    pub fn sample_cloned<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<T, GenError> {
        self.sample(rng).cloned()
    }
}

impl<T: PartialEq> WeightedTable<T> {
    /// Returns the stored weight of `item`, if present.
    pub fn weight_of(&self, item: &T) -> Option<f64> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == item)
            .map(|(_, weight)| *weight)
    }

    /// True when `item` can actually be drawn from this table.
    pub fn is_reachable(&self, item: &T) -> bool {
        match self.weight_of(item) {
            Some(weight) => weight > 0.0 || self.is_degenerate(),
            None => false,
        }
    }
}

impl WeightedTable<String> {
    /// Builds a string table from literal pairs.
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(item, weight)| (item.to_string(), *weight))
                .collect(),
        )
    }

    /// Builds an equal-weight string table from literals.
    pub fn from_items(items: &[&str]) -> Self {
        Self::uniform(items.iter().map(|item| item.to_string()))
    }
}

impl<T> FromIterator<(T, f64)> for WeightedTable<T> {
    fn from_iter<I: IntoIterator<Item = (T, f64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T> Default for WeightedTable<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

// =============================================================================
// CONDITIONAL TABLES
// =============================================================================

/// Which step of a fallback chain produced a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrawSource {
    /// Table registered for the exact condition value
    Keyed,
    /// The designated default table
    Default,
    /// Uniform over every item the table knows about
    Uniform,
    /// A resolver that computed the value from earlier attributes
    Derived,
}

/// A drawn value together with the resolver that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Draw<'a, T> {
    pub value: &'a T,
    pub source: DrawSource,
}

/// Two-level lookup: condition value → weight table, plus a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "K: Ord + Deserialize<'de>, T: Deserialize<'de>"))]
pub struct ConditionalTable<K: Ord, T> {
    #[serde(default)]
    keyed: BTreeMap<K, WeightedTable<T>>,
    #[serde(default)]
    default: Option<WeightedTable<T>>,
}

impl<K: Ord, T> ConditionalTable<K, T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            keyed: BTreeMap::new(),
            default: None,
        }
    }

    /// Registers the table for one condition value.
    pub fn with_entry(mut self, key: K, table: WeightedTable<T>) -> Self {
        self.keyed.insert(key, table);
        self
    }

    /// Sets the default table.
    pub fn with_default(mut self, table: WeightedTable<T>) -> Self {
        self.default = Some(table);
        self
    }

    /// Inserts or replaces the table for one condition value.
    pub fn insert(&mut self, key: K, table: WeightedTable<T>) {
        self.keyed.insert(key, table);
    }

    /// Returns the table keyed to `key`, if any.
    pub fn keyed(&self, key: &K) -> Option<&WeightedTable<T>> {
        self.keyed.get(key)
    }

    /// Returns the default table, if any.
    pub fn default_table(&self) -> Option<&WeightedTable<T>> {
        self.default.as_ref()
    }

    /// Iterates condition values in key order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.keyed.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.keyed.values().all(WeightedTable::is_empty)
            && self.default.as_ref().map_or(true, WeightedTable::is_empty)
    }
}

impl<K: Ord, T: PartialEq> ConditionalTable<K, T> {
    /// Every distinct item mentioned by any keyed table or the default,
    /// in key order then default order.
    pub fn universe(&self) -> Vec<&T> {
        let mut items: Vec<&T> = Vec::new();
        let tables = self.keyed.values().chain(self.default.iter());
        for table in tables {
            for item in table.items() {
                if !items.contains(&item) {
                    items.push(item);
                }
            }
        }
        items
    }

    /// Draws for `key` through the keyed → default → uniform chain.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, key: &K) -> Result<Draw<'_, T>, GenError> {
        let chain: [&dyn TableResolver<K, T>; 3] = [&KeyedResolver, &DefaultResolver, &UniformResolver];
        self.sample_with(&chain, rng, key)
    }

    /// Draws for `key` through a caller-supplied resolver chain.
    pub fn sample_with<R: Rng + ?Sized>(
        &self,
        chain: &[&dyn TableResolver<K, T>],
        rng: &mut R,
        key: &K,
    ) -> Result<Draw<'_, T>, GenError> {
        for resolver in chain {
            if let Some(candidates) = resolver.resolve(self, key) {
                let value = candidates.draw(rng)?;
                return Ok(Draw {
                    value,
                    source: resolver.source(),
                });
            }
        }
        Err(GenError::empty_universe("conditional table has no items"))
    }
}

impl<K: Ord, T> Default for ConditionalTable<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionalTable<String, String> {
    /// Builds a string table from literal keyed pairs.
    pub fn from_keyed(entries: &[(&str, &[(&str, f64)])]) -> Self {
        let mut table = Self::new();
        for (key, pairs) in entries {
            table.insert(key.to_string(), WeightedTable::from_pairs(pairs));
        }
        table
    }
}

// =============================================================================
// RESOLVER CHAIN
// =============================================================================

/// What a resolver hands back when it matches.
pub enum Candidates<'a, T> {
    Table(&'a WeightedTable<T>),
    Universe(Vec<&'a T>),
}

impl<'a, T> Candidates<'a, T> {
    /// Draws one value from the candidates.
    pub fn draw<R: Rng + ?Sized>(self, rng: &mut R) -> Result<&'a T, GenError> {
        match self {
            Candidates::Table(table) => table.sample(rng),
            Candidates::Universe(items) => {
                if items.is_empty() {
                    return Err(GenError::empty_universe("uniform fallback has no items"));
                }
                Ok(items[rng.gen_range(0..items.len())])
            }
        }
    }
}

/// One step of a conditional fallback chain.
pub trait TableResolver<K: Ord, T> {
    /// Label recorded on draws this resolver produces.
    fn source(&self) -> DrawSource;

    /// Returns candidates, or `None` to pass to the next resolver.
    fn resolve<'a>(&self, table: &'a ConditionalTable<K, T>, key: &K) -> Option<Candidates<'a, T>>;
}

/// Matches when a non-empty table is registered for the key.
pub struct KeyedResolver;

/// Matches when a non-empty default table exists.
pub struct DefaultResolver;

/// Matches when any item is known at all.
pub struct UniformResolver;

impl<K: Ord, T> TableResolver<K, T> for KeyedResolver {
    fn source(&self) -> DrawSource {
        DrawSource::Keyed
    }

    fn resolve<'a>(&self, table: &'a ConditionalTable<K, T>, key: &K) -> Option<Candidates<'a, T>> {
        table
            .keyed(key)
            .filter(|t| !t.is_empty())
            .map(Candidates::Table)
    }
}

impl<K: Ord, T> TableResolver<K, T> for DefaultResolver {
    fn source(&self) -> DrawSource {
        DrawSource::Default
    }

    fn resolve<'a>(&self, table: &'a ConditionalTable<K, T>, _key: &K) -> Option<Candidates<'a, T>> {
        table
            .default_table()
            .filter(|t| !t.is_empty())
            .map(Candidates::Table)
    }
}

impl<K: Ord, T: PartialEq> TableResolver<K, T> for UniformResolver {
    fn source(&self) -> DrawSource {
        DrawSource::Uniform
    }

    fn resolve<'a>(&self, table: &'a ConditionalTable<K, T>, _key: &K) -> Option<Candidates<'a, T>> {
        let universe = table.universe();
        if universe.is_empty() {
            None
        } else {
            Some(Candidates::Universe(universe))
        }
    }
}

/// Bernoulli draw; `p` is clamped to `[0, 1]`.
pub fn chance<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
    rng.gen_bool(p)
}

/// Uniform pick from a slice.
pub fn pick<'a, R: Rng + ?Sized, T>(rng: &mut R, items: &'a [T]) -> Result<&'a T, GenError> {
    if items.is_empty() {
        return Err(GenError::empty_universe("pick from empty slice"));
    }
    Ok(&items[rng.gen_range(0..items.len())])
}

// =============================================================================
// RANGES AND LIST DRAWS
// =============================================================================

/// Integer range, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    pub min: u32,
    pub max: u32,
}

impl IntRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// An inverted range collapses to `min`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        if self.max <= self.min {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    pub fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// "Has any of these": a chance, then a weighted count of distinct items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDraw {
    pub probability: f64,
    pub count: WeightedTable<usize>,
    pub items: Vec<String>,
}

impl ListDraw {
    pub fn new(probability: f64, counts: &[(usize, f64)], items: &[&str]) -> Self {
        Self {
            probability,
            count: WeightedTable::new(counts.to_vec()),
            items: items.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Draws with the configured probability.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<String>, GenError> {
        self.draw_with(rng, self.probability)
    }

    /// Draws with an explicit probability; a miss yields an empty list.
    pub fn draw_with<R: Rng + ?Sized>(&self, rng: &mut R, probability: f64) -> Result<Vec<String>, GenError> {
        if self.items.is_empty() || !chance(rng, probability) {
            return Ok(Vec::new());
        }
        let k = (*self.count.sample(rng)?).clamp(1, self.items.len());
        let table = WeightedTable::uniform(self.items.iter().cloned());
        Ok(table.sample_distinct(rng, k).into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_single_nonzero_weight_always_wins() {
        let table = WeightedTable::from_pairs(&[("A", 0.0), ("B", 3.5), ("C", 0.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1_000 {
            assert_eq!(table.sample(&mut rng).unwrap(), "B");
        }
    }

    #[test]
    fn test_all_zero_weights_fall_back_to_uniform() {
        let table = WeightedTable::from_pairs(&[("A", 0.0), ("B", 0.0), ("C", 0.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..300 {
            seen.insert(table.sample(&mut rng).unwrap().clone());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_negative_and_nan_weights_are_zeroed() {
        let table = WeightedTable::from_pairs(&[("A", -4.0), ("B", f64::NAN), ("C", 1.0)]);
        assert_eq!(table.weight_of(&"A".to_string()), Some(0.0));
        assert!(!table.is_reachable(&"B".to_string()));
        assert!(table.is_reachable(&"C".to_string()));
    }

    #[test]
    fn test_empty_table_is_contract_violation() {
        let table: WeightedTable<String> = WeightedTable::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let err = table.sample(&mut rng).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_weights_are_roughly_proportional() {
        let table = WeightedTable::from_pairs(&[("HEAVY", 9.0), ("LIGHT", 1.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let heavy = (0..10_000)
            .filter(|_| table.sample(&mut rng).unwrap() == "HEAVY")
            .count();
        assert!((8_700..9_300).contains(&heavy), "heavy={}", heavy);
    }

    #[test]
    fn test_sample_distinct_has_no_duplicates() {
        let table = WeightedTable::from_pairs(&[("A", 5.0), ("B", 1.0), ("C", 0.0), ("D", 2.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..100 {
            let picked = table.sample_distinct(&mut rng, 3);
            assert_eq!(picked.len(), 3);
            let unique: std::collections::HashSet<_> = picked.iter().collect();
            assert_eq!(unique.len(), 3);
            // Zero-weight C only appears once positives are exhausted
            assert!(!picked.contains(&&"C".to_string()));
        }
        assert_eq!(table.sample_distinct(&mut rng, 10).len(), 4);
    }

    #[test]
    fn test_conditional_keyed_hit() {
        let table = ConditionalTable::from_keyed(&[("NALOXONE", &[("0.4", 1.0), ("2", 1.0)])])
            .with_default(WeightedTable::from_pairs(&[("100", 1.0)]));
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        for _ in 0..50 {
            let draw = table.sample(&mut rng, &"NALOXONE".to_string()).unwrap();
            assert_eq!(draw.source, DrawSource::Keyed);
            assert!(draw.value == "0.4" || draw.value == "2");
        }
    }

    #[test]
    fn test_conditional_unseen_key_uses_default() {
        let table = ConditionalTable::from_keyed(&[("A", &[("x", 1.0)])])
            .with_default(WeightedTable::from_pairs(&[("d", 1.0)]));
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let draw = table.sample(&mut rng, &"Z".to_string()).unwrap();
        assert_eq!(draw.source, DrawSource::Default);
        assert_eq!(draw.value, "d");
    }

    #[test]
    fn test_conditional_unseen_key_without_default_is_uniform() {
        let table = ConditionalTable::from_keyed(&[
            ("A", &[("x", 1.0), ("y", 0.0)]),
            ("B", &[("y", 1.0), ("z", 1.0)]),
        ]);
        assert_eq!(table.universe().len(), 3);

        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..300 {
            let draw = table.sample(&mut rng, &"UNSEEN".to_string()).unwrap();
            assert_eq!(draw.source, DrawSource::Uniform);
            seen.insert(draw.value.clone());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_custom_chain_without_uniform_errors() {
        let table: ConditionalTable<String, String> = ConditionalTable::from_keyed(&[("A", &[("x", 1.0)])]);
        let chain: [&dyn TableResolver<String, String>; 2] = [&KeyedResolver, &DefaultResolver];
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        assert!(table.sample_with(&chain, &mut rng, &"B".to_string()).is_err());
        assert!(table.sample_with(&chain, &mut rng, &"A".to_string()).is_ok());
    }

    proptest! {
        #[test]
        fn prop_degenerate_distribution_is_deterministic(
            len in 1usize..12,
            hot in 0usize..12,
            weight in 0.001f64..1_000.0,
            seed in any::<u64>(),
        ) {
            let hot = hot % len;
            let table: WeightedTable<usize> = (0..len)
                .map(|i| (i, if i == hot { weight } else { 0.0 }))
                .collect();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for _ in 0..64 {
                prop_assert_eq!(*table.sample(&mut rng).unwrap(), hot);
            }
        }

        #[test]
        fn prop_fallback_never_raises(len in 1usize..12, seed in any::<u64>()) {
            let table: WeightedTable<usize> = (0..len).map(|i| (i, 0.0)).collect();
            let conditional: ConditionalTable<u8, usize> = ConditionalTable::new().with_entry(1, table.clone());
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            prop_assert!(*table.sample(&mut rng).unwrap() < len);
            let draw = conditional.sample(&mut rng, &42).unwrap();
            prop_assert_eq!(draw.source, DrawSource::Uniform);
            prop_assert!(*draw.value < len);
        }
    }
}
