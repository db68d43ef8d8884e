//! Conditional Attribute Cascade
//!
//! Resolves a fixed-order chain of dependent categorical attributes. Each
//! step names the attribute it fills and carries an ordered list of
//! resolvers; the first resolver that yields a value wins. The built-in
//! resolvers form the keyed → default → uniform chain, and domain code can
//! slot its own resolvers in between (for example a dosage computed from a
//! catalog range when no keyed dosage table exists).
//!
//! Keyed and default resolvers skip degenerate (all-zero) tables, so a
//! draw never lands on a value that has zero probability under the chosen
//! condition.

use crate::sampler::{ConditionalTable, DrawSource, WeightedTable};
use rand::{Rng, RngCore};
use safetynet_env::GenError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Separator used when several resolved values form one condition key.
pub const KEY_SEPARATOR: &str = "|";

/// Attribute values resolved so far, in resolution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedBundle {
    values: Vec<(String, String, DrawSource)>,
}

impl ResolvedBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the bundle with an attribute decided outside the cascade.
    pub fn with(mut self, attribute: &str, value: impl Into<String>) -> Self {
        self.insert(attribute, value.into(), DrawSource::Derived);
        self
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(a, _, _)| a == attribute)
            .map(|(_, v, _)| v.as_str())
    }

    pub fn source_of(&self, attribute: &str) -> Option<DrawSource> {
        self.values
            .iter()
            .find(|(a, _, _)| a == attribute)
            .map(|(_, _, s)| *s)
    }

    pub fn is_resolved(&self, attribute: &str) -> bool {
        self.values.iter().any(|(a, _, _)| a == attribute)
    }

    /// Resolved attribute names in resolution order.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(a, _, _)| a.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the value or an empty string.
    pub fn value_or_empty(&self, attribute: &str) -> String {
        self.get(attribute).unwrap_or_default().to_string()
    }

    /// Builds the condition key for `conditions`, or errors if one is unresolved.
    pub fn condition_key(&self, conditions: &[String]) -> Result<String, GenError> {
        let mut parts = Vec::with_capacity(conditions.len());
        for condition in conditions {
            match self.get(condition) {
                Some(value) => parts.push(value),
                None => {
                    return Err(GenError::invalid_config(format!(
                        "cascade condition '{}' is not resolved yet",
                        condition
                    )))
                }
            }
        }
        Ok(parts.join(KEY_SEPARATOR))
    }

    fn insert(&mut self, attribute: &str, value: String, source: DrawSource) {
        // Already-resolved attributes are never redrawn
        if !self.is_resolved(attribute) {
            self.values.push((attribute.to_string(), value, source));
        }
    }
}

/// One way of producing an attribute value.
pub trait StepResolver: Send + Sync {
    /// Label recorded on values this resolver produces.
    fn source(&self) -> DrawSource;

    /// Returns a value, or `None` to let the next resolver try.
    fn resolve(&self, bundle: &ResolvedBundle, rng: &mut dyn RngCore) -> Result<Option<String>, GenError>;
}

/// Draws from the table registered for the condition key.
pub struct KeyedStep {
    conditions: Vec<String>,
    table: Arc<ConditionalTable<String, String>>,
}

impl KeyedStep {
    pub fn new(conditions: &[&str], table: Arc<ConditionalTable<String, String>>) -> Self {
        Self {
            conditions: conditions.iter().map(|c| c.to_string()).collect(),
            table,
        }
    }
}

impl StepResolver for KeyedStep {
    fn source(&self) -> DrawSource {
        DrawSource::Keyed
    }

    fn resolve(&self, bundle: &ResolvedBundle, rng: &mut dyn RngCore) -> Result<Option<String>, GenError> {
        let key = bundle.condition_key(&self.conditions)?;
        match self.table.keyed(&key) {
            Some(table) if !table.is_empty() && !table.is_degenerate() => {
                Ok(Some(table.sample(rng)?.clone()))
            }
            _ => Ok(None),
        }
    }
}

/// Draws from the conditional table's default.
pub struct DefaultStep {
    table: Arc<ConditionalTable<String, String>>,
}

impl DefaultStep {
    pub fn new(table: Arc<ConditionalTable<String, String>>) -> Self {
        Self { table }
    }
}

impl StepResolver for DefaultStep {
    fn source(&self) -> DrawSource {
        DrawSource::Default
    }

    fn resolve(&self, _bundle: &ResolvedBundle, rng: &mut dyn RngCore) -> Result<Option<String>, GenError> {
        match self.table.default_table() {
            Some(table) if !table.is_empty() && !table.is_degenerate() => {
                Ok(Some(table.sample(rng)?.clone()))
            }
            _ => Ok(None),
        }
    }
}

/// Draws uniformly over every value the conditional table mentions.
pub struct UniformStep {
    table: Arc<ConditionalTable<String, String>>,
}

impl UniformStep {
    pub fn new(table: Arc<ConditionalTable<String, String>>) -> Self {
        Self { table }
    }
}

impl StepResolver for UniformStep {
    fn source(&self) -> DrawSource {
        DrawSource::Uniform
    }

    fn resolve(&self, _bundle: &ResolvedBundle, rng: &mut dyn RngCore) -> Result<Option<String>, GenError> {
        let universe = self.table.universe();
        if universe.is_empty() {
            return Ok(None);
        }
        Ok(Some(universe[rng.gen_range(0..universe.len())].clone()))
    }
}

/// Unconditioned draw from a flat table.
pub struct FlatStep {
    table: WeightedTable<String>,
}

impl FlatStep {
    pub fn new(table: WeightedTable<String>) -> Self {
        Self { table }
    }
}

impl StepResolver for FlatStep {
    fn source(&self) -> DrawSource {
        DrawSource::Default
    }

    fn resolve(&self, _bundle: &ResolvedBundle, rng: &mut dyn RngCore) -> Result<Option<String>, GenError> {
        if self.table.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.table.sample(rng)?.clone()))
    }
}

/// One attribute and the resolvers tried, in order, to fill it.
pub struct CascadeStep {
    attribute: String,
    resolvers: Vec<Box<dyn StepResolver>>,
    value_map: BTreeMap<String, String>,
}

impl CascadeStep {
    /// A step with no resolvers yet.
    pub fn new(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            resolvers: Vec::new(),
            value_map: BTreeMap::new(),
        }
    }

    /// A first-stage draw from a flat table.
    pub fn independent(attribute: &str, table: WeightedTable<String>) -> Self {
        Self::new(attribute).push(FlatStep::new(table))
    }

    /// Keyed → default → uniform over `table`, keyed by `conditions`.
    pub fn conditioned(attribute: &str, conditions: &[&str], table: ConditionalTable<String, String>) -> Self {
        let table = Arc::new(table);
        Self::new(attribute)
            .push(KeyedStep::new(conditions, table.clone()))
            .push(DefaultStep::new(table.clone()))
            .push(UniformStep::new(table))
    }

    /// Appends a resolver to the end of the chain.
    pub fn push(mut self, resolver: impl StepResolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    /// Inserts a resolver at `index` (clamped to the chain length).
    pub fn insert(mut self, index: usize, resolver: impl StepResolver + 'static) -> Self {
        let index = index.min(self.resolvers.len());
        self.resolvers.insert(index, Box::new(resolver));
        self
    }

    /// Rewrites drawn values through `map`; unmapped values pass through.
    pub fn map_values(mut self, map: BTreeMap<String, String>) -> Self {
        self.value_map = map;
        self
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn resolver_count(&self) -> usize {
        self.resolvers.len()
    }
}

/// An ordered chain of dependent attribute draws.
#[derive(Default)]
pub struct AttributeCascade {
    steps: Vec<CascadeStep>,
}

impl AttributeCascade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, step: CascadeStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(CascadeStep::attribute)
    }

    /// Resolves every step not already present in `bundle`.
    ///
    /// A step with no matching resolver means the attribute's universe is
    /// empty, which is a caller contract violation.
    pub fn resolve<R: Rng>(&self, rng: &mut R, mut bundle: ResolvedBundle) -> Result<ResolvedBundle, GenError> {
        let rng: &mut dyn RngCore = rng;
        for step in &self.steps {
            if bundle.is_resolved(&step.attribute) {
                continue;
            }

            let mut resolved = None;
            for resolver in &step.resolvers {
                if let Some(value) = resolver.resolve(&bundle, &mut *rng)? {
                    resolved = Some((value, resolver.source()));
                    break;
                }
            }

            match resolved {
                Some((value, source)) => {
                    let value = step.value_map.get(&value).cloned().unwrap_or(value);
                    bundle.insert(&step.attribute, value, source);
                }
                None => {
                    return Err(GenError::empty_universe(format!(
                        "no resolver produced a value for '{}'",
                        step.attribute
                    )))
                }
            }
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn route_table() -> ConditionalTable<String, String> {
        ConditionalTable::from_keyed(&[
            ("NALOXONE", &[("INTRAMUSCULAR", 3.0), ("INTRANASAL", 1.0)]),
            ("ASPIRIN", &[("ORAL", 1.0)]),
            ("GHOST", &[("NEVER", 0.0)]),
        ])
        .with_default(WeightedTable::from_pairs(&[("INTRAVENOUS", 1.0)]))
    }

    fn cascade() -> AttributeCascade {
        AttributeCascade::new()
            .then(CascadeStep::independent(
                "medication",
                WeightedTable::from_pairs(&[("NALOXONE", 1.0), ("ASPIRIN", 1.0)]),
            ))
            .then(CascadeStep::conditioned("route", &["medication"], route_table()))
    }

    #[test]
    fn test_second_stage_uses_keyed_table() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        for _ in 0..100 {
            let bundle = cascade()
                .resolve(&mut rng, ResolvedBundle::new().with("medication", "NALOXONE"))
                .unwrap();
            assert_eq!(bundle.source_of("route"), Some(DrawSource::Keyed));
            let route = bundle.get("route").unwrap();
            assert!(route == "INTRAMUSCULAR" || route == "INTRANASAL");
        }
    }

    #[test]
    fn test_preresolved_attribute_is_not_redrawn() {
        let mut rng = ChaCha8Rng::seed_from_u64(22);
        let bundle = cascade()
            .resolve(&mut rng, ResolvedBundle::new().with("medication", "ASPIRIN"))
            .unwrap();
        assert_eq!(bundle.get("medication"), Some("ASPIRIN"));
        assert_eq!(bundle.source_of("medication"), Some(DrawSource::Derived));
        assert_eq!(bundle.get("route"), Some("ORAL"));
    }

    #[test]
    fn test_unseen_condition_uses_default() {
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        let bundle = cascade()
            .resolve(&mut rng, ResolvedBundle::new().with("medication", "GLUCOSE"))
            .unwrap();
        assert_eq!(bundle.get("route"), Some("INTRAVENOUS"));
        assert_eq!(bundle.source_of("route"), Some(DrawSource::Default));
    }

    #[test]
    fn test_degenerate_keyed_table_is_skipped() {
        let mut rng = ChaCha8Rng::seed_from_u64(24);
        let bundle = cascade()
            .resolve(&mut rng, ResolvedBundle::new().with("medication", "GHOST"))
            .unwrap();
        assert_ne!(bundle.get("route"), Some("NEVER"));
    }

    #[test]
    fn test_unresolved_condition_is_config_error() {
        let broken = AttributeCascade::new().then(CascadeStep::conditioned("route", &["medication"], route_table()));
        let mut rng = ChaCha8Rng::seed_from_u64(25);
        assert!(matches!(
            broken.resolve(&mut rng, ResolvedBundle::new()),
            Err(GenError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_three_stage_chain_with_joined_key() {
        let complication = ConditionalTable::from_keyed(&[("NALOXONE|WORSE", &[("OVERDOSE", 1.0)])])
            .with_default(WeightedTable::from_pairs(&[("NONE", 1.0)]));
        let chain = cascade()
            .then(CascadeStep::independent("response", WeightedTable::from_pairs(&[("WORSE", 1.0)])))
            .then(CascadeStep::conditioned("complication", &["medication", "response"], complication));

        let mut rng = ChaCha8Rng::seed_from_u64(26);
        let bundle = chain
            .resolve(&mut rng, ResolvedBundle::new().with("medication", "NALOXONE"))
            .unwrap();
        assert_eq!(bundle.get("complication"), Some("OVERDOSE"));
        let order: Vec<&str> = bundle.attributes().collect();
        assert_eq!(order, vec!["medication", "route", "response", "complication"]);
    }

    #[test]
    fn test_value_map_rewrites_units() {
        let mut map = BTreeMap::new();
        map.insert("KEEP_VEIN".to_string(), "ML".to_string());
        let chain = AttributeCascade::new().then(
            CascadeStep::independent("unit", WeightedTable::from_pairs(&[("KEEP_VEIN", 1.0)])).map_values(map),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(27);
        let bundle = chain.resolve(&mut rng, ResolvedBundle::new()).unwrap();
        assert_eq!(bundle.get("unit"), Some("ML"));
    }

    #[test]
    fn test_empty_step_is_contract_violation() {
        let chain = AttributeCascade::new().then(CascadeStep::new("nothing"));
        let mut rng = ChaCha8Rng::seed_from_u64(28);
        let err = chain.resolve(&mut rng, ResolvedBundle::new()).unwrap_err();
        assert!(err.is_contract_violation());
    }
}
