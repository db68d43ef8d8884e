//! Timeline Synthesizer - Ordered Lifecycle Timestamps
//!
//! Given an anchor time and a priority class, walks a configured list of
//! stages and accumulates one duration draw per stage onto the previous
//! stage's timestamp. Every range has a minimum of at least one second, so
//! adjacent stages are strictly increasing.
//!
//! Interval fields are never stored independently of the timestamps: they
//! are computed from the timeline on request, which keeps them consistent
//! with the stage times by construction.

use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use safetynet_env::GenError;
use serde::{Deserialize, Serialize};

/// Urgency class of an occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn all() -> [Priority; 3] {
        [Priority::High, Priority::Medium, Priority::Low]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Named points in an incident's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Call,
    Dispatch,
    EnRoute,
    Arrive,
    Transport,
    HospitalArrival,
    Clear,
}

/// Inclusive range of whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRange {
    pub min_secs: i64,
    pub max_secs: i64,
}

impl DurationRange {
    pub const fn secs(min_secs: i64, max_secs: i64) -> Self {
        Self { min_secs, max_secs }
    }

    pub const fn minutes(min: i64, max: i64) -> Self {
        Self::secs(min * 60, max * 60)
    }

    /// Draws a duration in seconds.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        rng.gen_range(self.min_secs..=self.max_secs)
    }

    pub fn contains(&self, secs: i64) -> bool {
        (self.min_secs..=self.max_secs).contains(&secs)
    }

    /// Ranges must advance time and be non-inverted.
    pub fn validate(&self) -> Result<(), GenError> {
        if self.min_secs < 1 {
            return Err(GenError::invalid_config(format!(
                "duration range minimum must be >= 1s, got {}",
                self.min_secs
            )));
        }
        if self.max_secs < self.min_secs {
            return Err(GenError::invalid_config(format!(
                "duration range {}..={} is inverted",
                self.min_secs, self.max_secs
            )));
        }
        Ok(())
    }
}

/// One range per priority class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityRanges {
    pub high: DurationRange,
    pub medium: DurationRange,
    pub low: DurationRange,
}

impl PriorityRanges {
    /// Same range regardless of priority.
    pub const fn flat(range: DurationRange) -> Self {
        Self {
            high: range,
            medium: range,
            low: range,
        }
    }

    pub fn get(&self, priority: Priority) -> DurationRange {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

/// A stage and the time it takes to reach it from the previous stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    pub stage: Stage,
    pub ranges: PriorityRanges,
}

/// Stage list for the synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Stage stamped with the anchor time itself
    pub anchor_stage: Stage,

    /// Stages after the anchor, in order
    pub stages: Vec<StageSpec>,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            anchor_stage: Stage::Call,
            stages: vec![
                StageSpec {
                    stage: Stage::Dispatch,
                    ranges: PriorityRanges {
                        high: DurationRange::secs(15, 60),
                        medium: DurationRange::secs(30, 120),
                        low: DurationRange::secs(60, 180),
                    },
                },
                StageSpec {
                    stage: Stage::EnRoute,
                    ranges: PriorityRanges {
                        high: DurationRange::secs(30, 120),
                        medium: DurationRange::secs(45, 180),
                        low: DurationRange::secs(90, 300),
                    },
                },
                StageSpec {
                    stage: Stage::Arrive,
                    ranges: PriorityRanges {
                        high: DurationRange::minutes(3, 8),
                        medium: DurationRange::minutes(5, 12),
                        low: DurationRange::minutes(8, 15),
                    },
                },
                StageSpec {
                    stage: Stage::Transport,
                    ranges: PriorityRanges::flat(DurationRange::minutes(15, 45)),
                },
                StageSpec {
                    stage: Stage::HospitalArrival,
                    ranges: PriorityRanges::flat(DurationRange::minutes(10, 30)),
                },
                StageSpec {
                    stage: Stage::Clear,
                    ranges: PriorityRanges::flat(DurationRange::minutes(30, 90)),
                },
            ],
        }
    }
}

impl TimelineConfig {
    /// Checks every range and that no stage appears twice.
    pub fn validate(&self) -> Result<(), GenError> {
        let mut seen = vec![self.anchor_stage];
        for spec in &self.stages {
            if seen.contains(&spec.stage) {
                return Err(GenError::invalid_config(format!(
                    "stage {:?} appears more than once",
                    spec.stage
                )));
            }
            seen.push(spec.stage);
            for priority in Priority::all() {
                spec.ranges.get(priority).validate()?;
            }
        }
        Ok(())
    }

    /// Position of `stage` in stamp order; the anchor stage is 0.
    pub fn position(&self, stage: Stage) -> Option<usize> {
        if stage == self.anchor_stage {
            return Some(0);
        }
        self.stages.iter().position(|spec| spec.stage == stage).map(|i| i + 1)
    }

    /// Checks that every stage in `required` is stamped, in that order.
    pub fn require_stages(&self, required: &[Stage]) -> Result<(), GenError> {
        let mut last: Option<(Stage, usize)> = None;
        for &stage in required {
            let pos = self
                .position(stage)
                .ok_or_else(|| GenError::invalid_config(format!("timeline is missing stage {:?}", stage)))?;
            if let Some((prev, prev_pos)) = last {
                if pos < prev_pos {
                    return Err(GenError::invalid_config(format!(
                        "timeline stamps {:?} before {:?}",
                        stage, prev
                    )));
                }
            }
            last = Some((stage, pos));
        }
        Ok(())
    }

    /// Returns the range used to reach `stage` at `priority`.
    pub fn range(&self, stage: Stage, priority: Priority) -> Option<DurationRange> {
        self.stages
            .iter()
            .find(|spec| spec.stage == stage)
            .map(|spec| spec.ranges.get(priority))
    }
}

/// Ordered stage timestamps for one occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub priority: Priority,
    stamps: Vec<(Stage, NaiveDateTime)>,
}

impl Timeline {
    /// Builds a timeline from explicit stamps (used when re-reading records).
    pub fn from_stamps(priority: Priority, stamps: Vec<(Stage, NaiveDateTime)>) -> Self {
        Self { priority, stamps }
    }

    /// Timestamp of a stage, if the timeline has it.
    pub fn at(&self, stage: Stage) -> Option<NaiveDateTime> {
        self.stamps
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, t)| *t)
    }

    pub fn anchor(&self) -> Option<NaiveDateTime> {
        self.stamps.first().map(|(_, t)| *t)
    }

    pub fn terminal(&self) -> Option<NaiveDateTime> {
        self.stamps.last().map(|(_, t)| *t)
    }

    pub fn stamps(&self) -> &[(Stage, NaiveDateTime)] {
        &self.stamps
    }

    /// Seconds from `from` to `to`, as a literal difference.
    pub fn interval_secs(&self, from: Stage, to: Stage) -> Option<i64> {
        Some((self.at(to)? - self.at(from)?).num_seconds())
    }

    /// Every stage is at or after its predecessor.
    pub fn is_monotonic(&self) -> bool {
        self.stamps.windows(2).all(|w| w[1].1 >= w[0].1)
    }

    /// Every stage is strictly after its predecessor.
    pub fn is_strictly_increasing(&self) -> bool {
        self.stamps.windows(2).all(|w| w[1].1 > w[0].1)
    }
}

/// Produces timelines from a validated `TimelineConfig`.
#[derive(Debug, Clone)]
pub struct TimelineSynthesizer {
    config: TimelineConfig,
}

impl TimelineSynthesizer {
    /// Creates a synthesizer, rejecting configs that could stall time.
    pub fn new(config: TimelineConfig) -> Result<Self, GenError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Synthesizes a timeline starting at `anchor`.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        anchor: NaiveDateTime,
        priority: Priority,
    ) -> Timeline {
        let mut stamps = Vec::with_capacity(self.config.stages.len() + 1);
        stamps.push((self.config.anchor_stage, anchor));

        let mut current = anchor;
        for spec in &self.config.stages {
            let secs = spec.ranges.get(priority).sample(rng);
            current += Duration::seconds(secs);
            stamps.push((spec.stage, current));
        }

        Timeline { priority, stamps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn anchor() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 14)
            .and_then(|d| d.and_hms_opt(22, 15, 0))
            .unwrap()
    }

    #[test]
    fn test_high_priority_within_bounds() {
        let synth = TimelineSynthesizer::new(TimelineConfig::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..500 {
            let t = synth.synthesize(&mut rng, anchor(), Priority::High);
            assert_eq!(t.anchor(), Some(anchor()));
            assert!(t.is_strictly_increasing());

            let dispatch = t.interval_secs(Stage::Call, Stage::Dispatch).unwrap();
            let enroute = t.interval_secs(Stage::Dispatch, Stage::EnRoute).unwrap();
            let arrival = t.interval_secs(Stage::EnRoute, Stage::Arrive).unwrap();
            assert!((15..=60).contains(&dispatch));
            assert!((30..=120).contains(&enroute));
            assert!((180..=480).contains(&arrival));
        }
    }

    #[test]
    fn test_priority_ranges_are_ordered() {
        let config = TimelineConfig::default();
        let high = config.range(Stage::Arrive, Priority::High).unwrap();
        let low = config.range(Stage::Arrive, Priority::Low).unwrap();
        assert!(high.max_secs < low.max_secs);
        assert!(config.range(Stage::Call, Priority::High).is_none());
    }

    #[test]
    fn test_zero_minimum_rejected() {
        let mut config = TimelineConfig::default();
        config.stages[0].ranges.low = DurationRange::secs(0, 10);
        assert!(matches!(
            TimelineSynthesizer::new(config),
            Err(GenError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let mut config = TimelineConfig::default();
        let dup = config.stages[1];
        config.stages.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_require_stages_checks_presence_and_order() {
        let config = TimelineConfig::default();
        assert_eq!(config.position(Stage::Call), Some(0));
        assert!(config.require_stages(&[Stage::Call, Stage::Arrive, Stage::Clear]).is_ok());
        assert!(config.require_stages(&[Stage::Clear, Stage::Arrive]).is_err());

        let mut short = config.clone();
        short.stages.retain(|spec| spec.stage != Stage::HospitalArrival);
        assert!(short.validate().is_ok());
        assert!(short.require_stages(&[Stage::Transport, Stage::HospitalArrival]).is_err());
    }

    #[test]
    fn test_missing_stage_interval_is_none() {
        let t = Timeline::from_stamps(Priority::Low, vec![(Stage::Call, anchor())]);
        assert_eq!(t.interval_secs(Stage::Call, Stage::Clear), None);
        assert!(t.is_monotonic());
    }

    proptest! {
        #[test]
        fn prop_timeline_monotonic_and_intervals_exact(seed in any::<u64>(), p in 0usize..3) {
            let priority = Priority::all()[p];
            let synth = TimelineSynthesizer::new(TimelineConfig::default()).unwrap();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let t = synth.synthesize(&mut rng, anchor(), priority);

            prop_assert!(t.is_monotonic());
            prop_assert_eq!(t.stamps().len(), 7);
            for w in t.stamps().windows(2) {
                let secs = t.interval_secs(w[0].0, w[1].0).unwrap();
                prop_assert_eq!(secs, (w[1].1 - w[0].1).num_seconds());
                prop_assert!(secs > 0);
            }
            let total = t.interval_secs(Stage::Call, Stage::Clear).unwrap();
            prop_assert_eq!(total, (t.terminal().unwrap() - t.anchor().unwrap()).num_seconds());
        }
    }
}
