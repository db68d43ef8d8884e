//! Dataset Metrics
//! ===============
//!
//! Summary statistics for a finished dataset:
//! - **Counts**: records per collection
//! - **Reuse**: how often EMS incidents land on an already-seen identity
//! - **Response**: mean call-to-arrival seconds per priority
//! - **Entropy**: Shannon entropy (bits) of the incident-type and
//!   medication distributions, a quick check that the weight tables are
//!   not collapsing onto a handful of values

use crate::dataset::Dataset;
use crate::timeline::Priority;
use safetynet_env::PersonId;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetMetrics {
    pub counts: BTreeMap<String, usize>,
    pub distinct_ems_patients: usize,
    /// Share of EMS incidents whose patient had a prior event
    pub identity_reuse_rate: f64,
    pub max_events_per_identity: usize,
    pub frequent_caller_incidents: usize,
    pub mean_response_secs: BTreeMap<String, f64>,
    pub incident_type_entropy_bits: f64,
    pub medication_entropy_bits: f64,
    pub bookings_in_custody: usize,
}

impl DatasetMetrics {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let counts = dataset
            .counts()
            .into_iter()
            .map(|(name, n)| (name.to_string(), n))
            .collect();

        let mut per_identity: HashMap<PersonId, usize> = HashMap::new();
        for incident in &dataset.ems_incidents {
            *per_identity.entry(incident.patient_person_id).or_insert(0) += 1;
        }
        let reused = dataset
            .ems_incidents
            .iter()
            .filter(|i| i.patient_prior_events > 0)
            .count();

        let mut response: BTreeMap<Priority, (i64, usize)> = BTreeMap::new();
        for incident in &dataset.ems_incidents {
            let slot = response.entry(incident.priority).or_insert((0, 0));
            slot.0 += incident.intervals.call_to_arrival_seconds;
            slot.1 += 1;
        }
        let mean_response_secs = response
            .into_iter()
            .map(|(priority, (sum, n))| (priority.name().to_string(), sum as f64 / n as f64))
            .collect();

        Self {
            counts,
            distinct_ems_patients: per_identity.len(),
            identity_reuse_rate: ratio(reused, dataset.ems_incidents.len()),
            max_events_per_identity: per_identity.values().copied().max().unwrap_or(0),
            frequent_caller_incidents: dataset.ems_incidents.iter().filter(|i| i.is_frequent_caller).count(),
            mean_response_secs,
            incident_type_entropy_bits: shannon_entropy(
                dataset.ems_incidents.iter().map(|i| i.incident_type_code.as_str()),
            ),
            medication_entropy_bits: shannon_entropy(
                dataset.ems_medications.iter().map(|m| m.medication_name.as_str()),
            ),
            bookings_in_custody: dataset
                .bookings
                .iter()
                .filter(|b| b.release_datetime.is_none())
                .count(),
        }
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64
    } else {
        0.0
    }
}

/// Shannon entropy in bits of the empirical distribution of `values`.
///
/// ```text
/// H = -Σ p_i log2(p_i)
/// ```
///
/// Empty input has zero entropy.
pub fn shannon_entropy<'a>(values: impl IntoIterator<Item = &'a str>) -> f64 {
    let mut freq: HashMap<&str, usize> = HashMap::new();
    let mut total = 0usize;
    for value in values {
        *freq.entry(value).or_insert(0) += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    // Sorted so the float sum is reproducible
    let mut counts: Vec<usize> = freq.into_values().collect();
    counts.sort_unstable();
    -counts
        .into_iter()
        .map(|c| {
            let p = c as f64 / n;
            p * p.log2()
        })
        .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_entropy_uniform() {
        let h = shannon_entropy(["A", "B", "C", "D"]);
        assert_relative_eq!(h, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_entropy_single_value_is_zero() {
        let h = shannon_entropy(["A", "A", "A"]);
        assert_relative_eq!(h, 0.0, epsilon = 1e-12);
        assert_relative_eq!(shannon_entropy(std::iter::empty()), 0.0);
    }

    #[test]
    fn test_entropy_skewed() {
        // p = (0.75, 0.25)
        let h = shannon_entropy(["A", "A", "A", "B"]);
        let expected = -(0.75f64 * 0.75f64.log2() + 0.25 * 0.25f64.log2());
        assert_relative_eq!(h, expected, epsilon = 1e-12);
        assert!(h < 1.0);
    }

    #[test]
    fn test_empty_dataset_metrics() {
        let metrics = DatasetMetrics::from_dataset(&Dataset::new());
        assert_eq!(metrics.distinct_ems_patients, 0);
        assert_relative_eq!(metrics.identity_reuse_rate, 0.0);
        assert!(metrics.mean_response_secs.is_empty());
        assert_eq!(metrics.counts.len(), 15);
    }
}
