//! Integrity Module - Post-Run Dataset Audit
//! =========================================
//!
//! Re-checks a finished dataset against the invariants the generators are
//! supposed to uphold. Nothing here trusts the generator that produced the
//! records; every check works from the collections alone.
//!
//! Checks:
//! - Timeline monotonicity and interval arithmetic for every EMS incident
//! - Booking after arrest, release after booking, days served
//! - Jail logs bounded by the stay, BOOKED first and RELEASED last
//! - Recurrence spacing per identity
//! - Referential completeness for every child collection
//!
//! Usage:
//! ```ignore
//! use safetynet_core::integrity::IntegritySession;
//!
//! let mut session = IntegritySession::new(config.recurrence.clone());
//! let report = session.audit(&dataset);
//! assert!(report.passed());
//! ```

use crate::dataset::Dataset;
use crate::records::{EmsIntervals, LogAction};
use crate::recurrence::RecurrenceConfig;
use chrono::NaiveDateTime;
use safetynet_env::{PersonId, RecordId};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

// =============================================================================
// CHECKS
// =============================================================================

/// One family of invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityCheck {
    TimelineOrder,
    IntervalArithmetic,
    BookingOrder,
    DaysServed,
    LogOrder,
    RecurrenceSpacing,
    Referential,
}

impl IntegrityCheck {
    pub fn all() -> &'static [IntegrityCheck] {
        &[
            IntegrityCheck::TimelineOrder,
            IntegrityCheck::IntervalArithmetic,
            IntegrityCheck::BookingOrder,
            IntegrityCheck::DaysServed,
            IntegrityCheck::LogOrder,
            IntegrityCheck::RecurrenceSpacing,
            IntegrityCheck::Referential,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            IntegrityCheck::TimelineOrder => "timeline_order",
            IntegrityCheck::IntervalArithmetic => "interval_arithmetic",
            IntegrityCheck::BookingOrder => "booking_order",
            IntegrityCheck::DaysServed => "days_served",
            IntegrityCheck::LogOrder => "log_order",
            IntegrityCheck::RecurrenceSpacing => "recurrence_spacing",
            IntegrityCheck::Referential => "referential",
        }
    }
}

impl std::fmt::Display for IntegrityCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single failed invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub check: IntegrityCheck,
    pub detail: String,
}

// =============================================================================
// INTEGRITY SESSION
// =============================================================================

/// Collects violations across every check for one dataset.
pub struct IntegritySession {
    recurrence: RecurrenceConfig,
    violations: Vec<Violation>,
    checked: BTreeMap<IntegrityCheck, usize>,
    /// Violations kept verbatim; the rest are only counted
    sample_limit: usize,
    counts: BTreeMap<IntegrityCheck, usize>,
}

impl IntegritySession {
    pub fn new(recurrence: RecurrenceConfig) -> Self {
        Self::with_sample_limit(recurrence, 25)
    }

    pub fn with_sample_limit(recurrence: RecurrenceConfig, sample_limit: usize) -> Self {
        Self {
            recurrence,
            violations: Vec::new(),
            checked: BTreeMap::new(),
            sample_limit,
            counts: BTreeMap::new(),
        }
    }

    /// Runs every check over `dataset` and returns the report.
    pub fn audit(&mut self, dataset: &Dataset) -> IntegrityReport {
        self.check_timelines(dataset);
        self.check_bookings(dataset);
        self.check_logs(dataset);
        self.check_recurrence(dataset);
        self.check_references(dataset);
        self.generate_report()
    }

    fn observe(&mut self, check: IntegrityCheck) {
        *self.checked.entry(check).or_insert(0) += 1;
    }

    fn violate(&mut self, check: IntegrityCheck, detail: String) {
        *self.counts.entry(check).or_insert(0) += 1;
        if self.violations.len() < self.sample_limit {
            debug!("Integrity violation [{}]: {}", check, detail);
            self.violations.push(Violation { check, detail });
        }
    }

    pub fn check_timelines(&mut self, dataset: &Dataset) {
        for incident in &dataset.ems_incidents {
            self.observe(IntegrityCheck::TimelineOrder);
            if !incident.timeline.is_strictly_increasing() {
                self.violate(
                    IntegrityCheck::TimelineOrder,
                    format!("EMS {} timeline is not strictly increasing", incident.incident_number),
                );
            }

            self.observe(IntegrityCheck::IntervalArithmetic);
            match EmsIntervals::from_timeline(&incident.timeline) {
                Ok(expected) if expected == incident.intervals => {}
                Ok(_) => self.violate(
                    IntegrityCheck::IntervalArithmetic,
                    format!("EMS {} intervals disagree with its timeline", incident.incident_number),
                ),
                Err(e) => self.violate(
                    IntegrityCheck::IntervalArithmetic,
                    format!("EMS {}: {}", incident.incident_number, e),
                ),
            }
        }
    }

    pub fn check_bookings(&mut self, dataset: &Dataset) {
        let arrests: HashMap<RecordId, NaiveDateTime> = dataset
            .arrests
            .iter()
            .map(|a| (a.arrest_id, a.arrest_datetime))
            .collect();

        for booking in &dataset.bookings {
            self.observe(IntegrityCheck::BookingOrder);
            if let Some(arrested_at) = arrests.get(&booking.arrest_id) {
                if booking.booking_datetime < *arrested_at {
                    self.violate(
                        IntegrityCheck::BookingOrder,
                        format!("booking {} precedes its arrest", booking.booking_number),
                    );
                }
            }
            if let Some(released_at) = booking.release_datetime {
                if released_at <= booking.booking_datetime {
                    self.violate(
                        IntegrityCheck::BookingOrder,
                        format!("booking {} released before booked", booking.booking_number),
                    );
                }

                self.observe(IntegrityCheck::DaysServed);
                let days = (released_at - booking.booking_datetime).num_days();
                if days != booking.days_served {
                    self.violate(
                        IntegrityCheck::DaysServed,
                        format!(
                            "booking {} days served {} but stay is {} days",
                            booking.booking_number, booking.days_served, days
                        ),
                    );
                }
            }
        }
    }

    pub fn check_logs(&mut self, dataset: &Dataset) {
        let mut streams: BTreeMap<RecordId, Vec<(NaiveDateTime, LogAction)>> = BTreeMap::new();
        for log in &dataset.jail_logs {
            streams
                .entry(log.booking_id)
                .or_default()
                .push((log.log_datetime, log.action));
        }

        for booking in &dataset.bookings {
            let entries = match streams.get(&booking.booking_id) {
                Some(entries) => entries,
                None => continue,
            };
            self.observe(IntegrityCheck::LogOrder);

            if !entries.windows(2).all(|w| w[0].0 <= w[1].0) {
                self.violate(
                    IntegrityCheck::LogOrder,
                    format!("booking {} logs are not chronological", booking.booking_number),
                );
            }
            if entries.first().map(|e| e.1) != Some(LogAction::Booked) {
                self.violate(
                    IntegrityCheck::LogOrder,
                    format!("booking {} log stream does not open with BOOKED", booking.booking_number),
                );
            }
            let released = entries.iter().filter(|e| e.1 == LogAction::Released).count();
            match booking.release_datetime {
                Some(_) if released != 1 || entries.last().map(|e| e.1) != Some(LogAction::Released) => {
                    self.violate(
                        IntegrityCheck::LogOrder,
                        format!("booking {} log stream does not close with RELEASED", booking.booking_number),
                    );
                }
                None if released > 0 => {
                    self.violate(
                        IntegrityCheck::LogOrder,
                        format!("booking {} still in custody but logged RELEASED", booking.booking_number),
                    );
                }
                _ => {}
            }

            let end = booking.release_datetime;
            let outside = entries.iter().any(|(at, _)| {
                *at < booking.booking_datetime || end.map_or(false, |end| *at > end)
            });
            if outside {
                self.violate(
                    IntegrityCheck::LogOrder,
                    format!("booking {} has log entries outside the stay", booking.booking_number),
                );
            }
        }
    }

    /// Spacing between consecutive EMS events of each identity.
    pub fn check_recurrence(&mut self, dataset: &Dataset) {
        let mut events: HashMap<PersonId, Vec<NaiveDateTime>> = HashMap::new();
        for incident in &dataset.ems_incidents {
            if let Some(at) = incident.call_datetime() {
                events.entry(incident.patient_person_id).or_default().push(at);
            }
        }

        let mut identities: Vec<_> = events.into_iter().collect();
        identities.sort_by_key(|(id, _)| *id);
        for (person_id, mut history) in identities {
            history.sort();
            self.observe(IntegrityCheck::RecurrenceSpacing);
            if history.len() as u32 > self.recurrence.max_events {
                self.violate(
                    IntegrityCheck::RecurrenceSpacing,
                    format!("{} has {} events, cap is {}", person_id, history.len(), self.recurrence.max_events),
                );
            }
            for (idx, pair) in history.windows(2).enumerate() {
                let required = self.recurrence.min_spacing_days(idx as u32 + 1);
                let gap = (pair[1] - pair[0]).num_days();
                if gap < required {
                    self.violate(
                        IntegrityCheck::RecurrenceSpacing,
                        format!("{} events {} days apart, {} required", person_id, gap, required),
                    );
                }
            }
        }
    }

    pub fn check_references(&mut self, dataset: &Dataset) {
        let persons: HashSet<PersonId> = dataset.persons.iter().map(|p| p.person_id).collect();
        let cads: HashSet<RecordId> = dataset.cad_incidents.iter().map(|c| c.cad_id).collect();
        let incidents: HashSet<RecordId> = dataset.ems_incidents.iter().map(|i| i.incident_id).collect();
        let medications: HashSet<RecordId> = dataset.ems_medications.iter().map(|m| m.medication_id).collect();
        let arrests: HashSet<RecordId> = dataset.arrests.iter().map(|a| a.arrest_id).collect();
        let property: HashSet<RecordId> = dataset.property.iter().map(|p| p.property_id).collect();
        let bookings: HashSet<RecordId> = dataset.bookings.iter().map(|b| b.booking_id).collect();

        let mut missing: Vec<String> = Vec::new();
        let mut person = |kind: &str, id: &PersonId, checked: &mut usize| {
            *checked += 1;
            if !persons.contains(id) {
                missing.push(format!("{} references unknown person {}", kind, id));
            }
        };
        let mut checked = 0usize;

        for cad in &dataset.cad_incidents {
            if let Some(id) = &cad.person_id {
                person("CAD incident", id, &mut checked);
            }
        }
        for incident in &dataset.ems_incidents {
            person("EMS incident", &incident.patient_person_id, &mut checked);
        }
        for patient in &dataset.ems_patients {
            person("EMS patient", &patient.patient_id, &mut checked);
        }
        for med in &dataset.ems_medications {
            person("EMS medication", &med.patient_person_id, &mut checked);
        }
        for arrest in &dataset.arrests {
            person("arrest", &arrest.person_id, &mut checked);
        }
        for booking in &dataset.bookings {
            person("booking", &booking.person_id, &mut checked);
        }
        for record in &dataset.property {
            if let Some(owner) = &record.owner_person_id {
                person("property", owner, &mut checked);
            }
        }
        for program in &dataset.programs {
            for id in program.enrolled_person_ids.iter().chain(&program.waitlist_person_ids) {
                person("program", id, &mut checked);
            }
        }

        let mut record = |kind: &str, parent: &str, known: bool| {
            checked += 1;
            if !known {
                missing.push(format!("{} references unknown {}", kind, parent));
            }
        };
        for incident in &dataset.ems_incidents {
            if let Some(cad) = &incident.cad_incident_id {
                record("EMS incident", "CAD incident", cads.contains(cad));
            }
            for med in &incident.medication_ids {
                record("EMS incident", "medication", medications.contains(med));
            }
        }
        for med in &dataset.ems_medications {
            record("EMS medication", "EMS incident", incidents.contains(&med.incident_id));
        }
        for patient in &dataset.ems_patients {
            record("EMS patient", "EMS incident", incidents.contains(&patient.first_incident_id));
        }
        for report in &dataset.ems_reports {
            record("EMS report", "EMS incident", incidents.contains(&report.incident_id));
            for med in &report.medication_ids {
                record("EMS report", "medication", medications.contains(med));
            }
        }
        for arrest in &dataset.arrests {
            if let Some(cad) = &arrest.cad_incident_id {
                record("arrest", "CAD incident", cads.contains(cad));
            }
            for item in &arrest.evidence_property_ids {
                record("arrest", "property record", property.contains(item));
            }
        }
        for item in &dataset.property {
            if let Some(arrest) = &item.arrest_id {
                record("property", "arrest", arrests.contains(arrest));
            }
            if let Some(cad) = &item.cad_incident_id {
                record("property", "CAD incident", cads.contains(cad));
            }
        }
        for booking in &dataset.bookings {
            record("booking", "arrest", arrests.contains(&booking.arrest_id));
        }
        for sentence in &dataset.sentences {
            record("sentence", "booking", bookings.contains(&sentence.booking_id));
        }
        for bond in &dataset.bail_bonds {
            record("bail bond", "booking", bookings.contains(&bond.booking_id));
        }
        for incident in &dataset.jail_incidents {
            record("jail incident", "booking", bookings.contains(&incident.booking_id));
        }
        for log in &dataset.jail_logs {
            record("jail log", "booking", bookings.contains(&log.booking_id));
        }

        *self.checked.entry(IntegrityCheck::Referential).or_insert(0) += checked;
        for detail in missing {
            self.violate(IntegrityCheck::Referential, detail);
        }
    }

    /// Builds the report from everything checked so far.
    pub fn generate_report(&self) -> IntegrityReport {
        let checks = IntegrityCheck::all()
            .iter()
            .map(|check| {
                let outcome = CheckOutcome {
                    checked: self.checked.get(check).copied().unwrap_or(0),
                    violations: self.counts.get(check).copied().unwrap_or(0),
                };
                (check.name().to_string(), outcome)
            })
            .collect();

        let report = IntegrityReport {
            checks,
            samples: self.violations.clone(),
        };
        if !report.passed() {
            warn!("Integrity audit found {} violations", report.total_violations());
        }
        report
    }
}

// =============================================================================
// INTEGRITY REPORT
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub checked: usize,
    pub violations: usize,
}

/// Per-check violation counts plus a bounded sample of the violations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub checks: BTreeMap<String, CheckOutcome>,
    pub samples: Vec<Violation>,
}

impl IntegrityReport {
    pub fn total_violations(&self) -> usize {
        self.checks.values().map(|c| c.violations).sum()
    }

    /// A run passes only with zero violations.
    pub fn passed(&self) -> bool {
        self.total_violations() == 0
    }

    pub fn violations_for(&self, check: IntegrityCheck) -> usize {
        self.checks.get(check.name()).map_or(0, |c| c.violations)
    }

    /// First violation, for a one-line failure reason.
    pub fn first_failure(&self) -> Option<String> {
        self.samples.first().map(|v| format!("[{}] {}", v.check, v.detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Address, DispatchBundle, EmsIncident, JailBooking, JailLog, VitalSigns};
    use crate::timeline::{Priority, TimelineConfig, TimelineSynthesizer};
    use chrono::{Duration, NaiveDate};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn incident(person: PersonId, call_at: NaiveDateTime, rng: &mut ChaCha8Rng) -> EmsIncident {
        let timeline = TimelineSynthesizer::new(TimelineConfig::default())
            .unwrap()
            .synthesize(rng, call_at, Priority::Medium);
        EmsIncident {
            incident_id: RecordId::from_rng(rng),
            incident_number: "EMS-TEST".into(),
            cad_incident_id: None,
            incident_type_code: "2301021".into(),
            incident_type_description: "Chest Pain".into(),
            priority: Priority::Medium,
            intervals: EmsIntervals::from_timeline(&timeline).unwrap(),
            timeline,
            address: Address::default(),
            patient_person_id: person,
            patient_age: 40,
            patient_sex: "MALE".into(),
            patient_race: "WHITE".into(),
            patient_prior_events: 0,
            is_frequent_caller: false,
            primary_impression: "CHEST PAIN".into(),
            vital_signs: VitalSigns {
                bp_systolic: 120,
                bp_diastolic: 80,
                heart_rate: 80,
                respiratory_rate: 16,
                spo2: 98,
                temperature_f: 98.6,
            },
            treatment_provided: Vec::new(),
            medications_given: Vec::new(),
            medication_ids: Vec::new(),
            dispatch: DispatchBundle::default(),
        }
    }

    fn booking(booked: NaiveDateTime, days: i64) -> JailBooking {
        JailBooking {
            booking_id: RecordId::from_seed(1),
            person_id: PersonId::from_seed(1),
            arrest_id: RecordId::from_seed(2),
            booking_number: "BK1".into(),
            inmate_number: "IN1".into(),
            booking_datetime: booked,
            facility: "KING COUNTY JAIL".into(),
            housing_assignment: "A-1".into(),
            classification_level: "MINIMUM".into(),
            special_housing: Vec::new(),
            suicide_risk_level: "NONE".into(),
            medical_alerts: Vec::new(),
            charges_at_booking: Vec::new(),
            bail_amount: 0,
            bail_posted: false,
            programs_enrolled: Vec::new(),
            release_datetime: Some(booked + Duration::days(days)),
            release_type: "TIME_SERVED".into(),
            days_served: days,
        }
    }

    fn log(booking: &JailBooking, at: NaiveDateTime, action: LogAction) -> JailLog {
        JailLog {
            log_id: RecordId::new(),
            booking_id: booking.booking_id,
            person_id: booking.person_id,
            log_datetime: at,
            action,
            details: BTreeMap::new(),
            actor: "1234, SMITH".into(),
        }
    }

    #[test]
    fn test_empty_dataset_passes() {
        let report = IntegritySession::new(RecurrenceConfig::default()).audit(&Dataset::new());
        assert!(report.passed());
        assert_eq!(report.checks.len(), IntegrityCheck::all().len());
    }

    #[test]
    fn test_tampered_intervals_detected() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut dataset = Dataset::new();
        let mut ems = incident(PersonId::from_seed(1), at(1, 10), &mut rng);
        ems.intervals.total_scene_time_seconds += 60;
        dataset.ems_incidents.push(ems);

        let report = IntegritySession::new(RecurrenceConfig::default()).audit(&dataset);
        assert_eq!(report.violations_for(IntegrityCheck::IntervalArithmetic), 1);
        assert_eq!(report.violations_for(IntegrityCheck::TimelineOrder), 0);
    }

    #[test]
    fn test_spacing_violation_detected() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let config = RecurrenceConfig::default();
        let person = PersonId::from_seed(3);
        let mut dataset = Dataset::new();
        dataset.ems_incidents.push(incident(person, at(1, 10), &mut rng));
        dataset.ems_incidents.push(incident(person, at(1, 14), &mut rng));

        let report = IntegritySession::new(config.clone()).audit(&dataset);
        let expected = if config.min_spacing_days(1) > 0 { 1 } else { 0 };
        assert_eq!(report.violations_for(IntegrityCheck::RecurrenceSpacing), expected);
    }

    #[test]
    fn test_days_served_and_log_bounds() {
        let mut dataset = Dataset::new();
        let mut bad = booking(at(1, 8), 5);
        bad.days_served = 4;
        dataset.jail_logs.push(log(&bad, at(1, 8), LogAction::Booked));
        dataset.jail_logs.push(log(&bad, at(20, 8), LogAction::PhoneCall));
        dataset.jail_logs.push(log(&bad, at(6, 8), LogAction::Released));
        dataset.bookings.push(bad);

        let report = IntegritySession::new(RecurrenceConfig::default()).audit(&dataset);
        assert_eq!(report.violations_for(IntegrityCheck::DaysServed), 1);
        assert!(report.violations_for(IntegrityCheck::LogOrder) >= 1);
        assert!(!report.passed());
        assert!(report.first_failure().is_some());
    }

    #[test]
    fn test_dangling_reference_detected() {
        let mut dataset = Dataset::new();
        let good = booking(at(1, 8), 2);
        dataset.jail_logs.push(log(&good, at(1, 8), LogAction::Booked));
        dataset.jail_logs.push(log(&good, at(3, 8), LogAction::Released));
        dataset.bookings.push(good);

        let report = IntegritySession::new(RecurrenceConfig::default()).audit(&dataset);
        assert_eq!(report.violations_for(IntegrityCheck::LogOrder), 0);
        // Person and arrest are both absent
        assert_eq!(report.violations_for(IntegrityCheck::Referential), 2);
    }
}
