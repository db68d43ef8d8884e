//! Built-in jail lifecycle tables.
//!
//! Everything the booking → sentence/bail/incident → log → program chain
//! draws from. Loaded with `#[serde(default)]`, so an override file only
//! needs the fields it changes.

use crate::person_index::{ParoleStatus, ProbationStatus};
use crate::records::{ChargeSeverity, SentenceType};
use crate::sampler::{ConditionalTable, IntRange, ListDraw, WeightedTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilitySpec {
    pub name: String,
    pub street: String,
    pub city: String,
    pub zip_code: String,
    pub capacity: u32,
    pub security_level: String,
}

/// Terms a sentence type can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceTerms {
    /// Candidate total lengths in days
    pub days: Vec<i64>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub good_time_eligible: bool,
}

/// Optional year-valued field on a sentence, rounded to one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YearField {
    pub probability: f64,
    pub min: f64,
    pub max: f64,
}

impl YearField {
    const fn new(probability: f64, min: f64, max: f64) -> Self {
        Self { probability, min, max }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramSpec {
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JailTables {
    // Booking
    pub facilities: Vec<FacilitySpec>,
    pub booking_delay_hours: IntRange,
    pub classification: WeightedTable<String>,
    pub special_housing: Vec<(String, f64)>,
    pub suicide_risk: WeightedTable<String>,
    pub stay_days: IntRange,
    pub release_types: WeightedTable<String>,
    pub housing_blocks: Vec<String>,
    pub housing_cells: IntRange,
    pub medical_alerts: ListDraw,
    pub booking_programs: ListDraw,
    pub bail_posted_probability: f64,

    // Person mutation at booking
    pub probation: WeightedTable<ProbationStatus>,
    pub parole: WeightedTable<ParoleStatus>,
    pub parole_offenses: WeightedTable<String>,
    pub parole_timings: WeightedTable<String>,
    pub gang_probability: f64,
    pub gang_membership: WeightedTable<String>,
    pub multistate_probability: f64,

    // Sentencing
    pub sentence_probability: f64,
    pub sentence_types: ConditionalTable<ChargeSeverity, SentenceType>,
    pub sentence_terms: BTreeMap<SentenceType, SentenceTerms>,
    pub max_time_served_days: i64,
    pub sentence_start_delay_days: IntRange,
    pub offense_descriptions: WeightedTable<String>,
    pub definite_term: YearField,
    pub minimum_term: YearField,
    /// Added on top of the minimum term
    pub maximum_term: YearField,
    pub return_violator: YearField,
    pub gun_term: YearField,
    pub commitment_county: YearField,

    // Bail bonds
    pub bond_probability: f64,
    pub bond_types: WeightedTable<String>,
    pub bond_amounts: Vec<u64>,
    pub bond_posted_probability: f64,
    pub bondsmen: Vec<String>,
    pub bond_conditions: ListDraw,
    pub bond_exonerated_probability: f64,

    // In-custody incidents
    pub incident_probability: f64,
    pub incident_types: WeightedTable<String>,
    pub incident_locations: WeightedTable<String>,
    pub incident_staff: IntRange,
    pub incident_descriptions: WeightedTable<String>,
    pub incident_actions: ListDraw,
    /// `NONE` means no outside referral
    pub incident_referrals: WeightedTable<String>,

    // Logs
    pub property_intake_minutes: IntRange,
    pub property_items: IntRange,
    pub medical_intake_probability: f64,
    pub medical_intake_minutes: IntRange,
    pub housing_change_probability: f64,
    pub housing_change_hours: IntRange,
    pub court_probability: f64,
    pub court_days: IntRange,
    pub courts: WeightedTable<String>,
    pub court_results: WeightedTable<String>,
    pub max_visitors: u32,
    pub visitor_relations: WeightedTable<String>,
    pub visit_minutes: IntRange,
    pub max_phone_calls: u32,
    pub phone_relations: WeightedTable<String>,
    pub call_minutes: IntRange,
    pub disciplinary_probability: f64,
    pub disciplinary_actions: WeightedTable<String>,
    pub disciplinary_reasons: WeightedTable<String>,
    pub program_enroll_days: IntRange,
    pub program_complete_probability: f64,
    pub program_complete_days: IntRange,

    // Programs
    pub programs: Vec<ProgramSpec>,
    pub program_providers: WeightedTable<String>,
    pub program_locations: WeightedTable<String>,
    pub program_schedules: WeightedTable<String>,
    pub program_capacity: IntRange,
    pub program_enrollment: IntRange,
    pub program_waitlist: IntRange,
    /// Start offset from the anchor, in days before it
    pub program_start_days_before: IntRange,
    pub program_start_days_after: IntRange,
    pub program_durations: Vec<i64>,
    pub program_active_probability: f64,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn terms(days: &[i64], notes: &[&str], good_time_eligible: bool) -> SentenceTerms {
    SentenceTerms {
        days: days.to_vec(),
        notes: strings(notes),
        good_time_eligible,
    }
}

fn default_sentence_types() -> ConditionalTable<ChargeSeverity, SentenceType> {
    use crate::records::SentenceType::*;
    ConditionalTable::new()
        .with_entry(
            ChargeSeverity::Felony,
            WeightedTable::new(vec![
                (JailTime, 40.0),
                (Prison, 10.0),
                (WorkRelease, 10.0),
                (HouseArrest, 5.0),
                (ElectronicMonitoring, 5.0),
                (Probation, 20.0),
                (Suspended, 10.0),
            ]),
        )
        .with_entry(
            ChargeSeverity::Misdemeanor,
            WeightedTable::new(vec![
                (Probation, 30.0),
                (CommunityService, 20.0),
                (TimeServed, 10.0),
                (JailTime, 15.0),
                (Suspended, 10.0),
                (FineOnly, 10.0),
                (ElectronicMonitoring, 5.0),
                (DeferredSentence, 5.0),
                (Diversion, 5.0),
            ]),
        )
        .with_entry(
            ChargeSeverity::Infraction,
            WeightedTable::new(vec![
                (FineOnly, 45.0),
                (TimeServed, 20.0),
                (DeferredSentence, 15.0),
                (Diversion, 10.0),
                (CommunityService, 10.0),
            ]),
        )
}

fn default_sentence_terms() -> BTreeMap<SentenceType, SentenceTerms> {
    use crate::records::SentenceType::*;
    let time_served: Vec<i64> = (1..=30).collect();
    [
        (JailTime, terms(&[15, 30, 60, 90, 120, 180, 365], &[], true)),
        (Prison, terms(&[365, 730, 1095, 1460, 1825], &[], true)),
        (
            WorkRelease,
            terms(&[30, 60, 90, 120, 180, 365], &["Eligible for work release"], true),
        ),
        (HouseArrest, terms(&[14, 30, 60, 90, 120, 180], &["House arrest"], false)),
        (
            ElectronicMonitoring,
            terms(&[14, 30, 60, 90, 120, 180], &["Electronic monitoring"], false),
        ),
        (
            Probation,
            terms(&[180, 365, 730, 1095], &["Supervised probation", "Unsupervised probation"], false),
        ),
        (
            CommunityService,
            terms(
                &[30, 60, 90, 120],
                &[
                    "20 hours community service",
                    "40 hours community service",
                    "80 hours community service",
                    "120 hours community service",
                ],
                false,
            ),
        ),
        (TimeServed, terms(&time_served, &["Time served"], false)),
        (
            FineOnly,
            terms(
                &[0],
                &["Fine only: $250", "Fine only: $500", "Fine only: $1000", "Fine only: $2000"],
                false,
            ),
        ),
        (DeferredSentence, terms(&[90, 180, 365], &["Deferred sentence"], false)),
        (Diversion, terms(&[90, 180, 365], &["Diversion program"], false)),
        (Suspended, terms(&[30, 60, 90, 120, 180], &["Sentence suspended"], false)),
    ]
    .into_iter()
    .collect()
}

fn facility(name: &str, street: &str, city: &str, zip: &str, capacity: u32, security: &str) -> FacilitySpec {
    FacilitySpec {
        name: name.into(),
        street: street.into(),
        city: city.into(),
        zip_code: zip.into(),
        capacity,
        security_level: security.into(),
    }
}

impl Default for JailTables {
    fn default() -> Self {
        Self {
            facilities: vec![
                facility("King County Correctional Facility", "500 5th Ave", "Seattle", "98104", 1300, "MAXIMUM"),
                facility("Maleng Regional Justice Center", "401 4th Ave N", "Kent", "98032", 700, "MEDIUM"),
                facility("South Correctional Entity (SCORE) Jail", "20817 17th Ave S", "Des Moines", "98198", 800, "MEDIUM"),
                facility("Kirkland Justice Center Jail", "11750 NE 118th St", "Kirkland", "98034", 60, "MINIMUM"),
            ],
            booking_delay_hours: IntRange::new(1, 6),
            classification: WeightedTable::from_pairs(&[("MINIMUM", 40.0), ("MEDIUM", 45.0), ("MAXIMUM", 15.0)]),
            special_housing: vec![
                ("MEDICAL".into(), 0.10),
                ("MENTAL_HEALTH".into(), 0.05),
                ("PROTECTIVE_CUSTODY".into(), 0.02),
            ],
            suicide_risk: WeightedTable::from_pairs(&[("NONE", 80.0), ("LOW", 15.0), ("MEDIUM", 4.0), ("HIGH", 1.0)]),
            stay_days: IntRange::new(1, 365),
            release_types: WeightedTable::from_pairs(&[
                ("BAIL", 40.0),
                ("TIME_SERVED", 30.0),
                ("DISMISSED", 20.0),
                ("TRANSFER", 10.0),
            ]),
            housing_blocks: strings(&["A", "B", "C", "D"]),
            housing_cells: IntRange::new(1, 20),
            medical_alerts: ListDraw::new(0.2, &[(1, 2.0), (2, 1.0)], &["DIABETES", "HYPERTENSION"]),
            booking_programs: ListDraw::new(0.4, &[(1, 2.0), (2, 1.0)], &["EDUCATION", "SUBSTANCE_ABUSE"]),
            bail_posted_probability: 0.6,

            probation: WeightedTable::uniform([ProbationStatus::None, ProbationStatus::Active, ProbationStatus::Inactive]),
            parole: WeightedTable::uniform([
                ParoleStatus::None,
                ParoleStatus::Consideration,
                ParoleStatus::Active,
                ParoleStatus::Completed,
            ]),
            parole_offenses: WeightedTable::from_items(&["THEFT 3", "ASSAULT 4", "DUI", "BURGLARY 2", "POSSESSION"]),
            parole_timings: WeightedTable::from_items(&["30_DAYS", "60_DAYS", "90_DAYS", "UNKNOWN"]),
            gang_probability: 0.15,
            gang_membership: WeightedTable::from_items(&["NONE", "KNOWN_ASSOCIATE", "DOCUMENTED_MEMBER"]),
            multistate_probability: 0.1,

            sentence_probability: 0.55,
            sentence_types: default_sentence_types(),
            sentence_terms: default_sentence_terms(),
            max_time_served_days: 45,
            sentence_start_delay_days: IntRange::new(0, 14),
            offense_descriptions: WeightedTable::from_items(&["THEFT 3", "ASSAULT 4", "DUI", "DV VIOLATION", "BURGLARY 2"]),
            definite_term: YearField::new(0.5, 0.5, 10.0),
            minimum_term: YearField::new(0.4, 0.5, 5.0),
            maximum_term: YearField::new(0.7, 0.5, 10.0),
            return_violator: YearField::new(0.15, 0.5, 3.0),
            gun_term: YearField::new(0.1, 1.0, 3.0),
            commitment_county: YearField::new(0.1, 0.5, 2.0),

            bond_probability: 0.45,
            bond_types: WeightedTable::from_items(&["CASH", "SURETY", "PROPERTY", "PERSONAL_RECOGNIZANCE"]),
            bond_amounts: vec![500, 1_000, 2_500, 5_000, 10_000],
            bond_posted_probability: 0.5,
            bondsmen: strings(&["AAA Bail Bonds", "Quick Release Bail", "Liberty Bonding"]),
            bond_conditions: ListDraw::new(
                0.67,
                &[(1, 1.0), (2, 1.0)],
                &["NO_CONTACT", "PRETRIAL_SUPERVISION", "TRAVEL_RESTRICTIONS", "SURRENDER_PASSPORT"],
            ),
            bond_exonerated_probability: 0.2,

            incident_probability: 0.2,
            incident_types: WeightedTable::from_items(&["ASSAULT", "CONTRABAND", "SELF_HARM", "MEDICAL", "PROPERTY_DAMAGE"]),
            incident_locations: WeightedTable::from_items(&["POD A", "POD B", "DAYROOM", "YARD", "CELL 2", "MEDICAL"]),
            incident_staff: IntRange::new(1, 3),
            incident_descriptions: WeightedTable::from_items(&[
                "Altercation between inmates; separated by staff.",
                "Contraband discovered during cell search.",
                "Inmate referred for medical evaluation.",
                "Property damage to dayroom table recorded.",
            ]),
            incident_actions: ListDraw::new(
                1.0,
                &[(1, 1.0), (2, 1.0), (3, 1.0)],
                &["MEDICAL_EVAL", "DISCIPLINARY", "ISOLATION", "REPORT_FILED", "EVIDENCE_SEIZED"],
            ),
            incident_referrals: WeightedTable::from_items(&["NONE", "KCSO", "PROSECUTOR"]),

            property_intake_minutes: IntRange::new(1, 30),
            property_items: IntRange::new(1, 8),
            medical_intake_probability: 0.9,
            medical_intake_minutes: IntRange::new(5, 45),
            housing_change_probability: 0.3,
            housing_change_hours: IntRange::new(6, 72),
            court_probability: 0.4,
            court_days: IntRange::new(1, 30),
            courts: WeightedTable::from_items(&["KCSC", "SMC", "BMC"]),
            court_results: WeightedTable::from_items(&["CONTINUED", "HELD", "RELEASED_ON_BOND"]),
            max_visitors: 3,
            visitor_relations: WeightedTable::from_items(&["FAMILY", "FRIEND", "ATTORNEY", "CLERGY"]),
            visit_minutes: IntRange::new(15, 60),
            max_phone_calls: 6,
            phone_relations: WeightedTable::from_items(&["FAMILY", "FRIEND", "ATTORNEY"]),
            call_minutes: IntRange::new(3, 30),
            disciplinary_probability: 0.1,
            disciplinary_actions: WeightedTable::from_items(&["WARNING", "LOSS_OF_PRIVILEGES", "SEGREGATION"]),
            disciplinary_reasons: WeightedTable::from_items(&["CONTRABAND", "UNAUTHORIZED_COMMUNICATION", "ALTERCATION"]),
            program_enroll_days: IntRange::new(1, 10),
            program_complete_probability: 0.5,
            program_complete_days: IntRange::new(15, 120),

            programs: [
                ("GED Prep", "EDUCATION"),
                ("Substance Abuse Counseling", "SUBSTANCE_ABUSE"),
                ("Vocational Training", "VOCATIONAL"),
                ("Anger Management", "MENTAL_HEALTH"),
                ("Cognitive Behavioral Therapy", "MENTAL_HEALTH"),
            ]
            .iter()
            .map(|(name, category)| ProgramSpec {
                name: name.to_string(),
                category: category.to_string(),
            })
            .collect(),
            program_providers: WeightedTable::from_items(&[
                "County Dept. of Corrections",
                "Community College",
                "Nonprofit Partner",
            ]),
            program_locations: WeightedTable::from_items(&["CLASSROOM 1", "CLASSROOM 2", "PROGRAM ROOM", "MULTIPURPOSE"]),
            program_schedules: WeightedTable::from_items(&[
                "Mon/Wed/Fri 10:00-12:00",
                "Tue/Thu 13:00-15:00",
                "Sat 09:00-12:00",
            ]),
            program_capacity: IntRange::new(10, 30),
            program_enrollment: IntRange::new(5, 20),
            program_waitlist: IntRange::new(0, 5),
            program_start_days_before: IntRange::new(0, 90),
            program_start_days_after: IntRange::new(0, 30),
            program_durations: vec![30, 60, 90],
            program_active_probability: 0.7,
        }
    }
}

impl JailTables {
    pub fn terms(&self, sentence_type: SentenceType) -> Option<&SentenceTerms> {
        self.sentence_terms.get(&sentence_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::DrawSource;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_tables_round_trip_through_json() {
        let tables = JailTables::default();
        let json = serde_json::to_string(&tables).unwrap();
        let back: JailTables = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tables);

        // A conditional table may omit its keyed section
        let sparse: ConditionalTable<ChargeSeverity, SentenceType> =
            serde_json::from_str(r#"{ "default": null }"#).unwrap();
        assert!(sparse.is_empty());
    }

    #[test]
    fn test_every_sentence_type_has_terms() {
        let tables = JailTables::default();
        for sentence_type in tables.sentence_types.universe() {
            let terms = tables.terms(*sentence_type).unwrap();
            assert!(!terms.days.is_empty(), "{:?}", sentence_type);
        }
    }

    #[test]
    fn test_infractions_never_draw_custody() {
        let tables = JailTables::default();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        for _ in 0..500 {
            let draw = tables.sentence_types.sample(&mut rng, &ChargeSeverity::Infraction).unwrap();
            assert_eq!(draw.source, DrawSource::Keyed);
            assert!(!draw.value.is_custodial());
        }
    }

    #[test]
    fn test_tables_survive_json_round_trip() {
        let tables = JailTables::default();
        let json = serde_json::to_string(&tables).unwrap();
        let back: JailTables = serde_json::from_str(&json).unwrap();
        assert_eq!(tables, back);
    }
}
