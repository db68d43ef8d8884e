//! EMS Weight Tables
//! =================
//!
//! Every distribution the EMS lifecycle draws from, as one serde-friendly
//! config object. `EmsTables::default()` carries the built-in tables; a JSON
//! override file can replace any subset of them.
//!
//! The tables fall into four groups:
//!
//! - **Incident type**: base weights, time-of-day/weekend/season
//!   multipliers, medical-history overrides and the chronic-condition map
//!   used for frequent callers.
//! - **Clinical profile**: per-type impression, vitals ranges and
//!   treatments, plus priority, assessment scores and narratives.
//! - **Medication cascade**: catalog, per-type medication lists and the
//!   keyed route/dosage/unit/response/site/complication tables.
//! - **Dispatch cascade**: CAD level → provider → pre-arrival activation,
//!   acuity, procedures and the flat disposition/status tables.

use crate::sampler::{ConditionalTable, IntRange, ListDraw, WeightedTable};
use crate::timeline::{DurationRange, Priority, PriorityRanges, Stage, TimelineConfig};
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Incident type code for cardiac arrest.
pub const CARDIAC_ARREST: &str = "2301019";

/// Incident type used when no table names a type.
pub const NO_OTHER_CHOICE: &str = "2301051";

// =============================================================================
// SHARED SHAPES
// =============================================================================

/// Calendar windows an incident-type multiplier can apply in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeWindow {
    /// 22:00 - 04:59
    Night,
    /// 06:00 - 10:59
    MorningRush,
    /// 17:00 - 20:59
    EveningRush,
    /// 11:00 - 16:59 (daytime hours not already claimed by a rush window)
    Daytime,
    Weekend,
    Weekday,
    Winter,
    Spring,
    Summer,
    Fall,
}

impl TimeWindow {
    /// The hour window for `hour`, if any. 05:00 - 05:59 has none.
    pub fn for_hour(hour: u32) -> Option<TimeWindow> {
        match hour {
            22..=23 | 0..=4 => Some(TimeWindow::Night),
            6..=10 => Some(TimeWindow::MorningRush),
            17..=20 => Some(TimeWindow::EveningRush),
            7..=19 => Some(TimeWindow::Daytime),
            _ => None,
        }
    }

    /// Every window active at `at`.
    pub fn active_at(at: NaiveDateTime) -> Vec<TimeWindow> {
        let mut windows = Vec::with_capacity(3);
        if let Some(window) = Self::for_hour(at.hour()) {
            windows.push(window);
        }
        windows.push(match at.weekday() {
            Weekday::Sat | Weekday::Sun => TimeWindow::Weekend,
            _ => TimeWindow::Weekday,
        });
        windows.push(match at.month() {
            12 | 1 | 2 => TimeWindow::Winter,
            3..=5 => TimeWindow::Spring,
            6..=8 => TimeWindow::Summer,
            _ => TimeWindow::Fall,
        });
        windows
    }
}

/// Scales one incident type's base weight inside a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMultiplier {
    pub window: TimeWindow,
    pub incident_type: String,
    pub factor: f64,
}

/// Replaces the drawn type when the patient has `condition`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryOverride {
    pub condition: String,
    pub incident_type: String,
    pub probability: f64,
}

/// Vital-sign ranges for one incident type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsProfile {
    pub bp_systolic: IntRange,
    pub bp_diastolic: IntRange,
    pub heart_rate: IntRange,
    pub respiratory_rate: IntRange,
    pub spo2: IntRange,
    pub temperature_f: (f64, f64),
}

impl VitalsProfile {
    #[allow(clippy::too_many_arguments)]
    const fn new(
        sys: (u32, u32),
        dia: (u32, u32),
        hr: (u32, u32),
        rr: (u32, u32),
        spo2: (u32, u32),
        temp: (f64, f64),
    ) -> Self {
        Self {
            bp_systolic: IntRange::new(sys.0, sys.1),
            bp_diastolic: IntRange::new(dia.0, dia.1),
            heart_rate: IntRange::new(hr.0, hr.1),
            respiratory_rate: IntRange::new(rr.0, rr.1),
            spo2: IntRange::new(spo2.0, spo2.1),
            temperature_f: temp,
        }
    }

    /// No pressure, pulse or respirations.
    pub fn is_arrest(&self) -> bool {
        self.bp_systolic.max == 0 && self.heart_rate.max == 0
    }
}

/// Impression, vitals and treatments for one incident type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalProfile {
    pub impression: String,
    pub vitals: VitalsProfile,
    pub treatments: Vec<String>,
}

/// One administrable medication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationSpec {
    pub name: String,
    pub rxcui_code: String,
    pub dosage_min: f64,
    pub dosage_max: f64,
    pub unit: String,
}

/// Narrative text with `{age}`, `{sex}` and `{variant}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeTemplate {
    pub text: String,
    #[serde(default)]
    pub variants: Vec<String>,
}

/// Occupation table for patients whose age is below `max_age`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeBand {
    pub max_age: u32,
    pub table: WeightedTable<String>,
}

// =============================================================================
// TABLES
// =============================================================================

/// Injectable EMS configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmsTables {
    // --- incident type ---
    pub incident_descriptions: BTreeMap<String, String>,
    pub incident_base: WeightedTable<String>,
    pub type_multipliers: Vec<TypeMultiplier>,
    pub history_overrides: Vec<HistoryOverride>,
    pub chronic_incidents: BTreeMap<String, Vec<String>>,

    // --- clinical profile ---
    pub priority_map: BTreeMap<String, Priority>,
    pub default_priority: Priority,
    pub clinical_profiles: BTreeMap<String, ClinicalProfile>,
    pub default_profile: ClinicalProfile,
    /// Chance of Gaussian jitter on a non-arrest vitals draw
    pub atypical_vitals_probability: f64,
    pub pain_ranges: BTreeMap<String, IntRange>,
    pub default_pain: IntRange,
    pub gcs_ranges: BTreeMap<String, IntRange>,
    pub elderly_gcs: IntRange,
    pub default_gcs: IntRange,
    pub narratives: BTreeMap<String, NarrativeTemplate>,
    pub default_narrative: NarrativeTemplate,
    pub high_priority_facilities: Vec<String>,
    pub standard_facilities: Vec<String>,

    // --- medications ---
    pub medication_catalog: Vec<MedicationSpec>,
    pub medication_profiles: BTreeMap<String, Vec<String>>,
    pub default_medications: Vec<String>,
    pub medication_count: WeightedTable<usize>,
    pub oxygen_exempt_types: Vec<String>,
    pub med_route: ConditionalTable<String, String>,
    pub med_dosage: ConditionalTable<String, String>,
    pub med_unit: ConditionalTable<String, String>,
    pub unit_normalization: BTreeMap<String, String>,
    pub med_response: ConditionalTable<String, String>,
    pub med_site: ConditionalTable<String, String>,
    pub site_by_route: ConditionalTable<String, String>,
    pub med_complication: ConditionalTable<String, String>,
    pub prior_to_care_probability: f64,

    // --- dispatch ---
    pub cad_level: WeightedTable<String>,
    pub provider_type: ConditionalTable<String, String>,
    pub prearrival_activation: ConditionalTable<String, String>,
    pub patient_acuity: WeightedTable<String>,
    pub situation_acuity: ConditionalTable<String, String>,
    pub procedures: WeightedTable<String>,
    pub procedure_draws: IntRange,
    pub procedure_success: BTreeMap<String, f64>,
    pub default_procedure_success: f64,
    pub procedure_complication: ConditionalTable<String, String>,
    pub disposition: WeightedTable<String>,
    pub emd_performed: WeightedTable<String>,
    pub incident_status: WeightedTable<String>,
    pub unit_role: WeightedTable<String>,

    // --- patient profile ---
    pub patient_age: IntRange,
    /// Age from which the elderly GCS range applies
    pub elderly_age: u32,
    pub report_probability: f64,
    pub occupations: Vec<AgeBand>,
    pub allergies: ListDraw,
    /// `(older_than, probability)`, first match wins; younger patients get 0.2
    pub medication_age_chances: Vec<(u32, f64)>,
    pub current_medication_list: ListDraw,
    pub family_history: ListDraw,
    pub insurance: WeightedTable<String>,

    /// Faster response stages for callers the crews already know
    pub familiar_timeline: TimelineConfig,
}

impl EmsTables {
    /// Human description of an incident type code.
    pub fn describe(&self, code: &str) -> &str {
        self.incident_descriptions
            .get(code)
            .map(String::as_str)
            .unwrap_or("Unknown Problem")
    }

    /// Base weights scaled by every multiplier active at `at`.
    pub fn incident_weights(&self, at: NaiveDateTime) -> WeightedTable<String> {
        let active = TimeWindow::active_at(at);
        self.incident_base
            .iter()
            .map(|(code, base)| {
                let factor: f64 = self
                    .type_multipliers
                    .iter()
                    .filter(|m| &m.incident_type == code && active.contains(&m.window))
                    .map(|m| m.factor)
                    .product();
                (code.clone(), base * factor)
            })
            .collect()
    }

    pub fn priority_for(&self, code: &str) -> Priority {
        self.priority_map.get(code).copied().unwrap_or(self.default_priority)
    }

    pub fn clinical_profile(&self, code: &str) -> &ClinicalProfile {
        self.clinical_profiles.get(code).unwrap_or(&self.default_profile)
    }

    pub fn medications_for(&self, code: &str) -> &[String] {
        self.medication_profiles
            .get(code)
            .unwrap_or(&self.default_medications)
    }

    pub fn medication(&self, name: &str) -> Option<&MedicationSpec> {
        self.medication_catalog.iter().find(|m| m.name == name)
    }

    pub fn narrative(&self, code: &str) -> &NarrativeTemplate {
        self.narratives.get(code).unwrap_or(&self.default_narrative)
    }

    pub fn pain_range(&self, code: &str) -> IntRange {
        self.pain_ranges.get(code).copied().unwrap_or(self.default_pain)
    }

    /// GCS range for an incident type and patient age.
    pub fn gcs_range(&self, code: &str, age: u32) -> IntRange {
        match self.gcs_ranges.get(code) {
            Some(range) => *range,
            None if age >= self.elderly_age => self.elderly_gcs,
            None => self.default_gcs,
        }
    }

    /// Occupation table for `age`.
    pub fn occupation_table(&self, age: u32) -> Option<&WeightedTable<String>> {
        self.occupations
            .iter()
            .find(|band| age < band.max_age)
            .or_else(|| self.occupations.last())
            .map(|band| &band.table)
    }

    pub fn success_rate(&self, procedure: &str) -> f64 {
        self.procedure_success
            .get(procedure)
            .copied()
            .unwrap_or(self.default_procedure_success)
    }

    /// Chronic-condition incident types applicable to `conditions`.
    pub fn chronic_candidates(&self, conditions: &[String]) -> Vec<&str> {
        conditions
            .iter()
            .filter_map(|c| self.chronic_incidents.get(c))
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// Chance that a patient with `age` is on regular medication.
    pub fn medication_chance(&self, age: u32) -> f64 {
        self.medication_age_chances
            .iter()
            .find(|(min_age, _)| age > *min_age)
            .map(|(_, p)| *p)
            .unwrap_or(0.2)
    }
}

fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn flat(pairs: &[(&str, f64)]) -> WeightedTable<String> {
    WeightedTable::from_pairs(pairs)
}

fn profile(impression: &str, vitals: VitalsProfile, treatments: &[&str]) -> ClinicalProfile {
    ClinicalProfile {
        impression: impression.to_string(),
        vitals,
        treatments: strings(treatments),
    }
}

fn med(name: &str, code: &str, min: f64, max: f64, unit: &str) -> MedicationSpec {
    MedicationSpec {
        name: name.to_string(),
        rxcui_code: code.to_string(),
        dosage_min: min,
        dosage_max: max,
        unit: unit.to_string(),
    }
}

fn narrative(text: &str, variants: &[&str]) -> NarrativeTemplate {
    NarrativeTemplate {
        text: text.to_string(),
        variants: strings(variants),
    }
}

fn multiplier(window: TimeWindow, code: &str, factor: f64) -> TypeMultiplier {
    TypeMultiplier {
        window,
        incident_type: code.to_string(),
        factor,
    }
}

fn familiar_timeline() -> TimelineConfig {
    let mut config = TimelineConfig::default();
    for spec in &mut config.stages {
        let range = match spec.stage {
            Stage::Dispatch => Some(DurationRange::secs(10, 45)),
            Stage::EnRoute => Some(DurationRange::secs(20, 90)),
            Stage::Arrive => Some(DurationRange::minutes(2, 6)),
            _ => None,
        };
        if let Some(range) = range {
            spec.ranges = PriorityRanges::flat(range);
        }
    }
    config
}

impl Default for EmsTables {
    fn default() -> Self {
        use TimeWindow::*;

        let incident_descriptions = string_map(&[
            ("2301001", "Abdominal Pain/Problems"),
            ("2301003", "Allergic Reaction/Stings"),
            ("2301005", "Animal Bite"),
            ("2301007", "Assault"),
            ("2301009", "Automated Crash Notification"),
            ("2301011", "Back Pain (Non-Traumatic)"),
            ("2301013", "Breathing Problem"),
            ("2301015", "Burns/Explosion"),
            ("2301017", "Carbon Monoxide/Hazmat/Inhalation/CBRN"),
            ("2301019", "Cardiac Arrest/Death"),
            ("2301021", "Chest Pain (Non-Traumatic)"),
            ("2301023", "Choking"),
            ("2301025", "Convulsions/Seizure"),
            ("2301027", "Diabetic Problem"),
            ("2301029", "Electrocution/Lightning"),
            ("2301031", "Eye Problem/Injury"),
            ("2301033", "Falls"),
            ("2301035", "Fire"),
            ("2301037", "Headache"),
            ("2301039", "Healthcare Professional/Admission"),
            ("2301041", "Heart Problems/AICD"),
            ("2301043", "Heat/Cold Exposure"),
            ("2301045", "Hemorrhage/Laceration"),
            ("2301047", "Industrial Accident/Inaccessible Incident/Other Entrapments (Non-Vehicle)"),
            ("2301049", "Medical Alarm"),
            ("2301051", "No Other Appropriate Choice"),
            ("2301053", "Overdose/Poisoning/Ingestion"),
            ("2301055", "Pandemic/Epidemic/Outbreak"),
            ("2301057", "Pregnancy/Childbirth/Miscarriage"),
            ("2301059", "Psychiatric Problem/Abnormal Behavior/Suicide Attempt"),
            ("2301061", "Sick Person"),
            ("2301063", "Stab/Gunshot Wound/Penetrating Trauma"),
            ("2301065", "Standby"),
            ("2301067", "Stroke/CVA"),
            ("2301069", "Traffic/Transportation Incident"),
            ("2301071", "Transfer/Interfacility/Palliative Care"),
            ("2301073", "Traumatic Injury"),
            ("2301075", "Well Person Check"),
            ("2301077", "Unconscious/Fainting/Near-Fainting"),
            ("2301079", "Unknown Problem/Person Down"),
            ("2301081", "Drowning/Diving/SCUBA Accident"),
            ("2301083", "Airmedical Transport"),
        ]);

        let incident_base = flat(&[
            ("2301061", 14.0),
            ("2301013", 12.0),
            ("2301021", 11.0),
            ("2301033", 13.0),
            ("2301001", 7.0),
            ("2301025", 6.0),
            ("2301059", 6.0),
            ("2301053", 5.0),
            ("2301073", 6.0),
            ("2301067", 4.0),
            ("2301077", 5.0),
            ("2301027", 4.0),
            ("2301003", 3.0),
            ("2301057", 2.0),
            ("2301019", 2.0),
            ("2301063", 2.0),
            ("2301045", 2.0),
            ("2301043", 1.0),
            ("2301069", 3.0),
            ("2301007", 2.0),
            ("2301035", 1.0),
            ("2301005", 1.0),
            ("2301023", 1.0),
            ("2301037", 2.0),
            ("2301011", 2.0),
        ]);

        let type_multipliers = vec![
            multiplier(Night, "2301019", 2.5),
            multiplier(Night, "2301053", 2.0),
            multiplier(Night, "2301077", 1.8),
            multiplier(Night, "2301007", 2.2),
            multiplier(Night, "2301059", 1.6),
            multiplier(Night, "2301069", 1.4),
            multiplier(MorningRush, "2301021", 1.6),
            multiplier(MorningRush, "2301069", 2.0),
            multiplier(MorningRush, "2301033", 1.4),
            multiplier(MorningRush, "2301013", 1.3),
            multiplier(EveningRush, "2301069", 2.5),
            multiplier(EveningRush, "2301073", 1.5),
            multiplier(EveningRush, "2301007", 1.7),
            multiplier(Daytime, "2301033", 1.3),
            multiplier(Daytime, "2301021", 1.2),
            multiplier(Daytime, "2301013", 1.2),
            multiplier(Daytime, "2301001", 1.25),
            multiplier(Weekend, "2301053", 1.5),
            multiplier(Weekend, "2301059", 1.4),
            multiplier(Weekend, "2301073", 1.6),
            multiplier(Weekend, "2301033", 1.3),
            multiplier(Weekend, "2301069", 1.8),
            multiplier(Weekend, "2301007", 1.5),
            multiplier(Weekday, "2301021", 1.3),
            multiplier(Weekday, "2301013", 1.2),
            multiplier(Weekday, "2301061", 1.1),
            multiplier(Winter, "2301043", 4.0),
            multiplier(Winter, "2301033", 1.4),
            multiplier(Winter, "2301073", 1.3),
            multiplier(Winter, "2301021", 1.2),
            multiplier(Summer, "2301043", 3.0),
            multiplier(Summer, "2301003", 1.6),
            multiplier(Summer, "2301057", 1.3),
            multiplier(Summer, "2301073", 1.2),
            multiplier(Spring, "2301003", 1.8),
            multiplier(Spring, "2301025", 1.3),
            multiplier(Fall, "2301003", 1.4),
            multiplier(Fall, "2301033", 1.2),
        ];

        let history_overrides = [
            ("Heart Disease", "2301021", 0.3),
            ("Diabetes", "2301027", 0.2),
            ("COPD", "2301013", 0.25),
            ("Pregnancy", "2301057", 0.15),
            ("Sickle Cell Disease", "2301001", 0.2),
        ]
        .iter()
        .map(|(condition, code, p)| HistoryOverride {
            condition: condition.to_string(),
            incident_type: code.to_string(),
            probability: *p,
        })
        .collect();

        let chronic_incidents = [
            ("DIABETES_TYPE_2", &["2301027", "2301077", "2301001"][..]),
            ("HYPERTENSION", &["2301021", "2301067", "2301077"]),
            ("HEART_DISEASE", &["2301021", "2301019", "2301067"]),
            ("ASTHMA", &["2301013", "2301077"]),
            ("COPD", &["2301013", "2301077", "2301019"]),
            ("DEPRESSION", &["2301059", "2301077"]),
            ("ANXIETY", &["2301059", "2301077"]),
            ("ARTHRITIS", &["2301073", "2301011"]),
            ("KIDNEY_DISEASE", &["2301001", "2301077"]),
            ("THYROID_DISORDER", &["2301077", "2301001"]),
        ]
        .iter()
        .map(|(condition, codes)| (condition.to_string(), strings(codes)))
        .collect();

        let priority_map = [
            ("2301019", Priority::High),
            ("2301067", Priority::High),
            ("2301053", Priority::High),
            ("2301077", Priority::High),
            ("2301073", Priority::High),
            ("2301021", Priority::High),
            ("2301013", Priority::High),
            ("2301045", Priority::High),
            ("2301025", Priority::High),
            ("2301061", Priority::Medium),
            ("2301033", Priority::Medium),
            ("2301001", Priority::Medium),
            ("2301027", Priority::Medium),
            ("2301003", Priority::High),
            ("2301057", Priority::High),
            ("2301043", Priority::High),
            ("2301063", Priority::High),
            ("2301059", Priority::High),
            ("2301069", Priority::High),
            ("2301007", Priority::High),
            ("2301035", Priority::High),
            ("2301005", Priority::Medium),
            ("2301023", Priority::High),
            ("2301037", Priority::Medium),
            ("2301011", Priority::Low),
        ]
        .iter()
        .map(|(code, p)| (code.to_string(), *p))
        .collect();

        let clinical_profiles = [
            (
                "2301021",
                profile(
                    "CARDIAC",
                    VitalsProfile::new((140, 180), (80, 110), (90, 130), (16, 24), (92, 98), (97.0, 99.0)),
                    &["OXYGEN", "IV_ACCESS", "MONITORING", "ASPIRIN"],
                ),
            ),
            (
                "2301013",
                profile(
                    "RESPIRATORY",
                    VitalsProfile::new((110, 150), (70, 95), (90, 120), (20, 30), (85, 94), (97.0, 99.0)),
                    &["OXYGEN", "ALBUTEROL", "IV_ACCESS", "MONITORING"],
                ),
            ),
            (
                "2301053",
                profile(
                    "MEDICAL",
                    VitalsProfile::new((90, 120), (50, 80), (50, 100), (6, 12), (75, 90), (96.0, 99.0)),
                    &["NALOXONE", "IV_ACCESS", "MONITORING", "OXYGEN"],
                ),
            ),
            (
                "2301077",
                profile(
                    "MEDICAL",
                    VitalsProfile::new((80, 110), (50, 70), (50, 80), (10, 16), (90, 98), (96.0, 99.0)),
                    &["OXYGEN", "IV_FLUIDS", "MONITORING"],
                ),
            ),
            (
                "2301073",
                profile(
                    "TRAUMA",
                    VitalsProfile::new((85, 120), (50, 80), (90, 130), (18, 28), (92, 98), (97.0, 99.0)),
                    &["SPLINTING", "IV_FLUIDS", "BANDAGING", "OXYGEN"],
                ),
            ),
            (
                "2301025",
                profile(
                    "MEDICAL",
                    VitalsProfile::new((110, 160), (70, 100), (100, 140), (18, 26), (90, 98), (97.0, 99.0)),
                    &["OXYGEN", "IV_ACCESS", "MONITORING"],
                ),
            ),
            (
                "2301003",
                profile(
                    "MEDICAL",
                    VitalsProfile::new((100, 150), (60, 95), (100, 130), (20, 28), (88, 96), (97.0, 99.0)),
                    &["OXYGEN", "IV_ACCESS", "MONITORING"],
                ),
            ),
            (
                CARDIAC_ARREST,
                profile(
                    "CARDIAC",
                    VitalsProfile::new((0, 0), (0, 0), (0, 0), (0, 0), (60, 85), (96.0, 99.0)),
                    &["CPR", "DEFIBRILLATION", "IV_ACCESS", "OXYGEN"],
                ),
            ),
            (
                "2301045",
                profile(
                    "TRAUMA",
                    VitalsProfile::new((80, 110), (40, 70), (100, 140), (18, 28), (90, 98), (97.0, 99.0)),
                    &["IV_FLUIDS", "BANDAGING", "OXYGEN"],
                ),
            ),
            (
                "2301067",
                profile(
                    "MEDICAL",
                    VitalsProfile::new((150, 200), (90, 120), (70, 100), (14, 22), (95, 100), (97.0, 99.0)),
                    &["OXYGEN", "IV_ACCESS", "MONITORING"],
                ),
            ),
        ]
        .into_iter()
        .map(|(code, p)| (code.to_string(), p))
        .collect();

        let default_profile = profile(
            "MEDICAL",
            VitalsProfile::new((100, 140), (60, 90), (70, 110), (16, 22), (95, 99), (97.5, 98.6)),
            &["OXYGEN", "IV_ACCESS", "MONITORING"],
        );

        let mut pain_ranges = BTreeMap::new();
        for code in ["2301073", "2301045", "2301011", "2301001"] {
            pain_ranges.insert(code.to_string(), IntRange::new(4, 10));
        }
        for code in ["2301021", "2301013"] {
            pain_ranges.insert(code.to_string(), IntRange::new(3, 8));
        }

        let gcs_ranges = [
            (CARDIAC_ARREST, IntRange::new(3, 3)),
            ("2301077", IntRange::new(3, 8)),
            ("2301053", IntRange::new(3, 8)),
        ]
        .iter()
        .map(|(code, range)| (code.to_string(), *range))
        .collect();

        let narratives = [
            (
                CARDIAC_ARREST,
                narrative(
                    "Responded to {age}yo {sex} found unresponsive. CPR initiated. Transported to hospital with ongoing resuscitation efforts.",
                    &[],
                ),
            ),
            (
                "2301021",
                narrative(
                    "Chest pain call for {age}yo {sex}. Patient reports {variant} chest pain. ECG performed, oxygen administered.",
                    &["crushing", "sharp", "pressure-like"],
                ),
            ),
            (
                "2301013",
                narrative(
                    "Respiratory distress call. {age}yo {sex} patient experiencing {variant}. Oxygen therapy initiated.",
                    &["shortness of breath", "wheezing", "difficulty breathing"],
                ),
            ),
            (
                "2301073",
                narrative(
                    "Trauma call. {age}yo {sex} involved in {variant}. Patient assessed and stabilized.",
                    &["motor vehicle accident", "fall", "industrial accident"],
                ),
            ),
            (
                "2301053",
                narrative(
                    "Overdose/poisoning call. {age}yo {sex} found {variant}. Narcan administered. Patient responding to treatment.",
                    &["unconscious", "confused", "agitated"],
                ),
            ),
            (
                "2301077",
                narrative(
                    "Unconscious person call. {age}yo {sex} found unresponsive. Patient assessment performed. {variant}.",
                    &["Patient regained consciousness", "Patient transported unconscious"],
                ),
            ),
        ]
        .into_iter()
        .map(|(code, t)| (code.to_string(), t))
        .collect();

        let medication_catalog = vec![
            med("NORMAL SALINE", "7820", 500.0, 1000.0, "ML"),
            med("ONDANSETRON", "7941", 4.0, 8.0, "MG"),
            med("OXYGEN", "7781", 2.0, 15.0, "L/MIN"),
            med("FENTANYL", "4337", 25.0, 100.0, "MCG"),
            med("ASPIRIN", "1191", 81.0, 325.0, "MG"),
            med("NITROGLYCERIN", "7417", 0.3, 0.4, "MG"),
            med("ALBUTEROL", "435", 90.0, 180.0, "MCG"),
            med("IPRATROPIUM", "5737", 250.0, 500.0, "MCG"),
            med("METHYLPREDNISOLONE", "7021", 125.0, 250.0, "MG"),
            med("EPI 1:10,000", "3292", 0.1, 1.0, "MG"),
            med("NALOXONE", "7517", 0.4, 2.0, "MG"),
            med("DIPHENHYDRAMINE", "3498", 25.0, 50.0, "MG"),
            med("GLUCOSE", "3143", 25.0, 50.0, "ML"),
            med("ACETAMINOPHEN", "161", 325.0, 650.0, "MG"),
            med("EPI 1:1,000", "3292", 0.3, 0.5, "MG"),
            med("DEXTROSE 50%", "3143", 25.0, 50.0, "ML"),
            med("SODIUM BICARBONATE", "1778", 25.0, 50.0, "MEQ"),
            med("METOPROLOL", "6918", 5.0, 15.0, "MG"),
            med("MORPHINE", "7054", 2.0, 10.0, "MG"),
            med("MIDAZOLAM", "7018", 2.0, 10.0, "MG"),
            med("DIAZEPAM", "3322", 2.0, 10.0, "MG"),
            med("GLUCAGON", "4761", 0.5, 1.0, "MG"),
            med("HALOPERIDOL", "5093", 2.0, 10.0, "MG"),
            med("AMIODARONE", "177", 150.0, 300.0, "MG"),
            med("ATROPINE", "174", 0.5, 1.0, "MG"),
            med("CALCIUM CHLORIDE", "1754", 500.0, 1000.0, "MG"),
            med("TETRACAINE", "10391", 1.0, 2.0, "G"),
        ];

        let medication_profiles = [
            ("2301019", &["EPI 1:10,000", "AMIODARONE", "SODIUM BICARBONATE", "ATROPINE", "CALCIUM CHLORIDE"][..]),
            ("2301021", &["NITROGLYCERIN", "ASPIRIN", "MORPHINE", "OXYGEN", "METOPROLOL"]),
            ("2301013", &["ALBUTEROL", "IPRATROPIUM", "METHYLPREDNISOLONE", "OXYGEN", "EPI 1:1,000"]),
            ("2301001", &["MORPHINE", "ONDANSETRON", "NORMAL SALINE", "OXYGEN"]),
            ("2301053", &["NALOXONE", "OXYGEN", "NORMAL SALINE", "GLUCOSE", "DEXTROSE 50%"]),
            ("2301025", &["MIDAZOLAM", "DIAZEPAM", "OXYGEN", "NORMAL SALINE"]),
            ("2301003", &["EPI 1:1,000", "DIPHENHYDRAMINE", "OXYGEN", "NORMAL SALINE", "METHYLPREDNISOLONE"]),
            ("2301061", &["OXYGEN", "GLUCOSE", "NORMAL SALINE", "NALOXONE", "DEXTROSE 50%"]),
            ("2301063", &["OXYGEN", "NORMAL SALINE", "FENTANYL"]),
            ("2301073", &["FENTANYL", "MORPHINE", "NORMAL SALINE", "OXYGEN", "MIDAZOLAM"]),
            ("2301027", &["GLUCOSE", "DEXTROSE 50%", "GLUCAGON", "NORMAL SALINE"]),
            ("2301059", &["MIDAZOLAM", "HALOPERIDOL", "OXYGEN"]),
            ("2301041", &["NITROGLYCERIN", "ASPIRIN", "MORPHINE", "OXYGEN", "AMIODARONE"]),
            ("2301015", &["MORPHINE", "FENTANYL", "NORMAL SALINE", "OXYGEN"]),
            ("2301033", &["FENTANYL", "MORPHINE", "NORMAL SALINE", "OXYGEN"]),
            ("2301037", &["MORPHINE", "FENTANYL", "OXYGEN"]),
            ("2301011", &["MORPHINE", "FENTANYL", "OXYGEN"]),
            ("2301045", &["NORMAL SALINE", "OXYGEN", "MORPHINE"]),
            ("2301057", &["OXYGEN", "NORMAL SALINE", "EPI 1:10,000"]),
            ("2301043", &["NORMAL SALINE", "OXYGEN", "DEXTROSE 50%"]),
            ("2301023", &["OXYGEN", "NORMAL SALINE"]),
            ("2301031", &["TETRACAINE", "NORMAL SALINE"]),
            ("2301005", &["NORMAL SALINE", "OXYGEN", "MORPHINE"]),
            ("2301007", &["MORPHINE", "FENTANYL", "NORMAL SALINE", "OXYGEN"]),
            ("2301035", &["OXYGEN", "NORMAL SALINE", "MORPHINE"]),
            ("2301067", &["OXYGEN", "NORMAL SALINE", "ASPIRIN"]),
            ("2301069", &["MORPHINE", "FENTANYL", "NORMAL SALINE", "OXYGEN"]),
            ("2301077", &["OXYGEN", "GLUCOSE", "NORMAL SALINE", "NALOXONE"]),
        ]
        .iter()
        .map(|(code, meds)| (code.to_string(), strings(meds)))
        .collect();

        let med_route = ConditionalTable::from_keyed(&[
            (
                "NORMAL SALINE",
                &[("INTRAVENOUS", 0.957), ("INTRAOSSEOUS", 0.020), ("INTRAMUSCULAR", 0.005), ("IV_DRIP", 0.001)],
            ),
            ("ONDANSETRON", &[("INTRAVENOUS", 0.929), ("INTRAMUSCULAR", 0.069), ("INTRANASAL", 0.001)]),
            (
                "OXYGEN",
                &[
                    ("NON_REBREATHER", 0.453),
                    ("NASAL_CANNULA", 0.157),
                    ("INHALATION", 0.082),
                    ("BLOW_BY", 0.014),
                    ("ENDOTRACHEAL", 0.006),
                ],
            ),
            ("FENTANYL", &[("INTRAVENOUS", 0.741), ("INTRANASAL", 0.179), ("INTRAMUSCULAR", 0.032)]),
            ("ASPIRIN", &[("ORAL", 1.0)]),
            ("NITROGLYCERIN", &[("SUBLINGUAL", 0.972), ("ORAL", 0.028)]),
            ("ALBUTEROL", &[("INHALED", 1.0)]),
            ("IPRATROPIUM", &[("INHALED", 1.0)]),
            ("NALOXONE", &[("INTRAMUSCULAR", 0.45), ("INTRANASAL", 0.40), ("INTRAVENOUS", 0.15)]),
            ("EPI 1:1,000", &[("INTRAMUSCULAR", 1.0)]),
            ("GLUCAGON", &[("INTRAMUSCULAR", 1.0)]),
            ("ACETAMINOPHEN", &[("ORAL", 1.0)]),
            ("GLUCOSE", &[("ORAL", 0.6), ("INTRAVENOUS", 0.4)]),
            ("TETRACAINE", &[("OPHTHALMIC", 1.0)]),
        ])
        .with_default(flat(&[("INTRAVENOUS", 0.8), ("INTRAMUSCULAR", 0.1), ("INTRAOSSEOUS", 0.1)]));

        let med_dosage = ConditionalTable::from_keyed(&[
            ("ALBUTEROL", &[("2.5", 10.0), ("5", 1.0)]),
            ("DIAZEPAM", &[("2", 1.0), ("5", 1.0), ("10", 1.0)]),
            ("DIPHENHYDRAMINE", &[("25", 1.0), ("50", 1.0)]),
            ("EPI 1:1,000", &[("0.3", 1.0), ("0.5", 1.0)]),
            ("EPI 1:10,000", &[("0.1", 1.0), ("1.0", 1.0)]),
            ("FENTANYL", &[("25", 1.0), ("50", 1.0), ("75", 1.0), ("100", 1.0)]),
            ("GLUCOSE", &[("25", 1.0), ("50", 1.0)]),
            ("IPRATROPIUM", &[("250", 1.0), ("500", 1.0)]),
            ("METHYLPREDNISOLONE", &[("125", 1.0), ("250", 1.0)]),
            ("METOPROLOL", &[("5", 1.0), ("15", 1.0)]),
            ("MIDAZOLAM", &[("2", 1.0), ("10", 1.0)]),
            ("MORPHINE", &[("2", 1.0), ("4", 1.0), ("10", 1.0)]),
            ("NALOXONE", &[("0.4", 1.0), ("2", 1.0)]),
        ])
        .with_default(flat(&[("1", 1.0)]));

        let med_unit = ConditionalTable::from_keyed(&[
            ("ACETAMINOPHEN", &[("MG", 631.0), ("ML", 65.0)]),
            ("ALBUTEROL", &[("MG", 4422.0), ("PUFFS", 1.0)]),
            ("AMIODARONE", &[("MG", 345.0)]),
            ("ATROPINE", &[("MG", 277.0)]),
            ("CALCIUM CHLORIDE", &[("G", 102.0), ("MG", 22.0), ("ML", 1.0)]),
            ("DEXTROSE 50%", &[("G", 696.0), ("MG", 6.0)]),
            ("DIAZEPAM", &[("MG", 200.0)]),
            ("HALOPERIDOL", &[("MG", 36.0)]),
            ("IPRATROPIUM", &[("MCG", 2.0), ("MG", 721.0), ("ML", 4.0)]),
            ("METHYLPREDNISOLONE", &[("MG", 605.0)]),
            ("METOPROLOL", &[("MG", 447.0)]),
            ("MIDAZOLAM", &[("MCG", 1.0), ("MG", 140.0), ("ML", 3.0)]),
            ("NALOXONE", &[("MCG", 1.0), ("MG", 5129.0), ("UNITS", 1.0)]),
            ("NITROGLYCERIN", &[("MCG", 3.0)]),
            (
                "NORMAL SALINE",
                &[("ML", 13216.0), ("KEEP_VEIN", 696.0), ("L", 442.0), ("LITERS_PER", 47.0), ("LOCK_FLUSH", 4.0)],
            ),
            ("ONDANSETRON", &[("MG", 10241.0)]),
            ("OXYGEN", &[("LITERS_PER", 5718.0), ("L", 1374.0), ("LITERS_BO", 869.0)]),
            ("SODIUM BICARBONATE", &[("MCG", 653.0), ("MG", 2.0), ("ML", 19.0)]),
            ("TETRACAINE", &[("G", 39.0)]),
        ]);

        let unit_normalization = string_map(&[
            ("KEEP_VEIN", "ML"),
            ("LITERS_BO", "L"),
            ("LITERS_PER", "L/MIN"),
            ("LOCK_FLUSH", "ML"),
            ("METERED_D", "PUFFS"),
            ("UNITS_PER_I", "UNITS"),
            ("NOT_APPLIC", "UNITS"),
            ("NOT_RECORDED", "UNITS"),
            ("OTHER", "UNITS"),
        ]);

        let response = |i: f64, n: f64, u: f64, w: f64| -> Vec<(String, f64)> {
            vec![
                ("IMPROVED".to_string(), i),
                ("NOT_RECORDED".to_string(), n),
                ("UNCHANGED".to_string(), u),
                ("WORSE".to_string(), w),
            ]
        };
        let mut med_response = ConditionalTable::new().with_default(WeightedTable::from_items(&[
            "IMPROVED",
            "NOT_RECORDED",
            "UNCHANGED",
            "WORSE",
        ]));
        for (name, i, n, u, w) in [
            ("ACETAMINOPHEN", 0.286, 0.269, 0.445, 0.0),
            ("ALBUTEROL", 0.641, 0.241, 0.116, 0.002),
            ("AMIODARONE", 0.145, 0.298, 0.551, 0.006),
            ("ATROPINE", 0.537, 0.169, 0.290, 0.004),
            ("CALCIUM CHLORIDE", 0.082, 0.321, 0.597, 0.0),
            ("DEXTROSE 50%", 0.504, 0.419, 0.075, 0.0),
            ("DIPHENHYDRAMINE", 0.584, 0.214, 0.202, 0.001),
            ("EPI 1:1,000", 0.384, 0.316, 0.300, 0.001),
            ("EPI 1:10,000", 0.082, 0.299, 0.613, 0.001),
            ("FENTANYL", 0.673, 0.170, 0.154, 0.002),
            ("GLUCAGON", 0.531, 0.272, 0.196, 0.006),
            ("GLUCOSE", 0.491, 0.301, 0.202, 0.006),
            ("HALOPERIDOL", 0.611, 0.222, 0.167, 0.0),
            ("IPRATROPIUM", 0.629, 0.260, 0.110, 0.003),
            ("METHYLPREDNISOLONE", 0.398, 0.266, 0.336, 0.001),
            ("METOPROLOL", 0.669, 0.170, 0.158, 0.0),
            ("MIDAZOLAM", 0.513, 0.319, 0.166, 0.0),
            ("NALOXONE", 0.373, 0.219, 0.405, 0.001),
            ("NITROGLYCERIN", 0.540, 0.185, 0.266, 0.010),
            ("NORMAL SALINE", 0.297, 0.212, 0.492, 0.003),
            ("ONDANSETRON", 0.484, 0.234, 0.305, 0.001),
            ("OXYGEN", 0.617, 0.211, 0.172, 0.003),
            ("SODIUM BICARBONATE", 0.082, 0.271, 0.643, 0.0),
            ("TETRACAINE", 0.718, 0.154, 0.103, 0.026),
        ] {
            med_response.insert(name.to_string(), WeightedTable::new(response(i, n, u, w)));
        }

        let med_site = ConditionalTable::from_keyed(&[
            ("ALBUTEROL", &[("ANTECUBIT ARM-LEFT", 1.0), ("MOUTH", 10.0)]),
            ("DIPHENHYDRAMINE", &[("ANTECUBITAL-LEFT", 2.0), ("ARM-RIGHT", 2.0), ("LOWER EXT", 1.0)]),
            ("EPI 1:1,000", &[("HUMERAL I", 1.0), ("OTHER", 1.0)]),
            ("EPI 1:10,000", &[("ANTECUBIT ARM-LEFT", 1.0)]),
            (
                "FENTANYL",
                &[
                    ("ANTECUBITAL-LEFT", 11.0),
                    ("ANTECUBIT ARM-LEFT", 7.0),
                    ("ARM-RIGHT", 4.0),
                    ("HUMERAL I", 1.0),
                    ("NOSE", 3.0),
                    ("OTHER", 1.0),
                ],
            ),
            ("GLUCOSE", &[("MOUTH", 7.0)]),
            ("IPRATROPIUM", &[("MOUTH", 11.0)]),
            ("METHYLPREDNISOLONE", &[("ANTECUBITAL-LEFT", 2.0), ("ANTECUBIT ARM-LEFT", 1.0)]),
            ("METOPROLOL", &[("ARM-RIGHT", 1.0)]),
            ("NALOXONE", &[("ANTECUBITAL-LEFT", 1.0), ("HUMERAL I", 1.0), ("NOSE", 2.0)]),
            ("NITROGLYCERIN", &[("MOUTH", 13.0)]),
            (
                "NORMAL SALINE",
                &[("ANTECUBITAL-LEFT", 6.0), ("ANTECUBIT ARM-LEFT", 7.0), ("ARM-RIGHT", 2.0), ("HAND-LEFT", 1.0)],
            ),
            (
                "ONDANSETRON",
                &[
                    ("ANTECUBITAL-LEFT", 9.0),
                    ("ANTECUBIT ARM-LEFT", 9.0),
                    ("ARM-RIGHT", 3.0),
                    ("HAND-LEFT", 1.0),
                    ("HUMERAL I", 1.0),
                ],
            ),
            ("OXYGEN", &[("MOUTH", 2.0), ("OTHER", 9.0)]),
        ]);

        let limb_sites: &[(&str, f64)] = &[
            ("ANTECUBITAL-LEFT", 1.0),
            ("ANTECUBIT ARM-LEFT", 1.0),
            ("ARM-RIGHT", 1.0),
            ("HAND-LEFT", 1.0),
            ("HUMERAL I", 1.0),
        ];
        let site_by_route = ConditionalTable::from_keyed(&[
            ("ORAL", &[("MOUTH", 1.0)]),
            ("SUBLINGUAL", &[("MOUTH", 1.0)]),
            ("INHALED", &[("MOUTH", 1.0)]),
            ("INTRANASAL", &[("NOSE", 1.0)]),
            ("OPHTHALMIC", &[("EYE", 1.0)]),
            ("INTRAMUSCULAR", limb_sites),
            ("INTRAVENOUS", limb_sites),
        ])
        .with_default(flat(&[
            ("ANTECUBITAL-LEFT", 1.0),
            ("ANTECUBIT ARM-LEFT", 1.0),
            ("ARM-RIGHT", 1.0),
            ("HAND-LEFT", 1.0),
            ("HUMERAL I", 1.0),
            ("MOUTH", 1.0),
        ]));

        let med_complication = ConditionalTable::from_keyed(&[
            ("WORSE", &[("NONE", 0.4), ("ALLERGIC_REACTION", 0.2), ("OVERDOSE", 0.1), ("INEFFECTIVE", 0.3)]),
            ("UNCHANGED", &[("NONE", 0.8), ("INEFFECTIVE", 0.2)]),
        ])
        .with_default(flat(&[("NONE", 0.97), ("ALLERGIC_REACTION", 0.01), ("INEFFECTIVE", 0.02)]));

        let cad_level = flat(&[("BLS", 0.70), ("AEMT", 0.27), ("P", 0.012), ("I/P", 0.011), ("AP", 0.006)]);

        let provider_type = ConditionalTable::from_keyed(&[
            (
                "BLS",
                &[
                    ("ALS", 0.20),
                    ("BLS", 0.17),
                    ("BLS-EMT", 0.11),
                    ("PARAMEDIC", 0.15),
                    ("INTERMEDIATE_1", 0.03),
                    ("AEMT/EMT", 0.017),
                    ("INTERMEDIATE_2", 0.006),
                    ("EMT", 0.0007),
                    ("BLS-EMR", 0.0003),
                    ("PHYSICIAN", 0.00004),
                ],
            ),
            (
                "AEMT",
                &[
                    ("ALS", 0.23),
                    ("PARAMEDIC", 0.12),
                    ("BLS-EMT", 0.07),
                    ("BLS", 0.06),
                    ("INTERMEDIATE_1", 0.025),
                    ("AEMT/EMT", 0.014),
                    ("INTERMEDIATE_2", 0.006),
                    ("EMT", 0.0006),
                    ("BLS-EMR", 0.0003),
                ],
            ),
            (
                "P",
                &[
                    ("ALS", 0.51),
                    ("PARAMEDIC", 0.30),
                    ("BLS-EMT", 0.11),
                    ("INTERMEDIATE_1", 0.039),
                    ("AEMT/EMT", 0.015),
                    ("BLS", 0.013),
                    ("PHYSICIAN", 0.0005),
                ],
            ),
            (
                "I/P",
                &[
                    ("ALS", 0.50),
                    ("PARAMEDIC", 0.25),
                    ("BLS-EMT", 0.13),
                    ("INTERMEDIATE_1", 0.049),
                    ("BLS", 0.044),
                    ("AEMT/EMT", 0.017),
                ],
            ),
            (
                "AP",
                &[
                    ("ALS", 0.57),
                    ("PARAMEDIC", 0.24),
                    ("BLS-EMT", 0.09),
                    ("INTERMEDIATE_1", 0.027),
                    ("AEMT/EMT", 0.023),
                    ("BLS", 0.017),
                ],
            ),
        ]);

        let activation = |none: f64, trauma: f64, cardiac: f64, stroke: f64, general: f64, stemi: f64| {
            WeightedTable::from_pairs(&[
                ("NO VALUE", none),
                ("ADULT TRAUMA", trauma),
                ("CARDIAC ARREST", cardiac),
                ("STROKE ALERT", stroke),
                ("GENERAL TRAUMA", general),
                ("STEMI ACTIVATION", stemi),
            ])
        };
        let prearrival_activation = ConditionalTable::new()
            .with_entry("PARAMEDIC".to_string(), activation(0.965, 0.006, 0.003, 0.009, 0.001, 0.003))
            .with_entry("BLS".to_string(), activation(0.987, 0.003, 0.0002, 0.00006, 0.004, 0.0))
            .with_entry("BLS-EMT".to_string(), activation(0.989, 0.008, 0.0004, 0.00006, 0.002, 0.0))
            .with_entry("EMT".to_string(), activation(0.988, 0.010, 0.0005, 0.0001, 0.002, 0.0))
            .with_entry("AEMT/EMT".to_string(), activation(0.987, 0.013, 0.0007, 0.0, 0.003, 0.0))
            .with_entry("BLS-EMR".to_string(), activation(0.988, 0.009, 0.0005, 0.0, 0.002, 0.0))
            .with_default(activation(0.963, 0.008, 0.004, 0.009, 0.001, 0.003));

        let patient_acuity = flat(&[
            ("EMERGENT", 0.999),
            ("CRITICAL", 0.0003),
            ("LOWER ACUITY", 0.0009),
            ("SCHEDULED TRANSFER OR STANDBY", 0.0002),
        ]);

        let situation_acuity = ConditionalTable::from_keyed(&[
            (
                "EMERGENT",
                &[
                    ("EMERGENT", 0.79),
                    ("CRITICAL", 0.018),
                    ("LOWER ACUITY", 0.12),
                    ("NO VALUE", 0.065),
                    ("DEAD WITHOUT RESUSCITATION", 0.002),
                    ("DECEASED", 0.002),
                    ("NOT APPLICABLE", 0.004),
                ],
            ),
            (
                "CRITICAL",
                &[("EMERGENT", 0.50), ("CRITICAL", 0.46), ("LOWER ACUITY", 0.016), ("DEAD WITHOUT RESUSCITATION", 0.016)],
            ),
            ("LOWER ACUITY", &[("LOWER ACUITY", 0.36), ("EMERGENT", 0.63), ("CRITICAL", 0.003)]),
            (
                "SCHEDULED TRANSFER OR STANDBY",
                &[("EMERGENT", 0.81), ("LOWER ACUITY", 0.16), ("NOT APPLICABLE", 0.027)],
            ),
        ]);

        let procedures = flat(&[
            ("ECG, 12 LEAD", 20760.0),
            ("CATHETERIZATION OF VEIN", 18079.0),
            ("BLOOD GLUCOSE CHECK", 6351.0),
            ("12 LEAD ECG", 4711.0),
            ("MONITORING", 3631.0),
            ("VEIN, BLOOD DRAW", 2910.0),
            ("CAPNOGRAPHY", 1584.0),
            ("BLOOD DRAW", 1004.0),
            ("CERVICAL COLLAR", 756.0),
            ("IO CANNULATION", 313.0),
            ("ASSIST VENTILATIONS VIA BVM", 211.0),
            ("AIRWAY SUCTION", 202.0),
            ("SPLINTING, GENERAL", 184.0),
            ("WOUND CARE", 176.0),
            ("OROTRACHEAL INTUBATION", 166.0),
            ("ORAL AIRWAY INSERTION (OPA)", 97.0),
            ("CPAP", 60.0),
            ("APPLICATION OF SPLINT", 47.0),
            ("MECHANICAL ASSISTED CPR - LUCAS", 20.0),
            ("CARDIAC PACING", 10.0),
            ("CARDIOPULMONARY RESUSCITATION", 7.0),
        ]);

        let procedure_success = [
            ("12 LEAD ECG", 4616.0 / 4711.0),
            ("AIRWAY SUCTION", 200.0 / 202.0),
            ("APPLICATION OF SPLINT", 46.0 / 47.0),
            ("ASSIST VENTILATIONS VIA BVM", 207.0 / 211.0),
            ("BLOOD DRAW", 994.0 / 1004.0),
            ("BLOOD GLUCOSE CHECK", 6293.0 / 6351.0),
            ("CAPNOGRAPHY", 1576.0 / 1584.0),
            ("CARDIAC PACING", 6.0 / 10.0),
            ("CARDIOPULMONARY RESUSCITATION", 6.0 / 7.0),
            ("CATHETERIZATION OF VEIN", 13646.0 / 18079.0),
            ("CERVICAL COLLAR", 736.0 / 756.0),
        ]
        .iter()
        .map(|(p, rate)| (p.to_string(), *rate))
        .collect();

        let procedure_complication = ConditionalTable::from_keyed(&[
            ("12 LEAD ECG", &[("NONE", 0.95), ("NO_VALUE", 0.05)]),
            ("ECG, 12 LEAD", &[("NONE", 0.95), ("NO_VALUE", 0.05)]),
            ("AIRWAY SUCTION", &[("NONE", 0.85), ("NO_VALUE", 0.15)]),
            ("ASSIST VENTILATIONS VIA BVM", &[("NONE", 0.8), ("NO_VALUE", 0.2)]),
            ("BLOOD DRAW", &[("NONE", 0.9), ("NO_VALUE", 0.1)]),
            ("BLOOD GLUCOSE CHECK", &[("NOT_APPLICABLE", 0.99), ("NO_VALUE", 0.01)]),
            ("CAPNOGRAPHY", &[("NONE", 0.9), ("NO_VALUE", 0.1)]),
            ("CARDIAC PACING", &[("NONE", 0.5), ("NO_VALUE", 0.5)]),
            ("CARDIOPULMONARY RESUSCITATION", &[("NONE", 0.3), ("NO_VALUE", 0.7)]),
            ("CATHETERIZATION OF VEIN", &[("NOT_APPLICABLE", 0.99), ("NO_VALUE", 0.01)]),
            ("CERVICAL COLLAR", &[("NONE", 0.9), ("NO_VALUE", 0.1)]),
            ("CPAP", &[("HYPOXIA", 0.0), ("NO_VALUE", 1.0)]),
            ("MONITORING", &[("NOT_APPLICABLE", 1.0)]),
        ])
        .with_default(flat(&[("NONE", 1.0)]));

        let disposition = flat(&[
            ("TREATED, TRANSPORTED BY THIS EMS UNIT", 0.377),
            ("UNIT ASSIST (MANPOWER ONLY)", 0.175),
            ("CANCELED (PRIOR TO ARRIVAL AT SCENE)", 0.098),
            ("PATIENT REFUSAL", 0.091),
            ("TREATED, TRANSFERRED CARE", 0.066),
            ("CANCELED ON SCENE (NO PATIENT CONTACT)", 0.063),
            ("CANCELED (NO PATIENT FOUND)", 0.029),
            ("STANDBY (FIRE, EMS OPS, OR PUBLIC SAFETY EVENT)", 0.021),
            ("TREATED, TRANSPORTED WITH THIS EMS PROVIDER IN ANOTHER VEHICLE", 0.020),
            ("COMMAND / SUPERVISION ONLY", 0.013),
            ("CARDIAC ARREST - RESUSCITATION ATTEMPTED (NOT TRANSPORTED)", 0.007),
            ("DEAD ON ARRIVAL", 0.005),
            ("PERSON EVALUATED - NO EMS REQUIRED", 0.005),
            ("TRANSPORTED TO LANDING ZONE, CARE TRANSFERRED", 0.0002),
        ]);

        let emd_performed = flat(&[
            ("YES, UNKNOWN", 274258.0),
            ("YES, WITH FEEDBACK", 28135.0),
            ("NOT RECORDED", 1725.0),
            ("NO", 285.0),
            ("YES, WITHOUT FEEDBACK", 4.0),
        ]);

        let incident_status = flat(&[
            ("COMPLETED", 224927.0),
            ("BILLED", 144933.0),
            ("IN PROGRESS", 759.0),
            ("PENDING", 306.0),
            ("READY TO BILL", 114.0),
            ("REQUIRES EDIT", 59.0),
        ]);

        let unit_role = flat(&[
            ("GROUND TRANSPORT", 246947.0),
            ("FIRE APPARATUS, NON-TRANSPORT ASSISTANCE", 53303.0),
            ("FIRE APPARATUS, BLS (NON-TRANSPORT)", 20610.0),
            ("NON-TRANSPORT ADMINISTRATIVE (SUPERVISOR)", 20000.0),
            ("FIRE APPARATUS", 19076.0),
            ("NON-TRANSPORT RESCUE", 4185.0),
            ("COMMAND/EMS SUPERVISOR", 3848.0),
            ("FIRE APPARATUS, ALS (NON-TRANSPORT)", 845.0),
            ("RESCUE", 614.0),
            ("ALS CHASE", 203.0),
        ]);

        let occupations = vec![
            AgeBand {
                max_age: 16,
                table: flat(&[("STUDENT", 1.0)]),
            },
            AgeBand {
                max_age: 18,
                table: flat(&[("STUDENT", 0.8), ("PART_TIME_WORKER", 0.15), ("UNEMPLOYED", 0.05)]),
            },
            AgeBand {
                max_age: 65,
                table: flat(&[
                    ("OFFICE_WORKER", 0.25),
                    ("HEALTHCARE_WORKER", 0.15),
                    ("EDUCATOR", 0.10),
                    ("RETAIL_WORKER", 0.15),
                    ("CONSTRUCTION_WORKER", 0.10),
                    ("TECHNICAL_WORKER", 0.10),
                    ("SERVICE_WORKER", 0.08),
                    ("MANAGER", 0.05),
                    ("SELF_EMPLOYED", 0.02),
                    ("UNEMPLOYED", 0.05),
                ]),
            },
            AgeBand {
                max_age: u32::MAX,
                table: flat(&[("RETIRED", 0.85), ("PART_TIME_WORKER", 0.10), ("UNEMPLOYED", 0.05)]),
            },
        ];

        Self {
            incident_descriptions,
            incident_base,
            type_multipliers,
            history_overrides,
            chronic_incidents,
            priority_map,
            default_priority: Priority::Medium,
            clinical_profiles,
            default_profile,
            atypical_vitals_probability: 0.08,
            pain_ranges,
            default_pain: IntRange::new(0, 5),
            gcs_ranges,
            elderly_gcs: IntRange::new(12, 15),
            default_gcs: IntRange::new(13, 15),
            narratives,
            default_narrative: narrative(
                "EMS response to {age}yo {sex} patient. Assessment and treatment provided. Patient {variant}.",
                &["transported", "refused transport", "treated on scene"],
            ),
            high_priority_facilities: strings(&[
                "Harborview Medical Center",
                "Swedish Medical Center",
                "Virginia Mason Medical Center",
                "University of Washington Medical Center",
            ]),
            standard_facilities: strings(&[
                "Swedish Medical Center",
                "Virginia Mason Medical Center",
                "Providence Regional Medical Center",
                "Overlake Medical Center",
                "EvergreenHealth Medical Center",
            ]),
            medication_catalog,
            medication_profiles,
            default_medications: strings(&["OXYGEN", "NORMAL SALINE"]),
            medication_count: WeightedTable::new(vec![(1, 0.5), (2, 0.35), (3, 0.15)]),
            oxygen_exempt_types: strings(&["2301027", "2301031"]),
            med_route,
            med_dosage,
            med_unit,
            unit_normalization,
            med_response,
            med_site,
            site_by_route,
            med_complication,
            prior_to_care_probability: 0.05,
            cad_level,
            provider_type,
            prearrival_activation,
            patient_acuity,
            situation_acuity,
            procedures,
            procedure_draws: IntRange::new(1, 4),
            procedure_success,
            default_procedure_success: 0.80,
            procedure_complication,
            disposition,
            emd_performed,
            incident_status,
            unit_role,
            patient_age: IntRange::new(1, 95),
            elderly_age: 65,
            report_probability: 0.6,
            occupations,
            allergies: ListDraw::new(
                0.3,
                &[(1, 0.6), (2, 0.25), (3, 0.10), (4, 0.05)],
                &["PENICILLIN", "SULFONAMIDES", "ASPIRIN", "NUTS", "SHELLFISH", "POLLEN", "DUST"],
            ),
            medication_age_chances: vec![(50, 0.7), (30, 0.4)],
            current_medication_list: ListDraw::new(
                1.0,
                &[(1, 0.4), (2, 0.3), (3, 0.15), (4, 0.10), (5, 0.05)],
                &[
                    "METFORMIN",
                    "LISINOPRIL",
                    "ATORVASTATIN",
                    "OMEPRAZOLE",
                    "METOPROLOL",
                    "AMLODIPINE",
                    "SERTRALINE",
                    "LEVOTHYROXINE",
                    "ALBUTEROL",
                    "PREDNISONE",
                    "WARFARIN",
                    "FUROSEMIDE",
                    "GABAPENTIN",
                    "TRAMADOL",
                    "CYCLOBENZAPRINE",
                ],
            ),
            family_history: ListDraw::new(
                0.6,
                &[(1, 0.6), (2, 0.3), (3, 0.1)],
                &[
                    "HEART_DISEASE",
                    "CANCER",
                    "DIABETES",
                    "HYPERTENSION",
                    "STROKE",
                    "ALZHEIMERS",
                    "DEPRESSION",
                    "ASTHMA",
                ],
            ),
            insurance: flat(&[
                ("MEDICARE", 0.28),
                ("MEDICAID", 0.22),
                ("PRIVATE", 0.38),
                ("VA", 0.04),
                ("UNINSURED", 0.08),
            ]),
            familiar_timeline: familiar_timeline(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(h, 0, 0))
            .unwrap()
    }

    #[test]
    fn test_hour_windows_follow_first_match() {
        assert_eq!(TimeWindow::for_hour(23), Some(TimeWindow::Night));
        assert_eq!(TimeWindow::for_hour(3), Some(TimeWindow::Night));
        assert_eq!(TimeWindow::for_hour(5), None);
        assert_eq!(TimeWindow::for_hour(8), Some(TimeWindow::MorningRush));
        assert_eq!(TimeWindow::for_hour(13), Some(TimeWindow::Daytime));
        assert_eq!(TimeWindow::for_hour(18), Some(TimeWindow::EveningRush));
    }

    #[test]
    fn test_night_weekend_winter_multipliers_stack() {
        let tables = EmsTables::default();
        // Saturday 2024-01-06 at 02:00
        let weights = tables.incident_weights(at(2024, 1, 6, 2));
        let overdose = weights.weight_of(&"2301053".to_string()).unwrap();
        assert!((overdose - 5.0 * 2.0 * 1.5).abs() < 1e-9);

        let exposure = weights.weight_of(&"2301043".to_string()).unwrap();
        assert!((exposure - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_weekday_afternoon_leaves_arrests_at_base() {
        let tables = EmsTables::default();
        // Wednesday 2024-07-10 at 14:00
        let weights = tables.incident_weights(at(2024, 7, 10, 14));
        assert_eq!(weights.weight_of(&CARDIAC_ARREST.to_string()), Some(2.0));
        assert_eq!(weights.len(), tables.incident_base.len());
    }

    #[test]
    fn test_every_profiled_medication_is_in_catalog() {
        let tables = EmsTables::default();
        for meds in tables.medication_profiles.values() {
            for name in meds {
                assert!(tables.medication(name).is_some(), "{} missing from catalog", name);
            }
        }
        for name in &tables.default_medications {
            assert!(tables.medication(name).is_some());
        }
    }

    #[test]
    fn test_naloxone_has_keyed_second_stage_tables() {
        let tables = EmsTables::default();
        let key = "NALOXONE".to_string();
        assert!(tables.med_route.keyed(&key).is_some());
        assert!(tables.med_dosage.keyed(&key).is_some());
        assert!(tables.med_unit.keyed(&key).is_some());
    }

    #[test]
    fn test_lookups_fall_back_to_defaults() {
        let tables = EmsTables::default();
        assert_eq!(tables.priority_for("2301083"), Priority::Medium);
        assert_eq!(tables.priority_for("2301011"), Priority::Low);
        assert_eq!(tables.clinical_profile("2301083").impression, "MEDICAL");
        assert!(tables.clinical_profile(CARDIAC_ARREST).vitals.is_arrest());
        assert_eq!(tables.success_rate("UNLISTED"), 0.80);
        assert_eq!(tables.describe("9999999"), "Unknown Problem");
    }

    #[test]
    fn test_gcs_and_occupation_follow_age() {
        let tables = EmsTables::default();
        assert_eq!(tables.gcs_range(CARDIAC_ARREST, 30), IntRange::new(3, 3));
        assert_eq!(tables.gcs_range("2301061", 70), IntRange::new(12, 15));
        assert_eq!(tables.gcs_range("2301061", 40), IntRange::new(13, 15));

        let child = tables.occupation_table(10).unwrap();
        assert_eq!(child.len(), 1);
        let retiree = tables.occupation_table(80).unwrap();
        assert!(retiree.is_reachable(&"RETIRED".to_string()));
    }

    #[test]
    fn test_chronic_candidates_collects_all_conditions() {
        let tables = EmsTables::default();
        let conditions = vec!["ASTHMA".to_string(), "ARTHRITIS".to_string(), "NONE".to_string()];
        let candidates = tables.chronic_candidates(&conditions);
        assert_eq!(candidates, vec!["2301013", "2301077", "2301073", "2301011"]);
    }

    #[test]
    fn test_familiar_timeline_is_faster() {
        let tables = EmsTables::default();
        let familiar = tables.familiar_timeline.range(Stage::Arrive, Priority::Low).unwrap();
        let regular = TimelineConfig::default().range(Stage::Arrive, Priority::Low).unwrap();
        assert!(familiar.max_secs < regular.min_secs + 60);
        assert!(tables.familiar_timeline.validate().is_ok());
    }

    #[test]
    fn test_tables_survive_json_round_trip() {
        let tables = EmsTables::default();
        let json = serde_json::to_string(&tables).unwrap();
        let back: EmsTables = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tables);
    }
}
