//! Record value objects.
//!
//! Plain typed records with stable shapes. Optional fields are `Option`
//! and list fields default to empty, so downstream code never checks for
//! field presence. All records serialize with serde; enums use the
//! SCREAMING_SNAKE_CASE codes found in the source systems.

use crate::person_index::InmateState;
use crate::timeline::{Priority, Stage, Timeline};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use safetynet_env::{GenError, PersonId, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// SHARED
// =============================================================================

/// Street address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}, {} {}", self.street, self.city, self.state, self.zip_code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub first_name: String,
    pub last_name: String,
    pub source: String,
    pub confidence: f64,
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Root identity record.
///
/// `inmate` stays `None` until a booking creates it; after that every
/// field inside is written through `PersonIndex::context`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub person_id: PersonId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub sex: String,
    pub race: String,
    pub height_inches: u32,
    pub weight_lbs: u32,
    pub address: Address,
    pub phone: String,
    pub languages: Vec<String>,
    pub aliases: Vec<Alias>,
    pub veteran_status: bool,
    pub is_transient: bool,
    pub medical_history: Vec<String>,
    pub chronic_conditions: Vec<String>,
    #[serde(default)]
    pub inmate: Option<InmateState>,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Age in whole years on `on`.
    pub fn age_on(&self, on: NaiveDate) -> u32 {
        let mut age = on.year() - self.date_of_birth.year();
        if (on.month(), on.day()) < (self.date_of_birth.month(), self.date_of_birth.day()) {
            age -= 1;
        }
        age.max(0) as u32
    }
}

// =============================================================================
// CAD / ARREST
// =============================================================================

/// Call for service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadIncident {
    pub cad_id: RecordId,
    pub call_number: String,
    pub call_datetime: NaiveDateTime,
    pub nature_code: String,
    pub nature_description: String,
    pub priority: Priority,
    pub address: Address,
    pub person_id: Option<PersonId>,
    pub disposition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeSeverity {
    Felony,
    Misdemeanor,
    Infraction,
}

impl ChargeSeverity {
    pub fn code(&self) -> &'static str {
        match self {
            ChargeSeverity::Felony => "FELONY",
            ChargeSeverity::Misdemeanor => "MISDEMEANOR",
            ChargeSeverity::Infraction => "INFRACTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub description: String,
    pub category: String,
    pub severity: ChargeSeverity,
    pub statute: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrest {
    pub arrest_id: RecordId,
    pub person_id: PersonId,
    pub cad_incident_id: Option<RecordId>,
    pub arrest_datetime: NaiveDateTime,
    pub arrest_location: String,
    pub arresting_officer: String,
    pub arrest_type: String,
    pub arrest_method: String,
    pub charges: Vec<Charge>,
    pub use_of_force: bool,
    pub force_type: Option<String>,
    pub injuries_sustained: bool,
    pub miranda_read: bool,
    pub miranda_datetime: Option<NaiveDateTime>,
    pub bail_amount: u64,
    pub evidence_collected: Vec<String>,
    pub evidence_property_ids: Vec<RecordId>,
}

impl Arrest {
    /// Most serious charge severity, if any charge exists.
    pub fn lead_severity(&self) -> Option<ChargeSeverity> {
        self.charges.iter().map(|c| c.severity).min()
    }
}

// =============================================================================
// EMS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    pub bp_systolic: u32,
    pub bp_diastolic: u32,
    pub heart_rate: u32,
    pub respiratory_rate: u32,
    pub spo2: u32,
    pub temperature_f: f64,
}

impl VitalSigns {
    /// No blood pressure, pulse or respirations.
    pub fn is_arrest_profile(&self) -> bool {
        self.bp_systolic == 0 && self.bp_diastolic == 0 && self.heart_rate == 0 && self.respiratory_rate == 0
    }
}

/// Interval fields derived from an incident timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmsIntervals {
    pub call_to_arrival_seconds: i64,
    pub dispatch_to_enroute_seconds: i64,
    pub enroute_to_arrival_seconds: i64,
    pub arrival_to_transport_seconds: i64,
    pub transport_to_hospital_seconds: i64,
    pub total_scene_time_seconds: i64,
    pub total_incident_time_seconds: i64,
}

impl EmsIntervals {
    /// Stages the intervals are computed from, in timeline order.
    pub const STAGES: [Stage; 7] = [
        Stage::Call,
        Stage::Dispatch,
        Stage::EnRoute,
        Stage::Arrive,
        Stage::Transport,
        Stage::HospitalArrival,
        Stage::Clear,
    ];

    /// Computes every interval from `timeline`.
    pub fn from_timeline(timeline: &Timeline) -> Result<Self, GenError> {
        let secs = |from: Stage, to: Stage| {
            timeline.interval_secs(from, to).ok_or_else(|| {
                GenError::invalid_config(format!("timeline is missing {:?} or {:?}", from, to))
            })
        };
        Ok(Self {
            call_to_arrival_seconds: secs(Stage::Call, Stage::Arrive)?,
            dispatch_to_enroute_seconds: secs(Stage::Dispatch, Stage::EnRoute)?,
            enroute_to_arrival_seconds: secs(Stage::EnRoute, Stage::Arrive)?,
            arrival_to_transport_seconds: secs(Stage::Arrive, Stage::Transport)?,
            transport_to_hospital_seconds: secs(Stage::Transport, Stage::HospitalArrival)?,
            total_scene_time_seconds: secs(Stage::Arrive, Stage::Transport)?,
            total_incident_time_seconds: secs(Stage::Call, Stage::Clear)?,
        })
    }
}

/// Dispatch-side classification drawn through the CAD-level cascade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchBundle {
    pub cad_level_of_care: String,
    pub provider_type: String,
    pub prearrival_activation: String,
    pub patient_acuity: String,
    pub situation_acuity: String,
    pub attempted_procedures: Vec<String>,
    pub successful_procedures: Vec<String>,
    pub procedure_complications: BTreeMap<String, String>,
    pub disposition: String,
    pub emd_performed: String,
    pub incident_status: String,
    pub primary_unit_role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmsIncident {
    pub incident_id: RecordId,
    pub incident_number: String,
    pub cad_incident_id: Option<RecordId>,
    pub incident_type_code: String,
    pub incident_type_description: String,
    pub priority: Priority,
    pub timeline: Timeline,
    pub intervals: EmsIntervals,
    pub address: Address,
    pub patient_person_id: PersonId,
    pub patient_age: u32,
    pub patient_sex: String,
    pub patient_race: String,
    pub patient_prior_events: u32,
    pub is_frequent_caller: bool,
    pub primary_impression: String,
    pub vital_signs: VitalSigns,
    pub treatment_provided: Vec<String>,
    pub medications_given: Vec<String>,
    pub medication_ids: Vec<RecordId>,
    pub dispatch: DispatchBundle,
}

impl EmsIncident {
    pub fn call_datetime(&self) -> Option<NaiveDateTime> {
        self.timeline.at(Stage::Call)
    }
}

/// One medication administration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmsMedication {
    pub medication_id: RecordId,
    pub incident_id: RecordId,
    pub patient_person_id: PersonId,
    pub medication_name: String,
    pub rxcui_code: String,
    pub route: String,
    pub site: String,
    pub dosage: f64,
    pub dosage_unit: String,
    pub patient_response: String,
    pub complication: String,
    pub administered_datetime: NaiveDateTime,
    pub administered_prior_to_ems_care: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmsPatient {
    pub patient_id: PersonId,
    pub first_incident_id: RecordId,
    pub full_name: String,
    pub age: u32,
    pub sex: String,
    pub race: String,
    pub weight_lbs: u32,
    pub home_address: Address,
    pub occupation: String,
    pub known_allergies: Vec<String>,
    pub current_medications: Vec<String>,
    pub chronic_conditions: Vec<String>,
    pub medical_history: Vec<String>,
    pub family_medical_history: Vec<String>,
    pub insurance_provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmsReport {
    pub report_id: RecordId,
    pub report_number: String,
    pub report_datetime: NaiveDateTime,
    pub incident_id: RecordId,
    pub patient_id: PersonId,
    pub medication_ids: Vec<RecordId>,
    pub priority: Priority,
    pub narrative: String,
    pub pain_score: Option<u8>,
    pub glasgow_coma_scale: u8,
    pub destination_facility: String,
}

// =============================================================================
// JAIL
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JailBooking {
    pub booking_id: RecordId,
    pub person_id: PersonId,
    pub arrest_id: RecordId,
    pub booking_number: String,
    pub inmate_number: String,
    pub booking_datetime: NaiveDateTime,
    pub facility: String,
    pub housing_assignment: String,
    pub classification_level: String,
    pub special_housing: Vec<String>,
    pub suicide_risk_level: String,
    pub medical_alerts: Vec<String>,
    pub charges_at_booking: Vec<Charge>,
    pub bail_amount: u64,
    pub bail_posted: bool,
    pub programs_enrolled: Vec<String>,
    pub release_datetime: Option<NaiveDateTime>,
    pub release_type: String,
    pub days_served: i64,
}

/// Sentence kinds with their person-state effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SentenceType {
    JailTime,
    Prison,
    WorkRelease,
    HouseArrest,
    ElectronicMonitoring,
    Probation,
    Suspended,
    CommunityService,
    TimeServed,
    FineOnly,
    DeferredSentence,
    Diversion,
}

impl SentenceType {
    /// Sentences that put the person in custody.
    pub fn is_custodial(&self) -> bool {
        matches!(
            self,
            SentenceType::JailTime
                | SentenceType::Prison
                | SentenceType::WorkRelease
                | SentenceType::HouseArrest
                | SentenceType::ElectronicMonitoring
        )
    }

    /// Sentences that activate probation supervision.
    pub fn activates_probation(&self) -> bool {
        matches!(
            self,
            SentenceType::Probation | SentenceType::DeferredSentence | SentenceType::Diversion
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JailSentence {
    pub sentence_id: RecordId,
    pub person_id: PersonId,
    pub booking_id: RecordId,
    pub court_case_number: String,
    pub sentence_date: NaiveDateTime,
    pub offense_description: String,
    pub statute: String,
    pub sentence_type: SentenceType,
    pub total_days: i64,
    pub time_served_days: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub good_time_eligible: bool,
    pub notes: Option<String>,
    pub definite_stated_term_years: Option<f64>,
    pub minimum_years: Option<f64>,
    pub maximum_years: Option<f64>,
    pub return_violator_years: Option<f64>,
    pub gun_years: Option<f64>,
    pub commitment_county_years: Option<f64>,
    pub inmate_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BailBond {
    pub bond_id: RecordId,
    pub person_id: PersonId,
    pub booking_id: RecordId,
    pub bond_type: String,
    pub amount: u64,
    pub posted: bool,
    pub posted_datetime: Option<NaiveDateTime>,
    pub poster_name: Option<String>,
    pub bondsman_company: Option<String>,
    pub receipt_number: Option<String>,
    pub conditions: Vec<String>,
    pub exonerated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JailIncident {
    pub incident_id: RecordId,
    pub booking_id: RecordId,
    pub person_id: PersonId,
    pub incident_datetime: NaiveDateTime,
    pub incident_type: String,
    pub location: String,
    pub involved_staff: Vec<String>,
    pub description: String,
    pub actions_taken: Vec<String>,
    pub referral_to_outside_agency: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    Booked,
    PropertyIntake,
    MedicalIntake,
    HousingChange,
    CourtAppearance,
    VisitorCheckin,
    PhoneCall,
    Disciplinary,
    ProgramEnroll,
    ProgramComplete,
    Released,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JailLog {
    pub log_id: RecordId,
    pub booking_id: RecordId,
    pub person_id: PersonId,
    pub log_datetime: NaiveDateTime,
    pub action: LogAction,
    pub details: BTreeMap<String, String>,
    pub actor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionsFacility {
    pub facility_id: RecordId,
    pub name: String,
    pub address: Address,
    pub capacity: u32,
    pub security_level: String,
    pub contact_phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JailProgram {
    pub program_id: RecordId,
    pub name: String,
    pub category: String,
    pub provider: String,
    pub location: String,
    pub schedule: String,
    pub capacity: u32,
    pub enrolled_person_ids: Vec<PersonId>,
    pub waitlist_person_ids: Vec<PersonId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub active: bool,
}

// =============================================================================
// PROPERTY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    Evidence,
    Found,
    Stolen,
    Seized,
}

impl PropertyType {
    pub fn action_phrase(&self) -> &'static str {
        match self {
            PropertyType::Evidence => "collected as evidence",
            PropertyType::Found => "found and logged",
            PropertyType::Stolen => "reported stolen",
            PropertyType::Seized => "seized by officers",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub property_id: RecordId,
    pub property_type: PropertyType,
    pub case_number: String,
    pub arrest_id: Option<RecordId>,
    pub cad_incident_id: Option<RecordId>,
    pub owner_person_id: Option<PersonId>,
    pub description: String,
    pub category: String,
    pub subcategory: String,
    pub serial_number: Option<String>,
    pub value_estimated: u32,
    pub quantity: u32,
    pub unit_of_measure: String,
    pub logged_datetime: NaiveDateTime,
    pub evidence_locker: String,
    pub storage_bin: String,
    pub disposition: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{TimelineConfig, TimelineSynthesizer};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_age_on_respects_birthday() {
        let person = Person {
            person_id: PersonId::from_seed(1),
            first_name: "Ada".into(),
            last_name: "Moss".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 6, 15).unwrap(),
            sex: "FEMALE".into(),
            race: "WHITE".into(),
            height_inches: 66,
            weight_lbs: 140,
            address: Address::default(),
            phone: String::new(),
            languages: vec!["EN".into()],
            aliases: vec![],
            veteran_status: false,
            is_transient: false,
            medical_history: vec![],
            chronic_conditions: vec![],
            inmate: None,
        };
        assert_eq!(person.age_on(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()), 33);
        assert_eq!(person.age_on(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()), 34);
        assert_eq!(person.full_name(), "Ada Moss");
    }

    #[test]
    fn test_intervals_match_timeline() {
        let synth = TimelineSynthesizer::new(TimelineConfig::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(41);
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(3, 0, 0))
            .unwrap();
        let timeline = synth.synthesize(&mut rng, anchor, Priority::Medium);
        let intervals = EmsIntervals::from_timeline(&timeline).unwrap();

        assert_eq!(intervals.total_scene_time_seconds, intervals.arrival_to_transport_seconds);
        assert_eq!(
            intervals.total_incident_time_seconds,
            (timeline.terminal().unwrap() - anchor).num_seconds()
        );
        assert!(intervals.call_to_arrival_seconds > intervals.enroute_to_arrival_seconds);
    }

    #[test]
    fn test_sentence_effects_are_disjoint() {
        for t in [
            SentenceType::JailTime,
            SentenceType::Probation,
            SentenceType::FineOnly,
            SentenceType::Diversion,
            SentenceType::HouseArrest,
        ] {
            assert!(!(t.is_custodial() && t.activates_probation()));
        }
        assert!(!SentenceType::FineOnly.is_custodial());
    }

    #[test]
    fn test_lead_severity_picks_felony() {
        let charge = |severity| Charge {
            description: "x".into(),
            category: "PROPERTY".into(),
            severity,
            statute: "RCW 9.10".into(),
        };
        let arrest = Arrest {
            arrest_id: RecordId::from_seed(1),
            person_id: PersonId::from_seed(1),
            cad_incident_id: None,
            arrest_datetime: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            arrest_location: String::new(),
            arresting_officer: String::new(),
            arrest_type: "ON_VIEW".into(),
            arrest_method: "HANDCUFFS".into(),
            charges: vec![charge(ChargeSeverity::Misdemeanor), charge(ChargeSeverity::Felony)],
            use_of_force: false,
            force_type: None,
            injuries_sustained: false,
            miranda_read: true,
            miranda_datetime: None,
            bail_amount: 0,
            evidence_collected: vec![],
            evidence_property_ids: vec![],
        };
        assert_eq!(arrest.lead_severity(), Some(ChargeSeverity::Felony));
    }
}
