//! EMS Lifecycle Generator
//!
//! One call to `EmsLifecycle::generate` produces a fully linked EMS record
//! set:
//!
//! ```text
//! RecurrencePool::choose ──► identity (new person or reused profile)
//!        │
//!        ▼
//! incident type ─► priority ─► timeline ─► intervals
//!        │
//!        ▼
//! clinical bundle (impression, vitals, treatments)
//!        │
//!        ▼
//! medications: name → route → dosage → unit → response → site → complication
//!        │
//!        ▼
//! dispatch: cad level → provider type → pre-arrival activation,
//!           patient acuity → situation acuity, procedures
//!        │
//!        ▼
//! patient profile (new identities only) and optional report
//! ```

use crate::cascade::{
    AttributeCascade, CascadeStep, DefaultStep, KeyedStep, ResolvedBundle, StepResolver, UniformStep,
};
use crate::context::GenerationContext;
use crate::ems_tables::{ClinicalProfile, EmsTables, MedicationSpec};
use crate::person_index::PersonIndex;
use crate::population::{PopulationGenerator, PopulationTables};
use crate::records::{
    CadIncident, DispatchBundle, EmsIncident, EmsIntervals, EmsMedication, EmsPatient, EmsReport, Person,
    VitalSigns,
};
use crate::recurrence::{IdentityChoice, RecurrenceProfile};
use crate::sampler::{chance, pick, DrawSource, WeightedTable};
use crate::timeline::{Priority, Stage, Timeline, TimelineConfig, TimelineSynthesizer};
use chrono::{Datelike, Duration, NaiveDateTime};
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};
use safetynet_env::{GenError, PersonId, RecordId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Medication forced first on most incidents.
pub const OXYGEN: &str = "OXYGEN";

// Cascade attribute names
const MEDICATION: &str = "medication";
const ROUTE: &str = "route";
const DOSAGE: &str = "dosage";
const UNIT: &str = "unit";
const RESPONSE: &str = "response";
const SITE: &str = "site";
const COMPLICATION: &str = "complication";

const CAD_LEVEL: &str = "cad_level";
const PROVIDER_TYPE: &str = "provider_type";
const PREARRIVAL: &str = "prearrival_activation";
const PATIENT_ACUITY: &str = "patient_acuity";
const SITUATION_ACUITY: &str = "situation_acuity";
const DISPOSITION: &str = "disposition";
const EMD_PERFORMED: &str = "emd_performed";
const INCIDENT_STATUS: &str = "incident_status";
const UNIT_ROLE: &str = "primary_unit_role";

/// Everything one EMS occurrence produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EmsRecordSet {
    pub incident: EmsIncident,
    pub medications: Vec<EmsMedication>,
    /// Present only the first time an identity is seen
    pub patient: Option<EmsPatient>,
    pub report: Option<EmsReport>,
}

// =============================================================================
// CATALOG RESOLVERS
// =============================================================================

/// Dosage drawn uniformly from the catalog range when no keyed table exists.
struct CatalogDosage {
    catalog: Arc<BTreeMap<String, MedicationSpec>>,
}

impl StepResolver for CatalogDosage {
    fn source(&self) -> DrawSource {
        DrawSource::Derived
    }

    fn resolve(&self, bundle: &ResolvedBundle, rng: &mut dyn RngCore) -> Result<Option<String>, GenError> {
        let spec = match bundle.get(MEDICATION).and_then(|name| self.catalog.get(name)) {
            Some(spec) => spec,
            None => return Ok(None),
        };
        let value = if spec.dosage_max > spec.dosage_min {
            rng.gen_range(spec.dosage_min..spec.dosage_max)
        } else {
            spec.dosage_min
        };
        Ok(Some(format!("{:.1}", value)))
    }
}

/// The catalog's unit for the medication.
struct CatalogUnit {
    catalog: Arc<BTreeMap<String, MedicationSpec>>,
}

impl StepResolver for CatalogUnit {
    fn source(&self) -> DrawSource {
        DrawSource::Derived
    }

    fn resolve(&self, bundle: &ResolvedBundle, _rng: &mut dyn RngCore) -> Result<Option<String>, GenError> {
        Ok(bundle
            .get(MEDICATION)
            .and_then(|name| self.catalog.get(name))
            .map(|spec| spec.unit.clone()))
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

pub struct EmsLifecycle<'a> {
    tables: &'a EmsTables,
    population: PopulationGenerator<'a>,
    regular: TimelineSynthesizer,
    familiar: TimelineSynthesizer,
    medications: AttributeCascade,
    dispatch: AttributeCascade,
}

impl<'a> EmsLifecycle<'a> {
    /// Builds the lifecycle; both timeline configs are validated here.
    pub fn new(tables: &'a EmsTables, population: &'a PopulationTables, timeline: TimelineConfig) -> Result<Self, GenError> {
        Ok(Self {
            tables,
            population: PopulationGenerator::new(population),
            regular: TimelineSynthesizer::new(timeline)?,
            familiar: TimelineSynthesizer::new(tables.familiar_timeline.clone())?,
            medications: medication_cascade(tables),
            dispatch: dispatch_cascade(tables),
        })
    }

    pub fn tables(&self) -> &EmsTables {
        self.tables
    }

    /// Generates one EMS occurrence called in at `call_at`.
    ///
    /// New identities are inserted into `ctx.persons` and registered in
    /// `ctx.pool`; reused identities get the event appended to their
    /// history.
    pub fn generate<R: Rng>(
        &self,
        rng: &mut R,
        ctx: &mut GenerationContext,
        call_at: NaiveDateTime,
        cad: Option<&CadIncident>,
    ) -> Result<EmsRecordSet, GenError> {
        let t = self.tables;

        // 1. Identity
        let (profile, prior_events, is_new) = match ctx.pool.choose(rng, call_at)? {
            IdentityChoice::New => {
                let person = self
                    .population
                    .generate_person(rng, call_at.date(), t.patient_age)?;
                let profile = profile_for(&person, call_at);
                ctx.persons.insert(person)?;
                ctx.pool.register(profile.clone(), call_at)?;
                (profile, 0, true)
            }
            IdentityChoice::Reuse {
                person_id,
                prior_events,
            } => {
                ctx.pool.record_event(&person_id, call_at)?;
                let profile = ctx
                    .pool
                    .profile(&person_id)
                    .cloned()
                    .ok_or_else(|| GenError::missing_parent("recurrence profile", person_id))?;
                (profile, prior_events, false)
            }
        };
        let frequent = prior_events >= ctx.pool.config().frequent_threshold;

        // 2. Incident core
        let incident_type = self.incident_type(rng, &profile, frequent, call_at)?;
        let priority = t.priority_for(&incident_type);
        let synthesizer = if frequent { &self.familiar } else { &self.regular };
        let timeline = synthesizer.synthesize(rng, call_at, priority);
        let intervals = EmsIntervals::from_timeline(&timeline)?;

        // 3. Clinical bundle
        let clinical = t.clinical_profile(&incident_type);
        let vital_signs = self.vitals(rng, clinical)?;
        let treatment_provided = draw_treatments(rng, clinical);

        // 4. Medications
        let incident_id = RecordId::from_rng(rng);
        let names = self.medication_names(rng, &incident_type)?;
        let mut medications = Vec::with_capacity(names.len());
        for name in &names {
            medications.push(self.administer(rng, name, incident_id, profile.person_id, &timeline)?);
        }

        // 5. Dispatch bundle
        let dispatch = self.dispatch_bundle(rng)?;

        let address = match cad {
            Some(call) => call.address.clone(),
            None => self.population.address(rng)?,
        };
        let incident = EmsIncident {
            incident_id,
            incident_number: format!("EMS-{}{:06}", call_at.year(), rng.gen_range(0..1_000_000)),
            cad_incident_id: cad.map(|c| c.cad_id),
            incident_type_description: t.describe(&incident_type).to_string(),
            incident_type_code: incident_type,
            priority,
            timeline,
            intervals,
            address,
            patient_person_id: profile.person_id,
            patient_age: profile.age,
            patient_sex: profile.sex.clone(),
            patient_race: profile.race.clone(),
            patient_prior_events: prior_events,
            is_frequent_caller: frequent,
            primary_impression: clinical.impression.clone(),
            vital_signs,
            treatment_provided,
            medications_given: names,
            medication_ids: medications.iter().map(|m| m.medication_id).collect(),
            dispatch,
        };

        // 6. Patient profile and report
        let patient = if is_new {
            Some(self.patient(rng, &profile, &ctx.persons, incident_id)?)
        } else {
            None
        };
        let report = if chance(rng, t.report_probability) {
            Some(self.report(rng, &incident)?)
        } else {
            None
        };

        trace!(
            "EMS {} type {} for {} ({} prior events)",
            incident.incident_number,
            incident.incident_type_code,
            incident.patient_person_id,
            prior_events
        );
        Ok(EmsRecordSet {
            incident,
            medications,
            patient,
            report,
        })
    }

    /// Chronic mapping for frequent callers, otherwise the time-weighted
    /// table with medical-history overrides.
    fn incident_type<R: Rng>(
        &self,
        rng: &mut R,
        profile: &RecurrenceProfile,
        frequent: bool,
        call_at: NaiveDateTime,
    ) -> Result<String, GenError> {
        let t = self.tables;
        if frequent {
            let candidates = t.chronic_candidates(&profile.chronic_conditions);
            if !candidates.is_empty() {
                return Ok(pick(rng, &candidates)?.to_string());
            }
        }

        let drawn = t.incident_weights(call_at).sample_cloned(rng)?;
        for rule in &t.history_overrides {
            if profile.medical_history.contains(&rule.condition) && chance(rng, rule.probability) {
                debug!("History {} overrides type {} → {}", rule.condition, drawn, rule.incident_type);
                return Ok(rule.incident_type.clone());
            }
        }
        Ok(drawn)
    }

    /// Vitals from the type profile; arrests stay at zero.
    fn vitals<R: Rng>(&self, rng: &mut R, clinical: &ClinicalProfile) -> Result<VitalSigns, GenError> {
        let v = &clinical.vitals;
        let (lo, hi) = v.temperature_f;
        let temperature = if hi > lo { rng.gen_range(lo..hi) } else { lo };
        let temperature_f = (temperature * 10.0).round() / 10.0;

        if v.is_arrest() {
            return Ok(VitalSigns {
                bp_systolic: 0,
                bp_diastolic: 0,
                heart_rate: 0,
                respiratory_rate: 0,
                spo2: v.spo2.sample(rng),
                temperature_f,
            });
        }

        let mut vitals = VitalSigns {
            bp_systolic: v.bp_systolic.sample(rng),
            bp_diastolic: v.bp_diastolic.sample(rng),
            heart_rate: v.heart_rate.sample(rng),
            respiratory_rate: v.respiratory_rate.sample(rng),
            spo2: v.spo2.sample(rng),
            temperature_f,
        };
        if chance(rng, self.tables.atypical_vitals_probability) {
            vitals.heart_rate = jitter(rng, vitals.heart_rate, 15.0, 30, 220)?;
            vitals.respiratory_rate = jitter(rng, vitals.respiratory_rate, 4.0, 4, 60)?;
            vitals.spo2 = jitter(rng, vitals.spo2, 3.0, 50, 100)?;
        }
        Ok(vitals)
    }

    /// OXYGEN first unless the type is exempt, then distinct draws from
    /// the type's medication list.
    fn medication_names<R: Rng>(&self, rng: &mut R, incident_type: &str) -> Result<Vec<String>, GenError> {
        let t = self.tables;
        let count = *t.medication_count.sample(rng)?;
        let mut names = Vec::with_capacity(count);
        if count > 0 && !t.oxygen_exempt_types.iter().any(|c| c == incident_type) {
            names.push(OXYGEN.to_string());
        }
        let remaining = count.saturating_sub(names.len());
        let others = WeightedTable::uniform(
            t.medications_for(incident_type)
                .iter()
                .filter(|name| !names.contains(name))
                .cloned(),
        );
        names.extend(others.sample_distinct(rng, remaining).into_iter().cloned());
        Ok(names)
    }

    /// One administration through the medication cascade.
    fn administer<R: Rng>(
        &self,
        rng: &mut R,
        name: &str,
        incident_id: RecordId,
        patient: PersonId,
        timeline: &Timeline,
    ) -> Result<EmsMedication, GenError> {
        let t = self.tables;
        let bundle = self
            .medications
            .resolve(rng, ResolvedBundle::new().with(MEDICATION, name))?;

        let raw_dosage = bundle.value_or_empty(DOSAGE);
        let dosage = raw_dosage
            .parse::<f64>()
            .map_err(|_| GenError::invalid_config(format!("dosage '{}' for {} is not numeric", raw_dosage, name)))?;

        let prior = chance(rng, t.prior_to_care_probability);
        let administered_datetime =
            administration_time(rng, timeline, prior).ok_or(GenError::EmptyCollection("timeline stamps"))?;

        Ok(EmsMedication {
            medication_id: RecordId::from_rng(rng),
            incident_id,
            patient_person_id: patient,
            medication_name: name.to_string(),
            rxcui_code: t.medication(name).map(|m| m.rxcui_code.clone()).unwrap_or_default(),
            route: bundle.value_or_empty(ROUTE),
            site: bundle.value_or_empty(SITE),
            dosage,
            dosage_unit: bundle.value_or_empty(UNIT),
            patient_response: bundle.value_or_empty(RESPONSE),
            complication: bundle.value_or_empty(COMPLICATION),
            administered_datetime,
            administered_prior_to_ems_care: prior,
        })
    }

    fn dispatch_bundle<R: Rng>(&self, rng: &mut R) -> Result<DispatchBundle, GenError> {
        let t = self.tables;
        let bundle = self.dispatch.resolve(rng, ResolvedBundle::new())?;

        let draws = t.procedure_draws.sample(rng);
        let mut attempted: Vec<String> = Vec::new();
        for _ in 0..draws {
            let procedure = t.procedures.sample_cloned(rng)?;
            if !attempted.contains(&procedure) {
                attempted.push(procedure);
            }
        }
        let mut successful = Vec::new();
        let mut complications = BTreeMap::new();
        for procedure in &attempted {
            if chance(rng, t.success_rate(procedure)) {
                successful.push(procedure.clone());
            }
            let complication = t.procedure_complication.sample(rng, procedure)?.value.clone();
            complications.insert(procedure.clone(), complication);
        }

        Ok(DispatchBundle {
            cad_level_of_care: bundle.value_or_empty(CAD_LEVEL),
            provider_type: bundle.value_or_empty(PROVIDER_TYPE),
            prearrival_activation: bundle.value_or_empty(PREARRIVAL),
            patient_acuity: bundle.value_or_empty(PATIENT_ACUITY),
            situation_acuity: bundle.value_or_empty(SITUATION_ACUITY),
            attempted_procedures: attempted,
            successful_procedures: successful,
            procedure_complications: complications,
            disposition: bundle.value_or_empty(DISPOSITION),
            emd_performed: bundle.value_or_empty(EMD_PERFORMED),
            incident_status: bundle.value_or_empty(INCIDENT_STATUS),
            primary_unit_role: bundle.value_or_empty(UNIT_ROLE),
        })
    }

    /// Patient profile built from the recurrence snapshot.
    fn patient<R: Rng>(
        &self,
        rng: &mut R,
        profile: &RecurrenceProfile,
        persons: &PersonIndex,
        first_incident_id: RecordId,
    ) -> Result<EmsPatient, GenError> {
        let t = self.tables;
        let person = persons.require(&profile.person_id)?;
        let occupation = match t.occupation_table(profile.age) {
            Some(table) if !table.is_empty() => table.sample_cloned(rng)?,
            _ => "UNKNOWN".to_string(),
        };
        Ok(EmsPatient {
            patient_id: profile.person_id,
            first_incident_id,
            full_name: person.full_name(),
            age: profile.age,
            sex: profile.sex.clone(),
            race: profile.race.clone(),
            weight_lbs: profile.weight_lbs,
            home_address: profile.home_address.clone(),
            occupation,
            known_allergies: t.allergies.draw(rng)?,
            current_medications: t
                .current_medication_list
                .draw_with(rng, t.medication_chance(profile.age))?,
            chronic_conditions: profile.chronic_conditions.clone(),
            medical_history: profile.medical_history.clone(),
            family_medical_history: t.family_history.draw(rng)?,
            insurance_provider: t.insurance.sample_cloned(rng)?,
        })
    }

    /// Composite report aggregating the incident and its medications.
    fn report<R: Rng>(&self, rng: &mut R, incident: &EmsIncident) -> Result<EmsReport, GenError> {
        let t = self.tables;
        let code = &incident.incident_type_code;
        let template = t.narrative(code);
        let variant = if template.variants.is_empty() {
            String::new()
        } else {
            pick(rng, &template.variants)?.clone()
        };
        let narrative = template
            .text
            .replace("{age}", &incident.patient_age.to_string())
            .replace("{sex}", &incident.patient_sex.to_lowercase())
            .replace("{variant}", &variant);

        let pain_score = if incident.vital_signs.is_arrest_profile() {
            None
        } else {
            Some(t.pain_range(code).sample(rng).min(10) as u8)
        };
        let glasgow_coma_scale = t.gcs_range(code, incident.patient_age).sample(rng).clamp(3, 15) as u8;

        let facilities = if incident.priority == Priority::High {
            &t.high_priority_facilities
        } else {
            &t.standard_facilities
        };
        let report_datetime = incident
            .timeline
            .terminal()
            .ok_or(GenError::EmptyCollection("timeline stamps"))?;

        Ok(EmsReport {
            report_id: RecordId::from_rng(rng),
            report_number: format!("RPT-{}{:06}", report_datetime.year(), rng.gen_range(0..1_000_000)),
            report_datetime,
            incident_id: incident.incident_id,
            patient_id: incident.patient_person_id,
            medication_ids: incident.medication_ids.clone(),
            priority: incident.priority,
            narrative,
            pain_score,
            glasgow_coma_scale,
            destination_facility: pick(rng, facilities)?.clone(),
        })
    }
}

// =============================================================================
// CASCADE WIRING
// =============================================================================

fn medication_cascade(t: &EmsTables) -> AttributeCascade {
    let catalog: Arc<BTreeMap<String, MedicationSpec>> = Arc::new(
        t.medication_catalog
            .iter()
            .map(|m| (m.name.clone(), m.clone()))
            .collect(),
    );
    let dosage = Arc::new(t.med_dosage.clone());
    let unit = Arc::new(t.med_unit.clone());
    let site = Arc::new(t.med_site.clone());
    let site_by_route = Arc::new(t.site_by_route.clone());

    AttributeCascade::new()
        .then(CascadeStep::conditioned(ROUTE, &[MEDICATION], t.med_route.clone()))
        .then(
            CascadeStep::new(DOSAGE)
                .push(KeyedStep::new(&[MEDICATION], dosage.clone()))
                .push(CatalogDosage {
                    catalog: catalog.clone(),
                })
                .push(DefaultStep::new(dosage.clone()))
                .push(UniformStep::new(dosage)),
        )
        .then(
            CascadeStep::new(UNIT)
                .push(KeyedStep::new(&[MEDICATION], unit.clone()))
                .push(CatalogUnit { catalog })
                .push(DefaultStep::new(unit.clone()))
                .push(UniformStep::new(unit))
                .map_values(t.unit_normalization.clone()),
        )
        .then(CascadeStep::conditioned(RESPONSE, &[MEDICATION], t.med_response.clone()))
        .then(
            CascadeStep::new(SITE)
                .push(KeyedStep::new(&[MEDICATION], site))
                .push(KeyedStep::new(&[ROUTE], site_by_route.clone()))
                .push(DefaultStep::new(site_by_route.clone()))
                .push(UniformStep::new(site_by_route)),
        )
        .then(CascadeStep::conditioned(
            COMPLICATION,
            &[RESPONSE],
            t.med_complication.clone(),
        ))
}

fn dispatch_cascade(t: &EmsTables) -> AttributeCascade {
    AttributeCascade::new()
        .then(CascadeStep::independent(CAD_LEVEL, t.cad_level.clone()))
        .then(CascadeStep::conditioned(PROVIDER_TYPE, &[CAD_LEVEL], t.provider_type.clone()))
        .then(CascadeStep::conditioned(
            PREARRIVAL,
            &[PROVIDER_TYPE],
            t.prearrival_activation.clone(),
        ))
        .then(CascadeStep::independent(PATIENT_ACUITY, t.patient_acuity.clone()))
        .then(CascadeStep::conditioned(
            SITUATION_ACUITY,
            &[PATIENT_ACUITY],
            t.situation_acuity.clone(),
        ))
        .then(CascadeStep::independent(DISPOSITION, t.disposition.clone()))
        .then(CascadeStep::independent(EMD_PERFORMED, t.emd_performed.clone()))
        .then(CascadeStep::independent(INCIDENT_STATUS, t.incident_status.clone()))
        .then(CascadeStep::independent(UNIT_ROLE, t.unit_role.clone()))
}

// =============================================================================
// HELPERS
// =============================================================================

fn profile_for(person: &Person, at: NaiveDateTime) -> RecurrenceProfile {
    let mut profile = RecurrenceProfile::new(
        person.person_id,
        person.age_on(at.date()),
        person.sex.clone(),
        person.race.clone(),
        person.weight_lbs,
        person.address.clone(),
    );
    profile.medical_history = person.medical_history.clone();
    profile.chronic_conditions = person.chronic_conditions.clone();
    profile
}

fn draw_treatments<R: Rng>(rng: &mut R, clinical: &ClinicalProfile) -> Vec<String> {
    if clinical.treatments.is_empty() {
        return Vec::new();
    }
    let n = rng.gen_range(1..=clinical.treatments.len().min(4));
    WeightedTable::uniform(clinical.treatments.iter().cloned())
        .sample_distinct(rng, n)
        .into_iter()
        .cloned()
        .collect()
}

/// Gaussian nudge around `value`, clamped to `[min, max]`.
fn jitter<R: Rng>(rng: &mut R, value: u32, std_dev: f64, min: u32, max: u32) -> Result<u32, GenError> {
    let normal = Normal::new(f64::from(value), std_dev)
        .map_err(|e| GenError::invalid_config(format!("vitals jitter: {}", e)))?;
    let sampled = normal.sample(rng).round().max(0.0) as u32;
    Ok(sampled.clamp(min, max))
}

/// On scene between arrival and hospital arrival, or before the crew
/// arrived for medications given prior to EMS care.
fn administration_time<R: Rng>(rng: &mut R, timeline: &Timeline, prior: bool) -> Option<NaiveDateTime> {
    let call = timeline.anchor()?;
    let arrive = timeline.at(Stage::Arrive).unwrap_or(call);
    let (from, to) = if prior {
        (call, arrive)
    } else {
        let until = timeline
            .at(Stage::HospitalArrival)
            .or_else(|| timeline.terminal())
            .unwrap_or(arrive);
        (arrive, until)
    };
    let span = (to - from).num_seconds();
    if span <= 0 {
        return Some(from);
    }
    Some(from + Duration::seconds(rng.gen_range(0..span)))
}
