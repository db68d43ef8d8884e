//! Arrests, charges and bail.
//!
//! An arrest always references an existing person and, optionally, the
//! CAD incident it came from. Evidence items collected at the scene become
//! EVIDENCE property records linked back to the arrest.

use crate::person_index::PersonIndex;
use crate::population::{PopulationGenerator, PopulationTables};
use crate::property::{PropertyGenerator, PropertyLink};
use crate::records::{Arrest, CadIncident, Charge, ChargeSeverity, PropertyRecord, PropertyType};
use crate::sampler::{chance, IntRange, ListDraw, WeightedTable};
use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use safetynet_env::{GenError, PersonId, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

// =============================================================================
// TABLES
// =============================================================================

/// One chargeable offense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offense {
    pub description: String,
    pub category: String,
    pub severity: ChargeSeverity,
}

impl Offense {
    fn new(description: &str, category: &str, severity: ChargeSeverity) -> Self {
        Self {
            description: description.into(),
            category: category.into(),
            severity,
        }
    }
}

/// Inclusive bail amount range in dollars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BailRange {
    pub min: u64,
    pub max: u64,
}

impl BailRange {
    const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        if self.max <= self.min {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }
}

/// Multipliers applied when an arrest carries more than one charge.
///
/// Checked in field order; the first rule that matches applies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BailStacking {
    pub multiple_felonies: f64,
    pub felony_with_misdemeanors: f64,
    pub two_charges: f64,
    pub three_or_more: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrestTables {
    pub cad_link_probability: f64,
    /// Arrest time after the linked CAD call
    pub cad_delay_minutes: i64,
    pub arrest_types: WeightedTable<String>,
    pub arrest_methods: WeightedTable<String>,
    pub location_types: WeightedTable<String>,
    pub offenses: WeightedTable<Offense>,
    pub ancillary_probability: f64,
    pub ancillary_offenses: WeightedTable<Offense>,
    pub statute_chapters: IntRange,
    pub statute_sections: IntRange,
    pub use_of_force_probability: f64,
    pub force_types: WeightedTable<String>,
    pub injury_probability: f64,
    pub miranda_probability: f64,
    pub evidence: ListDraw,
    pub bail_schedule: BTreeMap<ChargeSeverity, BTreeMap<String, BailRange>>,
    pub bail_fallback: BTreeMap<ChargeSeverity, BailRange>,
    pub bail_stacking: BailStacking,
    /// Lowercased charge fragments that may be held without bail
    pub no_bail_offenses: Vec<String>,
    pub no_bail_probability: f64,
    pub no_bail_felony_count: usize,
    pub no_bail_felony_probability: f64,
}

impl Default for ArrestTables {
    fn default() -> Self {
        use crate::records::ChargeSeverity::{Felony as FEL, Infraction as INF, Misdemeanor as MISD};

        let offenses = vec![
            (Offense::new("Possession of Controlled Substance", "DRUG", MISD), 100.0),
            (Offense::new("Trafficking in Controlled Substance", "DRUG", FEL), 85.0),
            (Offense::new("Having Weapons While Under Disability", "WEAPONS", FEL), 70.0),
            (Offense::new("Theft", "PROPERTY", MISD), 65.0),
            (Offense::new("Felonious Assault", "VIOLENT", FEL), 60.0),
            (Offense::new("Receiving Stolen Property", "PROPERTY", MISD), 55.0),
            (Offense::new("Failure to Comply with Order", "COURT_ORDER", MISD), 50.0),
            (Offense::new("Domestic Violence", "VIOLENT", MISD), 45.0),
            (Offense::new("Burglary", "PROPERTY", FEL), 40.0),
            (Offense::new("Tampering with Evidence", "JUSTICE", FEL), 35.0),
            (Offense::new("Breaking and Entering", "PROPERTY", FEL), 32.0),
            (Offense::new("Robbery", "VIOLENT", FEL), 30.0),
            (Offense::new("Rape", "SEX", FEL), 15.0),
            (Offense::new("Gross Sexual Imposition", "SEX", FEL), 13.0),
            (Offense::new("Aggravated Robbery", "VIOLENT", FEL), 12.0),
            (Offense::new("Improperly Handling Firearms in a Motor Vehicle", "WEAPONS", FEL), 10.0),
            (Offense::new("Involuntary Manslaughter", "VIOLENT", FEL), 8.0),
            (Offense::new("Driving While Under the Influence of Alcohol", "TRAFFIC", MISD), 7.0),
            (Offense::new("Escape", "COURT_ORDER", FEL), 5.0),
        ];

        let ancillary = vec![
            (Offense::new("Failure to Comply with Order", "COURT_ORDER", MISD), 1.0),
            (Offense::new("Tampering with Evidence", "JUSTICE", FEL), 1.0),
            (Offense::new("Receiving Stolen Property", "PROPERTY", MISD), 1.0),
            (Offense::new("Theft", "PROPERTY", MISD), 1.0),
        ];

        let schedule = |rows: &[(&str, u64, u64)]| -> BTreeMap<String, BailRange> {
            rows.iter()
                .map(|(category, min, max)| (category.to_string(), BailRange::new(*min, *max)))
                .collect()
        };
        let mut bail_schedule = BTreeMap::new();
        bail_schedule.insert(INF, schedule(&[("TRAFFIC", 0, 0), ("OTHER", 50, 200)]));
        bail_schedule.insert(
            MISD,
            schedule(&[
                ("DRUG", 1_000, 5_000),
                ("PROPERTY", 500, 2_500),
                ("VIOLENT", 2_000, 10_000),
                ("TRAFFIC", 500, 2_000),
                ("COURT_ORDER", 1_500, 5_000),
                ("OTHER", 500, 2_000),
            ]),
        );
        bail_schedule.insert(
            FEL,
            schedule(&[
                ("DRUG", 10_000, 50_000),
                ("PROPERTY", 5_000, 25_000),
                ("VIOLENT", 25_000, 500_000),
                ("WEAPONS", 15_000, 100_000),
                ("SEX", 50_000, 1_000_000),
                ("JUSTICE", 25_000, 200_000),
                ("COURT_ORDER", 30_000, 200_000),
            ]),
        );

        Self {
            cad_link_probability: 0.7,
            cad_delay_minutes: 15,
            arrest_types: WeightedTable::from_items(&["ON_VIEW", "WARRANT", "INVESTIGATIVE", "TRAFFIC", "DOMESTIC_VIOLENCE"]),
            arrest_methods: WeightedTable::from_items(&[
                "HANDCUFFS",
                "VERBAL_COMMAND",
                "PHYSICAL_RESTRAINT",
                "TASER",
                "FIREARM_DISPLAY",
            ]),
            location_types: WeightedTable::from_items(&[
                "Street",
                "Residence",
                "Business",
                "Parking Lot",
                "Vehicle",
                "Public Place",
            ]),
            offenses: WeightedTable::new(offenses),
            ancillary_probability: 0.25,
            ancillary_offenses: WeightedTable::new(ancillary),
            statute_chapters: IntRange::new(9, 69),
            statute_sections: IntRange::new(10, 999),
            use_of_force_probability: 0.15,
            force_types: WeightedTable::from_items(&["HANDCUFFS", "PHYSICAL_RESTRAINT", "TASER", "OC_SPRAY", "BATON"]),
            injury_probability: 0.08,
            miranda_probability: 0.95,
            evidence: ListDraw::new(
                0.7,
                &[(1, 1.0), (2, 1.0), (3, 1.0)],
                &["PHOTOGRAPHS", "VIDEO_RECORDING", "PHYSICAL_EVIDENCE", "BODY_CAMERA", "DASH_CAMERA"],
            ),
            bail_schedule,
            bail_fallback: [
                (INF, BailRange::new(100, 500)),
                (MISD, BailRange::new(1_000, 5_000)),
                (FEL, BailRange::new(5_000, 25_000)),
            ]
            .into_iter()
            .collect(),
            bail_stacking: BailStacking {
                multiple_felonies: 1.8,
                felony_with_misdemeanors: 1.6,
                two_charges: 1.3,
                three_or_more: 1.7,
            },
            no_bail_offenses: [
                "murder",
                "rape",
                "aggravated assault",
                "involuntary manslaughter",
                "kidnapping",
                "armed robbery",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            no_bail_probability: 0.4,
            no_bail_felony_count: 3,
            no_bail_felony_probability: 0.2,
        }
    }
}

impl ArrestTables {
    fn bail_range(&self, charge: &Charge) -> Option<BailRange> {
        self.bail_schedule
            .get(&charge.severity)
            .and_then(|rows| rows.get(&charge.category))
            .or_else(|| self.bail_fallback.get(&charge.severity))
            .copied()
    }

    /// Bail for a set of charges.
    ///
    /// Sums each charge's scheduled range, applies the first stacking rule
    /// that matches, then checks the hold-without-bail rules.
    pub fn calculate_bail<R: Rng + ?Sized>(&self, rng: &mut R, charges: &[Charge]) -> u64 {
        if charges.is_empty() {
            return 0;
        }
        let all_traffic_infractions = charges
            .iter()
            .all(|c| c.severity == ChargeSeverity::Infraction && c.category == "TRAFFIC");
        if all_traffic_infractions {
            return 0;
        }

        let base: u64 = charges
            .iter()
            .filter_map(|c| self.bail_range(c).map(|range| range.sample(rng)))
            .sum();

        let felonies = charges.iter().filter(|c| c.severity == ChargeSeverity::Felony).count();
        let misdemeanors = charges
            .iter()
            .filter(|c| c.severity == ChargeSeverity::Misdemeanor)
            .count();
        let stacking = &self.bail_stacking;
        let multiplier = if charges.len() <= 1 {
            1.0
        } else if felonies >= 2 {
            stacking.multiple_felonies
        } else if felonies == 1 && misdemeanors >= 2 {
            stacking.felony_with_misdemeanors
        } else if charges.len() == 2 {
            stacking.two_charges
        } else {
            stacking.three_or_more
        };
        let amount = (base as f64 * multiplier).round() as u64;

        let serious = charges.iter().any(|c| {
            let name = c.description.to_lowercase();
            self.no_bail_offenses.iter().any(|o| name.contains(o.as_str()))
        });
        if serious && chance(rng, self.no_bail_probability) {
            return 0;
        }
        if felonies >= self.no_bail_felony_count && chance(rng, self.no_bail_felony_probability) {
            return 0;
        }
        amount
    }
}

// =============================================================================
// GENERATOR
// =============================================================================

/// An arrest and the evidence property it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrestRecordSet {
    pub arrest: Arrest,
    pub evidence: Vec<PropertyRecord>,
}

#[derive(Debug, Clone, Copy)]
pub struct ArrestGenerator<'a> {
    tables: &'a ArrestTables,
    population: PopulationGenerator<'a>,
    property: PropertyGenerator<'a>,
}

impl<'a> ArrestGenerator<'a> {
    pub fn new(
        tables: &'a ArrestTables,
        population: &'a PopulationTables,
        property: PropertyGenerator<'a>,
    ) -> Self {
        Self {
            tables,
            population: PopulationGenerator::new(population),
            property,
        }
    }

    pub fn tables(&self) -> &ArrestTables {
        self.tables
    }

    /// Picks the arrested person and, sometimes, the originating CAD call.
    ///
    /// A linked call that names a person arrests that person; otherwise a
    /// random person from the index is used.
    pub fn choose_subject<'c, R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        persons: &PersonIndex,
        cad_incidents: &'c [CadIncident],
    ) -> Result<(PersonId, Option<&'c CadIncident>), GenError> {
        let cad = if !cad_incidents.is_empty() && chance(rng, self.tables.cad_link_probability) {
            Some(&cad_incidents[rng.gen_range(0..cad_incidents.len())])
        } else {
            None
        };
        let person_id = match cad.and_then(|c| c.person_id) {
            Some(id) => persons.require(&id)?.person_id,
            None => persons.random_id(rng)?,
        };
        Ok((person_id, cad))
    }

    /// One arrest of `person_id`.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        persons: &PersonIndex,
        person_id: PersonId,
        cad: Option<&CadIncident>,
        window_start: NaiveDateTime,
        anchor: NaiveDateTime,
    ) -> Result<ArrestRecordSet, GenError> {
        let t = self.tables;
        persons.require(&person_id)?;

        let arrest_datetime = match cad {
            Some(call) => call.call_datetime + Duration::minutes(t.cad_delay_minutes),
            None => {
                let span = (anchor - window_start).num_seconds().max(1);
                window_start + Duration::seconds(rng.gen_range(0..span))
            }
        };
        let place = match cad {
            Some(call) => call.address.clone(),
            None => self.population.address(rng)?,
        };
        let arrest_location = format!("{} near {}", t.location_types.sample(rng)?, place);

        let charges = self.draw_charges(rng)?;
        let bail_amount = t.calculate_bail(rng, &charges);

        let use_of_force = chance(rng, t.use_of_force_probability);
        let force_type = if use_of_force {
            Some(t.force_types.sample_cloned(rng)?)
        } else {
            None
        };
        let injuries_sustained = chance(rng, t.injury_probability);
        let miranda_read = chance(rng, t.miranda_probability);
        let miranda_datetime = if miranda_read {
            Some(arrest_datetime + Duration::minutes(rng.gen_range(1..=30)))
        } else {
            None
        };

        let arrest_id = RecordId::from_rng(rng);
        let cad_incident_id = cad.map(|c| c.cad_id);
        let evidence_collected = t.evidence.draw(rng)?;
        let mut evidence = Vec::with_capacity(evidence_collected.len());
        for item in &evidence_collected {
            evidence.push(self.property.generate(
                rng,
                PropertyLink::arrest(arrest_id, cad_incident_id, person_id),
                Some(PropertyType::Evidence),
                Some(format!("{} {}.", item, PropertyType::Evidence.action_phrase())),
                arrest_datetime,
            )?);
        }

        let arrest = Arrest {
            arrest_id,
            person_id,
            cad_incident_id,
            arrest_datetime,
            arrest_location,
            arresting_officer: self.population.full_name(rng)?,
            arrest_type: t.arrest_types.sample_cloned(rng)?,
            arrest_method: t.arrest_methods.sample_cloned(rng)?,
            charges,
            use_of_force,
            force_type,
            injuries_sustained,
            miranda_read,
            miranda_datetime,
            bail_amount,
            evidence_collected,
            evidence_property_ids: evidence.iter().map(|p| p.property_id).collect(),
        };
        debug!(
            "Arrest {} of {} with {} charge(s), bail ${}",
            arrest.arrest_id,
            person_id,
            arrest.charges.len(),
            arrest.bail_amount
        );
        Ok(ArrestRecordSet { arrest, evidence })
    }

    /// Primary charge plus, sometimes, a distinct ancillary one.
    fn draw_charges<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<Charge>, GenError> {
        let t = self.tables;
        let primary = t.offenses.sample(rng)?;
        let mut charges = vec![self.charge(rng, primary)];
        if chance(rng, t.ancillary_probability) {
            let extra = t.ancillary_offenses.sample(rng)?;
            if extra.description != primary.description {
                charges.push(self.charge(rng, extra));
            }
        }
        Ok(charges)
    }

    fn charge<R: Rng + ?Sized>(&self, rng: &mut R, offense: &Offense) -> Charge {
        Charge {
            description: offense.description.clone(),
            category: offense.category.clone(),
            severity: offense.severity,
            statute: format!(
                "RCW {}.{}",
                self.tables.statute_chapters.sample(rng),
                self.tables.statute_sections.sample(rng)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyTables;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn charge(description: &str, category: &str, severity: ChargeSeverity) -> Charge {
        Charge {
            description: description.into(),
            category: category.into(),
            severity,
            statute: "RCW 9.10".into(),
        }
    }

    fn no_holds() -> ArrestTables {
        let mut tables = ArrestTables::default();
        tables.no_bail_probability = 0.0;
        tables.no_bail_felony_probability = 0.0;
        tables
    }

    #[test]
    fn test_all_traffic_infractions_have_no_bail() {
        let tables = ArrestTables::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let charges = vec![
            charge("Speeding", "TRAFFIC", ChargeSeverity::Infraction),
            charge("Expired Tabs", "TRAFFIC", ChargeSeverity::Infraction),
        ];
        assert_eq!(tables.calculate_bail(&mut rng, &charges), 0);
        assert_eq!(tables.calculate_bail(&mut rng, &[]), 0);
    }

    #[test]
    fn test_single_charge_uses_schedule() {
        let tables = no_holds();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for _ in 0..100 {
            let bail = tables.calculate_bail(&mut rng, &[charge("Theft", "PROPERTY", ChargeSeverity::Misdemeanor)]);
            assert!((500..=2_500).contains(&bail));
        }
    }

    #[test]
    fn test_unknown_category_uses_severity_fallback() {
        let tables = no_holds();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let bail = tables.calculate_bail(&mut rng, &[charge("Arson", "ARSON", ChargeSeverity::Felony)]);
        assert!((5_000..=25_000).contains(&bail));
    }

    #[test]
    fn test_two_felonies_stack_at_felony_rate() {
        let mut tables = no_holds();
        // Fixed amounts so the multiplier is observable
        tables
            .bail_schedule
            .get_mut(&ChargeSeverity::Felony)
            .unwrap()
            .insert("PROPERTY".into(), BailRange::new(10_000, 10_000));
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let charges = vec![
            charge("Burglary", "PROPERTY", ChargeSeverity::Felony),
            charge("Breaking and Entering", "PROPERTY", ChargeSeverity::Felony),
        ];
        assert_eq!(tables.calculate_bail(&mut rng, &charges), 36_000);
    }

    #[test]
    fn test_serious_charge_can_be_held_without_bail() {
        let mut tables = ArrestTables::default();
        tables.no_bail_probability = 1.0;
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let charges = vec![charge("Rape", "SEX", ChargeSeverity::Felony)];
        assert_eq!(tables.calculate_bail(&mut rng, &charges), 0);
    }

    #[test]
    fn test_arrest_links_evidence_and_cad() {
        let arrest_tables = ArrestTables::default();
        let pop = PopulationTables::default();
        let property_tables = PropertyTables::default();
        let generator = ArrestGenerator::new(&arrest_tables, &pop, PropertyGenerator::new(&property_tables));
        let mut rng = ChaCha8Rng::seed_from_u64(6);

        let anchor = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let start = anchor - Duration::days(730);
        let mut persons = PersonIndex::new();
        let person = PopulationGenerator::new(&pop).generate_adult(&mut rng, anchor.date()).unwrap();
        let person_id = person.person_id;
        persons.insert(person).unwrap();

        let cad = CadIncident {
            cad_id: RecordId::from_seed(77),
            call_number: "KCSO-2024000001".into(),
            call_datetime: anchor - Duration::days(3),
            nature_code: "2301043".into(),
            nature_description: "Assault".into(),
            priority: crate::timeline::Priority::High,
            address: Default::default(),
            person_id: Some(person_id),
            disposition: "COMPLETED".into(),
        };

        for _ in 0..50 {
            let set = generator
                .generate(&mut rng, &persons, person_id, Some(&cad), start, anchor)
                .unwrap();
            assert_eq!(set.arrest.cad_incident_id, Some(cad.cad_id));
            assert_eq!(set.arrest.arrest_datetime, cad.call_datetime + Duration::minutes(15));
            assert_eq!(set.evidence.len(), set.arrest.evidence_collected.len());
            assert!(!set.arrest.charges.is_empty() && set.arrest.charges.len() <= 2);
            for property in &set.evidence {
                assert_eq!(property.arrest_id, Some(set.arrest.arrest_id));
                assert_eq!(property.property_type, PropertyType::Evidence);
                assert!(set.arrest.evidence_property_ids.contains(&property.property_id));
            }
            if !set.arrest.use_of_force {
                assert!(set.arrest.force_type.is_none());
            }
        }
    }

    #[test]
    fn test_unknown_person_is_rejected() {
        let arrest_tables = ArrestTables::default();
        let pop = PopulationTables::default();
        let property_tables = PropertyTables::default();
        let generator = ArrestGenerator::new(&arrest_tables, &pop, PropertyGenerator::new(&property_tables));
        let anchor = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let result = generator.generate(
            &mut ChaCha8Rng::seed_from_u64(7),
            &PersonIndex::new(),
            PersonId::from_seed(1),
            None,
            anchor - Duration::days(10),
            anchor,
        );
        assert!(matches!(result, Err(GenError::MissingParent { .. })));
    }
}
