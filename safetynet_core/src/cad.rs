//! CAD calls for service.
//!
//! CAD incidents are the first event collection: EMS incidents, arrests and
//! standalone property records all hang off them.

use crate::ems_tables::EmsTables;
use crate::person_index::PersonIndex;
use crate::population::{PopulationGenerator, PopulationTables};
use crate::records::CadIncident;
use crate::sampler::{chance, WeightedTable};
use chrono::{Datelike, Duration, NaiveDateTime};
use rand::Rng;
use safetynet_env::{GenError, RecordId};
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadTables {
    pub agency: String,
    pub person_link_probability: f64,
    pub call_status: WeightedTable<String>,
}

impl Default for CadTables {
    fn default() -> Self {
        Self {
            agency: "KCSO".into(),
            person_link_probability: 0.9,
            call_status: WeightedTable::from_pairs(&[
                ("DISPATCHED", 10.0),
                ("EN_ROUTE", 15.0),
                ("ON_SCENE", 25.0),
                ("COMPLETED", 45.0),
                ("CANCELLED", 5.0),
            ]),
        }
    }
}

/// Builds CAD incidents from the shared EMS incident-type table.
#[derive(Debug, Clone, Copy)]
pub struct CadGenerator<'a> {
    tables: &'a CadTables,
    ems: &'a EmsTables,
    population: PopulationGenerator<'a>,
}

impl<'a> CadGenerator<'a> {
    pub fn new(tables: &'a CadTables, ems: &'a EmsTables, population: &'a PopulationTables) -> Self {
        Self {
            tables,
            ems,
            population: PopulationGenerator::new(population),
        }
    }

    /// One call inside `[window_start, anchor)`.
    ///
    /// Linking a person requires a populated index; an empty one is a
    /// call-order error.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        window_start: NaiveDateTime,
        anchor: NaiveDateTime,
        persons: &PersonIndex,
    ) -> Result<CadIncident, GenError> {
        let span = (anchor - window_start).num_seconds().max(1);
        let call_datetime = window_start + Duration::seconds(rng.gen_range(0..span));

        let nature_code = self.ems.incident_weights(call_datetime).sample_cloned(rng)?;
        let person_id = if chance(rng, self.tables.person_link_probability) {
            Some(persons.random_id(rng)?)
        } else {
            None
        };

        let incident = CadIncident {
            cad_id: RecordId::from_rng(rng),
            call_number: format!(
                "{}-{}{:06}",
                self.tables.agency,
                call_datetime.year(),
                rng.gen_range(0..1_000_000)
            ),
            call_datetime,
            nature_description: self.ems.describe(&nature_code).to_string(),
            priority: self.ems.priority_for(&nature_code),
            nature_code,
            address: self.population.address(rng)?,
            person_id,
            disposition: self.tables.call_status.sample_cloned(rng)?,
        };
        trace!("CAD {} {}", incident.call_number, incident.nature_code);
        Ok(incident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn window() -> (NaiveDateTime, NaiveDateTime) {
        let anchor = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        (anchor - Duration::days(730), anchor)
    }

    #[test]
    fn test_linking_requires_persons() {
        let (cad, ems, pop) = (CadTables::default(), EmsTables::default(), PopulationTables::default());
        let generator = CadGenerator::new(&cad, &ems, &pop);
        let (start, anchor) = window();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let result = (0..50)
            .map(|_| generator.generate(&mut rng, start, anchor, &PersonIndex::new()))
            .find(Result::is_err);
        assert!(matches!(result, Some(Err(GenError::EmptyCollection("persons")))));
    }

    #[test]
    fn test_calls_fall_inside_window_and_link_existing_persons() {
        let (cad, ems, pop) = (CadTables::default(), EmsTables::default(), PopulationTables::default());
        let generator = CadGenerator::new(&cad, &ems, &pop);
        let population = PopulationGenerator::new(&pop);
        let (start, anchor) = window();
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let mut persons = PersonIndex::new();
        for _ in 0..10 {
            let person = population.generate_adult(&mut rng, anchor.date()).unwrap();
            persons.insert(person).unwrap();
        }

        for _ in 0..200 {
            let incident = generator.generate(&mut rng, start, anchor, &persons).unwrap();
            assert!(incident.call_datetime >= start && incident.call_datetime < anchor);
            assert!(incident.call_number.starts_with("KCSO-"));
            if let Some(id) = incident.person_id {
                assert!(persons.contains(&id));
            }
            assert_eq!(incident.priority, ems.priority_for(&incident.nature_code));
        }
    }
}
