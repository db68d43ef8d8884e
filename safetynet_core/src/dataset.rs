//! The full set of generated collections.

use crate::records::{
    Arrest, BailBond, CadIncident, CorrectionsFacility, EmsIncident, EmsMedication, EmsPatient, EmsReport,
    JailBooking, JailIncident, JailLog, JailProgram, JailSentence, Person, PropertyRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every collection one run produces, in generation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub persons: Vec<Person>,
    pub cad_incidents: Vec<CadIncident>,
    pub ems_incidents: Vec<EmsIncident>,
    pub ems_medications: Vec<EmsMedication>,
    pub ems_patients: Vec<EmsPatient>,
    pub ems_reports: Vec<EmsReport>,
    pub arrests: Vec<Arrest>,
    pub property: Vec<PropertyRecord>,
    pub bookings: Vec<JailBooking>,
    pub sentences: Vec<JailSentence>,
    pub bail_bonds: Vec<BailBond>,
    pub jail_incidents: Vec<JailIncident>,
    pub jail_logs: Vec<JailLog>,
    pub facilities: Vec<CorrectionsFacility>,
    pub programs: Vec<JailProgram>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record count per collection, keyed by collection name.
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        BTreeMap::from([
            ("persons", self.persons.len()),
            ("cad_incidents", self.cad_incidents.len()),
            ("ems_incidents", self.ems_incidents.len()),
            ("ems_medications", self.ems_medications.len()),
            ("ems_patients", self.ems_patients.len()),
            ("ems_reports", self.ems_reports.len()),
            ("arrests", self.arrests.len()),
            ("property", self.property.len()),
            ("bookings", self.bookings.len()),
            ("sentences", self.sentences.len()),
            ("bail_bonds", self.bail_bonds.len()),
            ("jail_incidents", self.jail_incidents.len()),
            ("jail_logs", self.jail_logs.len()),
            ("facilities", self.facilities.len()),
            ("programs", self.programs.len()),
        ])
    }

    pub fn total_records(&self) -> usize {
        self.counts().values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_dataset_counts() {
        let dataset = Dataset::new();
        assert!(dataset.is_empty());
        assert_eq!(dataset.counts().len(), 15);
        assert!(dataset.counts().values().all(|&n| n == 0));
    }
}
