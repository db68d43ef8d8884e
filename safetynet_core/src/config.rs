//! Generator configuration.
//!
//! Every weight table lives in one of the per-domain structs below. Each
//! carries the built-in tables in its `Default`, and `#[serde(default)]`
//! lets an override file name only the fields it changes.

use crate::arrest::ArrestTables;
use crate::cad::CadTables;
use crate::ems_tables::EmsTables;
use crate::jail_tables::JailTables;
use crate::population::PopulationTables;
use crate::property::PropertyTables;
use crate::records::EmsIntervals;
use crate::recurrence::RecurrenceConfig;
use crate::timeline::TimelineConfig;
use safetynet_env::GenError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub timeline: TimelineConfig,
    pub recurrence: RecurrenceConfig,
    pub ems: EmsTables,
    pub jail: JailTables,
    pub arrest: ArrestTables,
    pub property: PropertyTables,
    pub cad: CadTables,
    pub population: PopulationTables,
}

impl GeneratorConfig {
    /// Loads an override file; fields it omits keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, GenError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        info!("Loaded generator config from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, GenError> {
        let config: Self = serde_json::from_str(json).map_err(|e| GenError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, GenError> {
        serde_json::to_string_pretty(self).map_err(|e| GenError::Serialization(e.to_string()))
    }

    /// Rejects configs the generators cannot run with.
    pub fn validate(&self) -> Result<(), GenError> {
        for timeline in [&self.timeline, &self.ems.familiar_timeline] {
            timeline.validate()?;
            timeline.require_stages(&EmsIntervals::STAGES)?;
        }
        self.recurrence.validate()?;
        if !(0.0..=1.0).contains(&self.ems.report_probability) {
            return Err(GenError::invalid_config("ems.report_probability must be within [0, 1]"));
        }
        if self.ems.medication_count.is_empty() {
            return Err(GenError::invalid_config("ems.medication_count is empty"));
        }
        if self.population.first_names.is_empty() {
            return Err(GenError::invalid_config("population.first_names is empty"));
        }
        Ok(())
    }
}
