//! JSON exporter for generated datasets.
//!
//! One file per run: run metadata, the integrity report, metrics and every
//! collection. A failed run still exports whatever it produced.

use crate::runner::RunResult;

use chrono::NaiveDateTime;
use safetynet_core::{Dataset, DatasetMetrics, IntegrityReport};
use safetynet_env::GenError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete run export.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetExport {
    /// Profile name
    pub profile: String,

    /// Seed used
    pub seed: u64,

    /// End of the generation window
    pub anchor: NaiveDateTime,

    pub counts: BTreeMap<&'static str, usize>,

    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<IntegrityReport>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<DatasetMetrics>,

    pub dataset: Dataset,
}

impl DatasetExport {
    /// Builds an export from a finished (or stopped) run.
    pub fn from_result(result: &RunResult, anchor: NaiveDateTime) -> Self {
        Self {
            profile: result.profile.name().to_string(),
            seed: result.seed,
            anchor,
            counts: result.counts.clone(),
            passed: result.passed,
            failure_reason: result.failure_reason.clone(),
            integrity: result.integrity.clone(),
            metrics: result.metrics.clone(),
            dataset: result.dataset.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, GenError> {
        serde_json::to_string_pretty(self).map_err(|e| GenError::Serialization(e.to_string()))
    }

    /// Writes to JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), GenError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
