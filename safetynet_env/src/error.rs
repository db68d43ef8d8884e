//! Error types for SafetyNet generation.
//!
//! Missing table entries and exhausted reuse pools are absorbed by
//! fallbacks and never show up here. What remains are caller-contract
//! violations and I/O at the edges.

use thiserror::Error;

/// Errors that can halt a generation run.
#[derive(Debug, Error)]
pub enum GenError {
    /// A sampler was handed an empty item universe
    #[error("Empty item universe: {0}")]
    EmptyUniverse(String),

    /// A child record referenced a parent that has not been generated
    #[error("Missing parent {kind}: {id}")]
    MissingParent { kind: &'static str, id: String },

    /// A consuming phase ran before its producing collection existed
    #[error("Empty collection: {0} must be generated first")]
    EmptyCollection(&'static str),

    /// An event falls too close to (or past) the end of the generation window
    #[error("Outside generation window: {0}")]
    OutsideWindow(String),

    /// An identity key was registered twice
    #[error("Duplicate identity: {0}")]
    DuplicateIdentity(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem error while loading config or exporting
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GenError {
    /// Creates an empty-universe error.
    pub fn empty_universe(what: impl Into<String>) -> Self {
        Self::EmptyUniverse(what.into())
    }

    /// Creates a missing-parent error.
    pub fn missing_parent(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::MissingParent {
            kind,
            id: id.to_string(),
        }
    }

    /// Creates an invalid-config error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Returns true for errors caused by generator call order.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::EmptyUniverse(_)
                | Self::MissingParent { .. }
                | Self::EmptyCollection(_)
                | Self::OutsideWindow(_)
        )
    }
}

impl From<std::io::Error> for GenError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
