//! Custom error types for the crate.
//!
//! This module defines the primary error type, `CytoError`, shared by the file loader,
//! the compensation engine and the gate model. Using the `thiserror` crate, it provides a
//! centralized and consistent way to report failures, from I/O and malformed FCS structure
//! to gate validation problems.
//!
//! ## Error Hierarchy
//!
//! - **`Io`**: Wraps standard `std::io::Error`, covering file access.
//! - **`Parse`**: The FCS binary structure (header, TEXT or DATA segment) is malformed.
//!   Fatal for that file only; batch callers skip the file and carry on.
//! - **`Spillover`**: A spillover matrix, embedded or external, could not be decoded.
//! - **`MissingSpillover`** / **`AlreadyCompensated`** / **`CompensationDimension`** /
//!   **`SingularSpillover`**: Preconditions of the compensation transform. These are raised
//!   only when `compensate()` is invoked, never at load time.
//! - **`InvalidChildDefinition`**, **`GateType`**, **`InvalidGeometry`**, **`DuplicateGate`**,
//!   **`UnknownParent`**, **`Validation`**: Synchronous validation failures of the gate model.
//!   The offending child or gate is never stored.
//! - **`FeatureNotEnabled`**: The code path needs a cargo feature that was not compiled in.
//!
//! By using `#[from]`, `CytoError` can be created from underlying error types with `?`.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, CytoError>;

/// Primary error type for cytogate.
#[derive(Error, Debug)]
pub enum CytoError {
    /// Configuration could not be loaded or extracted.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration values parsed but are semantically invalid.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Standard I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed FCS structure.
    #[error("FCS parse error: {0}")]
    Parse(String),

    /// The spillover matrix could not be decoded.
    #[error("Spillover matrix error: {0}")]
    Spillover(String),

    /// Compensation was requested but the file carries no spillover matrix.
    #[error(
        "Unable to locate spillover matrix, please provide a compensation matrix file \
         (e.g. --comp-matrix <csv>)"
    )]
    MissingSpillover,

    /// The event matrix has already been compensated once.
    #[error("Event data has already been compensated; compensation can only be applied once")]
    AlreadyCompensated,

    /// Number of compensable channels differs from the spillover dimension.
    #[error("Spillover matrix is {matrix}x{matrix} but the file has {channels} compensable channels")]
    CompensationDimension {
        /// Dimension of the spillover matrix.
        matrix: usize,
        /// Number of non scatter/time channels in the file.
        channels: usize,
    },

    /// The spillover matrix cannot be solved against.
    #[error("Spillover matrix is singular")]
    SingularSpillover,

    /// A threshold child carries a definition code not valid for the gate's mode.
    #[error("Invalid child definition '{definition}', should be one of: {expected}")]
    InvalidChildDefinition {
        /// The rejected definition code.
        definition: String,
        /// Human readable list of accepted codes.
        expected: String,
    },

    /// A child of the wrong kind was offered to a gate.
    #[error("Gate '{gate}' is a {kind} gate and does not accept {child} children")]
    GateType {
        /// Gate name.
        gate: String,
        /// Gate variant tag.
        kind: &'static str,
        /// Offered child kind.
        child: &'static str,
    },

    /// Geometry attached to a child population is not well formed.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Generic field validation failure.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A gate with the same name already exists in the scheme.
    #[error("Gate '{0}' already exists in the gating scheme")]
    DuplicateGate(String),

    /// A gate names a parent population nothing in the scheme produces.
    #[error("Parent population '{parent}' of gate '{gate}' does not exist")]
    UnknownParent {
        /// Gate name.
        gate: String,
        /// Missing parent population.
        parent: String,
    },

    /// CSV reading or writing failed.
    #[cfg(feature = "storage_csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A cargo feature required by this code path is disabled.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for CytoError {
    fn from(value: figment::Error) -> Self {
        CytoError::Config(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_spillover_names_remediation() {
        let msg = CytoError::MissingSpillover.to_string();
        assert!(msg.contains("spillover matrix"));
        assert!(msg.contains("compensation matrix"));
    }
}
