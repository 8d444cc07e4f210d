pub mod dimensioned;
pub mod source;
pub mod surface;
pub mod tmp;
pub mod value;
pub mod vol;

pub use dimensioned::{DimensionedField, FieldOp};
pub use source::{DirectoryFieldSource, FieldSource, MemoryFieldSource, ReadPolicy};
pub use surface::SurfaceField;
pub use tmp::Tmp;
pub use value::FieldValue;
pub use vol::VolField;

use crate::solver::dictionary::ConfigError;
use crate::solver::parallel::CommError;
use crate::solver::units::DimensionError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    /// The persistence layer has no data for a field that must be read.
    MissingData {
        field: String,
        source: String,
    },
    /// A flux-dependent condition was updated without a flux.
    MissingFlux {
        field: String,
        patch: String,
        flux: String,
    },
    /// Relaxation requested before the previous iteration was stored.
    NoPreviousIteration {
        field: String,
    },
    SizeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// Operands of a binary operation live on different meshes.
    MeshMismatch {
        operation: &'static str,
        lhs: String,
        rhs: String,
    },
    /// Equations for different fields combined.
    FieldMismatch {
        operation: &'static str,
        lhs: String,
        rhs: String,
    },
    CellOutOfRange {
        what: &'static str,
        cell: usize,
        n_cells: usize,
    },
    Config(ConfigError),
    Dimension(DimensionError),
    Comm(CommError),
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::MissingData { field, source } => {
                write!(f, "cannot find data for field {} in {}", field, source)
            }
            FieldError::MissingFlux { field, patch, flux } => write!(
                f,
                "boundary condition on patch {} of field {} needs flux {}",
                patch, field, flux
            ),
            FieldError::NoPreviousIteration { field } => write!(
                f,
                "previous iteration of field {} not stored; cannot relax",
                field
            ),
            FieldError::SizeMismatch {
                what,
                expected,
                found,
            } => write!(f, "{}: expected {} values, found {}", what, expected, found),
            FieldError::MeshMismatch { operation, lhs, rhs } => write!(
                f,
                "operands of '{}' are on different meshes: {} and {}",
                operation, lhs, rhs
            ),
            FieldError::FieldMismatch { operation, lhs, rhs } => write!(
                f,
                "incompatible fields for operation {} {} {}",
                lhs, operation, rhs
            ),
            FieldError::CellOutOfRange { what, cell, n_cells } => {
                write!(f, "{}: cell {} out of range 0..{}", what, cell, n_cells)
            }
            FieldError::Config(e) => write!(f, "{}", e),
            FieldError::Dimension(e) => write!(f, "{}", e),
            FieldError::Comm(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FieldError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FieldError::Config(e) => Some(e),
            FieldError::Dimension(e) => Some(e),
            FieldError::Comm(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for FieldError {
    fn from(e: ConfigError) -> Self {
        FieldError::Config(e)
    }
}

impl From<DimensionError> for FieldError {
    fn from(e: DimensionError) -> Self {
        FieldError::Dimension(e)
    }
}

impl From<CommError> for FieldError {
    fn from(e: CommError) -> Self {
        FieldError::Comm(e)
    }
}
