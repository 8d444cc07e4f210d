use crate::solver::dictionary::ConfigError;
use crate::solver::field::FieldError;
use crate::solver::linear_solver::SolveError;
use crate::solver::mesh::MeshError;
use crate::solver::parallel::CommError;
use crate::solver::scheme::SchemeError;
use crate::solver::units::DimensionError;
use std::fmt;

/// Any failure an application can hit while building or running a case.
#[derive(Debug, Clone, PartialEq)]
pub enum FvError {
    Dimension(DimensionError),
    Mesh(MeshError),
    Config(ConfigError),
    Field(FieldError),
    Scheme(SchemeError),
    Comm(CommError),
    Solve(SolveError),
}

impl fmt::Display for FvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FvError::Dimension(e) => write!(f, "dimension error: {}", e),
            FvError::Mesh(e) => write!(f, "mesh error: {}", e),
            FvError::Config(e) => write!(f, "configuration error: {}", e),
            FvError::Field(e) => write!(f, "field error: {}", e),
            FvError::Scheme(e) => write!(f, "scheme error: {}", e),
            FvError::Comm(e) => write!(f, "communication error: {}", e),
            FvError::Solve(e) => write!(f, "linear solver error: {}", e),
        }
    }
}

impl std::error::Error for FvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FvError::Dimension(e) => Some(e),
            FvError::Mesh(e) => Some(e),
            FvError::Config(e) => Some(e),
            FvError::Field(e) => Some(e),
            FvError::Scheme(e) => Some(e),
            FvError::Comm(e) => Some(e),
            FvError::Solve(e) => Some(e),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FvError {
                fn from(e: $ty) -> Self {
                    FvError::$variant(e)
                }
            }
        )*
    };
}

impl_from! {
    DimensionError => Dimension,
    MeshError => Mesh,
    ConfigError => Config,
    SchemeError => Scheme,
    CommError => Comm,
    SolveError => Solve,
}

// Field errors wrapping a more specific cause are flattened so callers can
// match on the cause directly.
impl From<FieldError> for FvError {
    fn from(e: FieldError) -> Self {
        match e {
            FieldError::Config(e) => FvError::Config(e),
            FieldError::Dimension(e) => FvError::Dimension(e),
            FieldError::Comm(e) => FvError::Comm(e),
            other => FvError::Field(other),
        }
    }
}

pub type FvResult<T> = Result<T, FvError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::units::si;

    #[test]
    fn field_errors_are_flattened() {
        let e: FvError = FieldError::Config(ConfigError::MissingEntry {
            scope: "T.boundaryField".into(),
            key: "inlet".into(),
        })
        .into();
        assert!(matches!(e, FvError::Config(ConfigError::MissingEntry { .. })));

        let e: FvError = FieldError::NoPreviousIteration { field: "p".into() }.into();
        assert!(matches!(e, FvError::Field(_)));
    }

    #[test]
    fn display_names_the_cause() {
        let e: FvError = si::LENGTH.check_same(si::TIME, "+").unwrap_err().into();
        let text = e.to_string();
        assert!(text.starts_with("dimension error"));
        assert!(text.contains('+'));
    }
}
