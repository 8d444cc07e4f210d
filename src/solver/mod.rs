pub mod apps;
pub mod boundary;
pub mod case;
pub mod dictionary;
pub mod error;
pub mod field;
pub mod fvc;
pub mod fvm;
pub mod linear_solver;
pub mod matrix;
pub mod mesh;
pub mod models;
pub mod parallel;
pub mod scheme;
pub mod time;
pub mod units;

pub use error::FvError;
pub use field::{DimensionedField, SurfaceField, Tmp, VolField};
pub use matrix::FvMatrix;
pub use mesh::FvMesh;
pub use units::{si, Dimensioned, DimensionError, DimensionSet};
