//! Physical dimension sets with rational exponents.
//!
//! Every field and equation in `fvcore` carries a [`DimensionSet`]; arithmetic
//! combining incompatible sets is rejected with a [`DimensionError`].

pub mod dimension_set;

pub use dimension_set::{si, DimensionError, DimensionSet, Exponent, BASE_NAMES, N_BASE_DIMENSIONS};
