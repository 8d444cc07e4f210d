//! Finite-volume discretization and linear-system assembly.
//!
//! Fields live on an [`solver::mesh::FvMesh`]; the `fvm` operators turn a PDE
//! term acting on a field into an [`solver::matrix::FvMatrix`], which is
//! composed, relaxed and solved through the `linear_solver` module.

pub mod solver;
