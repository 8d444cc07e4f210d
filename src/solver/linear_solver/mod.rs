//! Segregated linear solvers for one component of an [`FvMatrix`].
//!
//! A [`LinearSystem`] is the local CSR matrix plus coupled-patch interfaces;
//! the product `A x` subtracts `coeff * x_neighbour` across every interface,
//! exchanging processor values through the [`Communicator`] first.
//!
//! [`FvMatrix`]: crate::solver::matrix::FvMatrix

pub mod bicgstab;
pub mod csr;
pub mod ops;
pub mod pcg;
pub mod preconditioner;
pub mod smooth;

pub use csr::CsrMatrix;
pub use preconditioner::{Preconditioner, PreconditionerKind};
pub use smooth::SmootherKind;

use crate::solver::parallel::{CommError, Communicator};
use serde::Deserialize;
use std::fmt;

/// Residuals below this are treated as a singular (zero) search direction.
pub const VSMALL: f64 = 1e-300;
/// Added to the residual normalisation factor.
pub const SMALL: f64 = 1e-20;

#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceKind {
    /// Partner cells in the same matrix.
    Cyclic { neighbour_cells: Vec<usize> },
    /// Partner cells on another rank.
    Processor { rank: usize, tag: u64 },
}

/// Coupled patch seen by the solver: `y[face_cells[i]] -= coeffs[i] * x_nbr[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub patch: usize,
    pub face_cells: Vec<usize>,
    pub coeffs: Vec<f64>,
    pub kind: InterfaceKind,
}

pub struct LinearSystem<'a> {
    pub matrix: CsrMatrix,
    pub source: Vec<f64>,
    pub interfaces: Vec<Interface>,
    /// True when assembled without a separate lower triangle.
    pub symmetric: bool,
    pub comm: &'a dyn Communicator,
}

impl<'a> LinearSystem<'a> {
    pub fn n(&self) -> usize {
        self.matrix.n_rows
    }

    /// Values of `x` across every interface, exchanging processor values
    /// with all sends posted before any receive.
    pub fn interface_neighbours(&self, x: &[f64]) -> Result<Vec<Vec<f64>>, CommError> {
        for iface in &self.interfaces {
            if let InterfaceKind::Processor { rank, tag } = iface.kind {
                let values = iface.face_cells.iter().map(|&c| x[c]).collect();
                self.comm.send(rank, tag, values)?;
            }
        }
        let mut out = Vec::with_capacity(self.interfaces.len());
        for iface in &self.interfaces {
            let values = match &iface.kind {
                InterfaceKind::Cyclic { neighbour_cells } => neighbour_cells.iter().map(|&c| x[c]).collect(),
                InterfaceKind::Processor { rank, tag } => {
                    let values = self.comm.recv(*rank, *tag)?;
                    if values.len() != iface.face_cells.len() {
                        return Err(CommError::SizeMismatch {
                            from: *rank,
                            tag: *tag,
                            expected: iface.face_cells.len(),
                            found: values.len(),
                        });
                    }
                    values
                }
            };
            out.push(values);
        }
        Ok(out)
    }

    /// `y -= C x_nbr` over all interfaces.
    pub fn add_interface_product(&self, x: &[f64], y: &mut [f64]) -> Result<(), CommError> {
        if self.interfaces.is_empty() {
            return Ok(());
        }
        let nbr = self.interface_neighbours(x)?;
        for (iface, values) in self.interfaces.iter().zip(&nbr) {
            for ((&c, &coeff), &v) in iface.face_cells.iter().zip(&iface.coeffs).zip(values) {
                y[c] -= coeff * v;
            }
        }
        Ok(())
    }

    /// `y = A x`.
    pub fn amul(&self, x: &[f64], y: &mut [f64]) -> Result<(), CommError> {
        self.matrix.mat_vec_mul(x, y);
        self.add_interface_product(x, y)
    }

    /// `r = b - A x`; returns `A x` alongside.
    pub fn residual(&self, x: &[f64], r: &mut [f64]) -> Result<Vec<f64>, CommError> {
        self.amul(x, r)?;
        let ax = r.to_vec();
        ops::sub_from(&self.source, r);
        Ok(ax)
    }

    /// `A . 1` including interface coefficients.
    pub fn sum_a(&self) -> Vec<f64> {
        let mut s = self.matrix.row_sums();
        for iface in &self.interfaces {
            for (&c, &coeff) in iface.face_cells.iter().zip(&iface.coeffs) {
                s[c] -= coeff;
            }
        }
        s
    }

    pub fn global_dot(&self, a: &[f64], b: &[f64]) -> Result<f64, CommError> {
        self.comm.all_reduce_sum(ops::dot(a, b))
    }

    pub fn global_sum_mag(&self, a: &[f64]) -> Result<f64, CommError> {
        self.comm.all_reduce_sum(ops::sum_mag(a))
    }

    /// `sum(|A x - A xRef| + |b - A xRef|) + SMALL` with `xRef` the global
    /// average of `x`.
    pub fn norm_factor(&self, x: &[f64], ax: &[f64]) -> Result<f64, CommError> {
        let sums = self
            .comm
            .all_reduce_sum_vec(&[x.iter().sum::<f64>(), x.len() as f64])?;
        let x_ref = sums[0] / sums[1].max(1.0);
        let a_ref: Vec<f64> = self.sum_a().into_iter().map(|s| s * x_ref).collect();
        let local: f64 = ax
            .iter()
            .zip(&self.source)
            .zip(&a_ref)
            .map(|((&ax, &b), &ar)| (ax - ar).abs() + (b - ar).abs())
            .sum();
        Ok(self.comm.all_reduce_sum(local)? + SMALL)
    }

    /// Normalised residual of `x`.
    pub fn normalised_residual(&self, x: &[f64]) -> Result<f64, CommError> {
        let mut r = vec![0.0; self.n()];
        let ax = self.residual(x, &mut r)?;
        let norm = self.norm_factor(x, &ax)?;
        Ok(self.global_sum_mag(&r)? / norm)
    }
}

/// Entries of an `fvSolution.solvers` dictionary.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearSolverControls {
    pub solver: String,
    #[serde(default)]
    pub preconditioner: Option<String>,
    #[serde(default)]
    pub smoother: Option<String>,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub rel_tol: f64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default)]
    pub min_iter: usize,
    #[serde(default = "default_n_sweeps")]
    pub n_sweeps: usize,
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_max_iter() -> usize {
    1000
}

fn default_n_sweeps() -> usize {
    1
}

impl LinearSolverControls {
    pub fn new(solver: &str) -> Self {
        Self {
            solver: solver.to_string(),
            preconditioner: None,
            smoother: None,
            tolerance: default_tolerance(),
            rel_tol: 0.0,
            max_iter: default_max_iter(),
            min_iter: 0,
            n_sweeps: default_n_sweeps(),
        }
    }

    pub fn with_preconditioner(mut self, name: &str) -> Self {
        self.preconditioner = Some(name.to_string());
        self
    }

    pub fn with_smoother(mut self, name: &str) -> Self {
        self.smoother = Some(name.to_string());
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64, rel_tol: f64) -> Self {
        self.tolerance = tolerance;
        self.rel_tol = rel_tol;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }
}

/// Outcome of one linear solve.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverPerformance {
    pub solver: String,
    pub field: String,
    pub initial_residual: f64,
    pub final_residual: f64,
    pub n_iterations: usize,
    pub converged: bool,
    pub singular: bool,
}

impl SolverPerformance {
    pub fn new(solver: &str, field: &str) -> Self {
        Self {
            solver: solver.to_string(),
            field: field.to_string(),
            initial_residual: 0.0,
            final_residual: 0.0,
            n_iterations: 0,
            converged: false,
            singular: false,
        }
    }

    /// Updates and returns `converged` from the current residuals.
    pub fn check_convergence(&mut self, tolerance: f64, rel_tol: f64) -> bool {
        self.converged = self.final_residual < tolerance
            || (rel_tol > 0.0 && self.final_residual < rel_tol * self.initial_residual);
        self.converged
    }

    /// Whether another iteration is due: below `minIter`, or unconverged
    /// and below `maxIter`.
    pub fn keep_iterating(&mut self, controls: &LinearSolverControls) -> bool {
        let converged = self.check_convergence(controls.tolerance, controls.rel_tol);
        self.n_iterations < controls.min_iter || (!converged && self.n_iterations < controls.max_iter)
    }

    /// Marks the solve singular when `residual` has collapsed to zero.
    pub fn check_singularity(&mut self, residual: f64) -> bool {
        self.singular = residual < VSMALL;
        self.singular
    }

    /// Folds the performance of another component into this one.
    pub fn merge(&mut self, other: &SolverPerformance) {
        self.initial_residual = self.initial_residual.max(other.initial_residual);
        self.final_residual = self.final_residual.max(other.final_residual);
        self.n_iterations = self.n_iterations.max(other.n_iterations);
        self.converged &= other.converged;
        self.singular |= other.singular;
    }
}

impl fmt::Display for SolverPerformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:  Solving for {}, Initial residual = {:e}, Final residual = {:e}, No Iterations {}",
            self.solver, self.field, self.initial_residual, self.final_residual, self.n_iterations
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveError {
    Unknown {
        what: &'static str,
        name: String,
        valid: Vec<String>,
    },
    /// A symmetric-only solver was given an asymmetric matrix.
    AsymmetricMatrix { solver: &'static str, field: String },
    MissingSmoother { field: String },
    ZeroDiagonal { row: usize },
    Comm(CommError),
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::Unknown { what, name, valid } => write!(
                f,
                "unknown {} {}; valid {}s are: ({})",
                what,
                name,
                what,
                valid.join(" ")
            ),
            SolveError::AsymmetricMatrix { solver, field } => write!(
                f,
                "{} needs a symmetric matrix but the matrix for {} is asymmetric",
                solver, field
            ),
            SolveError::MissingSmoother { field } => {
                write!(f, "smoothSolver for {} needs a smoother", field)
            }
            SolveError::ZeroDiagonal { row } => write!(f, "zero diagonal coefficient in row {}", row),
            SolveError::Comm(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SolveError {}

impl From<CommError> for SolveError {
    fn from(e: CommError) -> Self {
        SolveError::Comm(e)
    }
}

/// Solver selected from [`LinearSolverControls`].
#[derive(Debug, Clone, PartialEq)]
pub enum LinearSolver {
    Pcg(PreconditionerKind),
    PBiCGStab(PreconditionerKind),
    Smooth { smoother: SmootherKind, n_sweeps: usize },
    Diagonal,
}

impl LinearSolver {
    pub const NAMES: [&'static str; 4] = ["PCG", "PBiCGStab", "smoothSolver", "diagonal"];

    pub fn select(controls: &LinearSolverControls, field: &str) -> Result<Self, SolveError> {
        let preconditioner = || -> Result<PreconditionerKind, SolveError> {
            controls.preconditioner.as_deref().unwrap_or("none").parse()
        };
        match controls.solver.as_str() {
            "PCG" => Ok(LinearSolver::Pcg(preconditioner()?)),
            "PBiCGStab" | "PBiCG" => Ok(LinearSolver::PBiCGStab(preconditioner()?)),
            "smoothSolver" => {
                let name = controls
                    .smoother
                    .as_deref()
                    .ok_or_else(|| SolveError::MissingSmoother { field: field.to_string() })?;
                Ok(LinearSolver::Smooth {
                    smoother: name.parse()?,
                    n_sweeps: controls.n_sweeps.max(1),
                })
            }
            "diagonal" => Ok(LinearSolver::Diagonal),
            other => Err(SolveError::Unknown {
                what: "solver",
                name: other.to_string(),
                valid: Self::NAMES.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    pub fn name(&self) -> String {
        match self {
            LinearSolver::Pcg(p) => format!("{}PCG", p.prefix()),
            LinearSolver::PBiCGStab(p) => format!("{}PBiCGStab", p.prefix()),
            LinearSolver::Smooth { smoother, .. } => smoother.as_str().to_string(),
            LinearSolver::Diagonal => "diagonal".to_string(),
        }
    }
}

/// Solves `system` for `x` in place.
pub fn solve(
    system: &LinearSystem<'_>,
    x: &mut [f64],
    controls: &LinearSolverControls,
    field: &str,
) -> Result<SolverPerformance, SolveError> {
    let solver = LinearSolver::select(controls, field)?;
    let perf = match &solver {
        LinearSolver::Pcg(p) => {
            if !system.symmetric {
                return Err(SolveError::AsymmetricMatrix {
                    solver: "PCG",
                    field: field.to_string(),
                });
            }
            pcg::solve(system, x, *p, controls, &solver.name(), field)?
        }
        LinearSolver::PBiCGStab(p) => bicgstab::solve(system, x, *p, controls, &solver.name(), field)?,
        LinearSolver::Smooth { smoother, n_sweeps } => {
            smooth::solve(system, x, *smoother, *n_sweeps, controls, field)?
        }
        LinearSolver::Diagonal => {
            for (i, xi) in x.iter_mut().enumerate() {
                let d = system.matrix.diag(i);
                if d == 0.0 {
                    return Err(SolveError::ZeroDiagonal { row: i });
                }
                *xi = system.source[i] / d;
            }
            let mut perf = SolverPerformance::new("diagonal", field);
            perf.converged = true;
            perf
        }
    };

    if !perf.converged {
        log::warn!(
            "{} did not converge for {} in {} iterations: final residual {:e} (tolerance {:e}, relTol {})",
            perf.solver,
            field,
            perf.n_iterations,
            perf.final_residual,
            controls.tolerance,
            controls.rel_tol
        );
    }
    Ok(perf)
}
