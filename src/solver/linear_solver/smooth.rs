use super::{LinearSolverControls, LinearSystem, SolveError, SolverPerformance};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmootherKind {
    GaussSeidel,
    /// Forward then backward sweep.
    SymGaussSeidel,
}

impl SmootherKind {
    pub const NAMES: [&'static str; 2] = ["GaussSeidel", "symGaussSeidel"];

    pub fn as_str(self) -> &'static str {
        match self {
            SmootherKind::GaussSeidel => "GaussSeidel",
            SmootherKind::SymGaussSeidel => "symGaussSeidel",
        }
    }
}

impl FromStr for SmootherKind {
    type Err = SolveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "GaussSeidel" => Ok(SmootherKind::GaussSeidel),
            "symGaussSeidel" => Ok(SmootherKind::SymGaussSeidel),
            other => Err(SolveError::Unknown {
                what: "smoother",
                name: other.to_string(),
                valid: Self::NAMES.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

fn relax_row(system: &LinearSystem<'_>, b: &[f64], x: &mut [f64], i: usize) {
    let mut sum = b[i];
    let mut diag = 0.0;
    for (j, a) in system.matrix.row(i) {
        if j == i {
            diag = a;
        } else {
            sum -= a * x[j];
        }
    }
    x[i] = sum / diag;
}

/// `n_sweeps` sweeps. Interface contributions are frozen at the start of
/// each sweep and moved to the right-hand side.
pub fn smooth(system: &LinearSystem<'_>, x: &mut [f64], kind: SmootherKind, n_sweeps: usize) -> Result<(), SolveError> {
    let n = system.n();
    if let Some(row) = (0..n).find(|&i| system.matrix.diag(i) == 0.0) {
        return Err(SolveError::ZeroDiagonal { row });
    }
    let mut b = vec![0.0; n];
    for _ in 0..n_sweeps {
        b.copy_from_slice(&system.source);
        let mut coupled = vec![0.0; n];
        system.add_interface_product(x, &mut coupled)?;
        for (bi, ci) in b.iter_mut().zip(&coupled) {
            // add_interface_product subtracted C x_nbr; move it across
            *bi -= ci;
        }

        for i in 0..n {
            relax_row(system, &b, x, i);
        }
        if kind == SmootherKind::SymGaussSeidel {
            for i in (0..n).rev() {
                relax_row(system, &b, x, i);
            }
        }
    }
    Ok(())
}

pub fn solve(
    system: &LinearSystem<'_>,
    x: &mut [f64],
    kind: SmootherKind,
    n_sweeps: usize,
    controls: &LinearSolverControls,
    field: &str,
) -> Result<SolverPerformance, SolveError> {
    let mut perf = SolverPerformance::new(kind.as_str(), field);

    let mut r = vec![0.0; system.n()];
    let ax = system.residual(x, &mut r)?;
    let norm_factor = system.norm_factor(x, &ax)?;
    perf.initial_residual = system.global_sum_mag(&r)? / norm_factor;
    perf.final_residual = perf.initial_residual;

    if perf.keep_iterating(controls) {
        loop {
            smooth(system, x, kind, n_sweeps)?;
            system.residual(x, &mut r)?;
            perf.final_residual = system.global_sum_mag(&r)? / norm_factor;
            perf.n_iterations += n_sweeps;

            if !perf.keep_iterating(controls) {
                break;
            }
        }
    }

    log::info!("{}", perf);
    Ok(perf)
}
