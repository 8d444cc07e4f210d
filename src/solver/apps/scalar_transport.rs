//! Transient transport of a passive scalar:
//! `ddt(T) + div(phi, T) - laplacian(DT, T) == fvModels.source(T)`.

use super::FvSolution;
use crate::solver::boundary::EvalContext;
use crate::solver::error::FvError;
use crate::solver::field::{SurfaceField, VolField};
use crate::solver::fvm;
use crate::solver::linear_solver::SolverPerformance;
use crate::solver::models::FvModels;
use crate::solver::parallel::Communicator;
use crate::solver::scheme::FvSchemes;
use crate::solver::time::{RunTime, TimeState};
use crate::solver::units::Dimensioned;

pub struct ScalarTransport {
    pub t: VolField<f64>,
    pub phi: SurfaceField<f64>,
    pub diffusivity: Dimensioned<f64>,
    pub schemes: FvSchemes,
    pub solution: FvSolution,
    pub models: FvModels<f64>,
    /// Initial residuals of the last step, by field.
    pub residuals: Vec<(String, f64)>,
}

impl ScalarTransport {
    pub fn new(
        t: VolField<f64>,
        phi: SurfaceField<f64>,
        diffusivity: Dimensioned<f64>,
        schemes: FvSchemes,
        solution: FvSolution,
    ) -> Self {
        Self {
            t,
            phi,
            diffusivity,
            schemes,
            solution,
            models: FvModels::default(),
            residuals: Vec::new(),
        }
    }

    pub fn with_models(mut self, models: FvModels<f64>) -> Self {
        self.models = models;
        self
    }

    /// One time step of `nOuterCorrectors` outer iterations. Returns the
    /// performance of the first solve.
    pub fn step(&mut self, time: TimeState, comm: &dyn Communicator) -> Result<SolverPerformance, FvError> {
        self.residuals.clear();
        self.t.store_old_times(&time);

        let name = self.t.name().to_string();
        let ddt_scheme = self.schemes.ddt(&format!("ddt({})", name))?;
        let div_scheme = self.schemes.div(&format!("div({},{})", self.phi.name, name))?;
        let laplacian_scheme = self
            .schemes
            .laplacian(&format!("laplacian({},{})", self.diffusivity.name, name))?;

        let pimple = &self.solution.pimple;
        let n_outer = pimple.n_outer_correctors.max(1);
        let n_non_orth = pimple.n_non_orthogonal_correctors;
        let ctx = EvalContext::new(time, comm).with_flux(&self.phi);
        let mut first: Option<SolverPerformance> = None;

        for outer in 0..n_outer {
            let final_iter = outer + 1 == n_outer;
            let eqn_name = if final_iter { format!("{}Final", name) } else { name.clone() };
            self.t.update_coeffs(&ctx)?;

            for _ in 0..=n_non_orth {
                let mut eqn = fvm::ddt(&self.t, ddt_scheme, &time)
                    .try_add(&fvm::div(&self.phi, &self.t, &div_scheme))?
                    .try_sub(&fvm::laplacian_uniform(&self.diffusivity, &self.t, &laplacian_scheme))?
                    .equals_matrix(&self.models.source(&self.t, &ctx)?)?;

                if let Some(alpha) = self.solution.relaxation_factors.equation(&eqn_name) {
                    eqn.relax(&self.t, alpha);
                }

                let controls = self.solution.solver(&eqn_name)?;
                let perf = eqn.solve(&mut self.t, controls, &ctx)?;
                if first.is_none() {
                    self.residuals.push((name.clone(), perf.initial_residual));
                    first = Some(perf);
                }
            }
        }

        let min = -comm.all_reduce_max(-self.t.min())?;
        let max = comm.all_reduce_max(self.t.max())?;
        log::info!("{}: min {:e}, max {:e}", name, min, max);
        Ok(first.unwrap_or_else(|| SolverPerformance::new("none", &name)))
    }

    /// Steps until the end time.
    pub fn run(&mut self, run_time: &mut RunTime, comm: &dyn Communicator) -> Result<Vec<SolverPerformance>, FvError> {
        let mut history = Vec::new();
        while run_time.running() {
            let time = run_time.advance();
            history.push(self.step(time, comm)?);
        }
        Ok(history)
    }
}
