//! Steady incompressible laminar flow with the SIMPLE algorithm.
//!
//! Each iteration assembles the momentum matrix, optionally solves it with
//! the current pressure gradient, builds `HbyA = H/A`, solves the pressure
//! equation `laplacian(1/A, p) == div(phiHbyA)` and corrects the face flux
//! and cell velocity.

use super::{extrapolated, FvSolution};
use crate::solver::boundary::EvalContext;
use crate::solver::dictionary::ConfigError;
use crate::solver::error::FvError;
use crate::solver::field::{SurfaceField, VolField};
use crate::solver::linear_solver::SolverPerformance;
use crate::solver::models::FvModels;
use crate::solver::parallel::Communicator;
use crate::solver::scheme::FvSchemes;
use crate::solver::time::RunTime;
use crate::solver::units::{si, Dimensioned};
use crate::solver::{fvc, fvm};
use nalgebra::Vector3;
use std::sync::Arc;

pub struct SimpleFluid {
    pub u: VolField<Vector3<f64>>,
    pub p: VolField<f64>,
    pub phi: SurfaceField<f64>,
    /// Kinematic viscosity.
    pub nu: Dimensioned<f64>,
    pub schemes: FvSchemes,
    pub solution: FvSolution,
    pub models: FvModels<Vector3<f64>>,
    /// Initial residuals of the last iteration, by field.
    pub residuals: Vec<(String, f64)>,
    cumulative_continuity_error: f64,
}

/// Continuity errors of the corrected flux, normalised by the total volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContinuityErrors {
    pub sum_local: f64,
    pub global: f64,
    pub cumulative: f64,
}

impl SimpleFluid {
    /// Starts from the flux of the initial velocity.
    pub fn new(
        u: VolField<Vector3<f64>>,
        p: VolField<f64>,
        nu: Dimensioned<f64>,
        schemes: FvSchemes,
        solution: FvSolution,
    ) -> Self {
        let mut phi = fvc::flux(&u);
        phi.name = "phi".to_string();
        Self {
            u,
            p,
            phi,
            nu,
            schemes,
            solution,
            models: FvModels::default(),
            residuals: Vec::new(),
            cumulative_continuity_error: 0.0,
        }
    }

    pub fn with_models(mut self, models: FvModels<Vector3<f64>>) -> Self {
        self.models = models;
        self
    }

    fn record(&mut self, perf: &SolverPerformance) {
        if !self.residuals.iter().any(|(name, _)| name == &perf.field) {
            self.residuals.push((perf.field.clone(), perf.initial_residual));
        }
    }

    pub fn initial_residual(&self, field: &str) -> Option<f64> {
        self.residuals.iter().find(|(name, _)| name == field).map(|(_, r)| *r)
    }

    /// One SIMPLE iteration. Returns true once every field listed in
    /// `residualControl` started the iteration below its threshold.
    pub fn iterate(&mut self, ctx: &EvalContext<'_>) -> Result<bool, FvError> {
        self.residuals.clear();
        let simple = self.solution.simple.clone();
        let mesh = Arc::clone(self.u.mesh());
        self.p.store_prev_iter();
        self.p.update_coeffs(ctx)?;

        // Momentum
        let flux_ctx = ctx.with_flux(&self.phi);
        self.u.update_coeffs(&flux_ctx)?;
        let div_scheme = self.schemes.div("div(phi,U)")?;
        let laplacian_scheme = self.schemes.laplacian(&format!("laplacian({},U)", self.nu.name))?;
        // Gauss linear is the only reconstruction; the lookup still rejects bad entries.
        self.schemes.grad("grad(p)")?;

        let mut u_eqn = fvm::div(&self.phi, &self.u, &div_scheme)
            .try_sub(&fvm::laplacian_uniform(&self.nu, &self.u, &laplacian_scheme))?
            .equals_matrix(&self.models.source(&self.u, ctx)?)?;
        if let Some(alpha) = self.solution.relaxation_factors.equation("U") {
            u_eqn.relax(&self.u, alpha);
        }

        if simple.momentum_predictor {
            let grad_p = fvc::grad(&self.p)?;
            let mut predictor = u_eqn.clone();
            predictor.add_source(grad_p.internal_field())?;
            let perf = predictor.solve(&mut self.u, self.solution.solver("U")?, &flux_ctx)?;
            self.record(&perf);
        }

        // Pressure
        let a = u_eqn.a();
        let r_au = extrapolated(
            "rAU",
            &mesh,
            si::DIMENSIONLESS / a.dimensions,
            a.values.iter().map(|&a| 1.0 / a).collect(),
            ctx,
        )?;
        let h = u_eqn.h(&self.u);
        let mut hbya = extrapolated(
            "HbyA",
            &mesh,
            self.u.dimensions(),
            h.values.iter().zip(r_au.values()).map(|(&h, &r)| h * r).collect(),
            ctx,
        )?;
        // Fixed-velocity patches keep their velocity in HbyA.
        for patch in mesh.patches.iter().filter(|p| !p.is_coupled()) {
            if self.u.boundary_field(patch.index).fixes_value() {
                let values = self.u.boundary_value(patch.index).to_vec();
                hbya.assign_boundary(patch.index, &values)?;
            }
        }

        let mut phi_hbya = fvc::flux(&hbya);
        phi_hbya.name = "phiHbyA".to_string();
        let r_au_f = fvc::interpolate(&r_au);
        let div_phi_hbya = fvc::div(&mesh, &phi_hbya);
        let p_scheme = self.schemes.laplacian("laplacian((1|A(U)),p)")?;

        let fixes_level = self.p.boundary_fields().iter().any(|pf| pf.fixes_value());
        let needs_reference = ctx.comm.all_reduce_max(if fixes_level { 1.0 } else { 0.0 })? == 0.0;
        let ref_cell = if needs_reference && ctx.comm.rank() == 0 {
            if simple.p_ref_cell >= mesh.num_cells() {
                return Err(ConfigError::InvalidEntry {
                    scope: "SIMPLE".to_string(),
                    key: "pRefCell".to_string(),
                    reason: format!("cell {} not in mesh of {} cells", simple.p_ref_cell, mesh.num_cells()),
                }
                .into());
            }
            Some(simple.p_ref_cell)
        } else {
            None
        };

        for non_orth in 0..=simple.n_non_orthogonal_correctors {
            let mut p_eqn = fvm::laplacian(&r_au_f, &self.p, &p_scheme).equals(&div_phi_hbya)?;
            p_eqn.set_reference(ref_cell, simple.p_ref_value)?;

            let perf = p_eqn.solve(&mut self.p, self.solution.solver("p")?, ctx)?;
            self.record(&perf);

            if non_orth == simple.n_non_orthogonal_correctors {
                self.phi = phi_hbya.try_sub(&p_eqn.flux(&self.p))?;
                self.phi.name = "phi".to_string();
            }
        }

        let errors = self.continuity_errors(ctx.comm)?;
        log::info!(
            "time step continuity errors : sum local = {:e}, global = {:e}, cumulative = {:e}",
            errors.sum_local,
            errors.global,
            errors.cumulative
        );

        if let Some(alpha) = self.solution.relaxation_factors.field("p") {
            self.p.relax(alpha)?;
            self.p.correct_boundary_conditions(ctx)?;
        }

        // Velocity correction with the relaxed pressure
        let grad_p = fvc::grad(&self.p)?;
        let u_new: Vec<Vector3<f64>> = hbya
            .values()
            .iter()
            .zip(r_au.values())
            .zip(grad_p.values())
            .map(|((&h, &r), &g)| h - g * r)
            .collect();
        self.u.set_values(&u_new)?;
        self.u.correct_boundary_conditions(&ctx.with_flux(&self.phi))?;

        let converged = !simple.residual_control.is_empty()
            && simple
                .residual_control
                .iter()
                .all(|(field, &tol)| self.initial_residual(field).map_or(true, |r| r < tol));
        Ok(converged)
    }

    /// Volume-weighted divergence of the current flux.
    pub fn continuity_errors(&mut self, comm: &dyn Communicator) -> Result<ContinuityErrors, FvError> {
        let mesh = self.u.mesh();
        let div = fvc::div(mesh, &self.phi);
        let mut local = [0.0; 3];
        for (&d, &v) in div.values.iter().zip(&mesh.cell_volumes) {
            local[0] += d.abs() * v;
            local[1] += d * v;
            local[2] += v;
        }
        let global = comm.all_reduce_sum_vec(&local)?;
        let sum_local = global[0] / global[2];
        let global_error = global[1] / global[2];
        self.cumulative_continuity_error += global_error;
        Ok(ContinuityErrors {
            sum_local,
            global: global_error,
            cumulative: self.cumulative_continuity_error,
        })
    }

    /// Iterates until `residualControl` is met or the end time is reached.
    /// Returns the number of iterations and whether the run converged.
    pub fn run(&mut self, run_time: &mut RunTime, comm: &dyn Communicator) -> Result<(usize, bool), FvError> {
        while run_time.running() {
            let time = run_time.advance();
            let ctx = EvalContext::new(time, comm);
            if self.iterate(&ctx)? {
                log::info!("SIMPLE solution converged in {} iterations", time.index);
                return Ok((time.index, true));
            }
        }
        Ok((run_time.index(), false))
    }
}
