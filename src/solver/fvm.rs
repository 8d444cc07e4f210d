//! Implicit finite-volume operators. Each returns the [`FvMatrix`]
//! contribution of one term; terms are combined with matrix algebra.
//!
//! Boundary coefficients are read from the cached patch coefficients, so
//! `psi.update_coeffs` must have run for the current state.

use crate::solver::field::{DimensionedField, FieldValue, SurfaceField, Tmp, VolField};
use crate::solver::fvc;
use crate::solver::matrix::FvMatrix;
use crate::solver::scheme::{ConvectionScheme, DdtScheme, LaplacianScheme, SnGradScheme};
use crate::solver::time::TimeState;
use crate::solver::units::{si, DimensionSet, Dimensioned};
use nalgebra::Vector3;
use wide::f64x4;

/// `V / dt` per cell.
fn volume_over_dt(volumes: &[f64], delta_t: f64) -> Vec<f64> {
    let n = volumes.len();
    let mut out = vec![0.0; n];
    let v_rdt = f64x4::splat(1.0 / delta_t);
    let mut i = 0;
    while i + 4 <= n {
        let v_vol = f64x4::from(&volumes[i..i + 4]);
        let arr: [f64; 4] = (v_vol * v_rdt).into();
        out[i..i + 4].copy_from_slice(&arr);
        i += 4;
    }
    while i < n {
        out[i] = volumes[i] / delta_t;
        i += 1;
    }
    out
}

/// Time derivative. `backward` falls back to Euler until two old levels
/// exist.
pub fn ddt<T: FieldValue>(psi: &VolField<T>, scheme: DdtScheme, time: &TimeState) -> FvMatrix<T> {
    let dims = psi.dimensions() * si::VOLUME / si::TIME;
    let mut m = FvMatrix::new(psi, dims);
    let mesh = psi.mesh();
    let old = psi.old_time();

    match (scheme, psi.old_old_time()) {
        (DdtScheme::SteadyState, _) => {}
        (DdtScheme::Backward, Some(old_old)) => {
            let dt = time.delta_t;
            let dt0 = time.delta_t0;
            let coefft = 1.0 + dt / (dt + dt0);
            let coefft00 = dt * dt / (dt0 * (dt + dt0));
            let coefft0 = coefft + coefft00;

            let rdt_v = volume_over_dt(&mesh.cell_volumes, dt);
            for c in 0..mesh.num_cells() {
                m.diag[c] = coefft * rdt_v[c];
                m.source[c] = (old[c] * coefft0 - old_old[c] * coefft00) * rdt_v[c];
            }
        }
        (DdtScheme::Euler, _) | (DdtScheme::Backward, None) => {
            m.diag = volume_over_dt(&mesh.cell_volumes, time.delta_t);
            for ((s, &o), &d) in m.source.iter_mut().zip(old).zip(&m.diag) {
                *s = o * d;
            }
        }
    }
    m
}

/// Convection `div(flux, psi)`.
pub fn div<T: FieldValue>(flux: &SurfaceField<f64>, psi: &VolField<T>, scheme: &ConvectionScheme) -> FvMatrix<T> {
    let mesh = psi.mesh();
    let weights = scheme.interpolation.weights(flux, psi);
    let mut m = FvMatrix::new(psi, flux.dimensions * psi.dimensions());

    let lower: Vec<f64> = weights
        .internal
        .iter()
        .zip(&flux.internal)
        .map(|(&w, &phi)| -w * phi)
        .collect();
    m.upper = lower.iter().zip(&flux.internal).map(|(&l, &phi)| l + phi).collect();
    m.lower = Some(lower);
    m.neg_sum_diag();

    for patch in &mesh.patches {
        let pf = psi.boundary_field(patch.index);
        let w = weights.patch(patch.index);
        let phi = flux.patch(patch.index);
        m.internal_coeffs[patch.index] = pf
            .value_internal_coeffs(w)
            .into_iter()
            .zip(phi)
            .map(|(c, &f)| c * f)
            .collect();
        m.boundary_coeffs[patch.index] = pf
            .value_boundary_coeffs(w)
            .into_iter()
            .zip(phi)
            .map(|(c, &f)| -(c * f))
            .collect();
    }

    if let Some(correction) = scheme.interpolation.correction(flux, psi) {
        let face_flux = correction.scale(flux);
        for (s, c) in m.source.iter_mut().zip(fvc::surface_sum(mesh, &face_flux)) {
            *s -= c;
        }
        m.face_flux_correction = Some(Tmp::new(face_flux));
    }

    if scheme.bounded {
        for (d, net) in m.diag.iter_mut().zip(fvc::surface_sum(mesh, flux)) {
            *d -= net;
        }
    }
    m
}

/// Diffusion `laplacian(gamma, psi)` with face diffusivity `gamma`.
pub fn laplacian<T: FieldValue>(gamma: &SurfaceField<f64>, psi: &VolField<T>, scheme: &LaplacianScheme) -> FvMatrix<T> {
    let mesh = psi.mesh();
    let mut m = FvMatrix::new(psi, gamma.dimensions * psi.dimensions() * si::LENGTH);

    let orthogonal = scheme.sn_grad == SnGradScheme::Orthogonal;
    let delta = if orthogonal {
        &mesh.delta_coeffs
    } else {
        &mesh.non_orth_delta_coeffs
    };
    let gamma_mag_sf: Vec<f64> = gamma
        .internal
        .iter()
        .zip(&mesh.mag_face_areas)
        .map(|(&g, &a)| g * a)
        .collect();
    m.upper = gamma_mag_sf.iter().zip(delta).map(|(&g, &d)| g * d).collect();
    m.neg_sum_diag();

    for patch in &mesh.patches {
        let pf = psi.boundary_field(patch.index);
        let patch_delta = if orthogonal {
            &patch.orth_delta_coeffs
        } else {
            &patch.delta_coeffs
        };
        let gms: Vec<f64> = patch
            .faces()
            .zip(gamma.patch(patch.index))
            .map(|(f, &g)| g * mesh.mag_face_areas[f])
            .collect();
        m.internal_coeffs[patch.index] = pf
            .gradient_internal_coeffs(patch_delta)
            .into_iter()
            .zip(&gms)
            .map(|(c, &g)| c * g)
            .collect();
        m.boundary_coeffs[patch.index] = pf
            .gradient_boundary_coeffs(patch_delta)
            .into_iter()
            .zip(&gms)
            .map(|(c, &g)| -(c * g))
            .collect();
    }

    if scheme.sn_grad.corrected() {
        let correction = non_orthogonal_correction(psi, gamma, &gamma_mag_sf, delta, scheme.sn_grad, m.dimensions());
        for (s, c) in m.source.iter_mut().zip(fvc::surface_sum(mesh, &correction)) {
            *s -= c;
        }
        m.face_flux_correction = Some(Tmp::new(correction));
    }
    m
}

/// `laplacian` with a uniform diffusivity.
pub fn laplacian_uniform<T: FieldValue>(
    gamma: &Dimensioned<f64>,
    psi: &VolField<T>,
    scheme: &LaplacianScheme,
) -> FvMatrix<T> {
    let gamma_f = SurfaceField::uniform(&gamma.name, psi.mesh(), gamma.dimensions, gamma.value);
    laplacian(&gamma_f, psi, scheme)
}

/// Explicit `gamma |Sf| k . grad(psi)_f` on internal and coupled faces;
/// uncoupled boundary faces carry no correction.
fn non_orthogonal_correction<T: FieldValue>(
    psi: &VolField<T>,
    gamma: &SurfaceField<f64>,
    gamma_mag_sf: &[f64],
    delta: &[f64],
    sn_grad: SnGradScheme,
    dimensions: DimensionSet,
) -> SurfaceField<T> {
    let mesh = psi.mesh();
    let grads = fvc::component_gradients(psi);
    let x = psi.values();

    let face_correction = |k: Vector3<f64>, w: f64, gp: &dyn Fn(usize) -> Vector3<f64>, gn: &dyn Fn(usize) -> Vector3<f64>, uncorrected: T, gms: f64| {
        let mut corr = T::zero();
        for d in 0..T::N_COMPONENTS {
            let grad_f = gp(d) * w + gn(d) * (1.0 - w);
            corr.set_component(d, k.dot(&grad_f));
        }
        corr * (sn_grad.limit(uncorrected.mag(), corr.mag()) * gms)
    };

    let internal = (0..mesh.num_internal_faces())
        .map(|f| {
            let (o, n) = (mesh.owner[f], mesh.neighbour[f]);
            face_correction(
                mesh.non_orth_correction_vectors[f],
                mesh.weights[f],
                &|d| grads[d][o],
                &|d| grads[d][n],
                (x[n] - x[o]) * delta[f],
                gamma_mag_sf[f],
            )
        })
        .collect();

    let boundary = mesh
        .patches
        .iter()
        .map(|patch| {
            let (Some(nbr_values), Some(nbr_grads)) = (
                fvc::patch_neighbour_values(psi, patch.index),
                fvc::patch_neighbour_gradients(psi, &grads, patch.index),
            ) else {
                return vec![T::zero(); patch.size()];
            };
            let gamma_p = gamma.patch(patch.index);
            patch
                .faces()
                .enumerate()
                .map(|(i, f)| {
                    let cell = patch.face_cells[i];
                    face_correction(
                        patch.non_orth_correction_vectors[i],
                        patch.weights[i],
                        &|d| grads[d][cell],
                        &|d| nbr_grads[d][i],
                        (nbr_values[i] - x[cell]) * patch.delta_coeffs[i],
                        gamma_p[i] * mesh.mag_face_areas[f],
                    )
                })
                .collect()
        })
        .collect();

    SurfaceField::new(
        &format!("faceFluxCorrection({})", psi.name()),
        dimensions,
        internal,
        boundary,
    )
}

/// Implicit source `sp * psi`.
pub fn sp<T: FieldValue>(coeff: &DimensionedField<f64>, psi: &VolField<T>) -> FvMatrix<T> {
    let mesh = psi.mesh();
    let mut m = FvMatrix::new(psi, coeff.dimensions * psi.dimensions() * si::VOLUME);
    for ((d, &s), &v) in m.diag.iter_mut().zip(&coeff.values).zip(&mesh.cell_volumes) {
        *d += v * s;
    }
    m
}

/// Explicit source `su`.
pub fn su<T: FieldValue>(su: &DimensionedField<T>, psi: &VolField<T>) -> FvMatrix<T> {
    let mesh = psi.mesh();
    let mut m = FvMatrix::new(psi, su.dimensions * si::VOLUME);
    for ((s, &value), &v) in m.source.iter_mut().zip(&su.values).zip(&mesh.cell_volumes) {
        *s -= value * v;
    }
    m
}

/// `coeff * psi`, implicit where `coeff > 0` and explicit elsewhere so the
/// diagonal never loses dominance.
pub fn su_sp<T: FieldValue>(coeff: &DimensionedField<f64>, psi: &VolField<T>) -> FvMatrix<T> {
    let mesh = psi.mesh();
    let mut m = FvMatrix::new(psi, coeff.dimensions * psi.dimensions() * si::VOLUME);
    let x = psi.values();
    for c in 0..mesh.num_cells() {
        let s = coeff.values[c];
        let v = mesh.cell_volumes[c];
        m.diag[c] += v * s.max(0.0);
        m.source[c] -= x[c] * (v * s.min(0.0));
    }
    m
}
