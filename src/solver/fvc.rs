//! Explicit finite-volume calculus: interpolation, face fluxes, Green-Gauss
//! gradients and surface integration of face fields.

use crate::solver::boundary::coupled::cyclic_neighbour_values;
use crate::solver::field::{DimensionedField, FieldError, FieldValue, SurfaceField, VolField};
use crate::solver::mesh::{Coupling, FvMesh};
use crate::solver::scheme::InterpolationScheme;
use crate::solver::units::si;
use nalgebra::Vector3;

/// Cell values on the far side of every patch face; `None` on uncoupled
/// patches. Processor patches use the last exchanged snapshot.
pub(crate) fn patch_neighbour_values<T: FieldValue>(psi: &VolField<T>, patch: usize) -> Option<Vec<T>> {
    let mesh = psi.mesh();
    match mesh.patches[patch].coupling {
        Some(Coupling::Cyclic { .. }) => cyclic_neighbour_values(mesh, patch, psi.values()),
        Some(Coupling::Processor { .. }) => Some(
            psi.boundary_field(patch)
                .neighbour_values()
                .map(|v| v.to_vec())
                .unwrap_or_else(|| psi.patch_internal(patch)),
        ),
        None => None,
    }
}

/// Cell gradients on the far side of every patch face, `[component][face]`;
/// `None` on uncoupled patches. Processor patches use the gradients
/// exchanged by the last `update_coeffs`, or the local ones before any.
pub(crate) fn patch_neighbour_gradients<T: FieldValue>(
    psi: &VolField<T>,
    grads: &[Vec<Vector3<f64>>],
    patch: usize,
) -> Option<Vec<Vec<Vector3<f64>>>> {
    let mesh = psi.mesh();
    let gather = |cells: &[usize]| -> Vec<Vec<Vector3<f64>>> {
        grads.iter().map(|g| cells.iter().map(|&c| g[c]).collect()).collect()
    };
    match mesh.patches[patch].coupling {
        Some(Coupling::Cyclic { neighbour }) => Some(gather(&mesh.patches[neighbour].face_cells)),
        Some(Coupling::Processor { .. }) => Some(
            psi.boundary_field(patch)
                .neighbour_gradients()
                .map(|g| g.to_vec())
                .unwrap_or_else(|| gather(&mesh.patches[patch].face_cells)),
        ),
        None => None,
    }
}

/// Face values from owner-side `weights`; uncoupled patches take the
/// boundary values.
pub fn interpolate_weighted<T: FieldValue>(psi: &VolField<T>, weights: &SurfaceField<f64>) -> SurfaceField<T> {
    let mesh = psi.mesh();
    let values = psi.values();
    let internal = (0..mesh.num_internal_faces())
        .map(|f| {
            let w = weights.internal[f];
            values[mesh.owner[f]] * w + values[mesh.neighbour[f]] * (1.0 - w)
        })
        .collect();
    let boundary = mesh
        .patches
        .iter()
        .map(|patch| match patch_neighbour_values(psi, patch.index) {
            Some(nbr) => patch
                .face_cells
                .iter()
                .zip(&nbr)
                .zip(weights.patch(patch.index))
                .map(|((&c, &n), &w)| values[c] * w + n * (1.0 - w))
                .collect(),
            None => psi.boundary_value(patch.index).to_vec(),
        })
        .collect();
    SurfaceField::new(&format!("interpolate({})", psi.name()), psi.dimensions(), internal, boundary)
}

/// Linear interpolation with the mesh weights.
pub fn interpolate<T: FieldValue>(psi: &VolField<T>) -> SurfaceField<T> {
    let mesh = psi.mesh();
    let values = psi.values();
    let internal = (0..mesh.num_internal_faces())
        .map(|f| {
            let w = mesh.weights[f];
            values[mesh.owner[f]] * w + values[mesh.neighbour[f]] * (1.0 - w)
        })
        .collect();
    // Coupled boundary values are already the weighted face values.
    let boundary = psi.boundary_values();
    SurfaceField::new(&format!("interpolate({})", psi.name()), psi.dimensions(), internal, boundary)
}

/// Flux-directed interpolation with a convection scheme, including its
/// explicit correction.
pub fn interpolate_with<T: FieldValue>(
    psi: &VolField<T>,
    flux: &SurfaceField<f64>,
    scheme: &InterpolationScheme,
) -> SurfaceField<T> {
    let weights = scheme.weights(flux, psi);
    let mut face = interpolate_weighted(psi, &weights);
    if let Some(corr) = scheme.correction(flux, psi) {
        for (v, c) in face.internal.iter_mut().zip(&corr.internal) {
            *v += *c;
        }
        for patch in psi.mesh().patches.iter().filter(|p| p.is_coupled()) {
            for (v, c) in face.boundary[patch.index].iter_mut().zip(corr.patch(patch.index)) {
                *v += *c;
            }
        }
    }
    face
}

/// `Sf . v_f` for a face vector field.
pub fn dot_sf(mesh: &FvMesh, ssf: &SurfaceField<Vector3<f64>>) -> SurfaceField<f64> {
    SurfaceField::new(
        &format!("({} & Sf)", ssf.name),
        ssf.dimensions * si::AREA,
        ssf.internal
            .iter()
            .enumerate()
            .map(|(f, v)| v.dot(&mesh.face_areas[f]))
            .collect(),
        mesh.patches
            .iter()
            .map(|p| {
                ssf.patch(p.index)
                    .iter()
                    .zip(p.faces())
                    .map(|(v, f)| v.dot(&mesh.face_areas[f]))
                    .collect()
            })
            .collect(),
    )
}

/// Volumetric flux of a velocity field: `interpolate(U) . Sf`.
pub fn flux(u: &VolField<Vector3<f64>>) -> SurfaceField<f64> {
    let mut phi = dot_sf(u.mesh(), &interpolate(u));
    phi.name = format!("phi({})", u.name());
    phi
}

/// Net outflow per cell: owner faces add, neighbour faces subtract.
pub fn surface_sum<T: FieldValue>(mesh: &FvMesh, ssf: &SurfaceField<T>) -> Vec<T> {
    let mut sum = vec![T::zero(); mesh.num_cells()];
    for (f, &v) in ssf.internal.iter().enumerate() {
        sum[mesh.owner[f]] += v;
        sum[mesh.neighbour[f]] -= v;
    }
    for patch in &mesh.patches {
        for (&c, &v) in patch.face_cells.iter().zip(ssf.patch(patch.index)) {
            sum[c] += v;
        }
    }
    sum
}

/// [`surface_sum`] divided by the cell volumes.
pub fn surface_integrate<T: FieldValue>(mesh: &FvMesh, ssf: &SurfaceField<T>) -> Vec<T> {
    let mut sum = surface_sum(mesh, ssf);
    for (v, &vol) in sum.iter_mut().zip(&mesh.cell_volumes) {
        *v = *v * (1.0 / vol);
    }
    sum
}

/// Divergence of a face flux.
pub fn div(mesh: &FvMesh, flux: &SurfaceField<f64>) -> DimensionedField<f64> {
    DimensionedField::new(
        &format!("div({})", flux.name),
        flux.dimensions / si::VOLUME,
        surface_integrate(mesh, flux),
    )
}

/// Green-Gauss gradient of every component of `psi`, indexed
/// `[component][cell]`.
pub fn component_gradients<T: FieldValue>(psi: &VolField<T>) -> Vec<Vec<Vector3<f64>>> {
    let mesh = psi.mesh();
    let face = interpolate(psi);
    let mut grads = vec![vec![Vector3::zeros(); mesh.num_cells()]; T::N_COMPONENTS];

    for f in 0..mesh.num_internal_faces() {
        let sf = mesh.face_areas[f];
        let v = face.internal[f];
        for (c, g) in grads.iter_mut().enumerate() {
            let contrib = sf * v.component(c);
            g[mesh.owner[f]] += contrib;
            g[mesh.neighbour[f]] -= contrib;
        }
    }
    for patch in &mesh.patches {
        for (i, fi) in patch.faces().enumerate() {
            let sf = mesh.face_areas[fi];
            let v = face.patch(patch.index)[i];
            for (c, g) in grads.iter_mut().enumerate() {
                g[patch.face_cells[i]] += sf * v.component(c);
            }
        }
    }
    for g in grads.iter_mut() {
        for (gc, &vol) in g.iter_mut().zip(&mesh.cell_volumes) {
            *gc /= vol;
        }
    }
    grads
}

/// Gauss linear gradient. Uncoupled boundary values are the patch-internal
/// gradient with its normal part replaced by the face-normal gradient.
pub fn grad(psi: &VolField<f64>) -> Result<VolField<Vector3<f64>>, FieldError> {
    let mesh = psi.mesh();
    let cells = component_gradients(psi).swap_remove(0);
    let sn = sn_grad(psi);
    let mut g = VolField::calculated(
        &format!("grad({})", psi.name()),
        std::sync::Arc::clone(mesh),
        psi.dimensions() / si::LENGTH,
        cells,
    )?;
    for patch in &mesh.patches {
        if patch.is_coupled() {
            continue;
        }
        let values: Vec<Vector3<f64>> = patch
            .faces()
            .enumerate()
            .map(|(i, f)| {
                let n = mesh.face_normal(f);
                let gc = g.values()[patch.face_cells[i]];
                gc + n * (sn.patch(patch.index)[i] - n.dot(&gc))
            })
            .collect();
        g.assign_boundary(patch.index, &values)?;
    }
    Ok(g)
}

/// Uncorrected face-normal gradient.
pub fn sn_grad<T: FieldValue>(psi: &VolField<T>) -> SurfaceField<T> {
    let mesh = psi.mesh();
    let values = psi.values();
    let internal = (0..mesh.num_internal_faces())
        .map(|f| (values[mesh.neighbour[f]] - values[mesh.owner[f]]) * mesh.non_orth_delta_coeffs[f])
        .collect();
    let boundary = mesh
        .patches
        .iter()
        .map(|patch| {
            let far = patch_neighbour_values(psi, patch.index)
                .unwrap_or_else(|| psi.boundary_value(patch.index).to_vec());
            patch
                .face_cells
                .iter()
                .zip(&far)
                .zip(&patch.delta_coeffs)
                .map(|((&c, &b), &d)| (b - values[c]) * d)
                .collect()
        })
        .collect();
    SurfaceField::new(
        &format!("snGrad({})", psi.name()),
        psi.dimensions() / si::LENGTH,
        internal,
        boundary,
    )
}
