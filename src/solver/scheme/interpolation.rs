use super::limiter::{gradient_ratio, Limiter};
use super::SchemeError;
use crate::solver::boundary::pos0;
use crate::solver::field::{FieldValue, SurfaceField, VolField};
use crate::solver::fvc;
use crate::solver::mesh::FvMesh;
use crate::solver::units::si;
use indexmap::IndexMap;
use nalgebra::Vector3;
use std::fmt;
use std::slice::Iter;

/// Face interpolation for convected fields.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationScheme {
    Upwind,
    Linear,
    /// Upwind weights plus an explicit gradient correction; `grad` names the
    /// gradient entry it was declared with.
    LinearUpwind { grad: String },
    /// TVD blend between linear and upwind weights.
    Limited(Limiter),
}

type Parser = fn(&str, &mut Iter<'_, &str>) -> Result<InterpolationScheme, SchemeError>;

fn no_args(name: &str, _: &mut Iter<'_, &str>) -> Result<InterpolationScheme, SchemeError> {
    Ok(match name {
        "upwind" => InterpolationScheme::Upwind,
        _ => InterpolationScheme::Linear,
    })
}

fn linear_upwind(name: &str, tokens: &mut Iter<'_, &str>) -> Result<InterpolationScheme, SchemeError> {
    let grad = tokens.next().ok_or_else(|| SchemeError::Malformed {
        entry: name.to_string(),
        reason: "linearUpwind needs a gradient scheme name".to_string(),
    })?;
    Ok(InterpolationScheme::LinearUpwind {
        grad: grad.to_string(),
    })
}

fn limited(name: &str, tokens: &mut Iter<'_, &str>) -> Result<InterpolationScheme, SchemeError> {
    if Limiter::takes_coefficient(name) {
        let k = tokens
            .next()
            .and_then(|t| t.parse::<f64>().ok())
            .ok_or_else(|| SchemeError::Malformed {
                entry: name.to_string(),
                reason: format!("{} needs a numeric coefficient", name),
            })?;
        return Limiter::with_coefficient(name, k).map(InterpolationScheme::Limited);
    }
    name.parse().map(InterpolationScheme::Limited)
}

/// Name-keyed constructors, in the order they are listed in errors.
pub fn interpolation_registry() -> IndexMap<&'static str, Parser> {
    let mut registry: IndexMap<&'static str, Parser> = IndexMap::new();
    registry.insert("upwind", no_args);
    registry.insert("linear", no_args);
    registry.insert("linearUpwind", linear_upwind);
    for name in Limiter::NAMES {
        registry.insert(name, limited);
    }
    registry
}

impl InterpolationScheme {
    /// Parses the tokens following `Gauss`.
    pub fn parse(tokens: &mut Iter<'_, &str>) -> Result<Self, SchemeError> {
        let registry = interpolation_registry();
        let name = tokens.next().ok_or_else(|| SchemeError::Malformed {
            entry: String::new(),
            reason: "missing interpolation scheme".to_string(),
        })?;
        let parser = registry.get(*name).ok_or_else(|| SchemeError::Unknown {
            kind: "interpolation",
            name: name.to_string(),
            valid: registry.keys().map(|k| k.to_string()).collect(),
        })?;
        parser(name, tokens)
    }

    pub fn parse_str(entry: &str) -> Result<Self, SchemeError> {
        let tokens: Vec<&str> = entry.split_whitespace().collect();
        let mut iter = tokens.iter();
        let scheme = Self::parse(&mut iter)?;
        if let Some(extra) = iter.next() {
            return Err(SchemeError::Malformed {
                entry: entry.to_string(),
                reason: format!("unexpected token {}", extra),
            });
        }
        Ok(scheme)
    }

    /// True if the scheme adds an explicit face correction.
    pub fn corrected(&self) -> bool {
        matches!(self, InterpolationScheme::LinearUpwind { .. })
    }

    /// Owner-side weights `w` with `psi_f = w psi_P + (1 - w) psi_N`.
    /// Uncoupled patches carry weight 1.
    pub fn weights<T: FieldValue>(&self, flux: &SurfaceField<f64>, psi: &VolField<T>) -> SurfaceField<f64> {
        let mesh = psi.mesh();
        let name = format!("{}Weights", psi.name());
        match self {
            InterpolationScheme::Upwind | InterpolationScheme::LinearUpwind { .. } => {
                upwind_weights(&name, mesh, flux)
            }
            InterpolationScheme::Linear => linear_weights(&name, mesh),
            InterpolationScheme::Limited(limiter) => limited_weights(&name, *limiter, flux, psi),
        }
    }

    /// Explicit face correction added on top of the weighted interpolate.
    pub fn correction<T: FieldValue>(&self, flux: &SurfaceField<f64>, psi: &VolField<T>) -> Option<SurfaceField<T>> {
        match self {
            InterpolationScheme::LinearUpwind { .. } => Some(linear_upwind_correction(flux, psi)),
            _ => None,
        }
    }
}

impl fmt::Display for InterpolationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpolationScheme::Upwind => f.write_str("upwind"),
            InterpolationScheme::Linear => f.write_str("linear"),
            InterpolationScheme::LinearUpwind { grad } => write!(f, "linearUpwind {}", grad),
            InterpolationScheme::Limited(l) => write!(f, "{}", l),
        }
    }
}

fn upwind_weights(name: &str, mesh: &FvMesh, flux: &SurfaceField<f64>) -> SurfaceField<f64> {
    SurfaceField::new(
        name,
        si::DIMENSIONLESS,
        flux.internal.iter().map(|&phi| pos0(phi)).collect(),
        mesh.patches
            .iter()
            .map(|p| {
                if p.is_coupled() {
                    flux.patch(p.index).iter().map(|&phi| pos0(phi)).collect()
                } else {
                    vec![1.0; p.size()]
                }
            })
            .collect(),
    )
}

pub(crate) fn linear_weights(name: &str, mesh: &FvMesh) -> SurfaceField<f64> {
    SurfaceField::new(
        name,
        si::DIMENSIONLESS,
        mesh.weights.clone(),
        mesh.patches.iter().map(|p| p.weights.clone()).collect(),
    )
}

fn limited_weights<T: FieldValue>(
    name: &str,
    limiter: Limiter,
    flux: &SurfaceField<f64>,
    psi: &VolField<T>,
) -> SurfaceField<f64> {
    let mesh = psi.mesh();
    let values = psi.values();
    let grads = fvc::component_gradients(psi);

    let limit_face = |phi: f64, vp: T, vn: T, gp: &dyn Fn(usize) -> Vector3<f64>, gn: &dyn Fn(usize) -> Vector3<f64>, d: Vector3<f64>| {
        (0..T::N_COMPONENTS)
            .map(|c| {
                let r = gradient_ratio(phi, vp.component(c), vn.component(c), gp(c).dot(&d), gn(c).dot(&d));
                limiter.limit(r)
            })
            .fold(f64::INFINITY, f64::min)
            .min(1.0)
            .max(0.0)
    };

    let internal = (0..mesh.num_internal_faces())
        .map(|f| {
            let (p, n) = (mesh.owner[f], mesh.neighbour[f]);
            let d = mesh.cell_centres[n] - mesh.cell_centres[p];
            let phi = flux.internal[f];
            let lim = limit_face(phi, values[p], values[n], &|c| grads[c][p], &|c| grads[c][n], d);
            lim * mesh.weights[f] + (1.0 - lim) * pos0(phi)
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
                return vec![1.0; patch.size()];
            };
            let phi = flux.patch(patch.index);
            (0..patch.size())
                .map(|i| {
                    let cell = patch.face_cells[i];
                    let lim = limit_face(
                        phi[i],
                        values[cell],
                        nbr_values[i],
                        &|c| grads[c][cell],
                        &|c| nbr_grads[c][i],
                        patch.deltas[i],
                    );
                    lim * patch.weights[i] + (1.0 - lim) * pos0(phi[i])
                })
                .collect()
        })
        .collect();

    SurfaceField::new(name, si::DIMENSIONLESS, internal, boundary)
}

fn linear_upwind_correction<T: FieldValue>(flux: &SurfaceField<f64>, psi: &VolField<T>) -> SurfaceField<T> {
    let mesh = psi.mesh();
    let grads = fvc::component_gradients(psi);
    let project = |grad: &dyn Fn(usize) -> Vector3<f64>, r: Vector3<f64>| {
        let mut v = T::zero();
        for c in 0..T::N_COMPONENTS {
            v.set_component(c, r.dot(&grad(c)));
        }
        v
    };

    let internal = (0..mesh.num_internal_faces())
        .map(|f| {
            let upwind = if flux.internal[f] >= 0.0 {
                mesh.owner[f]
            } else {
                mesh.neighbour[f]
            };
            project(&|c| grads[c][upwind], mesh.face_centres[f] - mesh.cell_centres[upwind])
        })
        .collect();

    let boundary = mesh
        .patches
        .iter()
        .map(|patch| {
            // Uncoupled faces take the upwind value as is.
            let Some(nbr_grads) = fvc::patch_neighbour_gradients(psi, &grads, patch.index) else {
                return vec![T::zero(); patch.size()];
            };
            let phi = flux.patch(patch.index);
            patch
                .faces()
                .enumerate()
                .map(|(i, f)| {
                    let cell = patch.face_cells[i];
                    let own = mesh.cell_centres[cell];
                    if phi[i] >= 0.0 {
                        project(&|c| grads[c][cell], mesh.face_centres[f] - own)
                    } else {
                        project(&|c| nbr_grads[c][i], mesh.face_centres[f] - (own + patch.deltas[i]))
                    }
                })
                .collect()
        })
        .collect();

    SurfaceField::new(&format!("{}Correction", psi.name()), psi.dimensions(), internal, boundary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::mesh::{generate_line_mesh, SidePatch};
    use std::sync::Arc;

    #[test]
    fn parses_with_arguments() {
        assert_eq!(InterpolationScheme::parse_str("upwind").unwrap(), InterpolationScheme::Upwind);
        assert_eq!(
            InterpolationScheme::parse_str("limitedLinear 1").unwrap(),
            InterpolationScheme::Limited(Limiter::LimitedLinear(1.0))
        );
        assert_eq!(
            InterpolationScheme::parse_str("linearUpwind grad(U)").unwrap(),
            InterpolationScheme::LinearUpwind { grad: "grad(U)".into() }
        );
        assert!(InterpolationScheme::parse_str("linear extra").is_err());
    }

    #[test]
    fn unknown_name_lists_valid_schemes() {
        match InterpolationScheme::parse_str("QUICKish") {
            Err(SchemeError::Unknown { valid, .. }) => {
                assert!(valid.contains(&"upwind".to_string()));
                assert!(valid.contains(&"SuperBee".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn limited_weights_are_linear_on_linear_profile() {
        let mesh = Arc::new(
            generate_line_mesh(6, 1.0, SidePatch::patch("inlet"), SidePatch::patch("outlet")).unwrap(),
        );
        let x: Vec<f64> = mesh.cell_centres.iter().map(|c| c.x).collect();
        let psi = VolField::calculated("T", Arc::clone(&mesh), si::DIMENSIONLESS, x).unwrap();
        let flux = SurfaceField::uniform("phi", &mesh, si::VOLUMETRIC_FLUX, 1.0);
        let w = InterpolationScheme::Limited(Limiter::VanLeer).weights(&flux, &psi);
        // Faces away from the ends see exact linear gradients.
        for f in 1..mesh.num_internal_faces() - 1 {
            assert!((w.internal[f] - mesh.weights[f]).abs() < 1e-10, "face {}", f);
        }
    }

    #[test]
    fn upwind_weights_follow_flux_sign() {
        let mesh = Arc::new(
            generate_line_mesh(3, 1.0, SidePatch::patch("inlet"), SidePatch::patch("outlet")).unwrap(),
        );
        let psi = VolField::calculated("T", Arc::clone(&mesh), si::DIMENSIONLESS, vec![0.0; 3]).unwrap();
        let mut flux = SurfaceField::uniform("phi", &mesh, si::VOLUMETRIC_FLUX, 1.0);
        flux.internal[1] = -1.0;
        let w = InterpolationScheme::Upwind.weights(&flux, &psi);
        assert_eq!(w.internal, vec![1.0, 0.0]);
    }
}
