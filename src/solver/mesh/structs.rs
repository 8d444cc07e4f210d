use super::geometry;
use nalgebra::{Point3, Vector3};
use std::fmt;
use std::ops::Range;

#[derive(Clone, Debug, PartialEq)]
pub enum PatchKind {
    Patch,
    Wall,
    /// Faces dropped from the finite-volume system (reduced-dimension cases).
    Empty,
    /// Periodic pairing with another patch of the same mesh, matched face by face.
    Cyclic { neighbour_patch: String },
    /// Inter-process boundary; neighbour cell centres are supplied by the
    /// decomposition, face by face.
    Processor {
        neighbour_rank: usize,
        neighbour_cell_centres: Vec<Point3<f64>>,
    },
}

impl PatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchKind::Patch => "patch",
            PatchKind::Wall => "wall",
            PatchKind::Empty => "empty",
            PatchKind::Cyclic { .. } => "cyclic",
            PatchKind::Processor { .. } => "processor",
        }
    }
}

/// Boundary patch as described by the mesh supplier.
#[derive(Clone, Debug)]
pub struct PatchSpec {
    pub name: String,
    pub kind: PatchKind,
    pub start: usize,
    pub size: usize,
}

/// How a coupled patch reaches the cells on its other side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coupling {
    Cyclic { neighbour: usize },
    /// `tag` is the ordinal of this patch among the patches facing `rank`,
    /// identical on both sides.
    Processor { rank: usize, tag: u64 },
}

#[derive(Clone, Debug)]
pub struct Patch {
    pub name: String,
    pub kind: PatchKind,
    pub index: usize,
    pub start: usize,
    pub size: usize,
    pub face_cells: Vec<usize>,
    pub coupling: Option<Coupling>,
    /// Owner-side interpolation weight per face (1 on uncoupled patches).
    pub weights: Vec<f64>,
    /// `1 / (n . delta)` per face.
    pub delta_coeffs: Vec<f64>,
    /// `1 / |delta|` on coupled patches; equal to `delta_coeffs` elsewhere.
    pub orth_delta_coeffs: Vec<f64>,
    /// `n - delta * delta_coeffs` on coupled patches, zero elsewhere.
    pub non_orth_correction_vectors: Vec<Vector3<f64>>,
    /// Cell centre to face centre, or cell centre to neighbour cell centre on
    /// coupled patches.
    pub deltas: Vec<Vector3<f64>>,
}

impl Patch {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn faces(&self) -> Range<usize> {
        self.start..self.start + self.size
    }

    pub fn is_coupled(&self) -> bool {
        self.coupling.is_some()
    }

    pub fn is_wall(&self) -> bool {
        matches!(self.kind, PatchKind::Wall)
    }

    /// Gathers `internal` at the cells adjacent to this patch.
    pub fn patch_internal_field<T: Copy>(&self, internal: &[T]) -> Vec<T> {
        self.face_cells.iter().map(|&c| internal[c]).collect()
    }
}

/// Read-only finite-volume mesh: polyhedral connectivity, primitive geometry
/// and the interpolation/difference quantities derived from it.
///
/// Faces are ordered internal first, then boundary faces grouped by patch.
#[derive(Clone, Debug)]
pub struct FvMesh {
    pub points: Vec<Point3<f64>>,
    pub faces: Vec<Vec<usize>>,
    pub owner: Vec<usize>,
    pub neighbour: Vec<usize>,
    pub patches: Vec<Patch>,

    pub cell_centres: Vec<Point3<f64>>,
    pub cell_volumes: Vec<f64>,
    pub face_centres: Vec<Point3<f64>>,
    pub face_areas: Vec<Vector3<f64>>,
    pub mag_face_areas: Vec<f64>,

    // Internal faces only
    pub weights: Vec<f64>,
    pub delta_coeffs: Vec<f64>,
    pub non_orth_delta_coeffs: Vec<f64>,
    pub non_orth_correction_vectors: Vec<Vector3<f64>>,

    n_cells: usize,
}

impl FvMesh {
    pub fn new(
        points: Vec<Point3<f64>>,
        faces: Vec<Vec<usize>>,
        owner: Vec<usize>,
        neighbour: Vec<usize>,
        patch_specs: Vec<PatchSpec>,
    ) -> Result<Self, MeshError> {
        let n_cells = check_topology(&points, &faces, &owner, &neighbour, &patch_specs)?;

        let (face_centres, face_areas) = geometry::face_centres_and_areas(&points, &faces);
        let mag_face_areas: Vec<f64> = face_areas.iter().map(|s| s.norm()).collect();
        let (cell_centres, cell_volumes) = geometry::cell_centres_and_volumes(
            n_cells,
            &owner,
            &neighbour,
            &face_centres,
            &face_areas,
        );

        if let Some(cell) = cell_volumes.iter().position(|&v| v <= 0.0) {
            return Err(MeshError::NonPositiveVolume {
                cell,
                volume: cell_volumes[cell],
            });
        }

        let mut mesh = Self {
            points,
            faces,
            owner,
            neighbour,
            patches: Vec::new(),
            cell_centres,
            cell_volumes,
            face_centres,
            face_areas,
            mag_face_areas,
            weights: Vec::new(),
            delta_coeffs: Vec::new(),
            non_orth_delta_coeffs: Vec::new(),
            non_orth_correction_vectors: Vec::new(),
            n_cells,
        };

        mesh.make_internal_interpolation();
        mesh.patches = mesh.make_patches(patch_specs)?;
        Ok(mesh)
    }

    pub fn num_cells(&self) -> usize {
        self.n_cells
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn num_internal_faces(&self) -> usize {
        self.neighbour.len()
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn patch_index(&self, name: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.name == name)
    }

    pub fn patch(&self, name: &str) -> Option<&Patch> {
        self.patches.iter().find(|p| p.name == name)
    }

    /// Total volume of the local (sub-)domain.
    pub fn total_volume(&self) -> f64 {
        self.cell_volumes.iter().sum()
    }

    /// Face unit normal.
    pub fn face_normal(&self, face: usize) -> Vector3<f64> {
        let mag = self.mag_face_areas[face];
        if mag > 0.0 {
            self.face_areas[face] / mag
        } else {
            Vector3::zeros()
        }
    }

    /// Largest angle (degrees) between a face normal and the owner-neighbour
    /// vector over internal faces.
    pub fn max_non_orthogonality(&self) -> f64 {
        let mut max_angle: f64 = 0.0;
        for face in 0..self.num_internal_faces() {
            let d = self.cell_centres[self.neighbour[face]] - self.cell_centres[self.owner[face]];
            let cos = (self.face_normal(face).dot(&d) / d.norm()).clamp(-1.0, 1.0);
            max_angle = max_angle.max(cos.acos().to_degrees());
        }
        max_angle
    }

    fn make_internal_interpolation(&mut self) {
        let n_internal = self.num_internal_faces();
        self.weights = Vec::with_capacity(n_internal);
        self.delta_coeffs = Vec::with_capacity(n_internal);
        self.non_orth_delta_coeffs = Vec::with_capacity(n_internal);
        self.non_orth_correction_vectors = Vec::with_capacity(n_internal);

        for face in 0..n_internal {
            let fi = face_interpolation(
                self.face_areas[face],
                self.face_centres[face],
                self.cell_centres[self.owner[face]],
                self.cell_centres[self.neighbour[face]],
            );
            self.weights.push(fi.weight);
            self.delta_coeffs.push(fi.delta_coeff);
            self.non_orth_delta_coeffs.push(fi.non_orth_delta_coeff);
            self.non_orth_correction_vectors.push(fi.correction);
        }
    }

    fn make_patches(&self, specs: Vec<PatchSpec>) -> Result<Vec<Patch>, MeshError> {
        let fv_specs: Vec<PatchSpec> = specs
            .into_iter()
            .filter(|s| s.kind != PatchKind::Empty)
            .collect();

        let mut patches = Vec::with_capacity(fv_specs.len());
        let mut processor_ordinals: std::collections::HashMap<usize, u64> = Default::default();

        for (index, spec) in fv_specs.iter().enumerate() {
            let face_cells: Vec<usize> = (spec.start..spec.start + spec.size)
                .map(|f| self.owner[f])
                .collect();

            let coupling = match &spec.kind {
                PatchKind::Cyclic { neighbour_patch } => {
                    let neighbour = fv_specs
                        .iter()
                        .position(|s| &s.name == neighbour_patch)
                        .ok_or_else(|| MeshError::MissingCyclicNeighbour {
                            patch: spec.name.clone(),
                            neighbour: neighbour_patch.clone(),
                        })?;
                    if neighbour == index || fv_specs[neighbour].size != spec.size {
                        return Err(MeshError::CyclicSizeMismatch {
                            patch: spec.name.clone(),
                            neighbour: neighbour_patch.clone(),
                        });
                    }
                    Some(Coupling::Cyclic { neighbour })
                }
                PatchKind::Processor {
                    neighbour_rank,
                    neighbour_cell_centres,
                } => {
                    if neighbour_cell_centres.len() != spec.size {
                        return Err(MeshError::SizeMismatch {
                            what: "processor neighbour cell centres",
                            patch: spec.name.clone(),
                            expected: spec.size,
                            found: neighbour_cell_centres.len(),
                        });
                    }
                    let ordinal = processor_ordinals.entry(*neighbour_rank).or_insert(0);
                    let tag = *ordinal;
                    *ordinal += 1;
                    Some(Coupling::Processor {
                        rank: *neighbour_rank,
                        tag,
                    })
                }
                _ => None,
            };

            let mut weights = Vec::with_capacity(spec.size);
            let mut delta_coeffs = Vec::with_capacity(spec.size);
            let mut orth_delta_coeffs = Vec::with_capacity(spec.size);
            let mut correction_vectors = Vec::with_capacity(spec.size);
            let mut deltas = Vec::with_capacity(spec.size);

            for (i, face) in (spec.start..spec.start + spec.size).enumerate() {
                let own = self.cell_centres[face_cells[i]];
                let cf = self.face_centres[face];

                // Neighbour cell centre seen from this side, when coupled.
                let nbr_centre = match (&spec.kind, coupling) {
                    (PatchKind::Cyclic { .. }, Some(Coupling::Cyclic { neighbour })) => {
                        let nbr_face = fv_specs[neighbour].start + i;
                        // Translate across the periodic pair.
                        let separation = cf - self.face_centres[nbr_face];
                        Some(self.cell_centres[self.owner[nbr_face]] + separation)
                    }
                    (
                        PatchKind::Processor {
                            neighbour_cell_centres,
                            ..
                        },
                        _,
                    ) => Some(neighbour_cell_centres[i]),
                    _ => None,
                };

                match nbr_centre {
                    Some(nbr_c) => {
                        let fi = face_interpolation(self.face_areas[face], cf, own, nbr_c);
                        weights.push(fi.weight);
                        delta_coeffs.push(fi.non_orth_delta_coeff);
                        orth_delta_coeffs.push(fi.delta_coeff);
                        correction_vectors.push(fi.correction);
                        deltas.push(nbr_c - own);
                    }
                    None => {
                        let d_own = cf - own;
                        let unit = self.face_normal(face);
                        let delta_coeff = 1.0 / unit.dot(&d_own).max(0.05 * d_own.norm());
                        weights.push(1.0);
                        delta_coeffs.push(delta_coeff);
                        orth_delta_coeffs.push(delta_coeff);
                        correction_vectors.push(Vector3::zeros());
                        deltas.push(d_own);
                    }
                }
            }

            patches.push(Patch {
                name: spec.name.clone(),
                kind: spec.kind.clone(),
                index,
                start: spec.start,
                size: spec.size,
                face_cells,
                coupling,
                weights,
                delta_coeffs,
                orth_delta_coeffs,
                non_orth_correction_vectors: correction_vectors,
                deltas,
            });
        }

        Ok(patches)
    }
}

/// Difference and interpolation factors of one face between the cell
/// centres `own` and `nei`.
struct FaceInterpolation {
    weight: f64,
    /// `1 / |d|`
    delta_coeff: f64,
    /// `1 / max(n . d, 0.05 |d|)`
    non_orth_delta_coeff: f64,
    correction: Vector3<f64>,
}

fn face_interpolation(sf: Vector3<f64>, cf: Point3<f64>, own: Point3<f64>, nei: Point3<f64>) -> FaceInterpolation {
    let sfd_own = sf.dot(&(cf - own)).abs();
    let sfd_nei = sf.dot(&(nei - cf)).abs();
    let weight = if sfd_own + sfd_nei > f64::MIN_POSITIVE {
        sfd_nei / (sfd_own + sfd_nei)
    } else {
        0.5
    };

    let delta = nei - own;
    let mag = sf.norm();
    let unit = if mag > 0.0 { sf / mag } else { Vector3::zeros() };
    let non_orth_delta_coeff = 1.0 / unit.dot(&delta).max(0.05 * delta.norm());
    FaceInterpolation {
        weight,
        delta_coeff: 1.0 / delta.norm(),
        non_orth_delta_coeff,
        correction: unit - delta * non_orth_delta_coeff,
    }
}

fn check_topology(
    points: &[Point3<f64>],
    faces: &[Vec<usize>],
    owner: &[usize],
    neighbour: &[usize],
    patches: &[PatchSpec],
) -> Result<usize, MeshError> {
    if owner.len() != faces.len() {
        return Err(MeshError::Inconsistent(format!(
            "{} faces but {} owners",
            faces.len(),
            owner.len()
        )));
    }
    if neighbour.len() > owner.len() {
        return Err(MeshError::Inconsistent(format!(
            "{} neighbours exceed {} faces",
            neighbour.len(),
            owner.len()
        )));
    }

    for (face, verts) in faces.iter().enumerate() {
        if verts.len() < 3 {
            return Err(MeshError::DegenerateFace { face });
        }
        if let Some(&p) = verts.iter().find(|&&p| p >= points.len()) {
            return Err(MeshError::PointOutOfRange { face, point: p });
        }
    }

    let n_cells = owner
        .iter()
        .chain(neighbour.iter())
        .copied()
        .max()
        .map(|m| m + 1)
        .unwrap_or(0);

    for (face, (&own, &nei)) in owner.iter().zip(neighbour.iter()).enumerate() {
        if own == nei {
            return Err(MeshError::Inconsistent(format!(
                "internal face {face} has owner == neighbour == {own}"
            )));
        }
    }

    let mut next_start = neighbour.len();
    for spec in patches {
        if spec.start != next_start {
            return Err(MeshError::PatchNotContiguous {
                patch: spec.name.clone(),
                expected_start: next_start,
                found_start: spec.start,
            });
        }
        next_start = spec.start + spec.size;
    }
    if next_start != faces.len() {
        return Err(MeshError::Inconsistent(format!(
            "patches cover faces up to {} but the mesh has {} faces",
            next_start,
            faces.len()
        )));
    }

    Ok(n_cells)
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeshError {
    Inconsistent(String),
    DegenerateFace {
        face: usize,
    },
    PointOutOfRange {
        face: usize,
        point: usize,
    },
    PatchNotContiguous {
        patch: String,
        expected_start: usize,
        found_start: usize,
    },
    MissingCyclicNeighbour {
        patch: String,
        neighbour: String,
    },
    CyclicSizeMismatch {
        patch: String,
        neighbour: String,
    },
    SizeMismatch {
        what: &'static str,
        patch: String,
        expected: usize,
        found: usize,
    },
    NonPositiveVolume {
        cell: usize,
        volume: f64,
    },
    InvalidSpec(String),
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::Inconsistent(msg) => write!(f, "inconsistent mesh: {}", msg),
            MeshError::DegenerateFace { face } => {
                write!(f, "face {} has fewer than three points", face)
            }
            MeshError::PointOutOfRange { face, point } => {
                write!(f, "face {} references missing point {}", face, point)
            }
            MeshError::PatchNotContiguous {
                patch,
                expected_start,
                found_start,
            } => write!(
                f,
                "patch {} starts at face {} but should start at {}",
                patch, found_start, expected_start
            ),
            MeshError::MissingCyclicNeighbour { patch, neighbour } => write!(
                f,
                "cyclic patch {} names neighbour patch {} which does not exist",
                patch, neighbour
            ),
            MeshError::CyclicSizeMismatch { patch, neighbour } => write!(
                f,
                "cyclic patch {} and its neighbour {} do not match face for face",
                patch, neighbour
            ),
            MeshError::SizeMismatch {
                what,
                patch,
                expected,
                found,
            } => write!(
                f,
                "{} on patch {}: expected {}, found {}",
                what, patch, expected, found
            ),
            MeshError::NonPositiveVolume { cell, volume } => {
                write!(f, "cell {} has non-positive volume {}", cell, volume)
            }
            MeshError::InvalidSpec(msg) => write!(f, "invalid mesh specification: {}", msg),
        }
    }
}

impl std::error::Error for MeshError {}
