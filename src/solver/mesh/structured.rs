use super::structs::{FvMesh, MeshError, PatchKind, PatchSpec};
use nalgebra::{Point3, Vector3};
use serde::Deserialize;

/// Name and kind of the patch one side of a box is assigned to. Sides sharing
/// a name are merged into one patch.
#[derive(Clone, Debug)]
pub struct SidePatch {
    pub name: String,
    pub kind: PatchKind,
}

impl SidePatch {
    pub fn new(name: &str, kind: PatchKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }

    pub fn patch(name: &str) -> Self {
        Self::new(name, PatchKind::Patch)
    }

    pub fn wall(name: &str) -> Self {
        Self::new(name, PatchKind::Wall)
    }

    pub fn empty(name: &str) -> Self {
        Self::new(name, PatchKind::Empty)
    }

    pub fn cyclic(name: &str, neighbour_patch: &str) -> Self {
        Self::new(
            name,
            PatchKind::Cyclic {
                neighbour_patch: neighbour_patch.to_string(),
            },
        )
    }
}

/// Bundles the six sides of a box: x-, x+, y-, y+, z-, z+.
#[derive(Clone, Debug)]
pub struct BoxSides {
    pub left: SidePatch,
    pub right: SidePatch,
    pub bottom: SidePatch,
    pub top: SidePatch,
    pub back: SidePatch,
    pub front: SidePatch,
}

impl BoxSides {
    /// All six sides in one wall patch.
    pub fn walls(name: &str) -> Self {
        let wall = SidePatch::wall(name);
        Self {
            left: wall.clone(),
            right: wall.clone(),
            bottom: wall.clone(),
            top: wall.clone(),
            back: wall.clone(),
            front: wall,
        }
    }

    /// Four in-plane sides with the z sides collapsed into `frontAndBack`.
    pub fn two_d(left: SidePatch, right: SidePatch, bottom: SidePatch, top: SidePatch) -> Self {
        let empty = SidePatch::empty("frontAndBack");
        Self {
            left,
            right,
            bottom,
            top,
            back: empty.clone(),
            front: empty,
        }
    }

    /// x sides only; y and z sides collapsed.
    pub fn one_d(left: SidePatch, right: SidePatch) -> Self {
        let empty = SidePatch::empty("defaultFaces");
        Self {
            left,
            right,
            bottom: empty.clone(),
            top: empty.clone(),
            back: empty.clone(),
            front: empty,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BoxMeshSpec {
    pub cells: [usize; 3],
    pub origin: Point3<f64>,
    pub extent: Vector3<f64>,
    pub sides: BoxSides,
}

/// Box description as it appears in a case file.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxMeshConfig {
    pub cells: [usize; 3],
    #[serde(default)]
    pub origin: [f64; 3],
    pub extent: [f64; 3],
    pub patches: BoxPatchNames,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BoxPatchNames {
    pub left: SideConfig,
    pub right: SideConfig,
    pub bottom: SideConfig,
    pub top: SideConfig,
    pub back: SideConfig,
    pub front: SideConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SideConfig {
    pub name: String,
    #[serde(rename = "type", default = "default_side_type")]
    pub kind: String,
    #[serde(default)]
    pub neighbour_patch: Option<String>,
}

fn default_side_type() -> String {
    "patch".to_string()
}

impl SideConfig {
    fn to_side(&self) -> Result<SidePatch, MeshError> {
        let kind = match self.kind.as_str() {
            "patch" => PatchKind::Patch,
            "wall" => PatchKind::Wall,
            "empty" => PatchKind::Empty,
            "cyclic" => PatchKind::Cyclic {
                neighbour_patch: self.neighbour_patch.clone().ok_or_else(|| {
                    MeshError::InvalidSpec(format!(
                        "cyclic side {} needs neighbour_patch",
                        self.name
                    ))
                })?,
            },
            other => {
                return Err(MeshError::InvalidSpec(format!(
                    "unknown side type {} for {} (valid: patch, wall, empty, cyclic)",
                    other, self.name
                )))
            }
        };
        Ok(SidePatch::new(&self.name, kind))
    }
}

impl BoxMeshConfig {
    pub fn to_spec(&self) -> Result<BoxMeshSpec, MeshError> {
        let p = &self.patches;
        Ok(BoxMeshSpec {
            cells: self.cells,
            origin: Point3::from(self.origin),
            extent: Vector3::from(self.extent),
            sides: BoxSides {
                left: p.left.to_side()?,
                right: p.right.to_side()?,
                bottom: p.bottom.to_side()?,
                top: p.top.to_side()?,
                back: p.back.to_side()?,
                front: p.front.to_side()?,
            },
        })
    }
}

pub fn generate_box_mesh(spec: &BoxMeshSpec) -> Result<FvMesh, MeshError> {
    generate_box_mesh_mapped(spec, |p| p)
}

/// Generates a hexahedral box and moves every point through `map`, which lets
/// callers build skewed (non-orthogonal) meshes with the same connectivity.
pub fn generate_box_mesh_mapped<F>(spec: &BoxMeshSpec, map: F) -> Result<FvMesh, MeshError>
where
    F: Fn(Point3<f64>) -> Point3<f64>,
{
    let [nx, ny, nz] = spec.cells;
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(MeshError::InvalidSpec(format!(
            "cell counts must be positive, got {:?}",
            spec.cells
        )));
    }
    if spec.extent.iter().any(|&e| e <= 0.0) {
        return Err(MeshError::InvalidSpec(format!(
            "extent must be positive, got {:?}",
            spec.extent
        )));
    }

    let dx = spec.extent.x / nx as f64;
    let dy = spec.extent.y / ny as f64;
    let dz = spec.extent.z / nz as f64;

    let pid = |i: usize, j: usize, k: usize| -> usize { i + (nx + 1) * (j + (ny + 1) * k) };
    let cid = |i: usize, j: usize, k: usize| -> usize { i + nx * (j + ny * k) };

    // --- Points ---
    let mut points = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                let p = spec.origin + Vector3::new(i as f64 * dx, j as f64 * dy, k as f64 * dz);
                points.push(map(p));
            }
        }
    }

    // Quads with normals along +x, +y, +z respectively.
    let x_face = |i, j, k| vec![pid(i, j, k), pid(i, j + 1, k), pid(i, j + 1, k + 1), pid(i, j, k + 1)];
    let y_face = |i, j, k| vec![pid(i, j, k), pid(i, j, k + 1), pid(i + 1, j, k + 1), pid(i + 1, j, k)];
    let z_face = |i, j, k| vec![pid(i, j, k), pid(i + 1, j, k), pid(i + 1, j + 1, k), pid(i, j + 1, k)];
    let reversed = |mut f: Vec<usize>| {
        f.reverse();
        f
    };

    // --- Internal faces, upper-triangular order ---
    let mut faces = Vec::new();
    let mut owner = Vec::new();
    let mut neighbour = Vec::new();

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let c = cid(i, j, k);
                if i + 1 < nx {
                    faces.push(x_face(i + 1, j, k));
                    owner.push(c);
                    neighbour.push(cid(i + 1, j, k));
                }
                if j + 1 < ny {
                    faces.push(y_face(i, j + 1, k));
                    owner.push(c);
                    neighbour.push(cid(i, j + 1, k));
                }
                if k + 1 < nz {
                    faces.push(z_face(i, j, k + 1));
                    owner.push(c);
                    neighbour.push(cid(i, j, k + 1));
                }
            }
        }
    }

    // --- Boundary faces per side ---
    let sides = &spec.sides;
    let mut side_faces: Vec<(&SidePatch, Vec<(Vec<usize>, usize)>)> = Vec::with_capacity(6);

    let mut left = Vec::new();
    let mut right = Vec::new();
    for k in 0..nz {
        for j in 0..ny {
            left.push((reversed(x_face(0, j, k)), cid(0, j, k)));
            right.push((x_face(nx, j, k), cid(nx - 1, j, k)));
        }
    }
    let mut bottom = Vec::new();
    let mut top = Vec::new();
    for k in 0..nz {
        for i in 0..nx {
            bottom.push((reversed(y_face(i, 0, k)), cid(i, 0, k)));
            top.push((y_face(i, ny, k), cid(i, ny - 1, k)));
        }
    }
    let mut back = Vec::new();
    let mut front = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            back.push((reversed(z_face(i, j, 0)), cid(i, j, 0)));
            front.push((z_face(i, j, nz), cid(i, j, nz - 1)));
        }
    }
    side_faces.push((&sides.left, left));
    side_faces.push((&sides.right, right));
    side_faces.push((&sides.bottom, bottom));
    side_faces.push((&sides.top, top));
    side_faces.push((&sides.back, back));
    side_faces.push((&sides.front, front));

    // Merge sides with the same patch name, keeping first-appearance order.
    let mut groups: Vec<(SidePatch, Vec<(Vec<usize>, usize)>)> = Vec::new();
    for (side, side_list) in side_faces {
        match groups.iter_mut().find(|(g, _)| g.name == side.name) {
            Some((g, list)) => {
                if g.kind != side.kind {
                    return Err(MeshError::InvalidSpec(format!(
                        "sides named {} disagree on patch type ({} vs {})",
                        side.name,
                        g.kind.as_str(),
                        side.kind.as_str()
                    )));
                }
                list.extend(side_list);
            }
            None => groups.push((side.clone(), side_list)),
        }
    }

    let mut patches = Vec::with_capacity(groups.len());
    for (side, list) in groups {
        let start = faces.len();
        let size = list.len();
        for (face, cell) in list {
            faces.push(face);
            owner.push(cell);
        }
        patches.push(PatchSpec {
            name: side.name,
            kind: side.kind,
            start,
            size,
        });
    }

    FvMesh::new(points, faces, owner, neighbour, patches)
}

/// `n` cells along x between `inlet` (x = 0) and `outlet` (x = length); the
/// transverse directions are collapsed.
pub fn generate_line_mesh(
    n: usize,
    length: f64,
    inlet: SidePatch,
    outlet: SidePatch,
) -> Result<FvMesh, MeshError> {
    generate_box_mesh(&line_spec(n, length, inlet, outlet))
}

fn line_spec(n: usize, length: f64, inlet: SidePatch, outlet: SidePatch) -> BoxMeshSpec {
    BoxMeshSpec {
        cells: [n, 1, 1],
        origin: Point3::origin(),
        extent: Vector3::new(length, 1.0, 1.0),
        sides: BoxSides::one_d(inlet, outlet),
    }
}

/// Splits the line mesh of [`generate_line_mesh`] into `n_parts` slabs along
/// x. Each slab is returned with processor patches carrying the neighbouring
/// cell centres; slab `p` is meant to run on rank `p`.
pub fn decompose_line_mesh(
    n: usize,
    length: f64,
    n_parts: usize,
    inlet: SidePatch,
    outlet: SidePatch,
) -> Result<Vec<FvMesh>, MeshError> {
    decompose_box_mesh_x(&line_spec(n, length, inlet, outlet), n_parts)
}

/// Slab decomposition of a box along x.
pub fn decompose_box_mesh_x(spec: &BoxMeshSpec, n_parts: usize) -> Result<Vec<FvMesh>, MeshError> {
    let [nx, ny, nz] = spec.cells;
    if n_parts == 0 || n_parts > nx {
        return Err(MeshError::InvalidSpec(format!(
            "cannot split {} cells into {} parts",
            nx, n_parts
        )));
    }
    if n_parts > 1
        && (matches!(spec.sides.left.kind, PatchKind::Cyclic { .. })
            || matches!(spec.sides.right.kind, PatchKind::Cyclic { .. }))
    {
        return Err(MeshError::InvalidSpec(
            "cyclic x sides cannot be split across processors".to_string(),
        ));
    }

    let dx = spec.extent.x / nx as f64;
    let dy = spec.extent.y / ny as f64;
    let dz = spec.extent.z / nz as f64;

    // Centres of the global cells in column `i`, in boundary-face order.
    let column_centres = |i: usize| -> Vec<Point3<f64>> {
        let mut centres = Vec::with_capacity(ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                centres.push(
                    spec.origin
                        + Vector3::new(
                            (i as f64 + 0.5) * dx,
                            (j as f64 + 0.5) * dy,
                            (k as f64 + 0.5) * dz,
                        ),
                );
            }
        }
        centres
    };

    let base = nx / n_parts;
    let extra = nx % n_parts;
    let mut parts = Vec::with_capacity(n_parts);
    let mut i_start = 0;

    for p in 0..n_parts {
        let count = base + usize::from(p < extra);
        let i_end = i_start + count;

        let mut sides = spec.sides.clone();
        if p > 0 {
            sides.left = SidePatch::new(
                &format!("procBoundary{}to{}", p, p - 1),
                PatchKind::Processor {
                    neighbour_rank: p - 1,
                    neighbour_cell_centres: column_centres(i_start - 1),
                },
            );
        }
        if p + 1 < n_parts {
            sides.right = SidePatch::new(
                &format!("procBoundary{}to{}", p, p + 1),
                PatchKind::Processor {
                    neighbour_rank: p + 1,
                    neighbour_cell_centres: column_centres(i_end),
                },
            );
        }

        let part_spec = BoxMeshSpec {
            cells: [count, ny, nz],
            origin: spec.origin + Vector3::new(i_start as f64 * dx, 0.0, 0.0),
            extent: Vector3::new(count as f64 * dx, spec.extent.y, spec.extent.z),
            sides,
        };
        parts.push(generate_box_mesh(&part_spec)?);
        i_start = i_end;
    }

    Ok(parts)
}
