use super::*;
use nalgebra::{Point3, Vector3};

fn channel_2d(nx: usize, ny: usize) -> FvMesh {
    generate_box_mesh(&BoxMeshSpec {
        cells: [nx, ny, 1],
        origin: Point3::origin(),
        extent: Vector3::new(2.0, 1.0, 0.1),
        sides: BoxSides::two_d(
            SidePatch::patch("inlet"),
            SidePatch::patch("outlet"),
            SidePatch::wall("walls"),
            SidePatch::wall("walls"),
        ),
    })
    .unwrap()
}

#[test]
fn test_box_mesh_counts_and_volumes() {
    let mesh = channel_2d(4, 3);

    assert_eq!(mesh.num_cells(), 12);
    // 3 * 3 x-faces + 4 * 2 y-faces
    assert_eq!(mesh.num_internal_faces(), 17);
    // frontAndBack is dropped from the finite-volume patches
    assert_eq!(mesh.patches.len(), 3);
    assert_eq!(mesh.patch("walls").unwrap().size(), 8);
    assert!(mesh.patch("frontAndBack").is_none());

    let expected = 2.0 / 4.0 * 1.0 / 3.0 * 0.1;
    for &v in &mesh.cell_volumes {
        assert!((v - expected).abs() < 1e-14);
    }
    assert!((mesh.total_volume() - 0.2).abs() < 1e-12);
}

#[test]
fn test_internal_faces_point_from_owner_to_neighbour() {
    let mesh = channel_2d(3, 3);
    for f in 0..mesh.num_internal_faces() {
        assert!(mesh.owner[f] < mesh.neighbour[f]);
        let d = mesh.cell_centres[mesh.neighbour[f]] - mesh.cell_centres[mesh.owner[f]];
        assert!(d.dot(&mesh.face_areas[f]) > 0.0, "face {} points backwards", f);
        assert!((mesh.weights[f] - 0.5).abs() < 1e-12);
        assert!((mesh.delta_coeffs[f] * d.norm() - 1.0).abs() < 1e-12);
        assert!(mesh.non_orth_correction_vectors[f].norm() < 1e-12);
    }
}

#[test]
fn test_closed_cells_sum_to_zero_area() {
    let mesh = channel_2d(3, 2);
    let mut sum = vec![Vector3::<f64>::zeros(); mesh.num_cells()];
    for f in 0..mesh.num_internal_faces() {
        sum[mesh.owner[f]] += mesh.face_areas[f];
        sum[mesh.neighbour[f]] -= mesh.face_areas[f];
    }
    for patch in &mesh.patches {
        for (i, f) in patch.faces().enumerate() {
            sum[patch.face_cells[i]] += mesh.face_areas[f];
        }
    }
    // The collapsed z faces cancel on every cell, so the remaining open sum is zero.
    for s in sum {
        assert!(s.norm() < 1e-12, "open cell: {:?}", s);
    }
}

#[test]
fn test_boundary_delta_coeffs() {
    let mesh = generate_line_mesh(5, 1.0, SidePatch::patch("left"), SidePatch::patch("right")).unwrap();
    let left = mesh.patch("left").unwrap();
    assert_eq!(left.face_cells, vec![0]);
    assert!((left.delta_coeffs[0] - 10.0).abs() < 1e-10);
    assert!((left.weights[0] - 1.0).abs() < 1e-14);
    let right = mesh.patch("right").unwrap();
    assert_eq!(right.face_cells, vec![4]);
    assert!((right.deltas[0].x - 0.1).abs() < 1e-12);
}

#[test]
fn test_cyclic_patches_are_coupled() {
    let spec = BoxMeshSpec {
        cells: [4, 1, 1],
        origin: Point3::origin(),
        extent: Vector3::new(1.0, 1.0, 1.0),
        sides: BoxSides::one_d(
            SidePatch::cyclic("left", "right"),
            SidePatch::cyclic("right", "left"),
        ),
    };
    let mesh = generate_box_mesh(&spec).unwrap();
    let left = mesh.patch("left").unwrap();
    let right_idx = mesh.patch_index("right").unwrap();

    assert_eq!(left.coupling, Some(Coupling::Cyclic { neighbour: right_idx }));
    assert!((left.weights[0] - 0.5).abs() < 1e-12);
    // Cell 0 to the periodic image of cell 3 is one cell width.
    assert!((left.delta_coeffs[0] - 4.0).abs() < 1e-10);
}

#[test]
fn test_cyclic_with_missing_partner_fails() {
    let spec = BoxMeshSpec {
        cells: [2, 1, 1],
        origin: Point3::origin(),
        extent: Vector3::new(1.0, 1.0, 1.0),
        sides: BoxSides::one_d(SidePatch::cyclic("left", "nowhere"), SidePatch::patch("right")),
    };
    match generate_box_mesh(&spec) {
        Err(MeshError::MissingCyclicNeighbour { patch, neighbour }) => {
            assert_eq!(patch, "left");
            assert_eq!(neighbour, "nowhere");
        }
        other => panic!("expected missing neighbour, got {:?}", other.map(|m| m.num_cells())),
    }
}

#[test]
fn test_decomposition_preserves_cells_and_tags() {
    let parts = decompose_line_mesh(
        10,
        1.0,
        3,
        SidePatch::patch("inlet"),
        SidePatch::patch("outlet"),
    )
    .unwrap();
    let total: usize = parts.iter().map(|m| m.num_cells()).sum();
    assert_eq!(total, 10);
    assert_eq!(parts[0].num_cells(), 4);

    let middle = &parts[1];
    let to_left = middle.patch("procBoundary1to0").unwrap();
    let to_right = middle.patch("procBoundary1to2").unwrap();
    assert_eq!(to_left.coupling, Some(Coupling::Processor { rank: 0, tag: 0 }));
    assert_eq!(to_right.coupling, Some(Coupling::Processor { rank: 2, tag: 0 }));
    assert!((to_left.weights[0] - 0.5).abs() < 1e-12);
    assert!((to_left.delta_coeffs[0] - 10.0).abs() < 1e-10);
}

#[test]
fn test_skewed_mesh_has_non_orthogonal_correction() {
    let spec = BoxMeshSpec {
        cells: [4, 4, 1],
        origin: Point3::origin(),
        extent: Vector3::new(1.0, 1.0, 0.1),
        sides: BoxSides::two_d(
            SidePatch::wall("walls"),
            SidePatch::wall("walls"),
            SidePatch::wall("walls"),
            SidePatch::wall("walls"),
        ),
    };
    let mesh = generate_box_mesh_mapped(&spec, |p| Point3::new(p.x + 0.3 * p.y, p.y, p.z)).unwrap();
    let angle = mesh.max_non_orthogonality();
    println!("max non-orthogonality: {angle}");
    assert!(angle > 10.0);
    assert!(mesh
        .non_orth_correction_vectors
        .iter()
        .any(|k| k.norm() > 1e-3));
    assert!((mesh.total_volume() - 0.1).abs() < 1e-12);
}
