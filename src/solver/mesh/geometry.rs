use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

const VSMALL: f64 = 1e-300;

/// Face centres and area vectors from a triangle fan about the point average.
pub fn face_centres_and_areas(
    points: &[Point3<f64>],
    faces: &[Vec<usize>],
) -> (Vec<Point3<f64>>, Vec<Vector3<f64>>) {
    faces
        .par_iter()
        .map(|face| face_centre_and_area(points, face))
        .unzip()
}

fn face_centre_and_area(points: &[Point3<f64>], face: &[usize]) -> (Point3<f64>, Vector3<f64>) {
    let n = face.len();
    if n == 3 {
        let (p0, p1, p2) = (points[face[0]], points[face[1]], points[face[2]]);
        let centre = Point3::from((p0.coords + p1.coords + p2.coords) / 3.0);
        return (centre, 0.5 * (p1 - p0).cross(&(p2 - p0)));
    }

    let mut estimate = Vector3::zeros();
    for &p in face {
        estimate += points[p].coords;
    }
    estimate /= n as f64;
    let estimate = Point3::from(estimate);

    let mut sum_n = Vector3::zeros();
    let mut sum_a = 0.0;
    let mut sum_ac = Vector3::zeros();

    for i in 0..n {
        let this = points[face[i]];
        let next = points[face[(i + 1) % n]];
        let c = this.coords + next.coords + estimate.coords;
        let tri_n = (next - this).cross(&(estimate - this));
        let a = tri_n.norm();

        sum_n += tri_n;
        sum_a += a;
        sum_ac += a * c;
    }

    if sum_a < VSMALL {
        (estimate, Vector3::zeros())
    } else {
        (Point3::from(sum_ac / (3.0 * sum_a)), 0.5 * sum_n)
    }
}

/// Cell centres and volumes by pyramid decomposition about the average of
/// each cell's face centres.
pub fn cell_centres_and_volumes(
    n_cells: usize,
    owner: &[usize],
    neighbour: &[usize],
    face_centres: &[Point3<f64>],
    face_areas: &[Vector3<f64>],
) -> (Vec<Point3<f64>>, Vec<f64>) {
    let mut estimate = vec![Vector3::<f64>::zeros(); n_cells];
    let mut n_cell_faces = vec![0usize; n_cells];

    for (face, &own) in owner.iter().enumerate() {
        estimate[own] += face_centres[face].coords;
        n_cell_faces[own] += 1;
    }
    for (face, &nei) in neighbour.iter().enumerate() {
        estimate[nei] += face_centres[face].coords;
        n_cell_faces[nei] += 1;
    }
    for (e, &count) in estimate.iter_mut().zip(n_cell_faces.iter()) {
        if count > 0 {
            *e /= count as f64;
        }
    }

    let mut centres = vec![Vector3::<f64>::zeros(); n_cells];
    let mut volumes = vec![0.0; n_cells];

    for (face, &own) in owner.iter().enumerate() {
        let cf = face_centres[face].coords;
        let pyr3_vol = face_areas[face].dot(&(cf - estimate[own]));
        let pc = 0.75 * cf + 0.25 * estimate[own];
        centres[own] += pyr3_vol * pc;
        volumes[own] += pyr3_vol;
    }
    for (face, &nei) in neighbour.iter().enumerate() {
        let cf = face_centres[face].coords;
        let pyr3_vol = face_areas[face].dot(&(estimate[nei] - cf));
        let pc = 0.75 * cf + 0.25 * estimate[nei];
        centres[nei] += pyr3_vol * pc;
        volumes[nei] += pyr3_vol;
    }

    let centres = centres
        .into_iter()
        .zip(volumes.iter())
        .zip(estimate)
        .map(|((c, &v), est)| {
            if v.abs() > VSMALL {
                Point3::from(c / v)
            } else {
                Point3::from(est)
            }
        })
        .collect();

    for v in volumes.iter_mut() {
        *v /= 3.0;
    }

    (centres, volumes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_cube_geometry() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        // All faces outward from the single cell.
        let faces = vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![3, 7, 6, 2],
            vec![0, 4, 7, 3],
            vec![1, 2, 6, 5],
        ];
        let owner = vec![0; 6];

        let (cf, sf) = face_centres_and_areas(&points, &faces);
        assert!((sf[0] - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-12);
        assert!((cf[1] - Point3::new(0.5, 0.5, 1.0)).norm() < 1e-12);

        let (cc, vol) = cell_centres_and_volumes(1, &owner, &[], &cf, &sf);
        assert!((vol[0] - 1.0).abs() < 1e-12);
        assert!((cc[0] - Point3::new(0.5, 0.5, 0.5)).norm() < 1e-12);
    }

    #[test]
    fn triangle_area_is_half_cross_product() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ];
        let (_, sf) = face_centres_and_areas(&points, &[vec![0, 1, 2]]);
        assert!((sf[0].z - 2.0).abs() < 1e-12);
    }
}
