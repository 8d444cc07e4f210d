//! Local vector kernels on `wide::f64x4` lanes with scalar tails.

use wide::f64x4;

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    let mut sum = f64x4::splat(0.0);
    let mut i = 0;
    let n = a.len();
    while i + 4 <= n {
        let va = f64x4::from(&a[i..i + 4]);
        let vb = f64x4::from(&b[i..i + 4]);
        sum += va * vb;
        i += 4;
    }
    let mut s = sum.reduce_add();
    while i < n {
        s += a[i] * b[i];
        i += 1;
    }
    s
}

pub fn sum_mag(a: &[f64]) -> f64 {
    let mut sum = f64x4::splat(0.0);
    let mut i = 0;
    let n = a.len();
    while i + 4 <= n {
        sum += f64x4::from(&a[i..i + 4]).abs();
        i += 4;
    }
    let mut s = sum.reduce_add();
    while i < n {
        s += a[i].abs();
        i += 1;
    }
    s
}

/// `r = b - r`.
pub fn sub_from(b: &[f64], r: &mut [f64]) {
    let n = b.len();
    let mut i = 0;
    while i + 4 <= n {
        let vb = f64x4::from(&b[i..i + 4]);
        let vr = f64x4::from(&r[i..i + 4]);
        let res: [f64; 4] = (vb - vr).into();
        r[i..i + 4].copy_from_slice(&res);
        i += 4;
    }
    while i < n {
        r[i] = b[i] - r[i];
        i += 1;
    }
}

/// `y += alpha * x`.
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    let n = x.len();
    let va = f64x4::splat(alpha);
    let mut i = 0;
    while i + 4 <= n {
        let vx = f64x4::from(&x[i..i + 4]);
        let vy = f64x4::from(&y[i..i + 4]);
        let res: [f64; 4] = (vy + va * vx).into();
        y[i..i + 4].copy_from_slice(&res);
        i += 4;
    }
    while i < n {
        y[i] += alpha * x[i];
        i += 1;
    }
}

/// `y = x + beta * y`.
pub fn xpby(x: &[f64], beta: f64, y: &mut [f64]) {
    let n = x.len();
    let vb = f64x4::splat(beta);
    let mut i = 0;
    while i + 4 <= n {
        let vx = f64x4::from(&x[i..i + 4]);
        let vy = f64x4::from(&y[i..i + 4]);
        let res: [f64; 4] = (vx + vb * vy).into();
        y[i..i + 4].copy_from_slice(&res);
        i += 4;
    }
    while i < n {
        y[i] = x[i] + beta * y[i];
        i += 1;
    }
}

/// `z = x - alpha * y`.
pub fn sub_scaled(x: &[f64], alpha: f64, y: &[f64], z: &mut [f64]) {
    let n = x.len();
    let va = f64x4::splat(alpha);
    let mut i = 0;
    while i + 4 <= n {
        let vx = f64x4::from(&x[i..i + 4]);
        let vy = f64x4::from(&y[i..i + 4]);
        let res: [f64; 4] = (vx - va * vy).into();
        z[i..i + 4].copy_from_slice(&res);
        i += 4;
    }
    while i < n {
        z[i] = x[i] - alpha * y[i];
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernels_match_scalar_loops() {
        let a: Vec<f64> = (0..7).map(|i| i as f64 - 3.0).collect();
        let b: Vec<f64> = (0..7).map(|i| 0.5 * i as f64).collect();
        let expected: f64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!((dot(&a, &b) - expected).abs() < 1e-12);
        assert_eq!(sum_mag(&a), 12.0);

        let mut y = b.clone();
        axpy(2.0, &a, &mut y);
        for i in 0..7 {
            assert_eq!(y[i], b[i] + 2.0 * a[i]);
        }

        let mut z = vec![0.0; 7];
        sub_scaled(&b, 0.5, &a, &mut z);
        assert_eq!(z[6], b[6] - 0.5 * a[6]);

        let mut r = a.clone();
        sub_from(&b, &mut r);
        assert_eq!(r[0], b[0] - a[0]);
    }
}
