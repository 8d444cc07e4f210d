use super::csr::CsrMatrix;
use super::SolveError;
use std::str::FromStr;

/// `w = M^-1 r` for some approximation `M` of the local matrix. Interfaces
/// are ignored.
pub trait Preconditioner {
    fn precondition(&self, r: &[f64], w: &mut [f64]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreconditionerKind {
    #[default]
    None,
    Diagonal,
    /// Diagonal incomplete Cholesky, symmetric matrices.
    Dic,
    /// Diagonal incomplete LU.
    Dilu,
}

impl PreconditionerKind {
    pub const NAMES: [&'static str; 4] = ["none", "diagonal", "DIC", "DILU"];

    /// Prefix in the solver name, e.g. `DIC` in `DICPCG`.
    pub fn prefix(self) -> &'static str {
        match self {
            PreconditionerKind::None => "",
            PreconditionerKind::Diagonal => "diagonal",
            PreconditionerKind::Dic => "DIC",
            PreconditionerKind::Dilu => "DILU",
        }
    }

    pub fn build(self, matrix: &CsrMatrix) -> Result<Box<dyn Preconditioner + '_>, SolveError> {
        Ok(match self {
            PreconditionerKind::None => Box::new(Identity),
            PreconditionerKind::Diagonal => Box::new(Jacobi::new(matrix)?),
            PreconditionerKind::Dic | PreconditionerKind::Dilu => Box::new(DiagonalIlu::new(matrix)?),
        })
    }
}

impl FromStr for PreconditionerKind {
    type Err = SolveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(PreconditionerKind::None),
            "diagonal" => Ok(PreconditionerKind::Diagonal),
            "DIC" => Ok(PreconditionerKind::Dic),
            "DILU" => Ok(PreconditionerKind::Dilu),
            other => Err(SolveError::Unknown {
                what: "preconditioner",
                name: other.to_string(),
                valid: Self::NAMES.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

struct Identity;

impl Preconditioner for Identity {
    fn precondition(&self, r: &[f64], w: &mut [f64]) {
        w.copy_from_slice(r);
    }
}

struct Jacobi {
    r_diag: Vec<f64>,
}

impl Jacobi {
    fn new(matrix: &CsrMatrix) -> Result<Self, SolveError> {
        let r_diag = matrix
            .diagonal()
            .into_iter()
            .enumerate()
            .map(|(row, d)| if d == 0.0 { Err(SolveError::ZeroDiagonal { row }) } else { Ok(1.0 / d) })
            .collect::<Result<_, _>>()?;
        Ok(Self { r_diag })
    }
}

impl Preconditioner for Jacobi {
    fn precondition(&self, r: &[f64], w: &mut [f64]) {
        for ((wi, &ri), &d) in w.iter_mut().zip(r).zip(&self.r_diag) {
            *wi = ri * d;
        }
    }
}

/// Zero-fill incomplete factorisation that only modifies the diagonal:
/// `D_i = a_ii - sum_{j<i} a_ij a_ji / D_j`. For symmetric matrices this is
/// DIC, otherwise DILU.
struct DiagonalIlu<'m> {
    matrix: &'m CsrMatrix,
    r_diag: Vec<f64>,
}

impl<'m> DiagonalIlu<'m> {
    fn new(matrix: &'m CsrMatrix) -> Result<Self, SolveError> {
        let n = matrix.n_rows;
        let mut d = matrix.diagonal();
        for i in 0..n {
            for (j, a_ij) in matrix.row(i) {
                if j < i {
                    d[i] -= a_ij * matrix.get(j, i) / d[j];
                }
            }
            if d[i] == 0.0 {
                return Err(SolveError::ZeroDiagonal { row: i });
            }
        }
        Ok(Self {
            matrix,
            r_diag: d.into_iter().map(|v| 1.0 / v).collect(),
        })
    }
}

impl Preconditioner for DiagonalIlu<'_> {
    fn precondition(&self, r: &[f64], w: &mut [f64]) {
        let n = self.matrix.n_rows;
        for i in 0..n {
            let mut sum = r[i];
            for (j, a_ij) in self.matrix.row(i) {
                if j < i {
                    sum -= a_ij * w[j];
                }
            }
            w[i] = self.r_diag[i] * sum;
        }
        for i in (0..n).rev() {
            let mut sum = 0.0;
            for (j, a_ij) in self.matrix.row(i) {
                if j > i {
                    sum += a_ij * w[j];
                }
            }
            w[i] -= self.r_diag[i] * sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dilu_is_exact_for_bidiagonal_matrices() {
        // Lower bidiagonal: the incomplete factorisation is complete.
        let m = CsrMatrix::from_triplets(3, &[(0, 0, 2.0), (1, 0, -1.0), (1, 1, 2.0), (2, 1, -1.0), (2, 2, 2.0)]);
        let p = PreconditionerKind::Dilu.build(&m).unwrap();
        let x = [1.0, 2.0, 3.0];
        let mut b = vec![0.0; 3];
        m.mat_vec_mul(&x, &mut b);
        let mut w = vec![0.0; 3];
        p.precondition(&b, &mut w);
        for (wi, xi) in w.iter().zip(&x) {
            assert!((wi - xi).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_diagonal_is_reported() {
        let m = CsrMatrix::from_triplets(2, &[(0, 1, 1.0), (1, 1, 1.0)]);
        assert!(matches!(
            PreconditionerKind::Diagonal.build(&m),
            Err(SolveError::ZeroDiagonal { row: 0 })
        ));
    }
}
