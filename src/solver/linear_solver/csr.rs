/// Compressed sparse row matrix with column-sorted rows and a cached
/// position of every diagonal entry.
#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix {
    pub values: Vec<f64>,
    pub col_indices: Vec<usize>,
    pub row_offsets: Vec<usize>,
    pub n_rows: usize,
    /// Index into `values` of each row's diagonal entry.
    pub diag_index: Vec<usize>,
}

impl CsrMatrix {
    /// Builds a square matrix; duplicate entries are summed and every row
    /// gets a (possibly zero) diagonal entry.
    pub fn from_triplets(n_rows: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut row_counts = vec![1usize; n_rows];
        for &(r, _, _) in triplets {
            row_counts[r] += 1;
        }

        let mut row_offsets = vec![0; n_rows + 1];
        for i in 0..n_rows {
            row_offsets[i + 1] = row_offsets[i] + row_counts[i];
        }

        let nnz = row_offsets[n_rows];
        let mut values = vec![0.0; nnz];
        let mut col_indices = vec![0; nnz];
        let mut current = row_offsets.clone();

        for i in 0..n_rows {
            col_indices[current[i]] = i;
            current[i] += 1;
        }
        for &(r, c, v) in triplets {
            let idx = current[r];
            values[idx] = v;
            col_indices[idx] = c;
            current[r] += 1;
        }

        // Sort each row by column and merge duplicates.
        let mut out_values = Vec::with_capacity(nnz);
        let mut out_cols = Vec::with_capacity(nnz);
        let mut out_offsets = vec![0; n_rows + 1];
        let mut diag_index = vec![0; n_rows];
        let mut row: Vec<(usize, f64)> = Vec::new();
        for i in 0..n_rows {
            row.clear();
            row.extend((row_offsets[i]..row_offsets[i + 1]).map(|j| (col_indices[j], values[j])));
            row.sort_by_key(|&(c, _)| c);
            for &(c, v) in &row {
                if out_cols.len() > out_offsets[i] && out_cols.last() == Some(&c) {
                    if let Some(last) = out_values.last_mut() {
                        *last += v;
                    }
                } else {
                    if c == i {
                        diag_index[i] = out_cols.len();
                    }
                    out_cols.push(c);
                    out_values.push(v);
                }
            }
            out_offsets[i + 1] = out_cols.len();
        }

        Self {
            values: out_values,
            col_indices: out_cols,
            row_offsets: out_offsets,
            n_rows,
            diag_index,
        }
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn diag(&self, row: usize) -> f64 {
        self.values[self.diag_index[row]]
    }

    pub fn diagonal(&self) -> Vec<f64> {
        self.diag_index.iter().map(|&j| self.values[j]).collect()
    }

    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        (self.row_offsets[row]..self.row_offsets[row + 1]).map(move |j| (self.col_indices[j], self.values[j]))
    }

    /// Entry `(row, col)`, zero if absent.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let cols = &self.col_indices[self.row_offsets[row]..self.row_offsets[row + 1]];
        match cols.binary_search(&col) {
            Ok(k) => self.values[self.row_offsets[row] + k],
            Err(_) => 0.0,
        }
    }

    pub fn mat_vec_mul(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n_rows);
        assert_eq!(y.len(), self.n_rows);

        for i in 0..self.n_rows {
            let mut sum = 0.0;
            for j in self.row_offsets[i]..self.row_offsets[i + 1] {
                sum += self.values[j] * x[self.col_indices[j]];
            }
            y[i] = sum;
        }
    }

    /// Row sums (`A . 1`).
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.n_rows)
            .map(|i| self.values[self.row_offsets[i]..self.row_offsets[i + 1]].iter().sum())
            .collect()
    }

    pub fn is_symmetric(&self, tol: f64) -> bool {
        (0..self.n_rows).all(|i| {
            self.row(i)
                .filter(|&(c, _)| c > i)
                .all(|(c, v)| (self.get(c, i) - v).abs() <= tol * v.abs().max(1.0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_triplets_sorts_and_merges() {
        let m = CsrMatrix::from_triplets(
            3,
            &[(0, 2, 1.0), (0, 0, 4.0), (1, 1, 2.0), (1, 1, 1.0), (2, 0, -1.0)],
        );
        assert_eq!(m.row(0).collect::<Vec<_>>(), vec![(0, 4.0), (2, 1.0)]);
        assert_eq!(m.diag(1), 3.0);
        // Row 2 had no diagonal triplet.
        assert_eq!(m.diag(2), 0.0);
        assert_eq!(m.get(2, 0), -1.0);
        assert_eq!(m.get(2, 1), 0.0);
    }

    #[test]
    fn test_mat_vec_mul() {
        let m = CsrMatrix::from_triplets(2, &[(0, 0, 2.0), (0, 1, -1.0), (1, 0, -1.0), (1, 1, 2.0)]);
        let mut y = vec![0.0; 2];
        m.mat_vec_mul(&[1.0, 2.0], &mut y);
        assert_eq!(y, vec![0.0, 3.0]);
        assert!(m.is_symmetric(1e-12));
        assert_eq!(m.row_sums(), vec![1.0, 1.0]);
    }
}
