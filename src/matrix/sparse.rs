// SparseMatrix trait and the CSR storage used by the stencil operator

use faer::Mat;

/// A read‐only sparse matrix supporting y = A * x.
pub trait SparseMatrix {
    /// Number of rows.
    fn nrows(&self) -> usize;
    /// Number of columns.
    fn ncols(&self) -> usize;
    /// Compute y = A * x.  `x.len() == ncols()`, `y.len() == nrows()`.
    fn spmv(&self, x: &[f64], y: &mut [f64]);
}

/// Compressed sparse row matrix with sorted, unique column indices per row.
#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Build a CSR from raw row‐ptr, col‐idx, and values.
    ///
    /// Column indices within a row must be sorted and unique.
    pub fn from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<f64>,
    ) -> Self {
        assert_eq!(row_ptr.len(), nrows + 1);
        assert_eq!(col_idx.len(), values.len());
        debug_assert!(col_idx.iter().all(|&c| c < ncols));
        Self { nrows, ncols, row_ptr, col_idx, values }
    }

    /// Build from `(row, col, value)` entries; duplicates are summed.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut sorted = triplets.to_vec();
        sorted.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        let mut row_ptr = vec![0; nrows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(sorted.len());
        let mut values: Vec<f64> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;
        for &(i, j, v) in &sorted {
            assert!(i < nrows && j < ncols, "entry ({i}, {j}) outside {nrows}x{ncols}");
            if last == Some((i, j)) {
                if let Some(acc) = values.last_mut() {
                    *acc += v;
                }
                continue;
            }
            col_idx.push(j);
            values.push(v);
            row_ptr[i + 1] += 1;
            last = Some((i, j));
        }
        for i in 0..nrows {
            row_ptr[i + 1] += row_ptr[i];
        }
        Self { nrows, ncols, row_ptr, col_idx, values }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Column indices and values of row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col_idx[range.clone()], &self.values[range])
    }

    /// Entry (i, j), zero when not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (cols, vals) = self.row(i);
        match cols.binary_search(&j) {
            Ok(k) => vals[k],
            Err(_) => 0.0,
        }
    }

    /// Main diagonal (requires a square matrix).
    pub fn diagonal(&self) -> Vec<f64> {
        assert_eq!(self.nrows, self.ncols);
        (0..self.nrows).map(|i| self.get(i, i)).collect()
    }

    /// Dense copy, for small systems and verification.
    pub fn to_dense(&self) -> Mat<f64> {
        let mut dense = Mat::<f64>::zeros(self.nrows, self.ncols);
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                dense[(i, j)] = v;
            }
        }
        dense
    }

    /// Renumber columns through `map_col`, dropping entries it maps to `None`.
    /// Entries landing on the same new column are summed. Used to cut the
    /// owned block out of a ghosted operator.
    pub fn filter_map_cols<F>(&self, ncols: usize, mut map_col: F) -> Self
    where
        F: FnMut(usize) -> Option<usize>,
    {
        let mut row_ptr = vec![0; self.nrows + 1];
        let mut col_idx = Vec::with_capacity(self.nnz());
        let mut values = Vec::with_capacity(self.nnz());
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            let mut entries: Vec<(usize, f64)> = cols
                .iter()
                .zip(vals)
                .filter_map(|(&c, &v)| map_col(c).map(|nc| (nc, v)))
                .collect();
            entries.sort_by_key(|&(c, _)| c);
            let start = col_idx.len();
            for (c, v) in entries {
                if col_idx.len() > start && col_idx.last() == Some(&c) {
                    if let Some(acc) = values.last_mut() {
                        *acc += v;
                    }
                    continue;
                }
                col_idx.push(c);
                values.push(v);
            }
            row_ptr[i + 1] = col_idx.len();
        }
        Self::from_csr(self.nrows, ncols, row_ptr, col_idx, values)
    }

    /// max |A − Aᵀ| over stored entries (square matrices only).
    pub fn asymmetry(&self) -> f64 {
        assert_eq!(self.nrows, self.ncols);
        let mut worst: f64 = 0.0;
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                worst = worst.max((v - self.get(j, i)).abs());
            }
        }
        worst
    }
}

impl SparseMatrix for CsrMatrix {
    fn nrows(&self) -> usize {
        self.nrows
    }
    fn ncols(&self) -> usize {
        self.ncols
    }
    fn spmv(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.ncols);
        assert_eq!(y.len(), self.nrows);
        for (i, yi) in y.iter_mut().enumerate() {
            let (cols, vals) = self.row(i);
            *yi = cols.iter().zip(vals).map(|(&j, &v)| v * x[j]).sum();
        }
    }
}

impl crate::core::traits::MatVec for CsrMatrix {
    fn matvec(&self, x: &[f64], y: &mut [f64]) {
        #[cfg(feature = "rayon")]
        self.spmv_parallel(x, y);
        #[cfg(not(feature = "rayon"))]
        self.spmv(x, y);
    }
}

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[cfg(feature = "rayon")]
impl CsrMatrix {
    /// Parallel SpMV using Rayon
    pub fn spmv_parallel(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.ncols);
        assert_eq!(y.len(), self.nrows);
        y.par_iter_mut().enumerate().for_each(|(i, yi)| {
            let (cols, vals) = self.row(i);
            *yi = cols.iter().zip(vals).map(|(&j, &v)| v * x[j]).sum();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_spmv() {
        // 3×3 identity in CSR: row_ptr=[0,1,2,3], col_idx=[0,1,2], vals=[1,1,1]
        let m = CsrMatrix::from_csr(3, 3, vec![0, 1, 2, 3], vec![0, 1, 2], vec![1.0, 1.0, 1.0]);
        let x = vec![2.0, 3.0, 5.0];
        let mut y = vec![0.0; 3];
        m.spmv(&x, &mut y);
        assert_eq!(y, x);
    }

    #[test]
    fn simple_pattern() {
        // 2×3 matrix [[1,2,0],[0,3,4]]
        let m = CsrMatrix::from_csr(
            2,
            3,
            vec![0, 2, 4],
            vec![0, 1, 1, 2],
            vec![1.0, 2.0, 3.0, 4.0],
        );
        let x = vec![1.0, 1.0, 1.0];
        let mut y = vec![0.0; 2];
        m.spmv(&x, &mut y);
        assert_eq!(y, vec![3.0, 7.0]);
    }

    #[test]
    fn triplets_sum_duplicates_and_sort() {
        let triplets = [(1, 1, 2.0), (0, 1, 1.0), (0, 0, 4.0), (1, 1, 3.0)];
        let m = CsrMatrix::from_triplets(2, 2, &triplets);
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.get(1, 1), 5.0);
        assert_eq!(m.row(0).0, &[0, 1]);
        assert_eq!(m.get(1, 0), 0.0);
        assert_eq!(m.diagonal(), vec![4.0, 5.0]);
        assert_eq!(m.asymmetry(), 1.0);
    }

    #[test]
    fn filter_drops_and_renumbers_columns() {
        let m = CsrMatrix::from_triplets(1, 4, &[(0, 0, 1.0), (0, 2, 2.0), (0, 3, 3.0)]);
        let sub = m.filter_map_cols(2, |c| match c {
            3 => Some(0),
            0 => Some(1),
            _ => None,
        });
        assert_eq!(sub.row(0).0, &[0, 1]);
        assert_eq!(sub.row(0).1, &[3.0, 1.0]);
    }
}
