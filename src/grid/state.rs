//! Geometry inputs of the streamfunction operator.
//!
//! All arrays are local to one process and carry two ghost layers on each
//! side: 2D fields have shape `(ni+4, nj+4)`, x-metrics length `ni+4`,
//! y-metrics length `nj+4`. The solver only reads them.

use faer::Mat;

use crate::error::{Result, StreamError};
use crate::grid::LocalDomain;

/// Per-level boundary flags on the padded grid, `true` at boundary/land cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelMask {
    ni: usize,
    nj: usize,
    nz: usize,
    data: Vec<bool>,
}

impl LevelMask {
    /// All levels open water.
    pub fn new(ni: usize, nj: usize, nz: usize) -> Self {
        Self { ni, nj, nz, data: vec![false; ni * nj * nz] }
    }

    pub fn from_fn<F>(ni: usize, nj: usize, nz: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> bool,
    {
        let mut mask = Self::new(ni, nj, nz);
        for k in 0..nz {
            for j in 0..nj {
                for i in 0..ni {
                    let idx = mask.offset(i, j, k);
                    mask.data[idx] = f(i, j, k);
                }
            }
        }
        mask
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.ni, self.nj, self.nz)
    }

    fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.ni * (j + self.nj * k)
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> bool {
        self.data[self.offset(i, j, k)]
    }

    pub fn set(&mut self, i: usize, j: usize, k: usize, value: bool) {
        let idx = self.offset(i, j, k);
        self.data[idx] = value;
    }

    /// Flag (or clear) every level of column (i, j).
    pub fn set_column(&mut self, i: usize, j: usize, value: bool) {
        for k in 0..self.nz {
            self.set(i, j, k, value);
        }
    }

    /// A column takes part in the elliptic problem only if no level is flagged.
    pub fn column_is_active(&self, i: usize, j: usize) -> bool {
        (0..self.nz).all(|k| !self.get(i, j, k))
    }
}

/// Depth-weighted transport coefficients, grid metrics and boundary mask.
#[derive(Debug, Clone)]
pub struct GridState {
    /// Inverse-depth weight on the x-faces (multiplies the east/west terms)
    pub hvr: Mat<f64>,
    /// Inverse-depth weight on the y-faces (multiplies the north/south terms)
    pub hur: Mat<f64>,
    pub dxt: Vec<f64>,
    pub dxu: Vec<f64>,
    pub dyt: Vec<f64>,
    pub dyu: Vec<f64>,
    /// cos(latitude) at T points
    pub cost: Vec<f64>,
    /// cos(latitude) at U points
    pub cosu: Vec<f64>,
    pub boundary_mask: LevelMask,
}

impl GridState {
    /// Unit coefficients and spacings, no land, on the padded local grid.
    pub fn uniform(domain: &LocalDomain, nz: usize) -> Self {
        let (pi, pj) = domain.padded_shape();
        Self {
            hvr: Mat::from_fn(pi, pj, |_, _| 1.0),
            hur: Mat::from_fn(pi, pj, |_, _| 1.0),
            dxt: vec![1.0; pi],
            dxu: vec![1.0; pi],
            dyt: vec![1.0; pj],
            dyu: vec![1.0; pj],
            cost: vec![1.0; pj],
            cosu: vec![1.0; pj],
            boundary_mask: LevelMask::new(pi, pj, nz),
        }
    }

    /// Whether padded column (i, j) is part of the elliptic problem.
    pub fn is_active(&self, i: usize, j: usize) -> bool {
        self.boundary_mask.column_is_active(i, j)
    }

    /// Check every array against the padded shape of `domain`.
    pub fn check_shape(&self, domain: &LocalDomain) -> Result<()> {
        let (pi, pj) = domain.padded_shape();
        for (name, m) in [("hvr", &self.hvr), ("hur", &self.hur)] {
            if (m.nrows(), m.ncols()) != (pi, pj) {
                return Err(StreamError::Shape(format!(
                    "{name} is {}x{}, expected {pi}x{pj}",
                    m.nrows(),
                    m.ncols()
                )));
            }
        }
        for (name, v, n) in [
            ("dxt", &self.dxt, pi),
            ("dxu", &self.dxu, pi),
            ("dyt", &self.dyt, pj),
            ("dyu", &self.dyu, pj),
            ("cost", &self.cost, pj),
            ("cosu", &self.cosu, pj),
        ] {
            if v.len() != n {
                return Err(StreamError::Shape(format!(
                    "{name} has length {}, expected {n}",
                    v.len()
                )));
            }
        }
        let (mi, mj, mz) = self.boundary_mask.shape();
        if (mi, mj) != (pi, pj) || mz == 0 {
            return Err(StreamError::Shape(format!(
                "boundary_mask is {mi}x{mj}x{mz}, expected {pi}x{pj}xN with N > 0"
            )));
        }
        Ok(())
    }
}
