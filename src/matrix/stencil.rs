//! Assembly of the 5-point streamfunction operator.
//!
//! For an owned cell with padded indices `(i, j)` the stencil weights are
//!
//! ```text
//! east   = hvr[i+1,j] / dxu[i] / dxt[i+1] / cosu[j]²
//! west   = hvr[i,  j] / dxu[i] / dxt[i]   / cosu[j]²
//! north  = hur[i,j+1] / dyu[j] / dyt[j+1] · cost[j+1] / cosu[j]
//! south  = hur[i,  j] / dyu[j] / dyt[j]   · cost[j]   / cosu[j]
//! center = −(east + west + north + south)
//! ```
//!
//! the curvilinear spherical-metric form of ∇·(H⁻¹∇ψ). Weights are multiplied
//! by the column activity; a center that ends up exactly zero is replaced by
//! one, turning land rows into identity equations.
//!
//! Rows are the owned cells (x fastest). Columns live in a ghosted local
//! numbering of `(ni+2) × (nj+2)` cells so that couplings to neighbouring
//! processes are resolved by a one-cell halo exchange at every product.
//! Entries that would reach past a ghosted global edge are dropped; the
//! boundary injector puts them back into the right-hand side.

use std::sync::Arc;

use crate::core::traits::MatVec;
use crate::error::{Result, StreamError};
use crate::grid::{halo_exchange, Direction, GridState, LocalDomain};
use crate::matrix::sparse::CsrMatrix;
use crate::parallel::Comm;

/// Stencil offsets in (center, east, west, north, south) order.
pub const STENCIL_OFFSETS: [(isize, isize); 5] = [(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)];

/// Off-diagonal weights at the global domain edges, used to fold Dirichlet
/// values into the right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryFactors {
    /// East weights of the last owned column, one per owned row (length nj)
    pub east: Vec<f64>,
    /// West weights of the first owned column (length nj)
    pub west: Vec<f64>,
    /// North weights of the last owned row (length ni)
    pub north: Vec<f64>,
    /// South weights of the first owned row (length ni)
    pub south: Vec<f64>,
}

/// The assembled, immutable operator of one process.
pub struct StencilOperator {
    domain: LocalDomain,
    matrix: CsrMatrix,
    comm: Arc<dyn Comm>,
}

impl std::fmt::Debug for StencilOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StencilOperator")
            .field("domain", &self.domain)
            .field("nnz", &self.matrix.nnz())
            .finish()
    }
}

impl StencilOperator {
    pub fn domain(&self) -> &LocalDomain {
        &self.domain
    }

    /// Local rows over ghosted columns.
    pub fn matrix(&self) -> &CsrMatrix {
        &self.matrix
    }

    pub fn comm(&self) -> &dyn Comm {
        self.comm.as_ref()
    }

    fn ghost_index(&self, gi: usize, gj: usize) -> usize {
        gi + gj * (self.domain.ni() + 2)
    }

    /// Weight of the coupling from owned cell (il, jl) to the cell at offset (di, dj).
    pub fn entry(&self, il: usize, jl: usize, di: isize, dj: isize) -> f64 {
        let row = self.domain.local_index(il, jl);
        let gi = (il as isize + 1 + di) as usize;
        let gj = (jl as isize + 1 + dj) as usize;
        self.matrix.get(row, self.ghost_index(gi, gj))
    }

    /// The couplings among owned cells only, with owned-cell column numbering.
    ///
    /// A periodic wrap onto this same process is kept (it is local); couplings
    /// to other processes are dropped. On a single process this is the whole
    /// operator.
    pub fn local_block(&self) -> CsrMatrix {
        let ni = self.domain.ni() as isize;
        let nj = self.domain.nj() as isize;
        let stride = self.domain.ni() + 2;
        let me = Some(self.domain.rank());
        let wrap_x = self.domain.neighbor(Direction::East) == me;
        let wrap_y = self.domain.neighbor(Direction::North) == me;
        self.matrix.filter_map_cols(self.domain.len(), |col| {
            let li = (col % stride) as isize - 1;
            let lj = (col / stride) as isize - 1;
            let li = wrap(li, ni, wrap_x)?;
            let lj = wrap(lj, nj, wrap_y)?;
            Some(self.domain.local_index(li, lj))
        })
    }
}

impl StencilOperator {
    /// Dense view of the whole operator. Single process only.
    pub fn to_dense(&self) -> Result<faer::Mat<f64>> {
        if self.comm.size() > 1 {
            return Err(StreamError::Unsupported("dense view of a distributed operator"));
        }
        Ok(self.local_block().to_dense())
    }
}

fn wrap(l: isize, n: isize, periodic_self: bool) -> Option<usize> {
    if (0..n).contains(&l) {
        Some(l as usize)
    } else if periodic_self {
        Some(l.rem_euclid(n) as usize)
    } else {
        None
    }
}

impl MatVec for StencilOperator {
    /// Halo exchange of `x`, then the local CSR product. Collective.
    fn matvec(&self, x: &[f64], y: &mut [f64]) {
        let (ni, nj) = (self.domain.ni(), self.domain.nj());
        assert_eq!(x.len(), ni * nj, "Input vector x has incorrect length");
        let (gx, gy) = (ni + 2, nj + 2);
        let mut ghosted = vec![0.0; gx * gy];
        for jl in 0..nj {
            let src = &x[jl * ni..(jl + 1) * ni];
            let start = 1 + (jl + 1) * gx;
            ghosted[start..start + ni].copy_from_slice(src);
        }
        halo_exchange(&mut ghosted, gx, gy, 1, &self.domain, self.comm.as_ref());
        self.matrix.matvec(&ghosted, y);
    }
}

fn check_finite_2d(
    name: &'static str,
    m: &faer::Mat<f64>,
    ri: std::ops::Range<usize>,
    rj: std::ops::Range<usize>,
) -> Result<()> {
    for j in rj {
        for i in ri.clone() {
            if !m[(i, j)].is_finite() {
                return Err(StreamError::NonFinite { field: name, i, j });
            }
        }
    }
    Ok(())
}

/// 1D fields report their own index as `i` for x-fields and `j` for y-fields.
fn check_finite_1d(
    name: &'static str,
    v: &[f64],
    r: std::ops::Range<usize>,
    along_x: bool,
) -> Result<()> {
    for k in r {
        if !v[k].is_finite() {
            let (i, j) = if along_x { (k, 0) } else { (0, k) };
            return Err(StreamError::NonFinite { field: name, i, j });
        }
    }
    Ok(())
}

fn check_inputs(state: &GridState, ni: usize, nj: usize) -> Result<()> {
    check_finite_2d("hvr", &state.hvr, 2..ni + 3, 2..nj + 2)?;
    check_finite_2d("hur", &state.hur, 2..ni + 2, 2..nj + 3)?;
    check_finite_1d("dxu", &state.dxu, 2..ni + 2, true)?;
    check_finite_1d("dxt", &state.dxt, 2..ni + 3, true)?;
    check_finite_1d("dyu", &state.dyu, 2..nj + 2, false)?;
    check_finite_1d("dyt", &state.dyt, 2..nj + 3, false)?;
    check_finite_1d("cost", &state.cost, 2..nj + 3, false)?;
    check_finite_1d("cosu", &state.cosu, 2..nj + 2, false)?;
    Ok(())
}

/// Masked stencil weights of every owned cell, one `ni·nj` array per offset.
fn stencil_coefficients(state: &GridState, domain: &LocalDomain) -> Result<[Vec<f64>; 5]> {
    let (ni, nj) = (domain.ni(), domain.nj());
    let mut cf: [Vec<f64>; 5] = std::array::from_fn(|_| vec![0.0; ni * nj]);
    for jl in 0..nj {
        for il in 0..ni {
            let (i, j) = (il + 2, jl + 2);
            let cosu2 = state.cosu[j] * state.cosu[j];
            let east = state.hvr[(i + 1, j)] / state.dxu[i] / state.dxt[i + 1] / cosu2;
            let west = state.hvr[(i, j)] / state.dxu[i] / state.dxt[i] / cosu2;
            let north = state.hur[(i, j + 1)] / state.dyu[j] / state.dyt[j + 1]
                * state.cost[j + 1]
                / state.cosu[j];
            let south =
                state.hur[(i, j)] / state.dyu[j] / state.dyt[j] * state.cost[j] / state.cosu[j];
            let weights = [("east", east), ("west", west), ("north", north), ("south", south)];
            for (name, value) in weights {
                if !value.is_finite() {
                    return Err(StreamError::NonFinite { field: name, i, j });
                }
            }

            let mask = if state.is_active(i, j) { 1.0 } else { 0.0 };
            let mut center = -(east + west + north + south) * mask;
            if center == 0.0 {
                center = 1.0;
            }
            let k = domain.local_index(il, jl);
            cf[0][k] = center;
            cf[1][k] = east * mask;
            cf[2][k] = west * mask;
            cf[3][k] = north * mask;
            cf[4][k] = south * mask;
        }
    }
    Ok(cf)
}

/// Assemble the operator of the process owning `domain`, together with the
/// boundary weights needed by the right-hand-side injection.
///
/// Fails with [`StreamError::Shape`] if the state does not match the padded
/// local grid, and with [`StreamError::NonFinite`] if a consumed input or a
/// resulting weight is NaN or infinite.
pub fn assemble_poisson_matrix(
    state: &GridState,
    domain: &LocalDomain,
    comm: Arc<dyn Comm>,
) -> Result<(StencilOperator, BoundaryFactors)> {
    state.check_shape(domain)?;
    let (ni, nj) = (domain.ni(), domain.nj());
    check_inputs(state, ni, nj)?;
    let cf = stencil_coefficients(state, domain)?;

    let stride = ni + 2;
    let (gi0, gj0) = (domain.i_range.start as isize, domain.j_range.start as isize);
    let (nx, ny) = (domain.nx as isize, domain.ny as isize);
    let mut triplets = Vec::with_capacity(5 * ni * nj);
    for jl in 0..nj {
        for il in 0..ni {
            let row = domain.local_index(il, jl);
            for (diag, &(di, dj)) in cf.iter().zip(STENCIL_OFFSETS.iter()) {
                let value = diag[row];
                let is_center = di == 0 && dj == 0;
                if value == 0.0 && !is_center {
                    continue;
                }
                let (gi, gj) = (gi0 + il as isize + di, gj0 + jl as isize + dj);
                if !domain.is_periodic_x() && !(0..nx).contains(&gi) {
                    continue;
                }
                if !domain.is_periodic_y() && !(0..ny).contains(&gj) {
                    continue;
                }
                let ci = (il as isize + 1 + di) as usize;
                let cj = (jl as isize + 1 + dj) as usize;
                triplets.push((row, ci + cj * stride, value));
            }
        }
    }
    let matrix = CsrMatrix::from_triplets(ni * nj, stride * (nj + 2), &triplets);

    let factors = BoundaryFactors {
        east: (0..nj).map(|jl| cf[1][domain.local_index(ni - 1, jl)]).collect(),
        west: (0..nj).map(|jl| cf[2][domain.local_index(0, jl)]).collect(),
        north: (0..ni).map(|il| cf[3][domain.local_index(il, nj - 1)]).collect(),
        south: (0..ni).map(|il| cf[4][domain.local_index(il, 0)]).collect(),
    };

    let identity_rows = cf[0].iter().filter(|&&c| c == 1.0).count();
    log::debug!(
        "assembled streamfunction operator on process {:?}: {} rows, {} nonzeros, {} identity rows",
        domain.proc_idx,
        ni * nj,
        matrix.nnz(),
        identity_rows
    );

    Ok((StencilOperator { domain: domain.clone(), matrix, comm }, factors))
}
