//! Dirichlet boundary values folded into the right-hand side.
//!
//! The operator drops couplings that reach past a ghosted global edge. The
//! corresponding known values sit in the first ghost layer of the
//! right-hand-side field and are moved to the edge cells here:
//! `rhs[edge] -= rhs[ghost] · factor`.

use faer::Mat;

use crate::grid::LocalDomain;
use crate::matrix::BoundaryFactors;

/// Patch a copy of the padded `rhs` with the boundary contributions of the
/// global edges this process owns. `rhs` itself is left untouched.
///
/// The x-axis is handled only when it is not periodic; the y-axis always.
pub fn inject_dirichlet(
    rhs: &Mat<f64>,
    domain: &LocalDomain,
    factors: &BoundaryFactors,
    enable_cyclic_x: bool,
) -> Mat<f64> {
    let mut out = rhs.clone();
    let (ni, nj) = (domain.ni(), domain.nj());

    if !enable_cyclic_x {
        if domain.is_last_x() {
            for (jl, &f) in factors.east.iter().enumerate().take(nj) {
                let j = jl + 2;
                out[(ni + 1, j)] -= rhs[(ni + 2, j)] * f;
            }
        }
        if domain.is_first_x() {
            for (jl, &f) in factors.west.iter().enumerate().take(nj) {
                let j = jl + 2;
                out[(2, j)] -= rhs[(1, j)] * f;
            }
        }
    }

    if domain.is_last_y() {
        for (il, &f) in factors.north.iter().enumerate().take(ni) {
            let i = il + 2;
            out[(i, nj + 1)] -= rhs[(i, nj + 2)] * f;
        }
    }
    if domain.is_first_y() {
        for (il, &f) in factors.south.iter().enumerate().take(ni) {
            let i = il + 2;
            out[(i, 2)] -= rhs[(i, 1)] * f;
        }
    }
    out
}
