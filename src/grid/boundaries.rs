//! Ghost-cell filling: halo exchange between neighbouring processes and
//! periodic wrap along cyclic axes.
//!
//! Buffers are flat and x-fastest (`buf[i + j * nx_total]`). At a ghosted
//! global edge the ghost cells are left as the caller supplied them: they carry
//! boundary values, not copies of the interior.

use std::ops::Range;

use faer::Mat;

use crate::grid::{Direction, LocalDomain};
use crate::parallel::Comm;

/// Fill the `width`-deep halo of `buf` from the neighbouring processes.
///
/// `buf` covers the owned block plus `width` ghost layers on each side, so
/// `nx_total = ni + 2·width` and `ny_total = nj + 2·width`. The x-direction is
/// exchanged first over the interior rows, then the y-direction over full
/// rows, which also fills the corners. Collective: every process must call it.
pub fn halo_exchange(
    buf: &mut [f64],
    nx_total: usize,
    ny_total: usize,
    width: usize,
    domain: &LocalDomain,
    comm: &dyn Comm,
) {
    assert_eq!(buf.len(), nx_total * ny_total, "halo buffer has wrong size");
    assert!(nx_total >= 2 * width && ny_total >= 2 * width, "buffer smaller than its halo");
    let east = domain.neighbor(Direction::East);
    let west = domain.neighbor(Direction::West);
    let north = domain.neighbor(Direction::North);
    let south = domain.neighbor(Direction::South);
    let inner_y = width..ny_total - width;
    let all_x = 0..nx_total;

    // eastward: our east strip → east neighbour's west halo
    shift(
        buf,
        nx_total,
        comm,
        east,
        west,
        (nx_total - 2 * width..nx_total - width, inner_y.clone()),
        (0..width, inner_y.clone()),
    );
    // westward
    shift(
        buf,
        nx_total,
        comm,
        west,
        east,
        (width..2 * width, inner_y.clone()),
        (nx_total - width..nx_total, inner_y),
    );
    // northward
    shift(
        buf,
        nx_total,
        comm,
        north,
        south,
        (all_x.clone(), ny_total - 2 * width..ny_total - width),
        (all_x.clone(), 0..width),
    );
    // southward
    shift(
        buf,
        nx_total,
        comm,
        south,
        north,
        (all_x.clone(), width..2 * width),
        (all_x, ny_total - width..ny_total),
    );
}

type Region = (Range<usize>, Range<usize>);

fn shift(
    buf: &mut [f64],
    stride: usize,
    comm: &dyn Comm,
    dest: Option<usize>,
    source: Option<usize>,
    send_region: Region,
    recv_region: Region,
) {
    if dest.is_none() && source.is_none() {
        return;
    }
    let send: Vec<f64> = if dest.is_some() {
        pack(buf, stride, &send_region)
    } else {
        Vec::new()
    };
    let mut recv = if source.is_some() {
        vec![0.0; recv_region.0.len() * recv_region.1.len()]
    } else {
        Vec::new()
    };
    comm.sendrecv(&send, dest, &mut recv, source);
    if source.is_some() {
        unpack(buf, stride, &recv_region, &recv);
    }
}

fn pack(buf: &[f64], stride: usize, (ri, rj): &Region) -> Vec<f64> {
    let mut out = Vec::with_capacity(ri.len() * rj.len());
    for j in rj.clone() {
        for i in ri.clone() {
            out.push(buf[i + j * stride]);
        }
    }
    out
}

fn unpack(buf: &mut [f64], stride: usize, (ri, rj): &Region, data: &[f64]) {
    let mut k = 0;
    for j in rj.clone() {
        for i in ri.clone() {
            buf[i + j * stride] = data[k];
            k += 1;
        }
    }
}

/// Fill the two ghost layers of a padded local field: halo exchange with the
/// neighbouring processes, periodic wrap along a cyclic x-axis. Returns a new
/// array; `field` is not modified.
pub fn enforce_boundaries(field: &Mat<f64>, domain: &LocalDomain, comm: &dyn Comm) -> Mat<f64> {
    let (pi, pj) = (field.nrows(), field.ncols());
    let mut flat = to_flat(field);
    halo_exchange(&mut flat, pi, pj, 2, domain, comm);
    Mat::from_fn(pi, pj, |i, j| flat[i + j * pi])
}

/// x-fastest copy of a 2D field.
pub fn to_flat(field: &Mat<f64>) -> Vec<f64> {
    let (pi, pj) = (field.nrows(), field.ncols());
    let mut flat = Vec::with_capacity(pi * pj);
    for j in 0..pj {
        for i in 0..pi {
            flat.push(field[(i, j)]);
        }
    }
    flat
}
