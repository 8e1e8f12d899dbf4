//! Rectangular decomposition of the global grid over a process grid.
//!
//! The global `nx × ny` grid is cut into `px × py` equal blocks. Each process
//! owns one block and is identified by its logical coordinate `proc_idx`;
//! ranks are numbered x-fastest (`rank = ix + iy·px`), the natural ordering of
//! a distributed structured array.
//!
//! Uneven splits are rejected: an `nx` that is not a multiple of `px` (or `ny`
//! of `py`) is a configuration error instead of a silently truncated range.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{Result, StreamError};

/// Behaviour of an axis at the global domain edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryType {
    /// The axis wraps around
    Periodic,
    /// Ghost cells hold externally supplied (boundary) values
    Ghosted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    East,
    West,
    North,
    South,
}

/// Fixed decomposition of an `nx × ny` grid over a `px × py` process grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition {
    nx: usize,
    ny: usize,
    num_proc: (usize, usize),
    boundary_type: (BoundaryType, BoundaryType),
}

impl Decomposition {
    pub fn new(
        nx: usize,
        ny: usize,
        num_proc: (usize, usize),
        enable_cyclic_x: bool,
    ) -> Result<Self> {
        let (px, py) = num_proc;
        if nx == 0 || ny == 0 {
            return Err(StreamError::Configuration(format!("empty grid {nx}x{ny}")));
        }
        if px == 0 || py == 0 {
            return Err(StreamError::Configuration(format!("empty process grid {px}x{py}")));
        }
        if nx % px != 0 {
            return Err(StreamError::Configuration(format!(
                "nx = {nx} is not divisible by the number of processes along x ({px})"
            )));
        }
        if ny % py != 0 {
            return Err(StreamError::Configuration(format!(
                "ny = {ny} is not divisible by the number of processes along y ({py})"
            )));
        }
        let boundary_x = if enable_cyclic_x {
            BoundaryType::Periodic
        } else {
            BoundaryType::Ghosted
        };
        Ok(Self {
            nx,
            ny,
            num_proc,
            boundary_type: (boundary_x, BoundaryType::Ghosted),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.nx, settings.ny, settings.num_proc, settings.enable_cyclic_x)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    pub fn num_proc(&self) -> (usize, usize) {
        self.num_proc
    }

    pub fn boundary_type(&self) -> (BoundaryType, BoundaryType) {
        self.boundary_type
    }

    /// Block sizes per process along each axis.
    pub fn ownership_ranges(&self) -> (Vec<usize>, Vec<usize>) {
        let (px, py) = self.num_proc;
        (vec![self.nx / px; px], vec![self.ny / py; py])
    }

    pub fn ranges_x(&self) -> Vec<Range<usize>> {
        blocks(self.nx, self.num_proc.0)
    }

    pub fn ranges_y(&self) -> Vec<Range<usize>> {
        blocks(self.ny, self.num_proc.1)
    }

    /// The sub-domain owned by the process at `proc_idx`.
    pub fn local(&self, proc_idx: (usize, usize)) -> Result<LocalDomain> {
        let (px, py) = self.num_proc;
        let (ix, iy) = proc_idx;
        if ix >= px || iy >= py {
            return Err(StreamError::Configuration(format!(
                "process coordinate ({ix}, {iy}) outside process grid {px}x{py}"
            )));
        }
        let bx = self.nx / px;
        let by = self.ny / py;
        Ok(LocalDomain {
            nx: self.nx,
            ny: self.ny,
            num_proc: self.num_proc,
            proc_idx,
            i_range: ix * bx..(ix + 1) * bx,
            j_range: iy * by..(iy + 1) * by,
            boundary_type: self.boundary_type,
        })
    }

    pub fn local_for_rank(&self, rank: usize) -> Result<LocalDomain> {
        let px = self.num_proc.0;
        self.local((rank % px, rank / px))
    }
}

fn blocks(n: usize, parts: usize) -> Vec<Range<usize>> {
    let size = n / parts;
    (0..parts).map(|p| p * size..(p + 1) * size).collect()
}

/// The block of the global grid owned by one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDomain {
    pub nx: usize,
    pub ny: usize,
    pub num_proc: (usize, usize),
    pub proc_idx: (usize, usize),
    /// Owned global x indices
    pub i_range: Range<usize>,
    /// Owned global y indices
    pub j_range: Range<usize>,
    pub boundary_type: (BoundaryType, BoundaryType),
}

impl LocalDomain {
    pub fn ni(&self) -> usize {
        self.i_range.len()
    }

    pub fn nj(&self) -> usize {
        self.j_range.len()
    }

    /// Shape of a local array with two ghost layers on every side.
    pub fn padded_shape(&self) -> (usize, usize) {
        (self.ni() + 4, self.nj() + 4)
    }

    /// Number of owned cells.
    pub fn len(&self) -> usize {
        self.ni() * self.nj()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_periodic_x(&self) -> bool {
        self.boundary_type.0 == BoundaryType::Periodic
    }

    pub fn is_periodic_y(&self) -> bool {
        self.boundary_type.1 == BoundaryType::Periodic
    }

    pub fn is_first_x(&self) -> bool {
        self.proc_idx.0 == 0
    }

    pub fn is_last_x(&self) -> bool {
        self.proc_idx.0 == self.num_proc.0 - 1
    }

    pub fn is_first_y(&self) -> bool {
        self.proc_idx.1 == 0
    }

    pub fn is_last_y(&self) -> bool {
        self.proc_idx.1 == self.num_proc.1 - 1
    }

    pub fn rank(&self) -> usize {
        self.proc_idx.0 + self.proc_idx.1 * self.num_proc.0
    }

    /// Rank of the neighbouring process, wrapping on periodic axes.
    pub fn neighbor(&self, direction: Direction) -> Option<usize> {
        let (px, py) = self.num_proc;
        let (ix, iy) = self.proc_idx;
        let coord = match direction {
            Direction::East if ix + 1 < px => Some((ix + 1, iy)),
            Direction::East if self.is_periodic_x() => Some((0, iy)),
            Direction::West if ix > 0 => Some((ix - 1, iy)),
            Direction::West if self.is_periodic_x() => Some((px - 1, iy)),
            Direction::North if iy + 1 < py => Some((ix, iy + 1)),
            Direction::North if self.is_periodic_y() => Some((ix, 0)),
            Direction::South if iy > 0 => Some((ix, iy - 1)),
            Direction::South if self.is_periodic_y() => Some((ix, py - 1)),
            _ => None,
        };
        coord.map(|(cx, cy)| cx + cy * px)
    }

    /// Position of owned cell (il, jl) in a local vector, x fastest.
    pub fn local_index(&self, il: usize, jl: usize) -> usize {
        il + jl * self.ni()
    }

    /// Natural global row number of owned cell (il, jl).
    pub fn global_index(&self, il: usize, jl: usize) -> usize {
        (self.i_range.start + il) + (self.j_range.start + jl) * self.nx
    }
}
