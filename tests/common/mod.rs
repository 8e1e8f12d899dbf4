//! Shared fixtures for the integration tests: padded local fields cut out of
//! analytic global fields, and an in-process communicator that runs every
//! rank of a process grid on its own thread.

#![allow(dead_code)]

use std::f64::consts::PI;
use std::sync::mpsc::{channel, Receiver, Sender};

use faer::Mat;
use streamsolve::config::Settings;
use streamsolve::grid::{Decomposition, GridState, LevelMask, LocalDomain};
use streamsolve::parallel::{Comm, ParallelContext};
use streamsolve::streamfunction::StreamfunctionSolver;

/// Global description of a test ocean: coefficient and metric functions of
/// the global padded index (`-2 ..= n+1`) and a land predicate.
#[derive(Clone)]
pub struct Ocean {
    pub nx: usize,
    pub ny: usize,
    pub cyclic: bool,
    pub land: Vec<(usize, usize)>,
}

impl Ocean {
    pub fn new(nx: usize, ny: usize, cyclic: bool) -> Self {
        Self { nx, ny, cyclic, land: Vec::new() }
    }

    pub fn with_land(mut self, cells: &[(usize, usize)]) -> Self {
        self.land.extend_from_slice(cells);
        self
    }

    fn phase_x(&self, gi: isize) -> f64 {
        2.0 * PI * gi as f64 / self.nx as f64
    }

    fn phase_y(&self, gj: isize) -> f64 {
        PI * gj as f64 / self.ny as f64
    }

    pub fn hvr(&self, gi: isize, gj: isize) -> f64 {
        1.0 + 0.3 * self.phase_x(gi).sin() * self.phase_y(gj).cos()
    }

    pub fn hur(&self, gi: isize, gj: isize) -> f64 {
        1.2 + 0.4 * self.phase_x(gi).cos() * self.phase_y(gj).sin()
    }

    pub fn is_land(&self, gi: isize, gj: isize) -> bool {
        self.land.iter().any(|&(i, j)| i as isize == gi && j as isize == gj)
    }

    /// Local state of `domain`, two ghost layers included.
    pub fn local_state(&self, domain: &LocalDomain) -> GridState {
        let (pi, pj) = domain.padded_shape();
        let gi0 = domain.i_range.start as isize - 2;
        let gj0 = domain.j_range.start as isize - 2;
        let gx = |i: usize| gi0 + i as isize;
        let gy = |j: usize| gj0 + j as isize;
        GridState {
            hvr: Mat::from_fn(pi, pj, |i, j| self.hvr(gx(i), gy(j))),
            hur: Mat::from_fn(pi, pj, |i, j| self.hur(gx(i), gy(j))),
            dxt: (0..pi).map(|i| 1.0 + 0.05 * self.phase_x(gx(i)).cos()).collect(),
            dxu: (0..pi).map(|i| 1.0 + 0.05 * self.phase_x(gx(i)).sin()).collect(),
            dyt: (0..pj).map(|j| 0.9 + 0.01 * gy(j) as f64).collect(),
            dyu: (0..pj).map(|j| 0.95 + 0.01 * gy(j) as f64).collect(),
            cost: (0..pj).map(|j| (0.2 + 0.05 * gy(j) as f64).cos()).collect(),
            cosu: (0..pj).map(|j| (0.22 + 0.05 * gy(j) as f64).cos()).collect(),
            boundary_mask: LevelMask::from_fn(pi, pj, 3, |i, j, k| {
                k == 0 && self.is_land(gx(i), gy(j))
            }),
        }
    }

    /// Padded local copy of a global field `f(gi, gj)`.
    pub fn local_field<F: Fn(isize, isize) -> f64>(&self, domain: &LocalDomain, f: F) -> Mat<f64> {
        let (pi, pj) = domain.padded_shape();
        let gi0 = domain.i_range.start as isize - 2;
        let gj0 = domain.j_range.start as isize - 2;
        Mat::from_fn(pi, pj, |i, j| f(gi0 + i as isize, gj0 + j as isize))
    }
}

/// The whole grid as one process's domain.
pub fn single(nx: usize, ny: usize, cyclic: bool) -> LocalDomain {
    Decomposition::new(nx, ny, (1, 1), cyclic).unwrap().local((0, 0)).unwrap()
}

/// Domain of the process at `proc_idx` for the grid of `settings`.
pub fn local_domain(settings: &Settings, proc_idx: (usize, usize)) -> LocalDomain {
    Decomposition::from_settings(settings).unwrap().local(proc_idx).unwrap()
}

/// Single-process solver.
pub fn serial_solver(state: &GridState, settings: &Settings) -> StreamfunctionSolver {
    StreamfunctionSolver::new(state, settings, &ParallelContext::serial()).unwrap()
}

/// Zero-filled padded field.
pub fn zeros(domain: &LocalDomain) -> Mat<f64> {
    let (pi, pj) = domain.padded_shape();
    Mat::zeros(pi, pj)
}

/// Communicator backed by one channel per ordered pair of ranks.
///
/// Messages between two ranks arrive in the order they were sent, and every
/// rank issues the same sequence of collective calls, so sends and receives
/// match up without tags.
pub struct ChannelComm {
    rank: usize,
    size: usize,
    to: Vec<Option<Sender<Vec<f64>>>>,
    from: Vec<Option<Receiver<Vec<f64>>>>,
}

impl ChannelComm {
    /// One communicator per rank, to be moved into the rank's thread.
    pub fn world(size: usize) -> Vec<ChannelComm> {
        let mut to: Vec<Vec<Option<Sender<Vec<f64>>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut from: Vec<Vec<Option<Receiver<Vec<f64>>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for src in 0..size {
            for dst in 0..size {
                let (tx, rx) = channel();
                to[src][dst] = Some(tx);
                from[dst][src] = Some(rx);
            }
        }
        to.into_iter()
            .zip(from)
            .enumerate()
            .map(|(rank, (to, from))| ChannelComm { rank, size, to, from })
            .collect()
    }

    fn send(&self, dest: usize, data: Vec<f64>) {
        self.to[dest].as_ref().unwrap().send(data).unwrap();
    }

    fn recv(&self, source: usize) -> Vec<f64> {
        self.from[source].as_ref().unwrap().recv().unwrap()
    }
}

impl Comm for ChannelComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_reduce(&self, x: f64) -> f64 {
        for dest in 0..self.size {
            self.send(dest, vec![x]);
        }
        // summed in rank order so every rank gets the same bits
        (0..self.size).map(|src| self.recv(src)[0]).sum()
    }

    fn sendrecv(
        &self,
        send: &[f64],
        dest: Option<usize>,
        recv: &mut [f64],
        source: Option<usize>,
    ) {
        if let Some(dest) = dest {
            self.send(dest, send.to_vec());
        }
        if let Some(source) = source {
            recv.copy_from_slice(&self.recv(source));
        }
    }
}
