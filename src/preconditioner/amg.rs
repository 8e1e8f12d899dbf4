//! Aggregation-based algebraic multigrid (AMG) preconditioner.
//!
//! The hierarchy is built from the local operator block only:
//!
//! 1. strength of connection: `j` is a strong neighbour of `i` when
//!    `|a_ij| ≥ θ·sqrt(|a_ii·a_jj|)`, both `a_ij` and `a_ji` are stored and the
//!    two diagonals share a sign. Identity rows (land cells) therefore have no
//!    strong neighbours and stay singleton aggregates.
//! 2. double pairwise aggregation: pair every node with its strongest free
//!    neighbour, then pair the pairs on the induced coarse graph.
//! 3. piecewise-constant interpolation `P`, restriction `R = Pᵀ` and Galerkin
//!    coarse operator `A_c = R·A·P`.
//!
//! One application is a V-cycle with `sweeps` pre- and post-smoothing steps
//! of the chosen relaxation. The coarsest level is factored densely with faer.

use std::collections::BTreeMap;

use faer::linalg::solvers::PartialPivLu;

use crate::config::{PcOptions, RelaxType};
use crate::error::{Result, StreamError};
use crate::matrix::{CsrMatrix, SparseMatrix};
use crate::preconditioner::{Jacobi, Preconditioner, Sor};
use crate::solver::direct_lu::{factor_dense, lu_solve_in_place};

/// Strong neighbours of every node, with their strength.
type StrengthGraph = Vec<Vec<(usize, f64)>>;

pub struct Amg {
    opts: PcOptions,
    levels: Vec<AmgLevel>,
    coarse: Option<CoarseSolve>,
}

struct AmgLevel {
    a: CsrMatrix,
    /// Aggregate of every fine node; defines P (one 1 per row) and R = Pᵀ
    aggregates: Vec<usize>,
    n_coarse: usize,
    smoother: Box<dyn Preconditioner>,
}

struct CoarseSolve {
    lu: PartialPivLu<f64>,
    n: usize,
}

impl Amg {
    /// Empty hierarchy; built by `setup`.
    pub fn new(opts: PcOptions) -> Self {
        Self { opts, levels: Vec::new(), coarse: None }
    }

    /// Number of levels including the coarsest.
    pub fn num_levels(&self) -> usize {
        self.levels.len() + usize::from(self.coarse.is_some())
    }

    /// Row counts from the finest to the coarsest level.
    pub fn level_sizes(&self) -> Vec<usize> {
        self.levels
            .iter()
            .map(|l| l.a.nrows())
            .chain(self.coarse.as_ref().map(|c| c.n))
            .collect()
    }

    fn build_smoother(&self, a: &CsrMatrix) -> Result<Box<dyn Preconditioner>> {
        let mut smoother: Box<dyn Preconditioner> = match self.opts.relax {
            RelaxType::SorJacobi => Box::new(Sor::symmetric(self.opts.omega, 1)),
            RelaxType::Jacobi => Box::new(Jacobi::with_damping(self.opts.omega)),
        };
        smoother.setup(a)?;
        Ok(smoother)
    }

    /// `sweeps` steps of z ← z + S(r − A z).
    fn smooth(&self, level: &AmgLevel, r: &[f64], z: &mut [f64]) -> Result<()> {
        let n = r.len();
        let mut res = vec![0.0; n];
        let mut corr = vec![0.0; n];
        for _ in 0..self.opts.sweeps {
            residual(&level.a, r, z, &mut res);
            level.smoother.apply(&res, &mut corr)?;
            z.iter_mut().zip(&corr).for_each(|(zi, ci)| *zi += ci);
        }
        Ok(())
    }

    fn v_cycle(&self, depth: usize, r: &[f64], z: &mut [f64]) -> Result<()> {
        let Some(level) = self.levels.get(depth) else {
            return self.solve_coarse(r, z);
        };
        z.fill(0.0);
        self.smooth(level, r, z)?;

        let mut res = vec![0.0; r.len()];
        residual(&level.a, r, z, &mut res);
        let mut r_coarse = vec![0.0; level.n_coarse];
        for (&agg, &ri) in level.aggregates.iter().zip(&res) {
            r_coarse[agg] += ri;
        }
        let mut z_coarse = vec![0.0; level.n_coarse];
        self.v_cycle(depth + 1, &r_coarse, &mut z_coarse)?;
        for (zi, &agg) in z.iter_mut().zip(&level.aggregates) {
            *zi += z_coarse[agg];
        }

        self.smooth(level, r, z)
    }

    fn solve_coarse(&self, r: &[f64], z: &mut [f64]) -> Result<()> {
        let coarse = self
            .coarse
            .as_ref()
            .ok_or(StreamError::Unsupported("AMG applied before setup"))?;
        z.copy_from_slice(r);
        lu_solve_in_place(&coarse.lu, z);
        Ok(())
    }
}

impl Preconditioner for Amg {
    fn setup(&mut self, a: &CsrMatrix) -> Result<()> {
        self.levels.clear();
        let mut current = a.clone();
        while self.levels.len() + 1 < self.opts.max_levels.max(1) {
            let n = current.nrows();
            if n <= self.opts.coarse_size {
                break;
            }
            let graph = strength_graph(&current, self.opts.strength_threshold);
            let (aggregates, n_coarse) = double_pairwise_aggregation(&graph);
            if n_coarse == n {
                break;
            }
            let coarse = galerkin_product(&current, &aggregates, n_coarse);
            let smoother = self.build_smoother(&current)?;
            self.levels.push(AmgLevel { a: current, aggregates, n_coarse, smoother });
            current = coarse;
        }
        let n = current.nrows();
        let lu = factor_dense(&current.to_dense())?;
        self.coarse = Some(CoarseSolve { lu, n });
        log::debug!(
            "AMG hierarchy with {} levels, sizes {:?}",
            self.num_levels(),
            self.level_sizes()
        );
        Ok(())
    }

    fn apply(&self, r: &[f64], z: &mut [f64]) -> Result<()> {
        self.v_cycle(0, r, z)
    }
}

fn residual(a: &CsrMatrix, b: &[f64], x: &[f64], out: &mut [f64]) {
    a.spmv(x, out);
    out.iter_mut().zip(b).for_each(|(o, bi)| *o = bi - *o);
}

fn strength_graph(a: &CsrMatrix, theta: f64) -> StrengthGraph {
    let diag = a.diagonal();
    (0..a.nrows())
        .map(|i| {
            let (cols, vals) = a.row(i);
            cols.iter()
                .zip(vals)
                .filter_map(|(&j, &v)| {
                    if j == i || v == 0.0 || a.get(j, i) == 0.0 {
                        return None;
                    }
                    let prod = diag[i] * diag[j];
                    if prod <= 0.0 {
                        return None;
                    }
                    let strength = v.abs() / prod.sqrt();
                    (strength >= theta).then_some((j, strength))
                })
                .collect()
        })
        .collect()
}

/// Pair each node with its strongest unvisited neighbour; the rest become
/// singletons. Returns the aggregate of every node and the aggregate count.
fn pairwise_aggregation(graph: &StrengthGraph) -> (Vec<usize>, usize) {
    let n = graph.len();
    let mut aggregates = vec![usize::MAX; n];
    let mut aggregate_id = 0;
    for i in 0..n {
        if aggregates[i] != usize::MAX {
            continue;
        }
        let strongest = graph[i]
            .iter()
            .filter(|&&(j, _)| j != i && aggregates[j] == usize::MAX)
            .fold(None, |best: Option<(usize, f64)>, &(j, s)| match best {
                Some((_, bs)) if bs >= s => best,
                _ => Some((j, s)),
            });
        aggregates[i] = aggregate_id;
        if let Some((j, _)) = strongest {
            aggregates[j] = aggregate_id;
        }
        aggregate_id += 1;
    }
    (aggregates, aggregate_id)
}

/// Strong connections between aggregates, strengths summed.
fn build_coarse_graph(
    graph: &StrengthGraph,
    aggregates: &[usize],
    n_coarse: usize,
) -> StrengthGraph {
    let mut rows: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n_coarse];
    for (i, edges) in graph.iter().enumerate() {
        for &(j, s) in edges {
            let (ai, aj) = (aggregates[i], aggregates[j]);
            if ai != aj {
                *rows[ai].entry(aj).or_insert(0.0) += s;
            }
        }
    }
    rows.into_iter().map(|row| row.into_iter().collect()).collect()
}

/// Two rounds of pairwise aggregation; aggregates hold up to four nodes.
fn double_pairwise_aggregation(graph: &StrengthGraph) -> (Vec<usize>, usize) {
    let (first, n_first) = pairwise_aggregation(graph);
    let coarse_graph = build_coarse_graph(graph, &first, n_first);
    let (second, n_second) = pairwise_aggregation(&coarse_graph);
    (first.iter().map(|&agg| second[agg]).collect(), n_second)
}

/// R·A·P for piecewise-constant P.
fn galerkin_product(a: &CsrMatrix, aggregates: &[usize], n_coarse: usize) -> CsrMatrix {
    let mut triplets = Vec::with_capacity(a.nnz());
    for i in 0..a.nrows() {
        let (cols, vals) = a.row(i);
        for (&j, &v) in cols.iter().zip(vals) {
            triplets.push((aggregates[i], aggregates[j], v));
        }
    }
    CsrMatrix::from_triplets(n_coarse, n_coarse, &triplets)
}
