//! End-to-end tests of the streamfunction facade on a single process.

mod common;

use approx::assert_relative_eq;
use common::{serial_solver, single, zeros, Ocean};
use faer::Mat;
use streamsolve::config::Settings;
use streamsolve::core::MatVec;
use streamsolve::error::StreamError;
use streamsolve::grid::{GridState, LocalDomain};
use streamsolve::parallel::ParallelContext;
use streamsolve::streamfunction::StreamfunctionSolver;

fn interior(field: &Mat<f64>, d: &LocalDomain) -> Vec<f64> {
    let mut v = Vec::with_capacity(d.len());
    for j in 2..d.nj() + 2 {
        for i in 2..d.ni() + 2 {
            v.push(field[(i, j)]);
        }
    }
    v
}

fn relative_residual(solver: &StreamfunctionSolver, x: &[f64], b: &[f64]) -> f64 {
    let mut ax = vec![0.0; b.len()];
    solver.engine().operator().matvec(x, &mut ax);
    let r = ax.iter().zip(b).map(|(a, b)| (a - b).powi(2)).sum::<f64>().sqrt();
    r / b.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[test]
fn four_by_four_unit_problem_converges() {
    let d = single(4, 4, false);
    let state = GridState::uniform(&d, 1);
    let settings = Settings::new(4, 4);
    let mut solver = serial_solver(&state, &settings);

    let inside = |k: usize| (2..6).contains(&k);
    let rhs = Mat::from_fn(8, 8, |i, j| if inside(i) && inside(j) { 1.0 } else { 0.0 });
    let x0 = zeros(&d);
    let (psi, stats) = solver.solve_with_stats(&state, &rhs, &x0, Some(&zeros(&d))).unwrap();

    assert!(stats.converged, "{stats:?}");
    assert!(stats.iterations <= settings.congr_max_iterations);
    assert_eq!((psi.nrows(), psi.ncols()), (8, 8));
    let rel = relative_residual(&solver, &interior(&psi, &d), &vec![1.0; 16]);
    assert!(rel <= settings.congr_epsilon, "relative residual {rel:e}");
    // the operator is negative definite: a positive source gives a negative streamfunction
    assert!(interior(&psi, &d).iter().all(|&v| v < 0.0));
    // ghost layers come from the masked rhs
    assert_eq!(psi[(0, 0)], 0.0);
    assert_eq!(psi[(7, 3)], 0.0);
}

#[test]
fn manufactured_solution_is_recovered() {
    let (nx, ny) = (16, 12);
    let d = single(nx, ny, false);
    let ocean = Ocean::new(nx, ny, false);
    let state = ocean.local_state(&d);
    let settings = Settings::new(nx, ny).with_tolerance(1e-10, 1000);
    let mut solver = serial_solver(&state, &settings);

    let exact: Vec<f64> = (0..ny)
        .flat_map(|j| {
            (0..nx).map(move |i| {
                let s = (std::f64::consts::PI * (i + 1) as f64 / (nx + 1) as f64).sin();
                s * (std::f64::consts::PI * (j + 1) as f64 / (ny + 1) as f64).sin()
            })
        })
        .collect();
    let mut b = vec![0.0; nx * ny];
    solver.engine().operator().matvec(&exact, &mut b);
    let mut rhs = zeros(&d);
    for j in 0..ny {
        for i in 0..nx {
            rhs[(i + 2, j + 2)] = b[i + j * nx];
        }
    }

    let psi = solver.solve(&state, &rhs, &zeros(&d), Some(&zeros(&d))).unwrap();
    let x = interior(&psi, &d);
    let rel = relative_residual(&solver, &x, &b);
    assert!(rel <= settings.congr_epsilon, "relative residual {rel:e}");
    for (xi, ei) in x.iter().zip(&exact) {
        assert_relative_eq!(xi, ei, epsilon = 1e-6);
    }
}

#[test]
fn land_cells_return_boundary_value_exactly() {
    let (nx, ny) = (10, 8);
    let d = single(nx, ny, true);
    let ocean = Ocean::new(nx, ny, true).with_land(&[(3, 3), (4, 3), (0, 5)]);
    let state = ocean.local_state(&d);
    let mut solver = serial_solver(&state, &Settings::new(nx, ny).with_cyclic_x(true));

    let rhs = ocean.local_field(&d, |gi, gj| 0.1 * (gi + 2 * gj) as f64);
    let boundary = ocean.local_field(&d, |gi, gj| {
        if ocean.is_land(gi, gj) { 7.5 + gi as f64 } else { 0.0 }
    });
    let psi = solver.solve(&state, &rhs, &zeros(&d), Some(&boundary)).unwrap();

    assert_eq!(psi[(3 + 2, 3 + 2)], 10.5);
    assert_eq!(psi[(4 + 2, 3 + 2)], 11.5);
    assert_eq!(psi[(2, 5 + 2)], 7.5);
}

#[test]
fn boundary_value_defaults_to_initial_guess() {
    let d = single(6, 6, false);
    let ocean = Ocean::new(6, 6, false).with_land(&[(2, 2)]);
    let state = ocean.local_state(&d);
    let mut solver = serial_solver(&state, &Settings::new(6, 6));
    let x0 = Mat::from_fn(10, 10, |i, j| (i * 10 + j) as f64);
    let psi = solver.solve(&state, &Mat::zeros(10, 10), &x0, None).unwrap();
    assert_eq!(psi[(4, 4)], 44.0);
    // the caller's guess is not touched
    assert_eq!(x0[(0, 0)], 0.0);
}

#[test]
fn repeated_solves_agree() {
    let d = single(12, 8, true);
    let ocean = Ocean::new(12, 8, true).with_land(&[(5, 4)]);
    let state = ocean.local_state(&d);
    let mut solver = serial_solver(&state, &Settings::new(12, 8).with_cyclic_x(true));
    let rhs = ocean.local_field(&d, |gi, gj| ((gi * 3 + gj) % 5) as f64 - 2.0);
    let x0 = ocean.local_field(&d, |gi, _| 0.01 * gi as f64);
    let first = solver.solve(&state, &rhs, &x0, None).unwrap();
    let second = solver.solve(&state, &rhs, &x0, None).unwrap();
    for j in 0..12 {
        for i in 0..16 {
            assert_relative_eq!(
                first[(i, j)],
                second[(i, j)],
                epsilon = 1e-12,
                max_relative = 1e-10
            );
        }
    }
}

#[test]
fn dirichlet_values_enter_through_the_ghost_cells() {
    // with zero source and a constant boundary value the solution is that constant
    let d = single(6, 5, false);
    let state = GridState::uniform(&d, 1);
    let mut solver = serial_solver(&state, &Settings::new(6, 5));
    let rhs = Mat::from_fn(10, 9, |i, j| {
        let ghost = i < 2 || i >= 8 || j < 2 || j >= 7;
        if ghost { 2.0 } else { 0.0 }
    });
    let psi = solver.solve(&state, &rhs, &zeros(&d), None).unwrap();
    for j in 2..7 {
        for i in 2..8 {
            assert_relative_eq!(psi[(i, j)], 2.0, epsilon = 1e-9);
        }
    }
}

#[test]
fn mismatched_shapes_are_rejected() {
    let d = single(4, 4, false);
    let state = GridState::uniform(&d, 1);
    let mut solver = serial_solver(&state, &Settings::new(4, 4));
    let err = solver.solve(&state, &Mat::zeros(8, 7), &zeros(&d), None).unwrap_err();
    assert!(matches!(err, StreamError::Shape(_)));
    let err = solver.solve(&state, &zeros(&d), &zeros(&d), Some(&Mat::zeros(4, 4))).unwrap_err();
    assert!(matches!(err, StreamError::Shape(_)));
}

#[test]
fn construction_errors_leave_nothing_behind() {
    let d = single(4, 4, false);
    let state = GridState::uniform(&d, 1);
    // uneven decomposition
    let err = StreamfunctionSolver::new(&state, &Settings::new(5, 4), &ParallelContext::serial());
    assert!(matches!(err, Err(StreamError::Shape(_)) | Err(StreamError::Configuration(_))));
    // process grid disagreeing with the context
    let settings = Settings::new(4, 4).with_num_proc(2, 1);
    assert!(matches!(
        StreamfunctionSolver::new(&state, &settings, &ParallelContext::serial()),
        Err(StreamError::Configuration(_))
    ));
    // non-finite coefficient
    let mut bad = state.clone();
    bad.hvr[(3, 3)] = f64::INFINITY;
    assert!(matches!(
        StreamfunctionSolver::new(&bad, &Settings::new(4, 4), &ParallelContext::serial()),
        Err(StreamError::NonFinite { field: "hvr", i: 3, j: 3 })
    ));
}
