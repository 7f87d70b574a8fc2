use rayon::prelude::*;

use crate::grid::{kind_at, CellKind, GridDims};

/// Outcome of one pressure solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    pub iterations: usize,
    /// Relative residual norm at exit.
    pub residual: f64,
    pub converged: bool,
}

impl SolveReport {
    fn trivial() -> Self {
        Self { iterations: 0, residual: 0.0, converged: true }
    }
}

/// Apply the implicit pressure stencil: `out = A * p`.
///
/// Row for a fluid cell: `(6 - empty_neighbors) * p_c - sum of fluid
/// neighbor pressures`. Solid faces (including the domain walls) keep the
/// cell on the diagonal and contribute no neighbor term; Empty faces drop
/// off the diagonal. Non-fluid rows are identically zero, which keeps the
/// operator symmetric over the fluid subspace.
pub fn apply_stencil(cell: &[CellKind], dims: GridDims, p: &[f64], out: &mut [f64]) {
    let (nx, ny) = (dims.nx, dims.ny);
    out.par_iter_mut().enumerate().for_each(|(idx, o)| {
        if cell[idx] != CellKind::Fluid {
            *o = 0.0;
            return;
        }
        let i = (idx % nx) as i64;
        let j = ((idx / nx) % ny) as i64;
        let k = (idx / (nx * ny)) as i64;

        let mut diag = 6.0;
        let mut off = 0.0;
        for (di, dj, dk) in [
            (-1i64, 0i64, 0i64),
            (1, 0, 0),
            (0, -1, 0),
            (0, 1, 0),
            (0, 0, -1),
            (0, 0, 1),
        ] {
            match kind_at(cell, dims, i + di, j + dj, k + dk) {
                CellKind::Fluid => {
                    off += p[dims.cell_index(
                        (i + di) as usize,
                        (j + dj) as usize,
                        (k + dk) as usize,
                    )];
                }
                CellKind::Solid => {}
                CellKind::Empty => diag -= 1.0,
            }
        }
        *o = diag * p[idx] - off;
    });
}

/// Solve `A x = b` over the fluid cells with conjugate gradient, matrix-free.
///
/// `x` is taken as the output only; it is cleared on entry. A numerically
/// zero right-hand side returns immediately without iterating. Hitting the
/// iteration cap is not an error: the best available `x` is kept and the
/// report carries `converged = false`.
pub fn solve(
    cell: &[CellKind],
    dims: GridDims,
    b: &[f64],
    x: &mut [f64],
    tolerance: f64,
    max_iterations: usize,
) -> SolveReport {
    let n = dims.cell_count();
    debug_assert_eq!(b.len(), n);
    debug_assert_eq!(x.len(), n);

    x.fill(0.0);

    let b_norm = dot(b, b).sqrt();
    if b_norm == 0.0 {
        return SolveReport::trivial();
    }

    // x = 0, so r = b.
    let mut r = b.to_vec();
    let mut p = b.to_vec();
    let mut ap = vec![0.0; n];
    let mut rr = dot(&r, &r);

    let mut iterations = 0;
    while iterations < max_iterations {
        let rel = rr.sqrt() / b_norm;
        if rel <= tolerance {
            return SolveReport { iterations, residual: rel, converged: true };
        }

        apply_stencil(cell, dims, &p, &mut ap);
        let p_ap = dot(&p, &ap);
        if p_ap <= 0.0 {
            // Singular direction (all-Neumann region); keep the best x so far.
            break;
        }
        let alpha = rr / p_ap;
        axpy(x, alpha, &p);
        axpy(&mut r, -alpha, &ap);

        let rr_new = dot(&r, &r);
        let beta = rr_new / rr;
        for (pi, &ri) in p.iter_mut().zip(r.iter()) {
            *pi = ri + beta * *pi;
        }
        rr = rr_new;
        iterations += 1;
    }

    let rel = rr.sqrt() / b_norm;
    SolveReport { iterations, residual: rel, converged: rel <= tolerance }
}

/// Serial inner product. Kept sequential so a solve is reproducible for
/// identical inputs regardless of thread count.
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// `y += alpha * x`.
fn axpy(y: &mut [f64], alpha: f64, x: &[f64]) {
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_fluid(dims: GridDims) -> Vec<CellKind> {
        vec![CellKind::Fluid; dims.cell_count()]
    }

    #[test]
    fn test_zero_rhs_returns_zero_in_zero_iterations() {
        let dims = GridDims { nx: 4, ny: 4, nz: 4, dx: 1.0 };
        let cell = all_fluid(dims);
        let b = vec![0.0; dims.cell_count()];
        let mut x = vec![1.0; dims.cell_count()];
        let report = solve(&cell, dims, &b, &mut x, 1e-8, 100);
        assert_eq!(report.iterations, 0);
        assert!(report.converged);
        assert!(x.iter().all(|&v| v == 0.0), "solution should be zero");
    }

    #[test]
    fn test_single_fluid_cell_analytic_solution() {
        // One fluid cell walled in by solid: the row is 6 * p = b.
        let dims = GridDims { nx: 3, ny: 3, nz: 3, dx: 1.0 };
        let mut cell = vec![CellKind::Solid; dims.cell_count()];
        let center = dims.cell_index(1, 1, 1);
        cell[center] = CellKind::Fluid;

        let mut b = vec![0.0; dims.cell_count()];
        b[center] = 12.0;
        let mut x = vec![0.0; dims.cell_count()];
        let report = solve(&cell, dims, &b, &mut x, 1e-10, 100);

        assert!(report.converged, "report: {report:?}");
        assert!(report.iterations <= 1, "one unknown should take one iteration");
        assert!((x[center] - 2.0).abs() < 1e-9, "got {}", x[center]);
    }

    #[test]
    fn test_cavity_with_point_source_converges_under_cap() {
        let dims = GridDims { nx: 10, ny: 10, nz: 10, dx: 1.0 };
        let cell = all_fluid(dims);
        let mut b = vec![0.0; dims.cell_count()];
        b[dims.cell_index(4, 5, 6)] = 1.0;
        let mut x = vec![0.0; dims.cell_count()];
        let report = solve(&cell, dims, &b, &mut x, 1e-6, 50);

        assert!(report.converged, "report: {report:?}");
        assert!(report.iterations < 50, "took {} iterations", report.iterations);
        assert!(report.residual <= 1e-6, "residual {}", report.residual);
    }

    #[test]
    fn test_iteration_cap_returns_best_effort() {
        let dims = GridDims { nx: 10, ny: 10, nz: 10, dx: 1.0 };
        let cell = all_fluid(dims);
        let mut b = vec![0.0; dims.cell_count()];
        b[dims.cell_index(5, 5, 5)] = 1.0;
        let mut x = vec![0.0; dims.cell_count()];
        let report = solve(&cell, dims, &b, &mut x, 1e-14, 3);

        assert!(!report.converged);
        assert_eq!(report.iterations, 3);
        assert!(x.iter().any(|&v| v != 0.0), "partial solution should be kept");
    }

    #[test]
    fn test_residual_shrinks_with_more_iterations() {
        let dims = GridDims { nx: 8, ny: 8, nz: 8, dx: 1.0 };
        let cell = all_fluid(dims);
        let mut b = vec![0.0; dims.cell_count()];
        b[dims.cell_index(3, 3, 3)] = 1.0;
        b[dims.cell_index(6, 2, 5)] = -0.5;

        let mut x = vec![0.0; dims.cell_count()];
        let short = solve(&cell, dims, &b, &mut x, 0.0, 5);
        let long = solve(&cell, dims, &b, &mut x, 0.0, 20);
        assert!(
            long.residual < short.residual,
            "5 iters: {}, 20 iters: {}",
            short.residual,
            long.residual
        );
    }

    #[test]
    fn test_stencil_is_symmetric_with_mixed_cells() {
        // y . A x == x . A y for arbitrary vectors supported on fluid cells.
        let dims = GridDims { nx: 5, ny: 4, nz: 3, dx: 1.0 };
        let mut cell = all_fluid(dims);
        cell[dims.cell_index(2, 1, 1)] = CellKind::Solid;
        cell[dims.cell_index(3, 2, 1)] = CellKind::Empty;
        cell[dims.cell_index(0, 0, 2)] = CellKind::Empty;

        let n = dims.cell_count();
        let mut x = vec![0.0; n];
        let mut y = vec![0.0; n];
        // Deterministic pseudo-random fill, zeroed outside the fluid region.
        let mut s = 42u64;
        for idx in 0..n {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            x[idx] = ((s >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            y[idx] = ((s >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            if cell[idx] != CellKind::Fluid {
                x[idx] = 0.0;
                y[idx] = 0.0;
            }
        }
        let mut ax = vec![0.0; n];
        let mut ay = vec![0.0; n];
        apply_stencil(&cell, dims, &x, &mut ax);
        apply_stencil(&cell, dims, &y, &mut ay);
        let yax = dot(&y, &ax);
        let xay = dot(&x, &ay);
        assert!((yax - xay).abs() < 1e-10, "y.Ax = {yax}, x.Ay = {xay}");
    }

    #[test]
    fn test_stencil_diagonal_accounts_for_empty_faces() {
        let dims = GridDims { nx: 3, ny: 3, nz: 3, dx: 1.0 };
        let mut cell = vec![CellKind::Solid; dims.cell_count()];
        let center = dims.cell_index(1, 1, 1);
        cell[center] = CellKind::Fluid;
        cell[dims.cell_index(2, 1, 1)] = CellKind::Empty;

        let mut p = vec![0.0; dims.cell_count()];
        p[center] = 1.0;
        let mut out = vec![0.0; dims.cell_count()];
        apply_stencil(&cell, dims, &p, &mut out);
        // 5 solid faces stay on the diagonal, the empty face drops off.
        assert!((out[center] - 5.0).abs() < 1e-12, "got {}", out[center]);
    }
}
