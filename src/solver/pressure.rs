use rayon::prelude::*;

use crate::grid::{CellKind, Grid, GridDims};

/// Discrete divergence of one fluid cell: net outward face flux divided by
/// dx. Flux through solid faces (including the domain walls) is zero no
/// matter what the face array holds.
pub fn divergence_at(grid: &Grid, i: usize, j: usize, k: usize) -> f64 {
    let dims = grid.dims();
    let (i_, j_, k_) = (i as i64, j as i64, k as i64);

    let mut flux = 0.0;
    if grid.kind_at(i_ - 1, j_, k_) != CellKind::Solid {
        flux -= grid.u[dims.u_index(i, j, k)];
    }
    if grid.kind_at(i_ + 1, j_, k_) != CellKind::Solid {
        flux += grid.u[dims.u_index(i + 1, j, k)];
    }
    if grid.kind_at(i_, j_ - 1, k_) != CellKind::Solid {
        flux -= grid.v[dims.v_index(i, j, k)];
    }
    if grid.kind_at(i_, j_ + 1, k_) != CellKind::Solid {
        flux += grid.v[dims.v_index(i, j + 1, k)];
    }
    if grid.kind_at(i_, j_, k_ - 1) != CellKind::Solid {
        flux -= grid.w[dims.w_index(i, j, k)];
    }
    if grid.kind_at(i_, j_, k_ + 1) != CellKind::Solid {
        flux += grid.w[dims.w_index(i, j, k + 1)];
    }
    flux / dims.dx
}

/// Fill `grid.divergence` for fluid cells (zero elsewhere) and return the
/// largest magnitude seen. Runs before the pressure solve; the result also
/// feeds the step diagnostics.
pub fn compute_divergence(grid: &mut Grid) -> f64 {
    let dims = grid.dims();
    let mut div = std::mem::take(&mut grid.divergence);
    {
        let grid: &Grid = grid;
        div.par_iter_mut().enumerate().for_each(|(idx, d)| {
            if grid.cell[idx] != CellKind::Fluid {
                *d = 0.0;
                return;
            }
            let i = idx % dims.nx;
            let j = (idx / dims.nx) % dims.ny;
            let k = idx / (dims.nx * dims.ny);
            *d = divergence_at(grid, i, j, k);
        });
    }
    grid.divergence = div;
    grid.divergence.iter().fold(0.0f64, |m, d| m.max(d.abs()))
}

/// Right-hand side for the pressure system: `-div * dx^2` per fluid cell.
/// The dx^2 factor matches the unscaled stencil rows, so the face correction
/// `(p_hi - p_lo) / dx` cancels the divergence on interior cells.
pub fn build_rhs(grid: &Grid, rhs: &mut [f64]) {
    let dx2 = grid.dx() * grid.dx();
    for ((r, &d), &c) in rhs.iter_mut().zip(grid.divergence.iter()).zip(grid.cell.iter()) {
        *r = if c == CellKind::Fluid { -d * dx2 } else { 0.0 };
    }
}

/// Subtract the discrete pressure gradient from the face velocities.
///
/// Faces between two fluid cells get the full correction. Faces against an
/// Empty cell keep their velocity (the zero-gradient ghost makes the
/// correction vanish). Faces touching a Solid cell are zeroed: no flow
/// through solids.
pub fn apply_pressure_gradient(grid: &mut Grid) {
    let dims = grid.dims();
    let inv_dx = 1.0 / dims.dx;
    let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);

    let cell = &grid.cell;
    let pressure = &grid.pressure;

    let correct = |lo: Option<usize>, hi: Option<usize>, face: &mut f64| {
        let lo_kind = lo.map_or(CellKind::Solid, |c| cell[c]);
        let hi_kind = hi.map_or(CellKind::Solid, |c| cell[c]);
        if lo_kind == CellKind::Solid || hi_kind == CellKind::Solid {
            *face = 0.0;
        } else if let (Some(lo), Some(hi), CellKind::Fluid, CellKind::Fluid) =
            (lo, hi, lo_kind, hi_kind)
        {
            *face -= (pressure[hi] - pressure[lo]) * inv_dx;
        }
        // Fluid-Empty faces: zero-gradient ghost, nothing to subtract.
    };

    let u = &mut grid.u;
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..=nx {
                let lo = (i > 0).then(|| dims.cell_index(i - 1, j, k));
                let hi = (i < nx).then(|| dims.cell_index(i, j, k));
                correct(lo, hi, &mut u[dims.u_index(i, j, k)]);
            }
        }
    }
    let v = &mut grid.v;
    for k in 0..nz {
        for j in 0..=ny {
            for i in 0..nx {
                let lo = (j > 0).then(|| dims.cell_index(i, j - 1, k));
                let hi = (j < ny).then(|| dims.cell_index(i, j, k));
                correct(lo, hi, &mut v[dims.v_index(i, j, k)]);
            }
        }
    }
    let w = &mut grid.w;
    for k in 0..=nz {
        for j in 0..ny {
            for i in 0..nx {
                let lo = (k > 0).then(|| dims.cell_index(i, j, k - 1));
                let hi = (k < nz).then(|| dims.cell_index(i, j, k));
                correct(lo, hi, &mut w[dims.w_index(i, j, k)]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn test_divergence_of_outflow_cell() {
        let mut grid = Grid::new(4, 4, 4, 0.5).unwrap();
        let dims = grid.dims();
        // Pure expansion out of cell (1,1,1).
        grid.u[dims.u_index(1, 1, 1)] = -1.0;
        grid.u[dims.u_index(2, 1, 1)] = 1.0;
        grid.v[dims.v_index(1, 1, 1)] = -1.0;
        grid.v[dims.v_index(1, 2, 1)] = 1.0;
        grid.w[dims.w_index(1, 1, 1)] = -1.0;
        grid.w[dims.w_index(1, 1, 2)] = 1.0;
        let d = divergence_at(&grid, 1, 1, 1);
        assert!((d - 12.0).abs() < 1e-12, "6 unit fluxes / dx 0.5: got {d}");
    }

    #[test]
    fn test_divergence_ignores_solid_faces() {
        let mut grid = Grid::new(4, 4, 4, 1.0).unwrap();
        let dims = grid.dims();
        grid.set_cell_kind(0, 1, 1, CellKind::Solid);
        // Garbage on the face into the solid cell must not count.
        grid.u[dims.u_index(1, 1, 1)] = 99.0;
        grid.u[dims.u_index(2, 1, 1)] = 1.0;
        let d = divergence_at(&grid, 1, 1, 1);
        assert!((d - 1.0).abs() < 1e-12, "got {d}");
    }

    #[test]
    fn test_compute_divergence_zeroes_non_fluid_cells() {
        let mut grid = Grid::new(3, 3, 3, 1.0).unwrap();
        grid.set_cell_kind(1, 1, 1, CellKind::Solid);
        grid.u.fill(1.0);
        grid.divergence.fill(7.0);
        compute_divergence(&mut grid);
        let dims = grid.dims();
        assert_eq!(grid.divergence[dims.cell_index(1, 1, 1)], 0.0);
    }

    #[test]
    fn test_rhs_is_negated_scaled_divergence() {
        let mut grid = Grid::new(3, 3, 3, 2.0).unwrap();
        let dims = grid.dims();
        grid.u[dims.u_index(2, 1, 1)] = 4.0;
        compute_divergence(&mut grid);
        let mut rhs = vec![0.0; dims.cell_count()];
        build_rhs(&grid, &mut rhs);
        let c = dims.cell_index(1, 1, 1);
        // div = 4 / 2 = 2, rhs = -2 * dx^2 = -8.
        assert!((rhs[c] + 8.0).abs() < 1e-12, "got {}", rhs[c]);
    }

    #[test]
    fn test_gradient_zeroes_solid_faces() {
        let mut grid = Grid::new(3, 3, 3, 1.0).unwrap();
        grid.set_cell_kind(1, 1, 1, CellKind::Solid);
        grid.u.fill(1.0);
        grid.v.fill(1.0);
        grid.w.fill(1.0);
        apply_pressure_gradient(&mut grid);
        let dims = grid.dims();
        assert_eq!(grid.u[dims.u_index(1, 1, 1)], 0.0, "face into solid");
        assert_eq!(grid.u[dims.u_index(2, 1, 1)], 0.0, "face out of solid");
        assert_eq!(grid.u[dims.u_index(0, 0, 0)], 0.0, "domain wall face");
    }

    #[test]
    fn test_gradient_subtracts_between_fluid_cells() {
        let mut grid = Grid::new(3, 1, 1, 1.0).unwrap();
        let dims = grid.dims();
        grid.pressure[dims.cell_index(0, 0, 0)] = 1.0;
        grid.pressure[dims.cell_index(1, 0, 0)] = 3.0;
        apply_pressure_gradient(&mut grid);
        // u face between cells 0 and 1: -(3 - 1) / 1 = -2.
        assert!((grid.u[dims.u_index(1, 0, 0)] + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_gradient_leaves_fluid_empty_faces_alone() {
        let mut grid = Grid::new(3, 1, 1, 1.0).unwrap();
        let dims = grid.dims();
        grid.set_cell_kind(2, 0, 0, CellKind::Empty);
        grid.pressure[dims.cell_index(1, 0, 0)] = 5.0;
        grid.u[dims.u_index(2, 0, 0)] = 0.75;
        apply_pressure_gradient(&mut grid);
        assert_eq!(grid.u[dims.u_index(2, 0, 0)], 0.75, "fluid-empty face must keep its velocity");
    }
}
