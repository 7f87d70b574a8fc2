use crate::grid::{CellKind, Grid};

use super::pressure::divergence_at;

/// Largest divergence magnitude over the fluid cells.
pub fn max_divergence(grid: &Grid) -> f64 {
    fold_fluid_divergence(grid, 0.0, |m, d| m.max(d.abs()))
}

/// L2 norm of the divergence over the fluid cells.
pub fn divergence_l2(grid: &Grid) -> f64 {
    fold_fluid_divergence(grid, 0.0, |s, d| s + d * d).sqrt()
}

fn fold_fluid_divergence(grid: &Grid, init: f64, f: impl Fn(f64, f64) -> f64) -> f64 {
    let dims = grid.dims();
    let mut acc = init;
    for k in 0..dims.nz {
        for j in 0..dims.ny {
            for i in 0..dims.nx {
                if grid.cell_kind(i, j, k) == CellKind::Fluid {
                    acc = f(acc, divergence_at(grid, i, j, k));
                }
            }
        }
    }
    acc
}

/// Volume-averaged kinetic energy over fluid cells, from cell-centered
/// velocity magnitudes: KE = 0.5 * <|V|^2>.
pub fn kinetic_energy(grid: &Grid) -> f64 {
    let dims = grid.dims();
    let mut sum = 0.0;
    let mut count = 0usize;
    for k in 0..dims.nz {
        for j in 0..dims.ny {
            for i in 0..dims.nx {
                if grid.cell_kind(i, j, k) != CellKind::Fluid {
                    continue;
                }
                let uc = 0.5 * (grid.u_at(i, j, k) + grid.u_at(i + 1, j, k));
                let vc = 0.5 * (grid.v_at(i, j, k) + grid.v_at(i, j + 1, k));
                let wc = 0.5 * (grid.w_at(i, j, k) + grid.w_at(i, j, k + 1));
                sum += uc * uc + vc * vc + wc * wc;
                count += 1;
            }
        }
    }
    if count > 0 {
        0.5 * sum / count as f64
    } else {
        0.0
    }
}

/// Largest face speed on the grid. `dt * max_velocity / dx` is the CFL
/// number the advection trace sees.
pub fn max_velocity(grid: &Grid) -> f64 {
    let u = grid.u.iter();
    let v = grid.v.iter();
    let w = grid.w.iter();
    u.chain(v).chain(w).fold(0.0f64, |m, &x| m.max(x.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn test_quiescent_grid_has_zero_diagnostics() {
        let grid = Grid::new(4, 4, 4, 1.0).unwrap();
        assert_eq!(max_divergence(&grid), 0.0);
        assert_eq!(divergence_l2(&grid), 0.0);
        assert_eq!(kinetic_energy(&grid), 0.0);
        assert_eq!(max_velocity(&grid), 0.0);
    }

    #[test]
    fn test_kinetic_energy_of_uniform_flow() {
        let mut grid = Grid::new(3, 3, 3, 1.0).unwrap();
        grid.u.fill(2.0);
        // |V|^2 = 4 in every cell, KE = 0.5 * 4.
        let ke = kinetic_energy(&grid);
        assert!((ke - 2.0).abs() < 1e-12, "got {ke}");
    }

    #[test]
    fn test_max_velocity_scans_all_components() {
        let mut grid = Grid::new(3, 3, 3, 1.0).unwrap();
        let dims = grid.dims();
        grid.w[dims.w_index(1, 1, 2)] = -4.5;
        assert_eq!(max_velocity(&grid), 4.5);
    }

    #[test]
    fn test_max_divergence_sees_injected_flux() {
        let mut grid = Grid::new(3, 3, 3, 1.0).unwrap();
        let dims = grid.dims();
        grid.u[dims.u_index(1, 1, 1)] = -1.0;
        assert!(max_divergence(&grid) > 0.0);
    }
}
