mod advect;
mod boundary;
mod cg;
pub mod diagnostics;
mod forces;
mod params;
mod pressure;

pub use cg::SolveReport;
pub use params::{IntegrationScheme, PressureSolverKind, SolverParams};

use tracing::warn;

use crate::grid::Grid;

/// Per-step diagnostic handed back to the caller. Non-convergence is data
/// here, never an error.
#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    pub pressure: SolveReport,
    /// Largest divergence magnitude before projection.
    pub max_divergence: f64,
}

/// Advances the grid one time step at a time: forces, advection, divergence,
/// pressure projection, boundary enforcement. Holds configuration only; all
/// simulation state lives in the grid it is handed.
pub struct FluidSolver {
    params: SolverParams,
    fallback_warned: bool,
}

impl FluidSolver {
    pub fn new(params: SolverParams) -> Self {
        Self { params, fallback_warned: false }
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Run one simulation step of length `dt` against the grid.
    pub fn step(&mut self, grid: &mut Grid, dt: f64) -> StepReport {
        let p = &self.params;

        // 1. External forces into the face velocities.
        forces::apply_gravity(grid, p.gravity, dt);
        forces::apply_buoyancy(grid, p, dt);
        if p.confinement > 0.0 {
            forces::vorticity_confinement(grid, p.confinement, dt);
        }

        // 2. Semi-Lagrangian advection of velocity and scalars.
        advect::advect_all(grid, p.integration, p.interpolation, dt);

        // 3. Divergence of the advected field.
        let max_divergence = pressure::compute_divergence(grid);

        // 4. Pressure projection.
        let report = self.project(grid);

        // 5. Boundary enforcement.
        boundary::enforce(grid);

        StepReport { pressure: report, max_divergence }
    }

    fn project(&mut self, grid: &mut Grid) -> SolveReport {
        if self.params.pressure_solver != PressureSolverKind::Cg && !self.fallback_warned {
            warn!(
                selected = ?self.params.pressure_solver,
                "pressure solver variant not implemented, using conjugate gradient"
            );
            self.fallback_warned = true;
        }

        let dims = grid.dims();
        let mut rhs = vec![0.0; dims.cell_count()];
        pressure::build_rhs(grid, &mut rhs);

        let mut p = std::mem::take(&mut grid.pressure);
        let report = cg::solve(
            &grid.cell,
            dims,
            &rhs,
            &mut p,
            self.params.tolerance,
            self.params.max_iterations,
        );
        grid.pressure = p;

        pressure::apply_pressure_gradient(grid);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellKind, Grid};
    use crate::interp::Kernel;

    fn step_once(grid: &mut Grid, params: SolverParams) -> StepReport {
        let dt = params.dt;
        let mut solver = FluidSolver::new(params);
        solver.step(grid, dt)
    }

    #[test]
    fn test_quiescent_fluid_stays_quiescent() {
        let mut grid = Grid::new(6, 6, 6, 1.0).unwrap();
        let dims = grid.dims();
        grid.density[dims.cell_index(3, 3, 3)] = 1.0;
        let density_before = grid.density.clone();

        let report = step_once(&mut grid, SolverParams::force_free());

        assert!(grid.u.iter().all(|&x| x == 0.0), "u should stay zero");
        assert!(grid.v.iter().all(|&x| x == 0.0), "v should stay zero");
        assert!(grid.w.iter().all(|&x| x == 0.0), "w should stay zero");
        assert_eq!(grid.density, density_before, "density should be untouched");
        assert_eq!(report.pressure.iterations, 0, "nothing to solve");
        assert_eq!(report.max_divergence, 0.0);
    }

    #[test]
    fn test_projection_removes_interior_divergence() {
        let mut grid = Grid::new(8, 8, 8, 1.0).unwrap();
        let dims = grid.dims();
        // Seed a divergent blob in the interior.
        for (di, dj, dk, s) in [(0, 0, 0, 1.0), (1, 0, 0, -0.5), (0, 1, 0, 0.25)] {
            let i = 3 + di;
            let j = 3 + dj;
            let k = 3 + dk;
            grid.u[dims.u_index(i, j, k)] = -s;
            grid.u[dims.u_index(i + 1, j, k)] = s;
            grid.v[dims.v_index(i, j, k)] = -s;
            grid.v[dims.v_index(i, j + 1, k)] = s;
        }

        let mut params = SolverParams::force_free();
        params.tolerance = 1e-8;
        let report = step_once(&mut grid, params);
        assert!(report.pressure.converged, "{:?}", report.pressure);
        assert!(report.max_divergence > 0.0, "seeded divergence should be visible");

        // Interior cells away from the walls are divergence-free afterwards.
        let reference = report.max_divergence;
        for k in 2..6 {
            for j in 2..6 {
                for i in 2..6 {
                    let d = super::pressure::divergence_at(&grid, i, j, k).abs();
                    assert!(
                        d <= 1e-6 * reference.max(1.0),
                        "cell ({i},{j},{k}) still divergent: {d}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_solid_faces_are_zero_after_step() {
        let mut grid = Grid::new(6, 6, 6, 1.0).unwrap();
        grid.set_cell_kind(2, 2, 2, CellKind::Solid);
        let dims = grid.dims();
        grid.density[dims.cell_index(3, 1, 2)] = 1.0;
        grid.temperature[dims.cell_index(3, 1, 2)] = 1.0;

        step_once(&mut grid, SolverParams::default());

        for (i, j, k) in [(2, 2, 2), (3, 2, 2)] {
            assert_eq!(grid.u[dims.u_index(i, j, k)], 0.0, "u face at ({i},{j},{k})");
        }
        for (i, j, k) in [(2, 2, 2), (2, 3, 2)] {
            assert_eq!(grid.v[dims.v_index(i, j, k)], 0.0, "v face at ({i},{j},{k})");
        }
        for (i, j, k) in [(2, 2, 2), (2, 2, 3)] {
            assert_eq!(grid.w[dims.w_index(i, j, k)], 0.0, "w face at ({i},{j},{k})");
        }
        // Domain walls as well.
        assert_eq!(grid.u[dims.u_index(0, 3, 3)], 0.0);
        assert_eq!(grid.v[dims.v_index(3, 6, 3)], 0.0);
    }

    #[test]
    fn test_gravity_divergence_matches_analytic_flux() {
        // 4x4x4, dx = 1, one step of pure gravity on a still fluid. Before
        // projection the interior v faces all carry dt * g, so only the rows
        // against the floor and ceiling see net flux: |div| = dt * |g| / dx.
        let mut grid = Grid::new(4, 4, 4, 1.0).unwrap();
        let dims = grid.dims();
        grid.density[dims.cell_index(2, 2, 2)] = 1.0;

        let dt = 0.1;
        super::forces::apply_gravity(&mut grid, -9.81, dt);
        let max_div = super::pressure::compute_divergence(&mut grid);

        let expected = dt * 9.81;
        assert!(
            (max_div - expected).abs() < 1e-9,
            "max divergence {max_div}, analytic {expected}"
        );
        // Interior rows cancel exactly.
        let mid = grid.divergence[dims.cell_index(1, 2, 1)];
        assert!(mid.abs() < 1e-9, "interior cell should be divergence-free, got {mid}");
        // Bottom row compresses, top row stretches.
        let bottom = grid.divergence[dims.cell_index(1, 0, 1)];
        let top = grid.divergence[dims.cell_index(1, 3, 1)];
        assert!((bottom + expected).abs() < 1e-9, "bottom row: {bottom}");
        assert!((top - expected).abs() < 1e-9, "top row: {top}");
    }

    #[test]
    fn test_step_converges_on_buoyant_plume() {
        let mut grid = Grid::new(8, 8, 8, 0.5).unwrap();
        let dims = grid.dims();
        for k in 3..5 {
            for i in 3..5 {
                grid.density[dims.cell_index(i, 1, k)] = 1.0;
                grid.temperature[dims.cell_index(i, 1, k)] = 1.0;
            }
        }
        let mut params = SolverParams::default();
        params.gravity = 0.0;
        let dt = params.dt;
        let mut solver = FluidSolver::new(params);
        for _ in 0..3 {
            let report = solver.step(&mut grid, dt);
            assert!(report.pressure.converged, "step did not converge: {report:?}");
        }
        assert!(
            diagnostics::kinetic_energy(&grid) > 0.0,
            "buoyancy should set the plume in motion"
        );
    }

    #[test]
    fn test_non_cg_selector_falls_back_and_still_steps() {
        let mut grid = Grid::new(4, 4, 4, 1.0).unwrap();
        let mut params = SolverParams::default();
        params.pressure_solver = PressureSolverKind::Jacobi;
        let dt = params.dt;
        let mut solver = FluidSolver::new(params);
        let report = solver.step(&mut grid, dt);
        assert!(report.pressure.converged || report.pressure.iterations > 0);
    }

    #[test]
    fn test_step_with_every_kernel_and_scheme_is_stable() {
        for kernel in [Kernel::Lerp, Kernel::Hat, Kernel::Gaussian, Kernel::CatmullRom] {
            for scheme in [
                IntegrationScheme::Euler,
                IntegrationScheme::Verlet,
                IntegrationScheme::RungeKutta2,
                IntegrationScheme::RungeKutta4,
            ] {
                let mut grid = Grid::new(5, 5, 5, 0.5).unwrap();
                let dims = grid.dims();
                grid.density[dims.cell_index(2, 1, 2)] = 1.0;
                grid.temperature[dims.cell_index(2, 1, 2)] = 1.0;
                let mut params = SolverParams::default();
                params.interpolation = kernel;
                params.integration = scheme;
                let dt = params.dt;
                let mut solver = FluidSolver::new(params);
                for _ in 0..2 {
                    solver.step(&mut grid, dt);
                }
                assert!(
                    grid.density.iter().all(|d| d.is_finite()),
                    "{kernel:?}/{scheme:?} produced non-finite density"
                );
                assert!(
                    grid.v.iter().all(|v| v.is_finite()),
                    "{kernel:?}/{scheme:?} produced non-finite velocity"
                );
            }
        }
    }
}
