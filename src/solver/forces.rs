use crate::grid::{CellKind, Grid};

use super::params::SolverParams;

/// Whether the v face between cells `(i, j-1, k)` and `(i, j, k)` carries
/// flow: neither side solid and at least one side fluid.
fn v_face_active(grid: &Grid, i: usize, j: usize, k: usize) -> bool {
    let below = grid.cell_kind(i, j - 1, k);
    let above = grid.cell_kind(i, j, k);
    below != CellKind::Solid
        && above != CellKind::Solid
        && (below == CellKind::Fluid || above == CellKind::Fluid)
}

/// Add gravity to the vertical faces, scaled by dt. Domain-boundary faces
/// stay untouched; they are zeroed by the boundary pass anyway.
pub fn apply_gravity(grid: &mut Grid, gravity: f64, dt: f64) {
    if gravity == 0.0 {
        return;
    }
    let dims = grid.dims();
    for k in 0..dims.nz {
        for j in 1..dims.ny {
            for i in 0..dims.nx {
                if v_face_active(grid, i, j, k) {
                    grid.v[dims.v_index(i, j, k)] += dt * gravity;
                }
            }
        }
    }
}

/// Smoke buoyancy on the vertical faces: dv = dt * (-alpha * rho + beta *
/// (T - T_ambient)), with rho and T averaged from the two adjacent cells.
/// Dense smoke sinks, hot smoke rises; the coefficients are configuration.
pub fn apply_buoyancy(grid: &mut Grid, params: &SolverParams, dt: f64) {
    if params.buoyancy_alpha == 0.0 && params.buoyancy_beta == 0.0 {
        return;
    }
    let dims = grid.dims();
    for k in 0..dims.nz {
        for j in 1..dims.ny {
            for i in 0..dims.nx {
                if !v_face_active(grid, i, j, k) {
                    continue;
                }
                let below = dims.cell_index(i, j - 1, k);
                let above = dims.cell_index(i, j, k);
                let rho = 0.5 * (grid.density[below] + grid.density[above]);
                let temp = 0.5 * (grid.temperature[below] + grid.temperature[above]);
                let accel = -params.buoyancy_alpha * rho
                    + params.buoyancy_beta * (temp - params.ambient_temperature);
                grid.v[dims.v_index(i, j, k)] += dt * accel;
            }
        }
    }
}

/// Vorticity confinement: amplifies existing vortical structures to
/// counteract the numerical dissipation of semi-Lagrangian advection.
/// Computes the cell-centered curl, then f = epsilon * dx * (N x omega)
/// with N the normalized gradient of |omega|, and spreads the force onto
/// the faces between fluid cells.
pub fn vorticity_confinement(grid: &mut Grid, epsilon: f64, dt: f64) {
    if epsilon == 0.0 {
        return;
    }
    let dims = grid.dims();
    let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
    if nx < 3 || ny < 3 || nz < 3 {
        return;
    }
    let cells = dims.cell_count();

    // Cell-centered velocity components.
    let mut uc = vec![0.0; cells];
    let mut vc = vec![0.0; cells];
    let mut wc = vec![0.0; cells];
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let c = dims.cell_index(i, j, k);
                uc[c] = 0.5 * (grid.u[dims.u_index(i, j, k)] + grid.u[dims.u_index(i + 1, j, k)]);
                vc[c] = 0.5 * (grid.v[dims.v_index(i, j, k)] + grid.v[dims.v_index(i, j + 1, k)]);
                wc[c] = 0.5 * (grid.w[dims.w_index(i, j, k)] + grid.w[dims.w_index(i, j, k + 1)]);
            }
        }
    }

    // Curl and its magnitude, central differences over interior cells.
    let mut ox = vec![0.0; cells];
    let mut oy = vec![0.0; cells];
    let mut oz = vec![0.0; cells];
    let mut om = vec![0.0; cells];
    let inv2dx = 1.0 / (2.0 * dims.dx);
    for k in 1..nz - 1 {
        for j in 1..ny - 1 {
            for i in 1..nx - 1 {
                let c = dims.cell_index(i, j, k);
                let dwdy = (wc[dims.cell_index(i, j + 1, k)] - wc[dims.cell_index(i, j - 1, k)]) * inv2dx;
                let dvdz = (vc[dims.cell_index(i, j, k + 1)] - vc[dims.cell_index(i, j, k - 1)]) * inv2dx;
                let dudz = (uc[dims.cell_index(i, j, k + 1)] - uc[dims.cell_index(i, j, k - 1)]) * inv2dx;
                let dwdx = (wc[dims.cell_index(i + 1, j, k)] - wc[dims.cell_index(i - 1, j, k)]) * inv2dx;
                let dvdx = (vc[dims.cell_index(i + 1, j, k)] - vc[dims.cell_index(i - 1, j, k)]) * inv2dx;
                let dudy = (uc[dims.cell_index(i, j + 1, k)] - uc[dims.cell_index(i, j - 1, k)]) * inv2dx;
                ox[c] = dwdy - dvdz;
                oy[c] = dudz - dwdx;
                oz[c] = dvdx - dudy;
                om[c] = (ox[c] * ox[c] + oy[c] * oy[c] + oz[c] * oz[c]).sqrt();
            }
        }
    }

    // Confinement force per cell: epsilon * dx * (N x omega).
    let mut fx = vec![0.0; cells];
    let mut fy = vec![0.0; cells];
    let mut fz = vec![0.0; cells];
    for k in 1..nz - 1 {
        for j in 1..ny - 1 {
            for i in 1..nx - 1 {
                let c = dims.cell_index(i, j, k);
                let ex = (om[dims.cell_index(i + 1, j, k)] - om[dims.cell_index(i - 1, j, k)]) * inv2dx;
                let ey = (om[dims.cell_index(i, j + 1, k)] - om[dims.cell_index(i, j - 1, k)]) * inv2dx;
                let ez = (om[dims.cell_index(i, j, k + 1)] - om[dims.cell_index(i, j, k - 1)]) * inv2dx;
                let len = (ex * ex + ey * ey + ez * ez).sqrt() + 1e-10;
                let (nx_, ny_, nz_) = (ex / len, ey / len, ez / len);
                let scale = epsilon * dims.dx;
                fx[c] = scale * (ny_ * oz[c] - nz_ * oy[c]);
                fy[c] = scale * (nz_ * ox[c] - nx_ * oz[c]);
                fz[c] = scale * (nx_ * oy[c] - ny_ * ox[c]);
            }
        }
    }

    // Spread onto faces between two fluid cells.
    for k in 0..nz {
        for j in 0..ny {
            for i in 1..nx {
                if grid.cell_kind(i - 1, j, k) == CellKind::Fluid
                    && grid.cell_kind(i, j, k) == CellKind::Fluid
                {
                    let f = 0.5 * (fx[dims.cell_index(i - 1, j, k)] + fx[dims.cell_index(i, j, k)]);
                    grid.u[dims.u_index(i, j, k)] += dt * f;
                }
            }
        }
    }
    for k in 0..nz {
        for j in 1..ny {
            for i in 0..nx {
                if grid.cell_kind(i, j - 1, k) == CellKind::Fluid
                    && grid.cell_kind(i, j, k) == CellKind::Fluid
                {
                    let f = 0.5 * (fy[dims.cell_index(i, j - 1, k)] + fy[dims.cell_index(i, j, k)]);
                    grid.v[dims.v_index(i, j, k)] += dt * f;
                }
            }
        }
    }
    for k in 1..nz {
        for j in 0..ny {
            for i in 0..nx {
                if grid.cell_kind(i, j, k - 1) == CellKind::Fluid
                    && grid.cell_kind(i, j, k) == CellKind::Fluid
                {
                    let f = 0.5 * (fz[dims.cell_index(i, j, k - 1)] + fz[dims.cell_index(i, j, k)]);
                    grid.w[dims.w_index(i, j, k)] += dt * f;
                }
            }
        }
    }
}
