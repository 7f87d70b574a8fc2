use crate::grid::{CellKind, Grid};

/// Reassert the no-flow-through-solid condition and the free-surface
/// convention: every face touching a Solid cell (domain walls included) is
/// zeroed, scalars are cleared outside the fluid region, and pressure only
/// lives on fluid cells. Runs as the last phase of each step.
pub fn enforce(grid: &mut Grid) {
    let dims = grid.dims();
    let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..=nx {
                let solid = grid.kind_at(i as i64 - 1, j as i64, k as i64) == CellKind::Solid
                    || grid.kind_at(i as i64, j as i64, k as i64) == CellKind::Solid;
                if solid {
                    grid.u[dims.u_index(i, j, k)] = 0.0;
                }
            }
        }
    }
    for k in 0..nz {
        for j in 0..=ny {
            for i in 0..nx {
                let solid = grid.kind_at(i as i64, j as i64 - 1, k as i64) == CellKind::Solid
                    || grid.kind_at(i as i64, j as i64, k as i64) == CellKind::Solid;
                if solid {
                    grid.v[dims.v_index(i, j, k)] = 0.0;
                }
            }
        }
    }
    for k in 0..=nz {
        for j in 0..ny {
            for i in 0..nx {
                let solid = grid.kind_at(i as i64, j as i64, k as i64 - 1) == CellKind::Solid
                    || grid.kind_at(i as i64, j as i64, k as i64) == CellKind::Solid;
                if solid {
                    grid.w[dims.w_index(i, j, k)] = 0.0;
                }
            }
        }
    }

    for idx in 0..dims.cell_count() {
        match grid.cell[idx] {
            CellKind::Fluid => {}
            CellKind::Solid | CellKind::Empty => {
                grid.density[idx] = 0.0;
                grid.temperature[idx] = 0.0;
                grid.pressure[idx] = 0.0;
            }
        }
    }
}
