use glam::DVec3;
use rayon::prelude::*;

use crate::grid::{sample_velocity, FaceAxis, Grid, GridDims, CELL_OFFSET};
use crate::interp::{sample, Kernel};

use super::params::IntegrationScheme;

/// Read-only velocity snapshot the characteristics are traced through.
pub struct Flow<'a> {
    pub u: &'a [f64],
    pub v: &'a [f64],
    pub w: &'a [f64],
    pub dims: GridDims,
    pub kernel: Kernel,
}

impl Flow<'_> {
    fn velocity(&self, pos: DVec3) -> DVec3 {
        sample_velocity(self.u, self.v, self.w, self.dims, pos, self.kernel)
    }
}

/// Trace a sample position backward through the flow over one step.
/// Intermediate and final positions are clamped to the domain box.
pub fn trace_back(flow: &Flow, pos: DVec3, dt: f64, scheme: IntegrationScheme) -> DVec3 {
    let dims = flow.dims;
    let back = match scheme {
        IntegrationScheme::Euler => pos - dt * flow.velocity(pos),
        IntegrationScheme::Verlet => {
            // Symmetric two-point update: average the velocity here and at
            // the provisional foot point.
            let v1 = flow.velocity(pos);
            let v2 = flow.velocity(dims.clamp_to_domain(pos - dt * v1));
            pos - dt * 0.5 * (v1 + v2)
        }
        IntegrationScheme::RungeKutta2 => {
            let v1 = flow.velocity(pos);
            let mid = flow.velocity(dims.clamp_to_domain(pos - 0.5 * dt * v1));
            pos - dt * mid
        }
        IntegrationScheme::RungeKutta4 => {
            let k1 = flow.velocity(pos);
            let k2 = flow.velocity(dims.clamp_to_domain(pos - 0.5 * dt * k1));
            let k3 = flow.velocity(dims.clamp_to_domain(pos - 0.5 * dt * k2));
            let k4 = flow.velocity(dims.clamp_to_domain(pos - dt * k3));
            pos - (dt / 6.0) * (k1 + 2.0 * k2 + 2.0 * k3 + k4)
        }
    };
    dims.clamp_to_domain(back)
}

/// Resample one field along traced characteristics: for every sample point of
/// `out`, trace backward and gather from `src` at the foot point. `src` and
/// `out` share the layout described by `size` and `offset`.
fn resample(
    out: &mut [f64],
    src: &[f64],
    size: (usize, usize, usize),
    offset: DVec3,
    flow: &Flow<'_>,
    scheme: IntegrationScheme,
    dt: f64,
) {
    let dims = flow.dims;
    let (sx, sy, _) = size;
    out.par_iter_mut().enumerate().for_each(|(idx, val)| {
        let i = idx % sx;
        let j = (idx / sx) % sy;
        let k = idx / (sx * sy);
        let pos = dims.sample_pos(offset, i, j, k);
        let back = trace_back(flow, pos, dt, scheme);
        *val = sample(src, size, dims.to_grid(back, offset), flow.kernel);
    });
}

/// Advect the three velocity components and both transported scalars through
/// the pre-step velocity field. Front arrays are swapped into the back
/// buffers first, so every field is read from the same time level.
pub fn advect_all(grid: &mut Grid, scheme: IntegrationScheme, kernel: Kernel, dt: f64) {
    std::mem::swap(&mut grid.u, &mut grid.u0);
    std::mem::swap(&mut grid.v, &mut grid.v0);
    std::mem::swap(&mut grid.w, &mut grid.w0);
    std::mem::swap(&mut grid.density, &mut grid.density0);
    std::mem::swap(&mut grid.temperature, &mut grid.temperature0);

    let dims = grid.dims();
    let flow = Flow { u: &grid.u0, v: &grid.v0, w: &grid.w0, dims, kernel };
    let cell_size = (dims.nx, dims.ny, dims.nz);

    resample(
        &mut grid.u,
        &grid.u0,
        dims.face_size(FaceAxis::U),
        GridDims::face_offset(FaceAxis::U),
        &flow,
        scheme,
        dt,
    );
    resample(
        &mut grid.v,
        &grid.v0,
        dims.face_size(FaceAxis::V),
        GridDims::face_offset(FaceAxis::V),
        &flow,
        scheme,
        dt,
    );
    resample(
        &mut grid.w,
        &grid.w0,
        dims.face_size(FaceAxis::W),
        GridDims::face_offset(FaceAxis::W),
        &flow,
        scheme,
        dt,
    );
    resample(&mut grid.density, &grid.density0, cell_size, CELL_OFFSET, &flow, scheme, dt);
    resample(
        &mut grid.temperature,
        &grid.temperature0,
        cell_size,
        CELL_OFFSET,
        &flow,
        scheme,
        dt,
    );
}
