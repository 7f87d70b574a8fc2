use glam::DVec3;
use serde::Deserialize;

use crate::config::ConfigError;
use crate::interp::{sample, Kernel};

/// Per-cell material classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    #[default]
    Fluid,
    Solid,
    Empty,
}

/// Staggered velocity component selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceAxis {
    U,
    V,
    W,
}

/// Grid geometry and index arithmetic, detached from the field storage so
/// solver routines can work on raw slices with split borrows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridDims {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub dx: f64,
}

/// Sample-position offset of cell-centered fields, in cells.
pub const CELL_OFFSET: DVec3 = DVec3::new(0.5, 0.5, 0.5);

impl GridDims {
    pub fn cell_count(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Row-major cell index, x fastest.
    #[inline]
    pub fn cell_index(&self, i: usize, j: usize, k: usize) -> usize {
        (k * self.ny + j) * self.nx + i
    }

    /// Index into the u array, sized `(nx+1) * ny * nz`.
    #[inline]
    pub fn u_index(&self, i: usize, j: usize, k: usize) -> usize {
        (k * self.ny + j) * (self.nx + 1) + i
    }

    /// Index into the v array, sized `nx * (ny+1) * nz`.
    #[inline]
    pub fn v_index(&self, i: usize, j: usize, k: usize) -> usize {
        (k * (self.ny + 1) + j) * self.nx + i
    }

    /// Index into the w array, sized `nx * ny * (nz+1)`.
    #[inline]
    pub fn w_index(&self, i: usize, j: usize, k: usize) -> usize {
        (k * self.ny + j) * self.nx + i
    }

    pub fn face_size(&self, axis: FaceAxis) -> (usize, usize, usize) {
        match axis {
            FaceAxis::U => (self.nx + 1, self.ny, self.nz),
            FaceAxis::V => (self.nx, self.ny + 1, self.nz),
            FaceAxis::W => (self.nx, self.ny, self.nz + 1),
        }
    }

    /// Sample-position offset of a face array, in cells. A u face sits at
    /// `(i, j + 0.5, k + 0.5) * dx`.
    pub fn face_offset(axis: FaceAxis) -> DVec3 {
        match axis {
            FaceAxis::U => DVec3::new(0.0, 0.5, 0.5),
            FaceAxis::V => DVec3::new(0.5, 0.0, 0.5),
            FaceAxis::W => DVec3::new(0.5, 0.5, 0.0),
        }
    }

    /// World position of the sample point `(i, j, k)` of an array with the
    /// given per-axis offset.
    pub fn sample_pos(&self, offset: DVec3, i: usize, j: usize, k: usize) -> DVec3 {
        (DVec3::new(i as f64, j as f64, k as f64) + offset) * self.dx
    }

    pub fn cell_center(&self, i: usize, j: usize, k: usize) -> DVec3 {
        self.sample_pos(CELL_OFFSET, i, j, k)
    }

    /// World-space extent of the domain.
    pub fn extent(&self) -> DVec3 {
        DVec3::new(self.nx as f64, self.ny as f64, self.nz as f64) * self.dx
    }

    /// Clamp a world position to the domain box.
    pub fn clamp_to_domain(&self, pos: DVec3) -> DVec3 {
        pos.clamp(DVec3::ZERO, self.extent())
    }

    /// Map a world position into the index space of an array with the given
    /// offset.
    pub fn to_grid(&self, pos: DVec3, offset: DVec3) -> DVec3 {
        pos / self.dx - offset
    }
}

/// Staggered (MAC) grid over a fixed box. Velocity components live on cell
/// faces, scalars at cell centers. Dimensions and cell width are fixed at
/// construction; every array is exactly sized to its layout and never
/// resized. Out-of-bounds access panics.
pub struct Grid {
    dims: GridDims,
    /// X velocity on yz faces.
    pub u: Vec<f64>,
    /// Y velocity on xz faces. +Y is up.
    pub v: Vec<f64>,
    /// Z velocity on xy faces.
    pub w: Vec<f64>,
    /// Back buffers for the advection swap.
    pub u0: Vec<f64>,
    pub v0: Vec<f64>,
    pub w0: Vec<f64>,
    pub density: Vec<f64>,
    pub density0: Vec<f64>,
    pub temperature: Vec<f64>,
    pub temperature0: Vec<f64>,
    pub pressure: Vec<f64>,
    pub divergence: Vec<f64>,
    pub cell: Vec<CellKind>,
}

impl Grid {
    pub fn new(nx: usize, ny: usize, nz: usize, dx: f64) -> Result<Self, ConfigError> {
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(ConfigError::InvalidDimensions(nx, ny, nz));
        }
        if !(dx > 0.0) || !dx.is_finite() {
            return Err(ConfigError::InvalidCellWidth(dx));
        }
        let dims = GridDims { nx, ny, nz, dx };
        let cells = dims.cell_count();
        let u_len = (nx + 1) * ny * nz;
        let v_len = nx * (ny + 1) * nz;
        let w_len = nx * ny * (nz + 1);
        Ok(Self {
            dims,
            u: vec![0.0; u_len],
            v: vec![0.0; v_len],
            w: vec![0.0; w_len],
            u0: vec![0.0; u_len],
            v0: vec![0.0; v_len],
            w0: vec![0.0; w_len],
            density: vec![0.0; cells],
            density0: vec![0.0; cells],
            temperature: vec![0.0; cells],
            temperature0: vec![0.0; cells],
            pressure: vec![0.0; cells],
            divergence: vec![0.0; cells],
            cell: vec![CellKind::Fluid; cells],
        })
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn nx(&self) -> usize {
        self.dims.nx
    }

    pub fn ny(&self) -> usize {
        self.dims.ny
    }

    pub fn nz(&self) -> usize {
        self.dims.nz
    }

    pub fn dx(&self) -> f64 {
        self.dims.dx
    }

    pub fn cell_kind(&self, i: usize, j: usize, k: usize) -> CellKind {
        self.cell[self.dims.cell_index(i, j, k)]
    }

    pub fn set_cell_kind(&mut self, i: usize, j: usize, k: usize, kind: CellKind) {
        let idx = self.dims.cell_index(i, j, k);
        self.cell[idx] = kind;
    }

    /// Classification with signed indices; everything outside the box is
    /// Solid (closed walls).
    pub fn kind_at(&self, i: i64, j: i64, k: i64) -> CellKind {
        kind_at(&self.cell, self.dims, i, j, k)
    }

    pub fn is_fluid(&self, i: usize, j: usize, k: usize) -> bool {
        self.cell_kind(i, j, k) == CellKind::Fluid
    }

    pub fn fluid_cell_count(&self) -> usize {
        self.cell.iter().filter(|&&c| c == CellKind::Fluid).count()
    }

    pub fn u_at(&self, i: usize, j: usize, k: usize) -> f64 {
        self.u[self.dims.u_index(i, j, k)]
    }

    pub fn v_at(&self, i: usize, j: usize, k: usize) -> f64 {
        self.v[self.dims.v_index(i, j, k)]
    }

    pub fn w_at(&self, i: usize, j: usize, k: usize) -> f64 {
        self.w[self.dims.w_index(i, j, k)]
    }

    pub fn density_at(&self, i: usize, j: usize, k: usize) -> f64 {
        self.density[self.dims.cell_index(i, j, k)]
    }

    pub fn temperature_at(&self, i: usize, j: usize, k: usize) -> f64 {
        self.temperature[self.dims.cell_index(i, j, k)]
    }

    /// Velocity at a world position. Each component is interpolated
    /// independently from its own staggered array.
    pub fn velocity_at(&self, pos: DVec3, kernel: Kernel) -> DVec3 {
        sample_velocity(&self.u, &self.v, &self.w, self.dims, pos, kernel)
    }

    pub fn sample_density(&self, pos: DVec3, kernel: Kernel) -> f64 {
        let g = self.dims.to_grid(pos, CELL_OFFSET);
        sample(
            &self.density,
            (self.dims.nx, self.dims.ny, self.dims.nz),
            g,
            kernel,
        )
    }

    pub fn sample_temperature(&self, pos: DVec3, kernel: Kernel) -> f64 {
        let g = self.dims.to_grid(pos, CELL_OFFSET);
        sample(
            &self.temperature,
            (self.dims.nx, self.dims.ny, self.dims.nz),
            g,
            kernel,
        )
    }
}

/// Classification lookup over a raw cell slice; out-of-range is Solid.
#[inline]
pub fn kind_at(cell: &[CellKind], dims: GridDims, i: i64, j: i64, k: i64) -> CellKind {
    if i < 0
        || j < 0
        || k < 0
        || i >= dims.nx as i64
        || j >= dims.ny as i64
        || k >= dims.nz as i64
    {
        CellKind::Solid
    } else {
        cell[dims.cell_index(i as usize, j as usize, k as usize)]
    }
}

/// Staggered velocity sampling over raw component slices. Free function so
/// advection can read the back buffers while writing the front arrays.
pub fn sample_velocity(
    u: &[f64],
    v: &[f64],
    w: &[f64],
    dims: GridDims,
    pos: DVec3,
    kernel: Kernel,
) -> DVec3 {
    let gu = dims.to_grid(pos, GridDims::face_offset(FaceAxis::U));
    let gv = dims.to_grid(pos, GridDims::face_offset(FaceAxis::V));
    let gw = dims.to_grid(pos, GridDims::face_offset(FaceAxis::W));
    DVec3::new(
        sample(u, dims.face_size(FaceAxis::U), gu, kernel),
        sample(v, dims.face_size(FaceAxis::V), gv, kernel),
        sample(w, dims.face_size(FaceAxis::W), gw, kernel),
    )
}
