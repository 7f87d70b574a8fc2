use std::path::Path;

use serde::Deserialize;

use crate::grid::{CellKind, Grid};

use super::{Importer, ImportError};

/// Axis-aligned box of cells, `min` inclusive, `max` exclusive. Boxes are
/// clamped against the grid when applied, so oversized regions are fine.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Region {
    pub min: [usize; 3],
    pub max: [usize; 3],
}

impl Region {
    fn clamped(&self, limit: [usize; 3]) -> [std::ops::Range<usize>; 3] {
        [0, 1, 2].map(|a| self.min[a].min(limit[a])..self.max[a].min(limit[a]))
    }
}

/// A box of cells stamped with smoke on load.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Emitter {
    pub region: Region,
    #[serde(default = "default_density")]
    pub density: f64,
    #[serde(default)]
    pub temperature: f64,
    /// Initial velocity written onto every face of the box's cells.
    #[serde(default)]
    pub velocity: Option<[f64; 3]>,
}

fn default_density() -> f64 {
    1.0
}

/// Scene description seeding a run: solid obstacles, empty (free surface)
/// regions and smoke emitters. The document is a small hierarchical
/// key/value file, parsed with serde like the rest of the configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scene {
    pub emitters: Vec<Emitter>,
    pub obstacles: Vec<Region>,
    pub empty: Vec<Region>,
}

impl Scene {
    /// Stamp the scene into a freshly constructed grid. Obstacles and empty
    /// regions are classified first so emitters never write into them.
    pub fn apply(&self, grid: &mut Grid) {
        let dims = grid.dims();
        let limit = [dims.nx, dims.ny, dims.nz];

        for region in &self.obstacles {
            let [xs, ys, zs] = region.clamped(limit);
            for k in zs.clone() {
                for j in ys.clone() {
                    for i in xs.clone() {
                        grid.set_cell_kind(i, j, k, CellKind::Solid);
                    }
                }
            }
        }
        for region in &self.empty {
            let [xs, ys, zs] = region.clamped(limit);
            for k in zs.clone() {
                for j in ys.clone() {
                    for i in xs.clone() {
                        if grid.cell_kind(i, j, k) != CellKind::Solid {
                            grid.set_cell_kind(i, j, k, CellKind::Empty);
                        }
                    }
                }
            }
        }

        for emitter in &self.emitters {
            let [xs, ys, zs] = emitter.region.clamped(limit);
            for k in zs.clone() {
                for j in ys.clone() {
                    for i in xs.clone() {
                        if !grid.is_fluid(i, j, k) {
                            continue;
                        }
                        let c = dims.cell_index(i, j, k);
                        grid.density[c] = emitter.density;
                        grid.temperature[c] = emitter.temperature;
                        if let Some([vx, vy, vz]) = emitter.velocity {
                            grid.u[dims.u_index(i, j, k)] = vx;
                            grid.u[dims.u_index(i + 1, j, k)] = vx;
                            grid.v[dims.v_index(i, j, k)] = vy;
                            grid.v[dims.v_index(i, j + 1, k)] = vy;
                            grid.w[dims.w_index(i, j, k)] = vz;
                            grid.w[dims.w_index(i, j, k + 1)] = vz;
                        }
                    }
                }
            }
        }
    }
}

/// Loads scene documents from disk.
#[derive(Debug, Default)]
pub struct SceneImporter;

impl Importer for SceneImporter {
    type Output = Scene;

    fn load(&mut self, path: &Path) -> Result<Scene, ImportError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ImportError::Io { path: path.to_path_buf(), source })?;
        serde_yaml::from_str(&contents)
            .map_err(|source| ImportError::Parse { path: path.to_path_buf(), source })
    }
}
