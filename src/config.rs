use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::interp::Kernel;
use crate::solver::{IntegrationScheme, PressureSolverKind};

/// Default config file looked up beside the process when no --config flag
/// is given.
pub const DEFAULT_CONFIG_FILE: &str = "fumarole.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("grid dimensions must be positive, got {0}x{1}x{2}")]
    InvalidDimensions(usize, usize, usize),
    #[error("cell width must be a positive finite number, got {0}")]
    InvalidCellWidth(f64),
    #[error("time step must be positive, got {0}")]
    InvalidTimeStep(f64),
    #[error("solver tolerance must be non-negative, got {0}")]
    InvalidTolerance(f64),
    #[error("solver iteration cap must be positive")]
    InvalidMaxIterations,
    #[error("frame count must be positive")]
    InvalidFrameCount,
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub grid: GridConfig,
    pub solver: SolverConfig,
    pub output: OutputConfig,
    /// Optional scene file seeding the initial grid contents.
    pub scene: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub cell_width: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub dt: f64,
    pub integration: IntegrationScheme,
    pub interpolation: Kernel,
    pub pressure_solver: PressureSolverKind,
    pub gravity: f64,
    pub buoyancy_alpha: f64,
    pub buoyancy_beta: f64,
    pub ambient_temperature: f64,
    pub confinement: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Frame file name prefix, historically "density_export_".
    pub prefix: String,
    pub directory: PathBuf,
    pub frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            solver: SolverConfig::default(),
            output: OutputConfig::default(),
            scene: None,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { nx: 50, ny: 50, nz: 50, cell_width: 0.01 }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: f64::EPSILON.sqrt(),
            max_iterations: 100,
            dt: 0.1,
            integration: IntegrationScheme::default(),
            interpolation: Kernel::default(),
            pressure_solver: PressureSolverKind::default(),
            gravity: -9.81,
            buoyancy_alpha: 0.08,
            buoyancy_beta: 0.97,
            ambient_temperature: 0.0,
            confinement: 0.0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { prefix: "density_export_".to_string(), directory: PathBuf::from("."), frames: 100 }
    }
}

impl Config {
    /// Load from an explicitly named file. Any failure is the caller's
    /// problem; an explicit path that does not parse is a hard error.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Load the default config file if present, otherwise defaults. A file
    /// that exists but fails to read or parse is reported and ignored.
    pub fn load_or_default() -> Self {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if !path.exists() {
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("ignoring {DEFAULT_CONFIG_FILE}: {e}");
                Self::default()
            }
        }
    }

    /// Fail-fast validation before any stepping begins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.grid;
        if g.nx == 0 || g.ny == 0 || g.nz == 0 {
            return Err(ConfigError::InvalidDimensions(g.nx, g.ny, g.nz));
        }
        if !(g.cell_width > 0.0) || !g.cell_width.is_finite() {
            return Err(ConfigError::InvalidCellWidth(g.cell_width));
        }
        let s = &self.solver;
        if !(s.dt > 0.0) || !s.dt.is_finite() {
            return Err(ConfigError::InvalidTimeStep(s.dt));
        }
        if s.tolerance < 0.0 || !s.tolerance.is_finite() {
            return Err(ConfigError::InvalidTolerance(s.tolerance));
        }
        if s.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations);
        }
        if self.output.frames == 0 {
            return Err(ConfigError::InvalidFrameCount);
        }
        Ok(())
    }
}
