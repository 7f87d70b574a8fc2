pub mod png;
pub mod scene;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::grid::Grid;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("image encoding: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Writes one artifact per completed simulation step. Implementations own
/// frame naming and format entirely; the solver never sees them.
pub trait Exporter {
    fn save(&mut self, grid: &Grid, frame: usize) -> Result<PathBuf, ExportError>;
}

/// Loads an external document into a typed value.
pub trait Importer {
    type Output;

    fn load(&mut self, path: &Path) -> Result<Self::Output, ImportError>;
}
