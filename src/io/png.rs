use std::path::PathBuf;

use image::{GrayImage, Luma};

use crate::grid::Grid;

use super::{Exporter, ExportError};

/// Exports the mid-depth density slice of the grid as an 8-bit grayscale
/// PNG per frame, named `<prefix><frame:05>.png`. Values are normalized
/// against the brightest cell of the slice; an all-zero slice produces a
/// black frame.
pub struct PngExporter {
    directory: PathBuf,
    prefix: String,
}

impl PngExporter {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self { directory: directory.into(), prefix: prefix.into() }
    }

    fn frame_path(&self, frame: usize) -> PathBuf {
        self.directory.join(format!("{}{:05}.png", self.prefix, frame))
    }
}

impl Exporter for PngExporter {
    fn save(&mut self, grid: &Grid, frame: usize) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.directory)?;

        let (nx, ny) = (grid.nx(), grid.ny());
        let k = grid.nz() / 2;

        let mut max = 0.0f64;
        for j in 0..ny {
            for i in 0..nx {
                max = max.max(grid.density_at(i, j, k));
            }
        }

        let mut img = GrayImage::new(nx as u32, ny as u32);
        for j in 0..ny {
            for i in 0..nx {
                let value = if max > 0.0 {
                    (grid.density_at(i, j, k) / max).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                // Image rows grow downward; grid +y is up.
                img.put_pixel(i as u32, (ny - 1 - j) as u32, Luma([(value * 255.0).round() as u8]));
            }
        }

        let path = self.frame_path(frame);
        img.save(&path)?;
        Ok(path)
    }
}
