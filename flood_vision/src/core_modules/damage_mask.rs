// THEORY:
// A `DamageMask` is the frozen output of the change detector: one tri-state cell per
// raster pixel. It is a "dumb" data container: it knows how to count its own cells
// but never how to classify them.
//
// The mask also carries the ground resolution of the grid it was derived from, so
// the estimator can turn counts into area without going back to the rasters.

use crate::error::{DamageError, Result};
use crate::core_modules::geo_raster::Meters;

/// Classification of a single mask cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskClass {
    /// Land in the before capture, water in the after capture.
    Damaged,
    /// Valid in both captures, without the darkening signature.
    Unchanged,
    /// Missing in at least one capture. Never counted as damaged.
    NoData,
}

/// Immutable per-pixel damage classification over the analysed window.
#[derive(Debug, Clone, PartialEq)]
pub struct DamageMask {
    width: u32,
    height: u32,
    cells: Vec<MaskClass>,
    resolution: Meters,
    /// Valid pixels that went from water to land (receding water, not damage).
    newly_bright_count: usize,
    /// Mean of `after - before` over valid pixels, `None` when nothing is valid.
    mean_delta: Option<f64>,
}

impl DamageMask {
    pub fn new(width: u32, height: u32, cells: Vec<MaskClass>, resolution: Meters) -> Result<Self> {
        if width == 0 || height == 0 || cells.len() != width as usize * height as usize {
            return Err(DamageError::InvalidRaster(format!(
                "mask of {width}x{height} cannot hold {} cells",
                cells.len()
            )));
        }
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(DamageError::InvalidRaster(format!(
                "resolution must be positive, got {resolution}"
            )));
        }
        Ok(Self {
            width,
            height,
            cells,
            resolution,
            newly_bright_count: 0,
            mean_delta: None,
        })
    }

    pub(crate) fn with_statistics(mut self, newly_bright_count: usize, mean_delta: Option<f64>) -> Self {
        self.newly_bright_count = newly_bright_count;
        self.mean_delta = mean_delta;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Meters {
        self.resolution
    }

    pub fn cells(&self) -> &[MaskClass] {
        &self.cells
    }

    pub fn cell(&self, x: u32, y: u32) -> Option<MaskClass> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get((y * self.width + x) as usize).copied()
    }

    pub fn total_count(&self) -> usize {
        self.cells.len()
    }

    pub fn damaged_count(&self) -> usize {
        self.count(MaskClass::Damaged)
    }

    pub fn no_data_count(&self) -> usize {
        self.count(MaskClass::NoData)
    }

    pub fn valid_count(&self) -> usize {
        self.total_count() - self.no_data_count()
    }

    pub fn newly_bright_count(&self) -> usize {
        self.newly_bright_count
    }

    pub fn mean_delta(&self) -> Option<f64> {
        self.mean_delta
    }

    fn count(&self, class: MaskClass) -> usize {
        self.cells.iter().filter(|&&c| c == class).count()
    }
}
