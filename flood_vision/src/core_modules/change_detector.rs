// THEORY:
// The `ChangeDetector` turns a before/after backscatter pair into a `DamageMask`. It
// implements the backscatter-drop signature used for flood mapping on GRD radar
// products: open water is a specular reflector and returns very little energy to the
// sensor, so a pixel that was bright ("land") before the event and dark ("water")
// after it is presumed flooded.
//
// Key architectural principles & algorithm steps:
// 1.  **Alignment Check**: The detector never resamples. Both rasters must already
//     share a grid (dimensions and resolution); anything else is a `GridMismatch`
//     and the loader is to blame.
// 2.  **Per-Pixel Delta**: For every position valid in both captures it computes
//     `delta = after - before`. The mean delta is kept as a scene statistic.
// 3.  **Threshold Classification**: A pixel is *damaged* when
//     `before >= bright_threshold` and `after <= dark_threshold`. The mirror case
//     (water turning to land) is counted as *newly bright* but is not damage.
// 4.  **Stateless Utility**: Classification is pixel-local. There is no
//     neighbourhood smoothing, so radar speckle is not filtered. This is a known
//     limitation of the method, not something later stages correct for.

use crate::core_modules::damage_mask::{DamageMask, MaskClass};
use crate::core_modules::geo_raster::{Backscatter, RasterPair};
use crate::error::{DamageError, Result};

// Both defaults are absolute VV levels, not a before/after ratio. A large drop
// that stays above the water level is not damage.

/// Minimum "before" backscatter (dB) counted as dry land.
pub const DEFAULT_BRIGHT_THRESHOLD_DB: Backscatter = -15.0;
/// Maximum "after" backscatter (dB) counted as open water.
pub const DEFAULT_DARK_THRESHOLD_DB: Backscatter = -18.0;

/// Tunable thresholds for the darkening predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Minimum before-value counted as "land".
    pub bright_threshold: Backscatter,
    /// Maximum after-value counted as "water".
    pub dark_threshold: Backscatter,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            bright_threshold: DEFAULT_BRIGHT_THRESHOLD_DB,
            dark_threshold: DEFAULT_DARK_THRESHOLD_DB,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        let finite = self.bright_threshold.is_finite() && self.dark_threshold.is_finite();
        if finite && self.dark_threshold < self.bright_threshold {
            Ok(())
        } else {
            Err(DamageError::InvalidThresholds {
                bright: self.bright_threshold,
                dark: self.dark_threshold,
            })
        }
    }
}

/// The four-way outcome of comparing one pixel across the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelChange {
    Unchanged,
    /// Land-to-water darkening: the damage signature.
    NewlyDark,
    /// Water-to-land brightening.
    NewlyBright,
    NoData,
}

impl From<PixelChange> for MaskClass {
    fn from(change: PixelChange) -> Self {
        match change {
            PixelChange::NewlyDark => MaskClass::Damaged,
            PixelChange::Unchanged | PixelChange::NewlyBright => MaskClass::Unchanged,
            PixelChange::NoData => MaskClass::NoData,
        }
    }
}

pub mod change_detector {
    use super::*; // Make structs from parent module available.

    /// Classifies a single pixel from its (possibly missing) before/after samples.
    pub fn classify_pixel(
        before: Option<Backscatter>,
        after: Option<Backscatter>,
        config: &DetectorConfig,
    ) -> PixelChange {
        let (Some(before), Some(after)) = (before, after) else {
            return PixelChange::NoData;
        };

        if before >= config.bright_threshold && after <= config.dark_threshold {
            PixelChange::NewlyDark
        } else if before <= config.dark_threshold && after >= config.bright_threshold {
            PixelChange::NewlyBright
        } else {
            PixelChange::Unchanged
        }
    }

    /// The main function of the change-detection layer.
    /// Consumes a raster pair and produces its damage mask.
    pub fn detect(pair: RasterPair, config: &DetectorConfig) -> Result<DamageMask> {
        config.validate()?;

        let RasterPair { before, after, .. } = pair;
        if !before.same_grid(&after) {
            return Err(DamageError::GridMismatch {
                before_width: before.width(),
                before_height: before.height(),
                before_resolution: before.resolution(),
                after_width: after.width(),
                after_height: after.height(),
                after_resolution: after.resolution(),
            });
        }

        let mut cells = Vec::with_capacity(before.samples().len());
        let mut newly_bright = 0usize;
        let mut delta_sum = 0.0f64;
        let mut delta_count = 0usize;

        for (before_value, after_value) in before.valid_samples().zip(after.valid_samples()) {
            if let (Some(b), Some(a)) = (before_value, after_value) {
                delta_sum += (a - b) as f64;
                delta_count += 1;
            }

            let change = classify_pixel(before_value, after_value, config);
            if change == PixelChange::NewlyBright {
                newly_bright += 1;
            }
            cells.push(MaskClass::from(change));
        }

        let mean_delta = (delta_count > 0).then(|| delta_sum / delta_count as f64);
        let mask = DamageMask::new(before.width(), before.height(), cells, before.resolution())?;
        Ok(mask.with_statistics(newly_bright, mean_delta))
    }
}
