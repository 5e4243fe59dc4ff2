/// Error types for the flood_vision engine
use thiserror::Error;

/// Main error type for every stage of the damage pipeline.
#[derive(Error, Debug)]
pub enum DamageError {
    /// Coordinate lies outside representable latitude/longitude bounds.
    #[error("Invalid coordinate: lat={lat}, lng={lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },

    /// Remote imagery timed out, failed, or has no coverage for the window.
    #[error("Imagery source unavailable: {0}")]
    ImagerySourceUnavailable(String),

    /// Before and after grids do not share dimensions and resolution.
    #[error(
        "Grid mismatch: before is {before_width}x{before_height} @ {before_resolution} m, after is {after_width}x{after_height} @ {after_resolution} m"
    )]
    GridMismatch {
        before_width: u32,
        before_height: u32,
        before_resolution: f64,
        after_width: u32,
        after_height: u32,
        after_resolution: f64,
    },

    /// Every pixel of the mask is no-data.
    #[error("No valid pixels: cannot estimate damage over an all no-data grid")]
    NoValidPixels,

    /// Unit value per area must be a finite, strictly positive number.
    #[error("Invalid valuation: {0}")]
    InvalidValuation(f64),

    /// No analysis has been run for the claim yet.
    #[error("No estimate yet for claim: {0}")]
    NoEstimateYet(String),

    /// A GeoRaster was constructed in violation of its invariants.
    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    /// Detector thresholds are inverted (dark must lie below bright).
    #[error("Invalid thresholds: dark {dark} must be below bright {bright}")]
    InvalidThresholds { bright: f32, dark: f32 },

    /// The "before" anchor is not strictly earlier than the "after" anchor.
    #[error("Invalid date range: {before} is not before {after}")]
    InvalidDateRange { before: String, after: String },

    /// No overlay has been stored under the reference.
    #[error("Overlay not found: {0}")]
    OverlayNotFound(String),

    /// Overlay storage failed on disk.
    #[error("Failed to store overlay: {0}")]
    OverlayStorage(#[from] std::io::Error),

    /// Overlay PNG encoding failed.
    #[error("Failed to encode overlay: {0}")]
    OverlayEncoding(#[from] image::ImageError),
}

impl DamageError {
    /// Caller input errors are rejected outright; everything else on the live
    /// path is eligible for the canned fallback.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            DamageError::InvalidCoordinate { .. }
                | DamageError::InvalidValuation(_)
                | DamageError::InvalidDateRange { .. }
        )
    }
}

/// Type alias for Results using DamageError
pub type Result<T> = std::result::Result<T, DamageError>;
