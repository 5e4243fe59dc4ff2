// THEORY:
// The `geo_raster` module is the data layer of the engine. It holds the "dumb"
// containers every other stage reads: a query coordinate, the geographic window
// around it, and a single-band radar backscatter grid anchored to that window.
//
// Key architectural principles:
// 1.  **Validated Construction**: A `GeoRaster` can only be built through
//     `GeoRaster::new`, which enforces the grid invariants (non-zero dimensions,
//     positive resolution, one sample per cell). Downstream stages never re-check.
// 2.  **Explicit No-Data**: Every raster carries its own no-data sentinel. A sample
//     equal to the sentinel (or NaN) is reported as `None` by `sample`, so no stage
//     can accidentally treat missing coverage as a real backscatter value.
// 3.  **Ownership**: A `RasterPair` exclusively owns its two rasters. It is built per
//     request by the loader and consumed by the detector; nothing persists it.

use crate::error::{DamageError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type Backscatter = f32;
pub type Meters = f64;

/// Mean length of one degree of latitude, in meters.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Sentinel written into cells with no radar coverage.
pub const DEFAULT_NO_DATA: Backscatter = -9999.0;

/// A WGS84 query point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Builds a coordinate, rejecting anything outside [-90, 90] x [-180, 180].
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        let coordinate = Self { lat, lng };
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn validate(&self) -> Result<()> {
        let lat_ok = self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat);
        let lng_ok = self.lng.is_finite() && (-180.0..=180.0).contains(&self.lng);
        if lat_ok && lng_ok {
            Ok(())
        } else {
            Err(DamageError::InvalidCoordinate {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }

    /// The bounding box of a `width` x `height` pixel window centered on this point.
    pub fn window(&self, width: u32, height: u32, resolution: Meters) -> BoundingBox {
        let half_height_m = height as f64 * resolution / 2.0;
        let half_width_m = width as f64 * resolution / 2.0;

        let half_lat = half_height_m / METERS_PER_DEGREE;
        // Longitude degrees shrink toward the poles; clamp so the window stays finite.
        let lat_scale = self.lat.to_radians().cos().max(1e-6);
        let half_lng = half_width_m / (METERS_PER_DEGREE * lat_scale);

        BoundingBox {
            west: (self.lng - half_lng).max(-180.0),
            south: (self.lat - half_lat).max(-90.0),
            east: (self.lng + half_lng).min(180.0),
            north: (self.lat + half_lat).min(90.0),
        }
    }
}

/// Geographic extent of a raster in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.south..=self.north).contains(&coordinate.lat)
            && (self.west..=self.east).contains(&coordinate.lng)
    }
}

/// A single-band, georeferenced grid of radar backscatter samples.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRaster {
    /// Grid width in pixels.
    width: u32,
    /// Grid height in pixels.
    height: u32,
    /// Row-major samples, `width * height` long.
    samples: Vec<Backscatter>,
    /// Geographic extent covered by the grid.
    extent: BoundingBox,
    /// Ground length of one pixel edge, in meters.
    resolution: Meters,
    /// Acquisition date of the capture.
    captured_on: NaiveDate,
    /// Value marking cells with no coverage.
    no_data: Backscatter,
}

impl GeoRaster {
    pub fn new(
        width: u32,
        height: u32,
        samples: Vec<Backscatter>,
        extent: BoundingBox,
        resolution: Meters,
        captured_on: NaiveDate,
        no_data: Backscatter,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DamageError::InvalidRaster(format!(
                "grid must be non-empty, got {width}x{height}"
            )));
        }
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(DamageError::InvalidRaster(format!(
                "resolution must be positive, got {resolution}"
            )));
        }
        let expected = width as usize * height as usize;
        if samples.len() != expected {
            return Err(DamageError::InvalidRaster(format!(
                "expected {expected} samples for {width}x{height}, got {}",
                samples.len()
            )));
        }
        Ok(Self {
            width,
            height,
            samples,
            extent,
            resolution,
            captured_on,
            no_data,
        })
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

    pub fn extent(&self) -> BoundingBox {
        self.extent
    }

    pub fn captured_on(&self) -> NaiveDate {
        self.captured_on
    }

    pub fn no_data(&self) -> Backscatter {
        self.no_data
    }

    pub fn samples(&self) -> &[Backscatter] {
        &self.samples
    }

    pub fn is_no_data(&self, value: Backscatter) -> bool {
        value.is_nan() || value == self.no_data
    }

    /// The sample at `(x, y)`, or `None` when out of bounds or no-data.
    pub fn sample(&self, x: u32, y: u32) -> Option<Backscatter> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let value = self.samples[(y * self.width + x) as usize];
        (!self.is_no_data(value)).then_some(value)
    }

    /// Samples paired with their validity, in row-major order.
    pub fn valid_samples(&self) -> impl Iterator<Item = Option<Backscatter>> + '_ {
        self.samples
            .iter()
            .map(move |&value| (!self.is_no_data(value)).then_some(value))
    }

    pub fn valid_count(&self) -> usize {
        self.valid_samples().filter(Option::is_some).count()
    }

    /// True when both rasters share dimensions and resolution.
    pub fn same_grid(&self, other: &GeoRaster) -> bool {
        self.width == other.width
            && self.height == other.height
            && (self.resolution - other.resolution).abs() < f64::EPSILON
    }
}

/// The before/after observation pair for a single request.
#[derive(Debug, Clone)]
pub struct RasterPair {
    pub coordinate: Coordinate,
    pub before: GeoRaster,
    pub after: GeoRaster,
}

impl RasterPair {
    pub fn new(coordinate: Coordinate, before: GeoRaster, after: GeoRaster) -> Self {
        Self {
            coordinate,
            before,
            after,
        }
    }

    pub fn before_date(&self) -> NaiveDate {
        self.before.captured_on()
    }

    pub fn after_date(&self) -> NaiveDate {
        self.after.captured_on()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
    }

    fn extent() -> BoundingBox {
        BoundingBox {
            west: 27.9,
            south: 45.8,
            east: 28.0,
            north: 45.9,
        }
    }

    #[test]
    fn coordinate_bounds_are_enforced() {
        assert!(Coordinate::new(45.8838, 27.9432).is_ok());
        assert!(Coordinate::new(90.0, -180.0).is_ok());
        assert!(matches!(
            Coordinate::new(999.0, 999.0),
            Err(DamageError::InvalidCoordinate { .. })
        ));
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, 180.5).is_err());
    }

    #[test]
    fn window_is_centered_on_coordinate() {
        let coordinate = Coordinate::new(45.0, 27.0).unwrap();
        let window = coordinate.window(64, 64, 10.0);
        assert!(window.contains(&coordinate));
        let center_lat = (window.north + window.south) / 2.0;
        let center_lng = (window.east + window.west) / 2.0;
        assert!((center_lat - 45.0).abs() < 1e-9);
        assert!((center_lng - 27.0).abs() < 1e-9);
        // 640 m of latitude.
        assert!(((window.north - window.south) * METERS_PER_DEGREE - 640.0).abs() < 1e-6);
        // A degree of longitude is shorter than a degree of latitude away from the equator.
        assert!(window.east - window.west > window.north - window.south);
    }

    #[test]
    fn raster_rejects_broken_invariants() {
        assert!(GeoRaster::new(0, 4, vec![], extent(), 10.0, date(), DEFAULT_NO_DATA).is_err());
        assert!(GeoRaster::new(2, 2, vec![0.0; 4], extent(), 0.0, date(), DEFAULT_NO_DATA).is_err());
        assert!(GeoRaster::new(2, 2, vec![0.0; 3], extent(), 10.0, date(), DEFAULT_NO_DATA).is_err());
        assert!(GeoRaster::new(2, 2, vec![0.0; 4], extent(), 10.0, date(), DEFAULT_NO_DATA).is_ok());
    }

    #[test]
    fn no_data_samples_read_as_none() {
        let raster = GeoRaster::new(
            2,
            2,
            vec![-10.0, DEFAULT_NO_DATA, f32::NAN, -20.0],
            extent(),
            10.0,
            date(),
            DEFAULT_NO_DATA,
        )
        .unwrap();
        assert_eq!(raster.sample(0, 0), Some(-10.0));
        assert_eq!(raster.sample(1, 0), None);
        assert_eq!(raster.sample(0, 1), None);
        assert_eq!(raster.sample(1, 1), Some(-20.0));
        assert_eq!(raster.sample(5, 5), None);
        assert_eq!(raster.valid_count(), 2);
    }
}
