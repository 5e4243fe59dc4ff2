// THEORY:
// The `raster_loader` resolves the before/after radar captures for a query point.
// It is the only stage of the pipeline that talks to the outside world, and the only
// one that is allowed to block, so it owns the single timeout boundary of a request.
//
// Key architectural principles:
// 1.  **Source Abstraction**: Where pixels come from is behind the `ImagerySource`
//     trait. The HTTP source serves production; the fixture source serves tests and
//     offline runs. The loader logic is identical for both.
// 2.  **Bounded Time**: Both captures are fetched concurrently and the pair is
//     wrapped in one `tokio::time::timeout`. A stalled source surfaces as
//     `ImagerySourceUnavailable`, never as a hung request.
// 3.  **Alignment Ownership**: The detector refuses mismatched grids, so the loader
//     guarantees alignment: any capture not delivered on the requested window grid is
//     nearest-neighbour resampled onto it before the pair is handed on.
// 4.  **Coverage Check**: A capture with no valid pixel at all is treated exactly
//     like a missing capture.

use crate::core_modules::geo_raster::{
    Backscatter, BoundingBox, Coordinate, GeoRaster, Meters, RasterPair, DEFAULT_NO_DATA,
};
use crate::error::{DamageError, Result};
use chrono::{Duration as DateSpan, NaiveDate};
use log::{debug, info};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_WINDOW_PIXELS: u32 = 64;
pub const DEFAULT_RESOLUTION_M: Meters = 10.0;
pub const DEFAULT_MOSAIC_DAYS: i64 = 10;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Wire quantization: `backscatter_db = raw * scale + offset`, raw 0 is no-data.
pub const DEFAULT_QUANT_SCALE: f32 = 0.01;
pub const DEFAULT_QUANT_OFFSET: f32 = -50.0;

/// The grid and time span one capture must cover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureWindow {
    pub extent: BoundingBox,
    pub width: u32,
    pub height: u32,
    pub resolution: Meters,
    /// First acquisition date accepted into the mosaic.
    pub start: NaiveDate,
    /// Last acquisition date accepted into the mosaic.
    pub end: NaiveDate,
}

/// A provider of single-band backscatter captures.
pub trait ImagerySource: Send + Sync {
    fn fetch(&self, window: &CaptureWindow) -> impl Future<Output = Result<GeoRaster>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagerySourceConfig {
    pub base_url: String,
    pub quant_scale: f32,
    pub quant_offset: f32,
}

impl Default for ImagerySourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8010/s1/vv".to_string(),
            quant_scale: DEFAULT_QUANT_SCALE,
            quant_offset: DEFAULT_QUANT_OFFSET,
        }
    }
}

/// Fetches quantized 16-bit grayscale PNG captures over HTTP.
#[derive(Debug, Clone)]
pub struct HttpImagerySource {
    client: reqwest::Client,
    config: ImagerySourceConfig,
}

impl HttpImagerySource {
    pub fn new(config: ImagerySourceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url_for(&self, window: &CaptureWindow) -> String {
        let bbox = window.extent;
        format!(
            "{}?bbox={},{},{},{}&start={}&end={}&width={}&height={}",
            self.config.base_url,
            bbox.west,
            bbox.south,
            bbox.east,
            bbox.north,
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d"),
            window.width,
            window.height
        )
    }
}

impl ImagerySource for HttpImagerySource {
    async fn fetch(&self, window: &CaptureWindow) -> Result<GeoRaster> {
        let url = self.url_for(window);
        debug!("Fetching capture {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DamageError::ImagerySourceUnavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::NO_CONTENT {
            return Err(DamageError::ImagerySourceUnavailable(format!(
                "no coverage for {} to {}",
                window.start, window.end
            )));
        }
        if !status.is_success() {
            return Err(DamageError::ImagerySourceUnavailable(format!(
                "bad response status: {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DamageError::ImagerySourceUnavailable(e.to_string()))?;
        decode_quantized(&body, window, self.config.quant_scale, self.config.quant_offset)
    }
}

/// Decodes a quantized grayscale capture into backscatter. The capture is dated
/// at the end of its mosaic window.
pub fn decode_quantized(
    bytes: &[u8],
    window: &CaptureWindow,
    scale: f32,
    offset: f32,
) -> Result<GeoRaster> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| DamageError::ImagerySourceUnavailable(format!("undecodable capture: {e}")))?
        .to_luma16();
    let (width, height) = image.dimensions();
    let samples: Vec<Backscatter> = image
        .pixels()
        .map(|p| match p.0[0] {
            0 => DEFAULT_NO_DATA,
            raw => raw as f32 * scale + offset,
        })
        .collect();
    let resolution = window.resolution * window.width as f64 / width.max(1) as f64;
    GeoRaster::new(width, height, samples, window.extent, resolution, window.end, DEFAULT_NO_DATA)
}

/// Serves pre-built captures keyed by acquisition date. A fetch returns the
/// latest capture dated inside the requested window.
#[derive(Debug, Clone, Default)]
pub struct FixtureImagerySource {
    captures: BTreeMap<NaiveDate, GeoRaster>,
}

impl FixtureImagerySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capture(mut self, raster: GeoRaster) -> Self {
        self.captures.insert(raster.captured_on(), raster);
        self
    }
}

impl ImagerySource for FixtureImagerySource {
    async fn fetch(&self, window: &CaptureWindow) -> Result<GeoRaster> {
        self.captures
            .range(window.start..=window.end)
            .next_back()
            .map(|(_, raster)| raster.clone())
            .ok_or_else(|| {
                DamageError::ImagerySourceUnavailable(format!(
                    "no coverage for {} to {}",
                    window.start, window.end
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoaderConfig {
    /// Window edge length in pixels.
    pub window_pixels: u32,
    /// Nominal ground resolution of the window grid.
    pub resolution: Meters,
    /// Days after each anchor accepted into its mosaic.
    pub mosaic_days: i64,
    /// Upper bound on fetching both captures.
    pub fetch_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            window_pixels: DEFAULT_WINDOW_PIXELS,
            resolution: DEFAULT_RESOLUTION_M,
            mosaic_days: DEFAULT_MOSAIC_DAYS,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

pub struct RasterPairLoader<S: ImagerySource> {
    source: S,
    config: LoaderConfig,
}

impl<S: ImagerySource> RasterPairLoader<S> {
    pub fn new(source: S, config: LoaderConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn load(&self, coordinate: Coordinate, before: NaiveDate, after: NaiveDate) -> Result<RasterPair> {
        coordinate.validate()?;
        if before >= after {
            return Err(DamageError::InvalidDateRange {
                before: before.to_string(),
                after: after.to_string(),
            });
        }

        let size = self.config.window_pixels;
        let extent = coordinate.window(size, size, self.config.resolution);
        let before_window = self.window(extent, before)?;
        let after_window = self.window(extent, after)?;

        info!(
            "Loading captures around ({:.4}, {:.4}) for {} and {}",
            coordinate.lat, coordinate.lng, before, after
        );

        let fetch_both = async {
            futures::try_join!(
                self.source.fetch(&before_window),
                self.source.fetch(&after_window)
            )
        };
        let (before_raster, after_raster) = tokio::time::timeout(self.config.fetch_timeout, fetch_both)
            .await
            .map_err(|_| {
                DamageError::ImagerySourceUnavailable(format!(
                    "timed out after {:?}",
                    self.config.fetch_timeout
                ))
            })??;

        let before_raster = align(before_raster, &before_window)?;
        let after_raster = align(after_raster, &after_window)?;
        Ok(RasterPair::new(coordinate, before_raster, after_raster))
    }

    /// The mosaic window starting at `anchor`. Fails when its end falls past
    /// the last representable date.
    fn window(&self, extent: BoundingBox, anchor: NaiveDate) -> Result<CaptureWindow> {
        let end = anchor
            .checked_add_signed(DateSpan::days(self.config.mosaic_days))
            .ok_or_else(|| DamageError::InvalidDateRange {
                before: anchor.to_string(),
                after: format!("{anchor} plus {} days", self.config.mosaic_days),
            })?;
        Ok(CaptureWindow {
            extent,
            width: self.config.window_pixels,
            height: self.config.window_pixels,
            resolution: self.config.resolution,
            start: anchor,
            end,
        })
    }
}

/// Puts a capture onto the window grid, resampling when its size differs, and
/// rejects captures without any coverage.
pub fn align(raster: GeoRaster, window: &CaptureWindow) -> Result<GeoRaster> {
    if raster.valid_count() == 0 {
        return Err(DamageError::ImagerySourceUnavailable(format!(
            "capture dated {} has no coverage",
            raster.captured_on()
        )));
    }

    let on_grid = raster.width() == window.width
        && raster.height() == window.height
        && (raster.resolution() - window.resolution).abs() < f64::EPSILON;
    if on_grid {
        return Ok(raster);
    }

    debug!(
        "Resampling capture {}x{} onto {}x{} window",
        raster.width(),
        raster.height(),
        window.width,
        window.height
    );
    let samples = resample_nearest(&raster, window.width, window.height);
    GeoRaster::new(
        window.width,
        window.height,
        samples,
        window.extent,
        window.resolution,
        raster.captured_on(),
        raster.no_data(),
    )
}

fn resample_nearest(raster: &GeoRaster, width: u32, height: u32) -> Vec<Backscatter> {
    let source = raster.samples();
    let (source_width, source_height) = (raster.width() as u64, raster.height() as u64);
    let mut samples = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height as u64 {
        // Pixel-center mapping.
        let sy = ((2 * y + 1) * source_height / (2 * height as u64)).min(source_height - 1);
        for x in 0..width as u64 {
            let sx = ((2 * x + 1) * source_width / (2 * width as u64)).min(source_width - 1);
            samples.push(source[(sy * source_width + sx) as usize]);
        }
    }
    samples
}
