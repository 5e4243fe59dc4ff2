// THEORY:
// The `pipeline` module is the top-level API of the damage engine. Its centrepiece is
// the `DamageGate`, which answers one analysis request either from the live stack
// (Loader -> Detector -> Estimator -> Renderer) or from the frozen canned result,
// and records the figures it returned with the grounding adapter.
//
// Key architectural principles:
// 1.  **Injected Mode**: The execution mode is a configuration value handed to the gate
//     at construction. It is never mutated afterwards, so several gates in different
//     modes can live side by side in one process.
// 2.  **Tagged Outcomes**: A request resolves to `Resolution::Live`, `Resolution::Canned`
//     or `Resolution::Fallback`. The gate pattern-matches on the live pipeline's
//     `Result` to decide on fallback; nothing is caught implicitly.
// 3.  **Caller Errors Are Never Masked**: Bad coordinates, valuations and date ranges are
//     rejected in every mode before any state is written. Only infrastructure and data
//     failures of the live path are downgraded to the canned result, and every downgrade
//     is logged as a warning with its cause.
// 4.  **One Output Shape**: Live, canned and fallback responses are the same
//     `AnalysisReport` type, so a caller cannot tell them apart by structure.

use crate::core_modules::canned::{CannedResult, CANNED_CLAIM_ID, CANNED_OVERLAY_REFERENCE, CANNED_SOURCE};
use crate::core_modules::change_detector::{DetectorConfig, change_detector};
use crate::core_modules::estimator::{self, AreaUnit, validate_valuation};
use crate::core_modules::geo_raster::Coordinate;
use crate::core_modules::grounding::{FactSheet, FactStore};
use crate::core_modules::mask_renderer;
use crate::core_modules::overlay_store::{OverlayStore, encode_reference};
use crate::core_modules::raster_loader::{ImagerySource, LoaderConfig, RasterPairLoader};
use crate::error::{DamageError, Result};
use chrono::{Duration, NaiveDate, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

// Re-export key data structures for the public API.
pub use crate::core_modules::estimator::DamageEstimate;
pub use crate::core_modules::grounding::{ClaimSummary, ResponseMode};

/// Days between the before and after anchors when the caller gives neither.
pub const DEFAULT_ANCHOR_INTERVAL_DAYS: i64 = 14;
pub const DISASTER_TYPE: &str = "flood";
/// Prefix of every overlay key written by a live analysis. The canned overlay
/// lives outside this namespace, so no claim id can replace it.
pub const LIVE_OVERLAY_PREFIX: &str = "live-";

/// Which path the gate is configured to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Live,
    #[default]
    Canned,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(ExecutionMode::Live),
            "canned" | "demo" => Ok(ExecutionMode::Canned),
            other => Err(format!("unknown execution mode '{other}', expected 'live' or 'canned'")),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Live => write!(f, "live"),
            ExecutionMode::Canned => write!(f, "canned"),
        }
    }
}

/// Configuration for the DamageGate, allowing for tunable behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisConfig {
    pub mode: ExecutionMode,
    pub detector: DetectorConfig,
    pub loader: LoaderConfig,
    /// Unit the caller's `value_per_unit_area` is expressed in.
    pub area_unit: AreaUnit,
    pub anchor_interval_days: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            detector: DetectorConfig::default(),
            loader: LoaderConfig::default(),
            area_unit: AreaUnit::default(),
            anchor_interval_days: DEFAULT_ANCHOR_INTERVAL_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub claim_id: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub crop_type: String,
    pub value_per_unit_area: f64,
    #[serde(default)]
    pub before_date: Option<NaiveDate>,
    #[serde(default)]
    pub after_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteInfo {
    pub source: String,
    pub before_date: NaiveDate,
    pub after_date: NaiveDate,
    pub resolution_m: f64,
}

/// The response of one analysis, identical in shape for every mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub claim_id: String,
    pub mode: ResponseMode,
    pub location: Coordinate,
    pub crop_type: String,
    #[serde(flatten)]
    pub estimate: DamageEstimate,
    pub damage_percent: f64,
    pub value_per_unit_area: f64,
    pub overlay_reference: String,
    pub analysis_date: NaiveDate,
    pub disaster_type: String,
    pub satellite_info: SatelliteInfo,
}

/// How a request was answered.
#[derive(Debug)]
pub enum Resolution {
    Live(AnalysisReport),
    Canned(AnalysisReport),
    /// The live path failed and the canned result was served instead.
    Fallback { report: AnalysisReport, cause: DamageError },
}

impl Resolution {
    pub fn report(&self) -> &AnalysisReport {
        match self {
            Resolution::Live(report) | Resolution::Canned(report) => report,
            Resolution::Fallback { report, .. } => report,
        }
    }

    pub fn into_report(self) -> AnalysisReport {
        match self {
            Resolution::Live(report) | Resolution::Canned(report) => report,
            Resolution::Fallback { report, .. } => report,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback { .. })
    }
}

/// The main, top-level struct for the damage engine.
pub struct DamageGate<S: ImagerySource> {
    config: AnalysisConfig,
    loader: RasterPairLoader<S>,
    overlays: Arc<dyn OverlayStore>,
    facts: Arc<FactStore>,
    canned: CannedResult,
}

impl<S: ImagerySource> DamageGate<S> {
    /// Builds a gate and stores the canned overlay so the canned reference always resolves.
    pub fn new(
        config: AnalysisConfig,
        source: S,
        overlays: Arc<dyn OverlayStore>,
        facts: Arc<FactStore>,
    ) -> Result<Self> {
        config.detector.validate()?;
        let canned = CannedResult::galati_flood();
        let canned_overlay = mask_renderer::render(&canned.mask()?)?;
        overlays.put(CANNED_OVERLAY_REFERENCE, &canned_overlay)?;
        info!("Damage gate ready in {} mode", config.mode);

        Ok(Self {
            loader: RasterPairLoader::new(source, config.loader),
            config,
            overlays,
            facts,
            canned,
        })
    }

    pub fn mode(&self) -> ExecutionMode {
        self.config.mode
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn facts(&self) -> &Arc<FactStore> {
        &self.facts
    }

    pub fn overlays(&self) -> &Arc<dyn OverlayStore> {
        &self.overlays
    }

    /// Answers a request and records the figures it returns as the claim's current facts.
    pub async fn resolve(&self, request: &AnalysisRequest) -> Result<Resolution> {
        let coordinate = Coordinate::new(request.lat, request.lng)?;
        validate_valuation(request.value_per_unit_area)?;
        let (before, after) = resolve_anchors(request, self.config.anchor_interval_days, Utc::now().date_naive())?;

        let resolution = match self.config.mode {
            ExecutionMode::Canned => {
                info!(
                    "Canned mode: serving frozen result, ignoring ({:.4}, {:.4})",
                    coordinate.lat, coordinate.lng
                );
                let claim_id = request.claim_id.as_deref().unwrap_or(CANNED_CLAIM_ID);
                Resolution::Canned(self.canned_report(claim_id, ResponseMode::Canned))
            }
            ExecutionMode::Live => {
                let claim_id = request
                    .claim_id
                    .clone()
                    .unwrap_or_else(|| format!("claim-{}", Uuid::new_v4()));
                match self.run_live(&claim_id, coordinate, request, before, after).await {
                    Ok(report) => Resolution::Live(report),
                    Err(e) if e.is_caller_error() => return Err(e),
                    Err(cause) => {
                        warn!("Live analysis for claim {claim_id} downgraded to canned result: {cause}");
                        Resolution::Fallback {
                            report: self.canned_report(&claim_id, ResponseMode::LiveFallback),
                            cause,
                        }
                    }
                }
            }
        };

        let report = resolution.report();
        self.facts.record(FactSheet::from_estimate(
            &report.claim_id,
            &report.estimate,
            report.mode,
            Utc::now(),
        ));
        Ok(resolution)
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport> {
        Ok(self.resolve(request).await?.into_report())
    }

    async fn run_live(
        &self,
        claim_id: &str,
        coordinate: Coordinate,
        request: &AnalysisRequest,
        before: NaiveDate,
        after: NaiveDate,
    ) -> Result<AnalysisReport> {
        info!("Live analysis for claim {claim_id} from {before} to {after}");
        let pair = self.loader.load(coordinate, before, after).await?;
        let (before_date, after_date) = (pair.before_date(), pair.after_date());
        let resolution_m = pair.after.resolution();

        let mask = change_detector::detect(pair, &self.config.detector)?;
        debug!(
            "Claim {claim_id}: {} newly bright pixels, mean delta {:?} dB",
            mask.newly_bright_count(),
            mask.mean_delta()
        );
        let estimate = estimator::estimate(
            &mask,
            resolution_m,
            request.value_per_unit_area,
            self.config.area_unit,
        )?;
        let overlay = mask_renderer::render(&mask)?;
        let overlay_reference = live_overlay_reference(claim_id);
        self.overlays.put(&overlay_reference, &overlay)?;

        info!(
            "Live analysis for claim {claim_id} complete: {} of {} pixels damaged",
            estimate.damaged_pixel_count, estimate.valid_pixel_count
        );
        Ok(AnalysisReport {
            claim_id: claim_id.to_string(),
            mode: ResponseMode::Live,
            location: coordinate,
            crop_type: request.crop_type.clone(),
            damage_percent: estimate.damage_percent(),
            value_per_unit_area: estimate.unit_value,
            estimate,
            overlay_reference,
            analysis_date: Utc::now().date_naive(),
            disaster_type: DISASTER_TYPE.to_string(),
            satellite_info: SatelliteInfo {
                source: CANNED_SOURCE.to_string(),
                before_date,
                after_date,
                resolution_m,
            },
        })
    }

    fn canned_report(&self, claim_id: &str, mode: ResponseMode) -> AnalysisReport {
        let canned = &self.canned;
        AnalysisReport {
            claim_id: claim_id.to_string(),
            mode,
            location: canned.location,
            crop_type: canned.crop_type.clone(),
            estimate: canned.estimate.clone(),
            damage_percent: canned.estimate.damage_percent(),
            value_per_unit_area: canned.estimate.unit_value,
            overlay_reference: canned.overlay_reference.clone(),
            analysis_date: canned.analysis_date,
            disaster_type: DISASTER_TYPE.to_string(),
            satellite_info: SatelliteInfo {
                source: canned.source.clone(),
                before_date: canned.before_date,
                after_date: canned.after_date,
                resolution_m: canned.resolution_m,
            },
        }
    }
}

/// Overlay key of a claim's live analysis.
pub fn live_overlay_reference(claim_id: &str) -> String {
    format!("{LIVE_OVERLAY_PREFIX}{}", encode_reference(claim_id))
}

/// Picks the before/after anchors: `after` defaults to `today`, `before` to
/// `interval_days` earlier. The before anchor must be strictly earlier.
pub fn resolve_anchors(
    request: &AnalysisRequest,
    interval_days: i64,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate)> {
    let after = request.after_date.unwrap_or(today);
    let before = match request.before_date {
        Some(before) => before,
        None => after
            .checked_sub_signed(Duration::days(interval_days))
            .ok_or_else(|| DamageError::InvalidDateRange {
                before: format!("{after} minus {interval_days} days"),
                after: after.to_string(),
            })?,
    };
    if before >= after {
        return Err(DamageError::InvalidDateRange {
            before: before.to_string(),
            after: after.to_string(),
        });
    }
    Ok((before, after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geo_raster::{DEFAULT_NO_DATA, GeoRaster};
    use crate::core_modules::overlay_store::MemoryOverlayStore;
    use crate::core_modules::raster_loader::FixtureImagerySource;
    use std::collections::BTreeSet;

    const LAND: f32 = -10.0;
    const WATER: f32 = -25.0;
    const LAT: f64 = 45.4;
    const LNG: f64 = 28.0;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn capture(day: u32, samples: Vec<f32>) -> GeoRaster {
        let extent = Coordinate::new(LAT, LNG).unwrap().window(4, 4, 10.0);
        GeoRaster::new(4, 4, samples, extent, 10.0, date(9, day), DEFAULT_NO_DATA).unwrap()
    }

    /// Before: three land pixels and one already-water pixel per row.
    /// After: two more land pixels in the first row turn to water.
    fn scenario_source() -> FixtureImagerySource {
        let row = [LAND, LAND, LAND, WATER];
        let before: Vec<f32> = row.iter().copied().cycle().take(16).collect();
        let mut after = before.clone();
        after[0] = WATER;
        after[1] = WATER;
        FixtureImagerySource::new()
            .with_capture(capture(3, before))
            .with_capture(capture(16, after))
    }

    fn config(mode: ExecutionMode) -> AnalysisConfig {
        AnalysisConfig {
            mode,
            loader: LoaderConfig {
                window_pixels: 4,
                resolution: 10.0,
                ..LoaderConfig::default()
            },
            area_unit: AreaUnit::SquareMeters,
            ..AnalysisConfig::default()
        }
    }

    fn gate<S: ImagerySource>(mode: ExecutionMode, source: S) -> DamageGate<S> {
        DamageGate::new(
            config(mode),
            source,
            Arc::new(MemoryOverlayStore::new()),
            Arc::new(FactStore::new()),
        )
        .unwrap()
    }

    fn request(claim_id: &str) -> AnalysisRequest {
        AnalysisRequest {
            claim_id: Some(claim_id.to_string()),
            lat: LAT,
            lng: LNG,
            crop_type: "maize".to_string(),
            value_per_unit_area: 5.0,
            before_date: Some(date(9, 1)),
            after_date: Some(date(9, 14)),
        }
    }

    fn field_names(report: &AnalysisReport) -> BTreeSet<String> {
        match serde_json::to_value(report).unwrap() {
            serde_json::Value::Object(map) => map.keys().cloned().collect(),
            other => panic!("report serialised to {other}"),
        }
    }

    #[tokio::test]
    async fn live_scenario_reports_two_damaged_pixels() {
        let gate = gate(ExecutionMode::Live, scenario_source());
        let resolution = gate.resolve(&request("claim-4x4")).await.unwrap();
        assert!(matches!(resolution, Resolution::Live(_)));

        let report = resolution.into_report();
        assert_eq!(report.mode, ResponseMode::Live);
        assert_eq!(report.estimate.damaged_pixel_count, 2);
        assert!((report.estimate.damaged_area - 200.0).abs() < 1e-9);
        assert!((report.estimate.financial_loss - 1000.0).abs() < 1e-9);
        assert_eq!(report.satellite_info.before_date, date(9, 3));
        assert_eq!(report.satellite_info.after_date, date(9, 16));
        assert_eq!(report.crop_type, "maize");

        let png = gate.overlays().get(&report.overlay_reference).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let facts = gate.facts().current_facts("claim-4x4").unwrap();
        assert_eq!(facts.financial_loss, report.estimate.financial_loss);
        assert_eq!(facts.mode, ResponseMode::Live);
        assert_eq!(report.overlay_reference, "live-claim-4x4");
    }

    #[tokio::test]
    async fn identical_captures_report_no_damage() {
        let source = FixtureImagerySource::new()
            .with_capture(capture(3, vec![LAND; 16]))
            .with_capture(capture(16, vec![LAND; 16]));
        let report = gate(ExecutionMode::Live, source).analyze(&request("dry")).await.unwrap();
        assert_eq!(report.mode, ResponseMode::Live);
        assert_eq!(report.estimate.damage_fraction, 0.0);
        assert_eq!(report.estimate.financial_loss, 0.0);
    }

    #[tokio::test]
    async fn unavailable_imagery_falls_back_to_canned_shape() {
        let live = gate(ExecutionMode::Live, FixtureImagerySource::new());
        let resolution = live.resolve(&request("claim-x")).await.unwrap();
        assert!(resolution.is_fallback());
        match &resolution {
            Resolution::Fallback { cause, .. } => {
                assert!(matches!(cause, DamageError::ImagerySourceUnavailable(_)))
            }
            other => panic!("expected fallback, got {other:?}"),
        }
        let fallback = resolution.into_report();
        assert_eq!(fallback.mode, ResponseMode::LiveFallback);
        assert_eq!(fallback.claim_id, "claim-x");
        assert_eq!(fallback.estimate.financial_loss, 153_000.0);
        assert!(live.overlays().get(&fallback.overlay_reference).is_ok());
        assert_eq!(live.facts().current_facts("claim-x").unwrap().mode, ResponseMode::LiveFallback);

        let canned = gate(ExecutionMode::Canned, FixtureImagerySource::new())
            .analyze(&request("claim-x"))
            .await
            .unwrap();
        assert_eq!(canned.mode, ResponseMode::Canned);
        assert_eq!(field_names(&fallback), field_names(&canned));
        assert_eq!(field_names(&fallback), field_names(&live_report().await));
    }

    #[tokio::test]
    async fn anonymous_fallback_keeps_the_generated_claim_id() {
        let live = gate(ExecutionMode::Live, FixtureImagerySource::new());
        let anonymous = AnalysisRequest {
            claim_id: None,
            ..request("unused")
        };
        let report = live.analyze(&anonymous).await.unwrap();
        assert_eq!(report.mode, ResponseMode::LiveFallback);
        assert!(report.claim_id.starts_with("claim-"), "got {}", report.claim_id);
        assert_eq!(live.facts().current_facts(&report.claim_id).unwrap().mode, ResponseMode::LiveFallback);
        assert!(matches!(
            live.facts().current_facts(CANNED_CLAIM_ID),
            Err(DamageError::NoEstimateYet(_))
        ));
    }

    #[tokio::test]
    async fn disjoint_coverage_falls_back_for_lack_of_valid_pixels() {
        let mut before = vec![LAND; 16];
        let mut after = vec![WATER; 16];
        before[8..].fill(DEFAULT_NO_DATA);
        after[..8].fill(DEFAULT_NO_DATA);
        let source = FixtureImagerySource::new()
            .with_capture(capture(3, before))
            .with_capture(capture(16, after));
        let live = gate(ExecutionMode::Live, source);

        let resolution = live.resolve(&request("patchy")).await.unwrap();
        match &resolution {
            Resolution::Fallback { report, cause } => {
                assert!(matches!(cause, DamageError::NoValidPixels));
                assert_eq!(report.mode, ResponseMode::LiveFallback);
                assert_eq!(report.overlay_reference, CANNED_OVERLAY_REFERENCE);
            }
            other => panic!("expected fallback, got {other:?}"),
        }
        assert!(live.overlays().get(&live_overlay_reference("patchy")).is_err());
    }

    #[tokio::test]
    async fn live_claim_cannot_replace_the_canned_overlay() {
        let live = gate(ExecutionMode::Live, scenario_source());
        let canned_png = mask_renderer::render(&CannedResult::galati_flood().mask().unwrap())
            .unwrap()
            .png;

        let report = live.analyze(&request(CANNED_OVERLAY_REFERENCE)).await.unwrap();
        assert_eq!(report.mode, ResponseMode::Live);
        assert_eq!(report.overlay_reference, "live-canned-flood-mask-galati");
        assert_eq!(live.overlays().get(CANNED_OVERLAY_REFERENCE).unwrap(), canned_png);
        assert_ne!(live.overlays().get(&report.overlay_reference).unwrap(), canned_png);
    }

    #[tokio::test]
    async fn unsafe_claim_ids_get_distinct_overlays() {
        let live = gate(ExecutionMode::Live, scenario_source());
        let slash = live.analyze(&request("a/b")).await.unwrap();
        let space = live.analyze(&request("a b")).await.unwrap();
        assert_eq!(slash.mode, ResponseMode::Live);
        assert_ne!(slash.overlay_reference, space.overlay_reference);
        assert!(live.overlays().get(&slash.overlay_reference).is_ok());
        assert!(live.overlays().get(&space.overlay_reference).is_ok());
    }

    async fn live_report() -> AnalysisReport {
        gate(ExecutionMode::Live, scenario_source())
            .analyze(&request("shape"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn out_of_range_coordinate_is_rejected_without_state() {
        for mode in [ExecutionMode::Live, ExecutionMode::Canned] {
            let gate = gate(mode, scenario_source());
            let bad = AnalysisRequest {
                lat: 999.0,
                lng: 999.0,
                ..request("bad-coordinate")
            };
            let result = gate.resolve(&bad).await;
            assert!(matches!(result, Err(DamageError::InvalidCoordinate { .. })));
            assert!(matches!(
                gate.facts().current_facts("bad-coordinate"),
                Err(DamageError::NoEstimateYet(_))
            ));
            assert!(gate.overlays().get("bad-coordinate").is_err());
        }
    }

    #[tokio::test]
    async fn non_positive_valuation_is_rejected_in_every_mode() {
        for mode in [ExecutionMode::Live, ExecutionMode::Canned] {
            let gate = gate(mode, scenario_source());
            let bad = AnalysisRequest {
                value_per_unit_area: 0.0,
                ..request("bad-value")
            };
            assert!(matches!(gate.resolve(&bad).await, Err(DamageError::InvalidValuation(_))));
        }
    }

    #[tokio::test]
    async fn canned_mode_ignores_location_and_uses_frozen_figures() {
        let gate = gate(ExecutionMode::Canned, scenario_source());
        let anonymous = AnalysisRequest {
            claim_id: None,
            ..request("unused")
        };
        let report = gate.analyze(&anonymous).await.unwrap();
        assert_eq!(report.claim_id, CANNED_CLAIM_ID);
        assert_eq!(report.location, CannedResult::galati_flood().location);
        assert_eq!(report.estimate.damaged_area, 127.5);
        assert_eq!(report.overlay_reference, CANNED_OVERLAY_REFERENCE);
        assert!(gate.overlays().get(CANNED_OVERLAY_REFERENCE).is_ok());
    }

    #[tokio::test]
    async fn both_modes_run_side_by_side() {
        let live = gate(ExecutionMode::Live, scenario_source());
        let canned = gate(ExecutionMode::Canned, scenario_source());
        let (first, second) = (request("side"), request("side"));
        let (a, b) = tokio::join!(live.analyze(&first), canned.analyze(&second));
        assert_eq!(a.unwrap().mode, ResponseMode::Live);
        assert_eq!(b.unwrap().mode, ResponseMode::Canned);
        assert_eq!(live.mode(), ExecutionMode::Live);
        assert_eq!(canned.mode(), ExecutionMode::Canned);
    }

    #[tokio::test]
    async fn reanalysis_keeps_history_and_latest_figures() {
        let gate = gate(ExecutionMode::Live, scenario_source());
        gate.analyze(&request("again")).await.unwrap();
        let second = AnalysisRequest {
            value_per_unit_area: 7.0,
            ..request("again")
        };
        gate.analyze(&second).await.unwrap();

        let facts = gate.facts();
        assert_eq!(facts.history("again").unwrap().len(), 2);
        assert!((facts.current_facts("again").unwrap().financial_loss - 1400.0).abs() < 1e-9);
    }

    #[test]
    fn anchors_default_to_a_fourteen_day_interval() {
        let open = AnalysisRequest {
            before_date: None,
            after_date: None,
            ..request("anchors")
        };
        let (before, after) = resolve_anchors(&open, DEFAULT_ANCHOR_INTERVAL_DAYS, date(9, 15)).unwrap();
        assert_eq!(after, date(9, 15));
        assert_eq!(before, date(9, 1));

        let inverted = AnalysisRequest {
            before_date: Some(date(9, 20)),
            ..open
        };
        assert!(matches!(
            resolve_anchors(&inverted, DEFAULT_ANCHOR_INTERVAL_DAYS, date(9, 15)),
            Err(DamageError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn anchors_at_the_calendar_edges_are_date_errors() {
        let open = AnalysisRequest {
            before_date: None,
            after_date: Some(NaiveDate::MIN),
            ..request("edge")
        };
        assert!(matches!(
            resolve_anchors(&open, DEFAULT_ANCHOR_INTERVAL_DAYS, date(9, 15)),
            Err(DamageError::InvalidDateRange { .. })
        ));
    }

    #[tokio::test]
    async fn calendar_edges_are_rejected_in_every_mode() {
        let earliest = AnalysisRequest {
            before_date: None,
            after_date: Some(NaiveDate::MIN),
            ..request("edge-min")
        };
        let canned = gate(ExecutionMode::Canned, scenario_source());
        assert!(matches!(canned.resolve(&earliest).await, Err(DamageError::InvalidDateRange { .. })));
        assert!(canned.facts().current_facts("edge-min").is_err());

        let latest = AnalysisRequest {
            before_date: None,
            after_date: Some(NaiveDate::MAX),
            ..request("edge-max")
        };
        let live = gate(ExecutionMode::Live, scenario_source());
        assert!(matches!(live.resolve(&latest).await, Err(DamageError::InvalidDateRange { .. })));
        assert!(live.facts().current_facts("edge-max").is_err());
    }

    #[test]
    fn execution_mode_parses_from_text() {
        assert_eq!("live".parse::<ExecutionMode>().unwrap(), ExecutionMode::Live);
        assert_eq!(" Canned ".parse::<ExecutionMode>().unwrap(), ExecutionMode::Canned);
        assert!("sometimes".parse::<ExecutionMode>().is_err());
    }
}
