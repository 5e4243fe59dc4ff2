// THEORY:
// The canned result is a frozen, hand-authored analysis used verbatim whenever the
// gate runs in canned mode or has to abandon a live run. It has the same shape as a
// live result, down to a real rendered overlay, so a caller cannot tell by structure
// alone which path produced a response.
//
// The record reproduces a flood event over wheat fields near Pechea, Galați County
// (September 2024). Its figures are internally consistent with the estimator: 12 750
// damaged pixels of 15 000 valid at 10 m resolution give 127.5 ha of 150 ha, and at
// 1 200 per hectare a loss of exactly 153 000.

use crate::core_modules::damage_mask::{DamageMask, MaskClass};
use crate::core_modules::estimator::{AreaUnit, DamageEstimate};
use crate::core_modules::geo_raster::Coordinate;
use crate::error::Result;
use chrono::NaiveDate;

pub const CANNED_CLAIM_ID: &str = "SF-2024-GAL-001";
pub const CANNED_OVERLAY_REFERENCE: &str = "canned-flood-mask-galati";
pub const CANNED_CROP_TYPE: &str = "wheat";
pub const CANNED_SOURCE: &str = "Sentinel-1 GRD";

const CANNED_MASK_WIDTH: u32 = 150;
const CANNED_MASK_HEIGHT: u32 = 100;
const CANNED_RESOLUTION_M: f64 = 10.0;

/// Frozen analysis returned by the canned and fallback paths.
#[derive(Debug, Clone, PartialEq)]
pub struct CannedResult {
    pub claim_id: String,
    pub location: Coordinate,
    pub crop_type: String,
    pub estimate: DamageEstimate,
    pub overlay_reference: String,
    pub analysis_date: NaiveDate,
    pub before_date: NaiveDate,
    pub after_date: NaiveDate,
    pub resolution_m: f64,
    pub source: String,
}

impl CannedResult {
    pub fn galati_flood() -> Self {
        Self {
            claim_id: CANNED_CLAIM_ID.to_string(),
            location: Coordinate {
                lat: 45.8838,
                lng: 27.9432,
            },
            crop_type: CANNED_CROP_TYPE.to_string(),
            estimate: DamageEstimate {
                damaged_pixel_count: 12_750,
                valid_pixel_count: 15_000,
                damaged_area: 127.5,
                total_area: 150.0,
                damage_fraction: 0.85,
                financial_loss: 153_000.0,
                unit_value: 1_200.0,
                area_unit: AreaUnit::Hectares,
            },
            overlay_reference: CANNED_OVERLAY_REFERENCE.to_string(),
            analysis_date: date(2024, 9, 15),
            before_date: date(2024, 9, 1),
            after_date: date(2024, 9, 14),
            resolution_m: CANNED_RESOLUTION_M,
            source: CANNED_SOURCE.to_string(),
        }
    }

    /// Synthetic mask behind the canned overlay: water spreading in from the west
    /// edge, alternating 127 and 128 flooded pixels per row.
    pub fn mask(&self) -> Result<DamageMask> {
        let mut cells = Vec::with_capacity((CANNED_MASK_WIDTH * CANNED_MASK_HEIGHT) as usize);
        for y in 0..CANNED_MASK_HEIGHT {
            let flooded = if y % 2 == 0 { 127 } else { 128 };
            for x in 0..CANNED_MASK_WIDTH {
                cells.push(if x < flooded { MaskClass::Damaged } else { MaskClass::Unchanged });
            }
        }
        DamageMask::new(CANNED_MASK_WIDTH, CANNED_MASK_HEIGHT, cells, self.resolution_m)
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}
