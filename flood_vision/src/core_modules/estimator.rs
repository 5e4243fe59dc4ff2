// THEORY:
// The estimator is the only place in the system where money is computed. It takes
// the mask's pixel counts and turns them into a physical area and then a loss, with
// no other inputs than the ground resolution and the caller's unit value.
//
//   area per pixel   = resolution²  (m²), scaled into the caller's area unit
//   damaged_area     = damaged_pixel_count × area per pixel
//   damage_fraction  = damaged_pixel_count / valid_pixel_count
//   financial_loss   = damaged_area × unit_value
//
// The loss is never estimated independently of the area: it is always exactly the
// product above, which is what lets the grounding adapter re-derive payouts later.

use crate::core_modules::damage_mask::DamageMask;
use crate::core_modules::geo_raster::Meters;
use crate::error::{DamageError, Result};
use serde::{Deserialize, Serialize};

pub const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Area unit the valuation is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AreaUnit {
    #[serde(rename = "m2")]
    SquareMeters,
    #[default]
    #[serde(rename = "ha")]
    Hectares,
}

impl AreaUnit {
    /// Multiplier from square meters into this unit.
    pub fn from_square_meters(&self) -> f64 {
        match self {
            AreaUnit::SquareMeters => 1.0,
            AreaUnit::Hectares => 1.0 / SQUARE_METERS_PER_HECTARE,
        }
    }
}

/// Area and loss figures derived from one damage mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageEstimate {
    pub damaged_pixel_count: usize,
    pub valid_pixel_count: usize,
    /// Damaged area in `area_unit`.
    pub damaged_area: f64,
    /// Area of all valid pixels in `area_unit`.
    pub total_area: f64,
    /// Damaged share of valid pixels, in [0, 1].
    pub damage_fraction: f64,
    /// `damaged_area × unit_value`.
    pub financial_loss: f64,
    pub unit_value: f64,
    pub area_unit: AreaUnit,
}

impl DamageEstimate {
    pub fn damage_percent(&self) -> f64 {
        self.damage_fraction * 100.0
    }
}

/// Rejects zero, negative and non-finite unit values.
pub fn validate_valuation(unit_value: f64) -> Result<()> {
    if unit_value.is_finite() && unit_value > 0.0 {
        Ok(())
    } else {
        Err(DamageError::InvalidValuation(unit_value))
    }
}

pub fn estimate(
    mask: &DamageMask,
    resolution: Meters,
    unit_value: f64,
    area_unit: AreaUnit,
) -> Result<DamageEstimate> {
    validate_valuation(unit_value)?;
    if !(resolution.is_finite() && resolution > 0.0) {
        return Err(DamageError::InvalidRaster(format!(
            "resolution must be positive, got {resolution}"
        )));
    }

    let valid_pixel_count = mask.valid_count();
    if valid_pixel_count == 0 {
        return Err(DamageError::NoValidPixels);
    }
    let damaged_pixel_count = mask.damaged_count();

    let pixel_area = resolution * resolution * area_unit.from_square_meters();
    let damaged_area = damaged_pixel_count as f64 * pixel_area;

    Ok(DamageEstimate {
        damaged_pixel_count,
        valid_pixel_count,
        damaged_area,
        total_area: valid_pixel_count as f64 * pixel_area,
        damage_fraction: damaged_pixel_count as f64 / valid_pixel_count as f64,
        financial_loss: damaged_area * unit_value,
        unit_value,
        area_unit,
    })
}
