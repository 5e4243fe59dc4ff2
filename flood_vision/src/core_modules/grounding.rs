// THEORY:
// The grounding adapter is the read-only data boundary between the estimator and
// the narrative collaborator that talks to claimants. Any number the narrative
// states about money or area must come from here: either a stored figure or a
// fixed arithmetic rule applied to stored figures.
//
// Key architectural principles:
// 1.  **Write Once Per Analysis**: The gate records one `FactSheet` per completed
//     analysis. Nothing else writes, and sheets are never edited in place.
// 2.  **Latest Write Wins**: A claim may be analysed several times. Every sheet is
//     kept as history; `current_facts` answers with the most recent one.
// 3.  **Derived Answers Only**: Payout questions are answered by
//     `damaged_area × unit_value` over stored figures, the same rule the estimator
//     used, so the narrative never has to compute money itself.

use crate::core_modules::estimator::{AreaUnit, DamageEstimate};
use crate::error::{DamageError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Which path actually produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    Live,
    Canned,
    LiveFallback,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Live => "live",
            ResponseMode::Canned => "canned",
            ResponseMode::LiveFallback => "live_fallback",
        }
    }
}

/// Numeric facts of one analysis, as exposed to the narrative layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactSheet {
    pub claim_id: String,
    pub damage_fraction: f64,
    pub damage_percent: f64,
    pub damaged_area: f64,
    pub total_area: f64,
    pub financial_loss: f64,
    pub unit_value: f64,
    pub area_unit: AreaUnit,
    /// Response mode that produced these figures.
    pub mode: ResponseMode,
    pub as_of: DateTime<Utc>,
}

impl FactSheet {
    pub fn from_estimate(claim_id: &str, estimate: &DamageEstimate, mode: ResponseMode, as_of: DateTime<Utc>) -> Self {
        Self {
            claim_id: claim_id.to_string(),
            damage_fraction: estimate.damage_fraction,
            damage_percent: estimate.damage_percent(),
            damaged_area: estimate.damaged_area,
            total_area: estimate.total_area,
            financial_loss: estimate.financial_loss,
            unit_value: estimate.unit_value,
            area_unit: estimate.area_unit,
            mode,
            as_of,
        }
    }

    /// Payout for a requested part of the damaged area, capped at the damaged area.
    pub fn payout_for_area(&self, sub_area: f64) -> Result<f64> {
        if !(sub_area.is_finite() && sub_area >= 0.0) {
            return Err(DamageError::InvalidValuation(sub_area));
        }
        Ok(sub_area.min(self.damaged_area) * self.unit_value)
    }

    pub fn claim_summary(&self) -> ClaimSummary {
        ClaimSummary {
            claim_id: self.claim_id.clone(),
            estimated_payout: self.financial_loss,
            damage_percent: self.damage_percent,
            status: "analysis_complete".to_string(),
        }
    }

    /// Plain-text fact block handed to the narrative collaborator.
    pub fn context_block(&self) -> String {
        let unit = match self.area_unit {
            AreaUnit::Hectares => "ha",
            AreaUnit::SquareMeters => "m2",
        };
        format!(
            "CURRENT DAMAGE ANALYSIS DATA:\n\
             - Claim ID: {}\n\
             - Total Analysed Area: {:.2} {unit}\n\
             - Damaged Area: {:.2} {unit}\n\
             - Damage Percentage: {:.2}%\n\
             - Value per {unit}: {:.2}\n\
             - Estimated Financial Loss: {:.2}\n\
             - Payout Formula: damaged_area x value_per_{unit} = {:.2} x {:.2} = {:.2}\n\
             - Source: {}\n\
             - As Of: {}",
            self.claim_id,
            self.total_area,
            self.damaged_area,
            self.damage_percent,
            self.unit_value,
            self.financial_loss,
            self.damaged_area,
            self.unit_value,
            self.financial_loss,
            self.mode.as_str(),
            self.as_of.to_rfc3339(),
        )
    }
}

/// Compact status of a claim, as shown next to a narrative answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSummary {
    pub claim_id: String,
    pub estimated_payout: f64,
    pub damage_percent: f64,
    pub status: String,
}

/// In-memory fact sheets keyed by claim id.
#[derive(Debug, Default)]
pub struct FactStore {
    sheets: RwLock<HashMap<String, Vec<FactSheet>>>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, sheet: FactSheet) {
        let mut sheets = self.sheets.write().unwrap_or_else(PoisonError::into_inner);
        sheets.entry(sheet.claim_id.clone()).or_default().push(sheet);
    }

    pub fn current_facts(&self, claim_id: &str) -> Result<FactSheet> {
        let sheets = self.sheets.read().unwrap_or_else(PoisonError::into_inner);
        sheets
            .get(claim_id)
            .and_then(|history| history.last())
            .cloned()
            .ok_or_else(|| DamageError::NoEstimateYet(claim_id.to_string()))
    }

    /// All sheets for a claim, oldest first.
    pub fn history(&self, claim_id: &str) -> Result<Vec<FactSheet>> {
        let sheets = self.sheets.read().unwrap_or_else(PoisonError::into_inner);
        sheets
            .get(claim_id)
            .filter(|history| !history.is_empty())
            .cloned()
            .ok_or_else(|| DamageError::NoEstimateYet(claim_id.to_string()))
    }

    pub fn payout_for_area(&self, claim_id: &str, sub_area: f64) -> Result<f64> {
        self.current_facts(claim_id)?.payout_for_area(sub_area)
    }

    pub fn claim_summary(&self, claim_id: &str) -> Result<ClaimSummary> {
        Ok(self.current_facts(claim_id)?.claim_summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sheet(claim_id: &str, damaged_area: f64, unit_value: f64, minute: u32) -> FactSheet {
        let estimate = DamageEstimate {
            damaged_pixel_count: 0,
            valid_pixel_count: 1,
            damaged_area,
            total_area: 150.0,
            damage_fraction: damaged_area / 150.0,
            financial_loss: damaged_area * unit_value,
            unit_value,
            area_unit: AreaUnit::Hectares,
        };
        let as_of = Utc.with_ymd_and_hms(2024, 9, 15, 12, minute, 0).unwrap();
        FactSheet::from_estimate(claim_id, &estimate, ResponseMode::Live, as_of)
    }

    #[test]
    fn unknown_claim_has_no_estimate_yet() {
        let store = FactStore::new();
        assert!(matches!(store.current_facts("nope"), Err(DamageError::NoEstimateYet(_))));
        assert!(matches!(store.history("nope"), Err(DamageError::NoEstimateYet(_))));
    }

    #[test]
    fn latest_write_wins_and_history_is_kept() {
        let store = FactStore::new();
        store.record(sheet("c1", 100.0, 1200.0, 0));
        store.record(sheet("c1", 127.5, 1200.0, 5));
        store.record(sheet("c2", 1.0, 10.0, 1));

        let current = store.current_facts("c1").unwrap();
        assert_eq!(current.damaged_area, 127.5);
        assert_eq!(current.financial_loss, 153_000.0);
        assert_eq!(store.history("c1").unwrap().len(), 2);
        assert_eq!(store.current_facts("c2").unwrap().damaged_area, 1.0);
        assert_eq!(current.mode, ResponseMode::Live);
    }

    #[test]
    fn payout_is_derived_from_stored_figures() {
        let store = FactStore::new();
        store.record(sheet("c1", 127.5, 1200.0, 0));
        assert_eq!(store.payout_for_area("c1", 10.0).unwrap(), 12_000.0);
        // Capped at the damaged area.
        assert_eq!(store.payout_for_area("c1", 500.0).unwrap(), 153_000.0);
        assert!(matches!(store.payout_for_area("c1", -1.0), Err(DamageError::InvalidValuation(_))));
        assert!(matches!(store.payout_for_area("c9", 1.0), Err(DamageError::NoEstimateYet(_))));
    }

    #[test]
    fn claim_summary_reports_loss_as_payout() {
        let store = FactStore::new();
        store.record(sheet("c1", 127.5, 1200.0, 0));
        let summary = store.claim_summary("c1").unwrap();
        assert_eq!(summary.estimated_payout, 153_000.0);
        assert!((summary.damage_percent - 85.0).abs() < 1e-9);
        assert_eq!(summary.status, "analysis_complete");
    }

    #[test]
    fn context_block_carries_the_stored_numbers() {
        let block = sheet("SF-2024-GAL-001", 127.5, 1200.0, 0).context_block();
        assert!(block.contains("Claim ID: SF-2024-GAL-001"));
        assert!(block.contains("Damaged Area: 127.50 ha"));
        assert!(block.contains("Damage Percentage: 85.00%"));
        assert!(block.contains("Estimated Financial Loss: 153000.00"));
        assert!(block.contains("127.50 x 1200.00 = 153000.00"));
        assert!(block.contains("Source: live"));
    }
}
