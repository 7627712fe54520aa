use serde::Serialize;

use crate::models::{CanonicalTest, Gender};
use crate::reference::GlobalReferenceTable;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidatedRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// True when the report's own bounds were discarded wholesale.
    pub used_fallback: bool,
}

/// Report bounds are implausible when inverted or negative.
pub fn bounds_are_plausible(min: Option<f64>, max: Option<f64>) -> bool {
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return false;
        }
    }
    min.map_or(true, |v| v >= 0.0) && max.map_or(true, |v| v >= 0.0)
}

/// Decide the bounds a result is classified against.
///
/// Plausible report bounds win, with a missing side filled from the global
/// table (`used_fallback = false`). Implausible or absent report bounds are
/// replaced by the global pair for the patient's gender (`used_fallback = true`).
pub fn validate(
    table: &GlobalReferenceTable,
    ocr_min: Option<f64>,
    ocr_max: Option<f64>,
    test: CanonicalTest,
    gender: Option<Gender>,
) -> ValidatedRange {
    let (global_min, global_max) = table.bounds(test, gender);
    let has_report_bound = ocr_min.is_some() || ocr_max.is_some();

    if has_report_bound && bounds_are_plausible(ocr_min, ocr_max) {
        return ValidatedRange {
            min: ocr_min.or(global_min),
            max: ocr_max.or(global_max),
            used_fallback: false,
        };
    }

    if has_report_bound {
        tracing::debug!(test = %test, ?ocr_min, ?ocr_max, "Discarding implausible report range");
    }
    ValidatedRange {
        min: global_min,
        max: global_max,
        used_fallback: true,
    }
}
