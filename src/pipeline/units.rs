use serde::Serialize;

use crate::models::CanonicalTest;
use crate::reference::{unit_key, UnitClass, UnitTable};

/// How the standard unit of a value was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitResolution {
    /// Raw unit already is the test's standard unit.
    AlreadyStandard,
    /// Matched a conversion rule.
    Converted,
    /// Raw unit missing or unrecognized: standard unit taken from the test's
    /// unit class and the value passed through unconverted.
    Inferred,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardizedValue {
    pub value: Option<f64>,
    pub unit: String,
    pub resolution: UnitResolution,
}

/// Convert a raw value into the standard unit for `test`.
///
/// Used for display and aggregation only; classification never reads the
/// result. Never fails: an unknown unit is a lossy pass-through.
pub fn normalize(
    units: &UnitTable,
    value: Option<f64>,
    raw_unit: Option<&str>,
    test: CanonicalTest,
) -> StandardizedValue {
    let key = unit_key(raw_unit.unwrap_or_default());
    let standard = UnitClass::of(test).standard_unit();

    if !key.is_empty() && key == unit_key(standard) {
        return StandardizedValue {
            value,
            unit: standard.to_string(),
            resolution: UnitResolution::AlreadyStandard,
        };
    }

    if let Some(rule) = units.find_for(&key, standard) {
        return StandardizedValue {
            value: value.map(|v| v * rule.multiplier),
            unit: rule.target.clone(),
            resolution: UnitResolution::Converted,
        };
    }

    if !key.is_empty() {
        tracing::debug!(unit = raw_unit.unwrap_or_default(), test = %test, "Unrecognized unit, inferring standard unit");
    }
    StandardizedValue {
        value,
        unit: standard.to_string(),
        resolution: UnitResolution::Inferred,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CanonicalTest::*;

    fn run(value: f64, unit: &str, test: CanonicalTest) -> StandardizedValue {
        normalize(&UnitTable::builtin(), Some(value), Some(unit), test)
    }

    fn approx(actual: Option<f64>, expected: f64) -> bool {
        actual.is_some_and(|v| (v - expected).abs() < 1e-9)
    }

    #[test]
    fn thousands_per_microliter_scale_up() {
        let out = run(7.2, "10^3/µL", WbcCount);
        assert!(approx(out.value, 7200.0));
        assert_eq!(out.unit, "cells/µL");
        assert_eq!(out.resolution, UnitResolution::Converted);
    }

    #[test]
    fn lakhs_per_cumm() {
        let out = run(2.5, "Lakhs/cumm", PlateletCount);
        assert!(approx(out.value, 250000.0));
        assert_eq!(out.unit, "cells/µL");
    }

    #[test]
    fn already_standard_is_identity() {
        let out = run(7200.0, "cells/µL", WbcCount);
        assert!(approx(out.value, 7200.0));
        assert_eq!(out.resolution, UnitResolution::AlreadyStandard);
    }

    #[test]
    fn mg_per_dl_is_not_grams() {
        let out = run(95.0, "mg/dl", GlucoseFasting);
        assert_eq!(out.unit, "mg/dL");
        assert!(approx(out.value, 95.0));
    }

    #[test]
    fn grams_per_liter_to_deciliter() {
        let out = run(135.0, "g/L", HemoglobinCbc);
        assert!(approx(out.value, 13.5));
        assert_eq!(out.unit, "g/dL");
    }

    #[test]
    fn crp_in_mg_per_liter_stays() {
        let out = run(5.0, "mg/L", Crp);
        assert!(approx(out.value, 5.0));
        assert_eq!(out.unit, "mg/L");
    }

    #[test]
    fn crp_in_mg_per_deciliter_scales_to_mg_per_liter() {
        let out = run(0.8, "mg/dL", Crp);
        assert!(approx(out.value, 8.0));
        assert_eq!(out.unit, "mg/L");
        assert_eq!(out.resolution, UnitResolution::Converted);
    }

    #[test]
    fn million_per_cumm_spellings_stay_red_cell_units() {
        for unit in ["million/cumm", "Millions/cumm", "million/cmm", "mill/cumm"] {
            let out = run(4.5, unit, RbcCount);
            assert_eq!(out.unit, "million/µL", "unit {unit}");
            assert!(approx(out.value, 4.5));
        }
    }

    #[test]
    fn per_cumm_still_means_cells_for_white_counts() {
        let out = run(7200.0, "/cumm", WbcCount);
        assert_eq!(out.unit, "cells/µL");
        assert!(approx(out.value, 7200.0));
    }

    #[test]
    fn missing_unit_is_inferred() {
        let out = normalize(&UnitTable::builtin(), Some(13.2), None, HemoglobinCbc);
        assert_eq!(out.unit, "g/dL");
        assert!(approx(out.value, 13.2));
        assert_eq!(out.resolution, UnitResolution::Inferred);
    }

    #[test]
    fn unknown_unit_passes_value_through() {
        let out = run(48.0, "mmol/mol", Hba1c);
        assert_eq!(out.unit, "%");
        assert!(approx(out.value, 48.0));
        assert_eq!(out.resolution, UnitResolution::Inferred);
    }

    #[test]
    fn missing_value_still_resolves_unit() {
        let out = normalize(&UnitTable::builtin(), None, Some("U/L"), Alt);
        assert_eq!(out.value, None);
        assert_eq!(out.unit, "U/L");
    }
}
