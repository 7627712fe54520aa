use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::CanonicalTest::{self, *};
use crate::models::Gender;

/// One reference interval in the test's standard unit. Either bound may be
/// absent ("< 200", ">= 90").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    pub unit: String,
}

/// Gender-aware reference entry. Missing gendered entries fall back to `default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SexedRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub male: Option<RangeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub female: Option<RangeSpec>,
    pub default: RangeSpec,
}

impl SexedRange {
    pub fn same(default: RangeSpec) -> Self {
        Self {
            male: None,
            female: None,
            default,
        }
    }

    pub fn by_gender(male: Option<RangeSpec>, female: Option<RangeSpec>, default: RangeSpec) -> Self {
        Self {
            male,
            female,
            default,
        }
    }

    pub fn for_gender(&self, gender: Option<Gender>) -> &RangeSpec {
        let gendered = match gender {
            Some(Gender::Male) => self.male.as_ref(),
            Some(Gender::Female) => self.female.as_ref(),
            None => None,
        };
        gendered.unwrap_or(&self.default)
    }
}

/// Built-in population reference ranges, used when a report's own range is
/// missing or implausible.
#[derive(Debug, Clone)]
pub struct GlobalReferenceTable {
    ranges: HashMap<CanonicalTest, SexedRange>,
}

impl GlobalReferenceTable {
    pub fn builtin() -> Self {
        Self {
            ranges: builtin_ranges().into_iter().collect(),
        }
    }

    pub fn from_ranges(ranges: HashMap<CanonicalTest, SexedRange>) -> Self {
        Self { ranges }
    }

    pub fn lookup(&self, test: CanonicalTest, gender: Option<Gender>) -> Option<&RangeSpec> {
        self.ranges.get(&test).map(|entry| entry.for_gender(gender))
    }

    /// `(min, max)` for the gender, `(None, None)` when the test has no entry.
    pub fn bounds(&self, test: CanonicalTest, gender: Option<Gender>) -> (Option<f64>, Option<f64>) {
        self.lookup(test, gender)
            .map(|r| (r.min, r.max))
            .unwrap_or((None, None))
    }

    pub fn standard_unit(&self, test: CanonicalTest) -> Option<&str> {
        self.ranges.get(&test).map(|entry| entry.default.unit.as_str())
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl Default for GlobalReferenceTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn range(min: f64, max: f64, unit: &str) -> RangeSpec {
    RangeSpec {
        min: Some(min),
        max: Some(max),
        unit: unit.to_string(),
    }
}

fn at_most(max: f64, unit: &str) -> RangeSpec {
    RangeSpec {
        min: None,
        max: Some(max),
        unit: unit.to_string(),
    }
}

fn at_least(min: f64, unit: &str) -> RangeSpec {
    RangeSpec {
        min: Some(min),
        max: None,
        unit: unit.to_string(),
    }
}

fn builtin_ranges() -> Vec<(CanonicalTest, SexedRange)> {
    vec![
        (
            HemoglobinCbc,
            SexedRange::by_gender(
                Some(range(13.0, 17.5, "g/dL")),
                Some(range(12.0, 16.0, "g/dL")),
                range(12.0, 17.0, "g/dL"),
            ),
        ),
        (
            RbcCount,
            SexedRange::by_gender(
                Some(range(4.5, 5.9, "million/µL")),
                Some(range(4.0, 5.2, "million/µL")),
                range(4.0, 5.9, "million/µL"),
            ),
        ),
        (WbcCount, SexedRange::same(range(4000.0, 11000.0, "cells/µL"))),
        (PlateletCount, SexedRange::same(range(150000.0, 450000.0, "cells/µL"))),
        (
            Hematocrit,
            SexedRange::by_gender(
                Some(range(38.3, 48.6, "%")),
                Some(range(35.5, 44.9, "%")),
                range(36.0, 50.0, "%"),
            ),
        ),
        (Mcv, SexedRange::same(range(80.0, 100.0, "fL"))),
        (Mch, SexedRange::same(range(27.0, 32.0, "pg"))),
        (Mchc, SexedRange::same(range(32.0, 36.0, "g/dL"))),
        (Rdw, SexedRange::same(range(11.5, 16.0, "%"))),
        (Mpv, SexedRange::same(range(7.5, 11.5, "fL"))),
        (Pdw, SexedRange::same(range(9.0, 17.0, "fL"))),
        (Pct, SexedRange::same(range(0.1, 0.5, "%"))),
        (Neutrophils, SexedRange::same(range(40.0, 75.0, "%"))),
        (Lymphocytes, SexedRange::same(range(20.0, 45.0, "%"))),
        (Monocytes, SexedRange::same(range(2.0, 10.0, "%"))),
        (Eosinophils, SexedRange::same(range(1.0, 6.0, "%"))),
        (Basophils, SexedRange::same(range(0.0, 2.0, "%"))),
        (
            Esr,
            SexedRange::by_gender(
                Some(range(0.0, 15.0, "mm/hr")),
                Some(range(0.0, 20.0, "mm/hr")),
                range(0.0, 20.0, "mm/hr"),
            ),
        ),
        (Alt, SexedRange::same(range(7.0, 56.0, "U/L"))),
        (Ast, SexedRange::same(range(8.0, 48.0, "U/L"))),
        (Alp, SexedRange::same(range(44.0, 147.0, "U/L"))),
        (
            Ggt,
            SexedRange::by_gender(
                Some(range(0.0, 65.0, "U/L")),
                Some(range(0.0, 45.0, "U/L")),
                range(0.0, 55.0, "U/L"),
            ),
        ),
        (BilirubinTotal, SexedRange::same(range(0.1, 1.2, "mg/dL"))),
        (BilirubinDirect, SexedRange::same(range(0.0, 0.3, "mg/dL"))),
        (BilirubinIndirect, SexedRange::same(range(0.1, 0.9, "mg/dL"))),
        (Albumin, SexedRange::same(range(3.5, 5.5, "g/dL"))),
        (TotalProtein, SexedRange::same(range(6.0, 8.3, "g/dL"))),
        (Globulin, SexedRange::same(range(2.0, 3.5, "g/dL"))),
        (
            Creatinine,
            SexedRange::by_gender(
                Some(range(0.7, 1.3, "mg/dL")),
                Some(range(0.6, 1.1, "mg/dL")),
                range(0.6, 1.2, "mg/dL"),
            ),
        ),
        (Bun, SexedRange::same(range(7.0, 20.0, "mg/dL"))),
        (Urea, SexedRange::same(range(15.0, 45.0, "mg/dL"))),
        (Egfr, SexedRange::same(at_least(90.0, "mL/min/1.73m²"))),
        (
            UricAcid,
            SexedRange::by_gender(
                Some(range(3.5, 7.2, "mg/dL")),
                Some(range(2.5, 6.2, "mg/dL")),
                range(2.5, 7.0, "mg/dL"),
            ),
        ),
        (Sodium, SexedRange::same(range(136.0, 145.0, "mEq/L"))),
        (Potassium, SexedRange::same(range(3.5, 5.0, "mEq/L"))),
        (Chloride, SexedRange::same(range(98.0, 106.0, "mEq/L"))),
        (Calcium, SexedRange::same(range(8.5, 10.5, "mg/dL"))),
        (Phosphorus, SexedRange::same(range(2.5, 4.5, "mg/dL"))),
        (Tsh, SexedRange::same(range(0.4, 4.5, "mIU/L"))),
        (T3Total, SexedRange::same(range(60.0, 181.0, "ng/dL"))),
        (T4Total, SexedRange::same(range(4.5, 12.0, "µg/dL"))),
        (FreeT3, SexedRange::same(range(2.3, 4.2, "pg/mL"))),
        (FreeT4, SexedRange::same(range(0.8, 1.8, "ng/dL"))),
        (TotalCholesterol, SexedRange::same(at_most(200.0, "mg/dL"))),
        (LdlCholesterol, SexedRange::same(at_most(100.0, "mg/dL"))),
        (
            HdlCholesterol,
            SexedRange::by_gender(
                Some(at_least(40.0, "mg/dL")),
                Some(at_least(50.0, "mg/dL")),
                at_least(40.0, "mg/dL"),
            ),
        ),
        (VldlCholesterol, SexedRange::same(at_most(30.0, "mg/dL"))),
        (Triglycerides, SexedRange::same(at_most(150.0, "mg/dL"))),
        (GlucoseFasting, SexedRange::same(range(70.0, 100.0, "mg/dL"))),
        (GlucoseRandom, SexedRange::same(at_most(140.0, "mg/dL"))),
        (GlucosePp, SexedRange::same(at_most(140.0, "mg/dL"))),
        (Hba1c, SexedRange::same(at_most(5.7, "%"))),
        (AverageBloodGlucose, SexedRange::same(at_most(120.0, "mg/dL"))),
        (VitaminD, SexedRange::same(range(30.0, 100.0, "ng/mL"))),
        (VitaminB12, SexedRange::same(range(200.0, 900.0, "pg/mL"))),
        (
            Iron,
            SexedRange::by_gender(
                Some(range(65.0, 175.0, "µg/dL")),
                Some(range(50.0, 170.0, "µg/dL")),
                range(50.0, 175.0, "µg/dL"),
            ),
        ),
        (
            Ferritin,
            SexedRange::by_gender(
                Some(range(20.0, 300.0, "ng/mL")),
                Some(range(10.0, 150.0, "ng/mL")),
                range(10.0, 300.0, "ng/mL"),
            ),
        ),
        (Tibc, SexedRange::same(range(250.0, 400.0, "µg/dL"))),
        (Crp, SexedRange::same(at_most(3.0, "mg/L"))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_canonical_test_has_a_range() {
        let table = GlobalReferenceTable::builtin();
        for test in CanonicalTest::ALL {
            assert!(table.lookup(*test, None).is_some(), "missing range for {test}");
        }
        assert_eq!(table.len(), CanonicalTest::ALL.len());
    }

    #[test]
    fn gendered_lookup() {
        let table = GlobalReferenceTable::builtin();
        assert_eq!(table.bounds(HemoglobinCbc, Some(Gender::Male)), (Some(13.0), Some(17.5)));
        assert_eq!(table.bounds(HemoglobinCbc, Some(Gender::Female)), (Some(12.0), Some(16.0)));
        assert_eq!(table.bounds(HemoglobinCbc, None), (Some(12.0), Some(17.0)));
    }

    #[test]
    fn missing_gender_entry_uses_default() {
        let table = GlobalReferenceTable::builtin();
        assert_eq!(table.bounds(WbcCount, Some(Gender::Female)), (Some(4000.0), Some(11000.0)));
    }

    #[test]
    fn one_sided_ranges() {
        let table = GlobalReferenceTable::builtin();
        assert_eq!(table.bounds(TotalCholesterol, None), (None, Some(200.0)));
        assert_eq!(table.bounds(HdlCholesterol, Some(Gender::Female)), (Some(50.0), None));
        assert_eq!(table.bounds(Egfr, None), (Some(90.0), None));
    }

    #[test]
    fn standard_units() {
        let table = GlobalReferenceTable::builtin();
        assert_eq!(table.standard_unit(PlateletCount), Some("cells/µL"));
        assert_eq!(table.standard_unit(Tsh), Some("mIU/L"));
    }

    #[test]
    fn sexed_range_parses_from_json() {
        let json = r#"{"female": {"min": 1.0, "max": 2.0, "unit": "x"}, "default": {"max": 3.0, "unit": "x"}}"#;
        let entry: SexedRange = serde_json::from_str(json).unwrap();
        assert!(entry.male.is_none());
        assert_eq!(entry.for_gender(Some(Gender::Male)).max, Some(3.0));
        assert_eq!(entry.for_gender(Some(Gender::Female)).min, Some(1.0));
    }
}
