use serde::{Deserialize, Serialize};

use crate::models::CanonicalTest::{self, *};

/// Measurement family of a test. Fixes the standard unit used when a raw
/// unit is missing or unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitClass {
    CellCount,
    MillionCount,
    Percentage,
    GramsPerDeciliter,
    MilligramsPerDeciliter,
    MicrogramsPerDeciliter,
    NanogramsPerDeciliter,
    NanogramsPerMilliliter,
    PicogramsPerMilliliter,
    MilligramsPerLiter,
    MilliequivalentsPerLiter,
    UnitsPerLiter,
    MilliInternationalUnitsPerLiter,
    Femtoliters,
    Picograms,
    MillimetersPerHour,
    FiltrationRate,
}

impl UnitClass {
    pub fn standard_unit(&self) -> &'static str {
        match self {
            Self::CellCount => "cells/µL",
            Self::MillionCount => "million/µL",
            Self::Percentage => "%",
            Self::GramsPerDeciliter => "g/dL",
            Self::MilligramsPerDeciliter => "mg/dL",
            Self::MicrogramsPerDeciliter => "µg/dL",
            Self::NanogramsPerDeciliter => "ng/dL",
            Self::NanogramsPerMilliliter => "ng/mL",
            Self::PicogramsPerMilliliter => "pg/mL",
            Self::MilligramsPerLiter => "mg/L",
            Self::MilliequivalentsPerLiter => "mEq/L",
            Self::UnitsPerLiter => "U/L",
            Self::MilliInternationalUnitsPerLiter => "mIU/L",
            Self::Femtoliters => "fL",
            Self::Picograms => "pg",
            Self::MillimetersPerHour => "mm/hr",
            Self::FiltrationRate => "mL/min/1.73m²",
        }
    }

    pub fn of(test: CanonicalTest) -> UnitClass {
        match test {
            WbcCount | PlateletCount => Self::CellCount,
            RbcCount => Self::MillionCount,
            Hematocrit | Rdw | Pct | Neutrophils | Lymphocytes | Monocytes | Eosinophils
            | Basophils | Hba1c => Self::Percentage,
            HemoglobinCbc | Mchc | Albumin | TotalProtein | Globulin => Self::GramsPerDeciliter,
            Mcv | Mpv | Pdw => Self::Femtoliters,
            Mch => Self::Picograms,
            Esr => Self::MillimetersPerHour,
            Alt | Ast | Alp | Ggt => Self::UnitsPerLiter,
            BilirubinTotal | BilirubinDirect | BilirubinIndirect | Creatinine | Bun | Urea
            | UricAcid | Calcium | Phosphorus | TotalCholesterol | LdlCholesterol
            | HdlCholesterol | VldlCholesterol | Triglycerides | GlucoseFasting
            | GlucoseRandom | GlucosePp | AverageBloodGlucose => Self::MilligramsPerDeciliter,
            Egfr => Self::FiltrationRate,
            Sodium | Potassium | Chloride => Self::MilliequivalentsPerLiter,
            Tsh => Self::MilliInternationalUnitsPerLiter,
            T3Total | FreeT4 => Self::NanogramsPerDeciliter,
            T4Total | Iron | Tibc => Self::MicrogramsPerDeciliter,
            FreeT3 | VitaminB12 => Self::PicogramsPerMilliliter,
            VitaminD | Ferritin => Self::NanogramsPerMilliliter,
            Crp => Self::MilligramsPerLiter,
        }
    }
}

/// `pattern → (target unit, multiplier)` conversion rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRule {
    pub pattern: String,
    pub target: String,
    pub multiplier: f64,
}

/// Canonical matching form of a unit string: lowercase, no whitespace,
/// micro and multiplication signs folded to ASCII.
pub fn unit_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            'µ' | 'μ' => 'u',
            '×' => 'x',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Ordered conversion table. Lookup tries exact keys in table order, then
/// containment with longer patterns first, scoped to the wanted target unit.
#[derive(Debug, Clone)]
pub struct UnitTable {
    rules: Vec<(String, UnitRule)>,
    longest_first: Vec<usize>,
}

impl UnitTable {
    pub fn builtin() -> Self {
        Self::from_rules(
            BUILTIN_RULES
                .iter()
                .map(|(pattern, target, multiplier)| UnitRule {
                    pattern: pattern.to_string(),
                    target: target.to_string(),
                    multiplier: *multiplier,
                })
                .collect(),
        )
    }

    pub fn from_rules(rules: Vec<UnitRule>) -> Self {
        let rules: Vec<(String, UnitRule)> = rules
            .into_iter()
            .map(|rule| (unit_key(&rule.pattern), rule))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        let mut longest_first: Vec<usize> = (0..rules.len()).collect();
        longest_first.sort_by_key(|&i| std::cmp::Reverse(rules[i].0.chars().count()));
        Self {
            rules,
            longest_first,
        }
    }

    /// Rule for `key` when the result must land in `standard`.
    ///
    /// Exact keys prefer a rule targeting `standard` and otherwise take the
    /// first exact rule. Containment only considers rules targeting
    /// `standard`, so a short generic pattern cannot pull a value into
    /// another unit family.
    pub fn find_for(&self, key: &str, standard: &str) -> Option<&UnitRule> {
        if key.is_empty() {
            return None;
        }
        let mut exact = self.rules.iter().filter(|(pattern, _)| pattern == key);
        let first_exact = exact.clone().next();
        if let Some((_, rule)) = exact.find(|(_, rule)| rule.target == standard).or(first_exact) {
            return Some(rule);
        }
        self.longest_first
            .iter()
            .map(|&i| &self.rules[i])
            .filter(|(_, rule)| rule.target == standard)
            .find(|(pattern, _)| key.contains(pattern.as_str()))
            .map(|(_, rule)| rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for UnitTable {
    fn default() -> Self {
        Self::builtin()
    }
}

const BUILTIN_RULES: &[(&str, &str, f64)] = &[
    // Cell counts
    ("10^3/uL", "cells/µL", 1000.0),
    ("10³/µL", "cells/µL", 1000.0),
    ("10^3/µL", "cells/µL", 1000.0),
    ("x10³/µL", "cells/µL", 1000.0),
    ("x10^3/µL", "cells/µL", 1000.0),
    ("thousand/µL", "cells/µL", 1000.0),
    ("K/µL", "cells/µL", 1000.0),
    ("10^9/L", "cells/µL", 1000.0),
    ("×10⁹/L", "cells/µL", 1000.0),
    ("x10^9/L", "cells/µL", 1000.0),
    ("lakhs/cumm", "cells/µL", 100000.0),
    ("lakh/cumm", "cells/µL", 100000.0),
    ("lac/cumm", "cells/µL", 100000.0),
    ("lacs/cumm", "cells/µL", 100000.0),
    ("cells/µL", "cells/µL", 1.0),
    ("/µL", "cells/µL", 1.0),
    ("/cumm", "cells/µL", 1.0),
    ("per cumm", "cells/µL", 1.0),
    // Red cell counts
    ("million/µL", "million/µL", 1.0),
    ("mill/µL", "million/µL", 1.0),
    ("mill/cumm", "million/µL", 1.0),
    ("million/cumm", "million/µL", 1.0),
    ("millions/cumm", "million/µL", 1.0),
    ("million/cmm", "million/µL", 1.0),
    ("10^6/µL", "million/µL", 1.0),
    ("x10^6/µL", "million/µL", 1.0),
    ("10^12/L", "million/µL", 1.0),
    ("×10¹²/L", "million/µL", 1.0),
    // Hemoglobin and proteins
    ("g/dL", "g/dL", 1.0),
    ("gm/dL", "g/dL", 1.0),
    ("gms/dL", "g/dL", 1.0),
    ("gm%", "g/dL", 1.0),
    ("g%", "g/dL", 1.0),
    ("g/L", "g/dL", 0.1),
    ("gm/L", "g/dL", 0.1),
    // Percentages
    ("%", "%", 1.0),
    ("percent", "%", 1.0),
    // Enzymes
    ("U/L", "U/L", 1.0),
    ("IU/L", "U/L", 1.0),
    // Electrolytes
    ("mEq/L", "mEq/L", 1.0),
    ("mmol/L", "mEq/L", 1.0),
    // General concentrations
    ("mg/dL", "mg/dL", 1.0),
    ("mg%", "mg/dL", 1.0),
    ("mg/L", "mg/dL", 0.1),
    ("mg/dL", "mg/L", 10.0),
    ("mg%", "mg/L", 10.0),
    ("ng/mL", "ng/mL", 1.0),
    ("pg/mL", "pg/mL", 1.0),
    ("µg/dL", "µg/dL", 1.0),
    ("mcg/dL", "µg/dL", 1.0),
    // Thyroid
    ("mIU/L", "mIU/L", 1.0),
    ("µIU/mL", "mIU/L", 1.0),
    ("mU/L", "mIU/L", 1.0),
    ("ng/dL", "ng/dL", 1.0),
    // Cell indices
    ("fL", "fL", 1.0),
    ("femtoliters", "fL", 1.0),
    ("femtolitre", "fL", 1.0),
    ("pg", "pg", 1.0),
    ("picograms", "pg", 1.0),
    // ESR
    ("mm/hr", "mm/hr", 1.0),
    ("mm/hour", "mm/hr", 1.0),
    ("mm/1hr", "mm/hr", 1.0),
    ("mm 1st hr", "mm/hr", 1.0),
    ("mm in 1 hr", "mm/hr", 1.0),
    ("mm at 1 hour", "mm/hr", 1.0),
];
