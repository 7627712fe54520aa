//! Urine panels reuse blood-test names ("RBC", "Glucose", "Protein") for
//! different measurements. When a batch looks like a urine panel those names
//! are dropped instead of being filed under the blood test.

use serde::Serialize;

/// Name fragments that only appear on urine reports.
const URINE_MARKERS: &[&str] = &[
    "specific gravity",
    "turbidity",
    "pus cells",
    "epithelial cells",
    "casts",
    "urobilinogen",
    "deposit",
    "organisms",
    "amorphous",
    "completeurinogram",
    "urinary",
    "urinogram",
];

/// Names shared between urine and blood panels.
const AMBIGUOUS_NAMES: &[&str] = &[
    "red blood cells",
    "rbc",
    "glucose",
    "protein",
    "proteins",
    "bilirubin",
    "ketones",
    "sugar",
];

const AMBIGUOUS_AFFIXES: &[&str] = &["red blood", "rbc"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecimenKind {
    Blood,
    Urine,
}

/// Label prefix recorded for names dropped by the guard.
pub const URINE_SKIP_PREFIX: &str = "URINE:";

/// Urine when at least `threshold` names contain a urine marker.
pub fn detect_specimen<'a, I>(names: I, threshold: usize) -> SpecimenKind
where
    I: IntoIterator<Item = &'a str>,
{
    let markers = names
        .into_iter()
        .map(str::to_lowercase)
        .filter(|name| URINE_MARKERS.iter().any(|marker| name.contains(marker)))
        .count();
    if markers >= threshold {
        SpecimenKind::Urine
    } else {
        SpecimenKind::Blood
    }
}

pub fn is_cross_specimen_name(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    AMBIGUOUS_NAMES.contains(&lower.as_str())
        || AMBIGUOUS_AFFIXES
            .iter()
            .any(|affix| lower.starts_with(affix) || lower.ends_with(affix))
}

/// Per-batch decision on which entries to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecimenGuard {
    kind: SpecimenKind,
}

impl SpecimenGuard {
    pub fn for_names<'a, I>(names: I, threshold: usize) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            kind: detect_specimen(names, threshold),
        }
    }

    pub fn kind(&self) -> SpecimenKind {
        self.kind
    }

    pub fn should_skip(&self, name: &str) -> bool {
        self.kind == SpecimenKind::Urine && is_cross_specimen_name(name)
    }
}
