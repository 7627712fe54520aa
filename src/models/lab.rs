use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::canonical::CanonicalTest;
use super::enums::{AbnormalDirection, Gender, ReportCategory};

/// One untrusted test line as produced by OCR or a batch import.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTestEntry {
    #[serde(default, alias = "Test Name", alias = "test_name", deserialize_with = "lenient_string")]
    pub raw_name: String,
    #[serde(default, alias = "Result", alias = "result", deserialize_with = "lenient_text")]
    pub raw_result_text: Option<String>,
    #[serde(default, alias = "Unit", alias = "unit", deserialize_with = "lenient_text")]
    pub raw_unit_text: Option<String>,
    #[serde(
        default,
        alias = "Reference Range",
        alias = "reference_range",
        deserialize_with = "lenient_text"
    )]
    pub raw_reference_text: Option<String>,
}

impl RawTestEntry {
    pub fn new(name: &str, result: &str, unit: &str, reference: &str) -> Self {
        let text = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            raw_name: name.to_string(),
            raw_result_text: text(result),
            raw_unit_text: text(unit),
            raw_reference_text: text(reference),
        }
    }
}

/// All test lines extracted from one report for one patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientBatch {
    #[serde(default, alias = "Patient Name", alias = "patient_name", deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, alias = "Age", alias = "age", deserialize_with = "lenient_text")]
    pub age_text: Option<String>,
    #[serde(default, alias = "Gender", alias = "gender", deserialize_with = "lenient_text")]
    pub gender_text: Option<String>,
    #[serde(default, alias = "Report Date", alias = "report_date", deserialize_with = "lenient_text")]
    pub report_date_text: Option<String>,
    #[serde(default, alias = "Image Filename", alias = "source", deserialize_with = "lenient_text")]
    pub source_ref: Option<String>,
    #[serde(default, alias = "Tests")]
    pub tests: Vec<RawTestEntry>,
}

/// Canonical, unit-normalized, abnormality-flagged result of one raw entry.
///
/// `is_abnormal` and `abnormal_direction` are derived from the raw `value`
/// and the raw-unit reference bounds; the standardized value never feeds
/// classification. `is_abnormal == abnormal_direction.is_some()` always.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTestRecord {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub canonical_test: CanonicalTest,
    pub raw_test_name: String,
    pub value: Option<f64>,
    pub value_text: Option<String>,
    pub unit_raw: String,
    pub value_standard: Option<f64>,
    pub unit_standard: String,
    pub reference_min_raw: Option<f64>,
    pub reference_max_raw: Option<f64>,
    pub reference_raw_text: Option<String>,
    pub used_global_reference: bool,
    pub is_abnormal: bool,
    pub abnormal_direction: Option<AbnormalDirection>,
    pub report_type: ReportCategory,
    pub report_date: Option<NaiveDate>,
    pub source_ref: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Identity used to drop exact duplicates within an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    patient_name: String,
    canonical_test: CanonicalTest,
    value_bits: Option<u64>,
    unit_raw: String,
}

impl NormalizedTestRecord {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            patient_name: self.patient_name.clone(),
            canonical_test: self.canonical_test,
            value_bits: self.value.map(f64::to_bits),
            unit_raw: self.unit_raw.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionStats {
    pub processed: usize,
    pub extracted: usize,
    pub with_value: usize,
    pub abnormal: usize,
    pub unknown_skipped: usize,
    pub reference_fallbacks: usize,
    pub duplicates_removed: usize,
    pub unmapped_names: Vec<String>,
}

/// Import files carry numbers where text is expected ("Age": 34).
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}
