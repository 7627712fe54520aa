//! Batch ingestion: raw entries → canonical records, with exact-duplicate
//! removal across the whole run.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use uuid::Uuid;

use crate::config::NormalizerConfig;
use crate::models::{
    DedupKey, Gender, IngestionStats, NormalizedTestRecord, PatientBatch, RawTestEntry,
};
use crate::reference::ReferenceData;

use super::classify::classify;
use super::parser::{parse_reference, parse_value};
use super::reference_range::validate;
use super::resolver::TestResolver;
use super::specimen::{SpecimenGuard, URINE_SKIP_PREFIX};
use super::units::normalize;

static AGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("Invalid age regex"));

/// Date layouts seen in report headers, tried in order. Two-digit years come
/// before four-digit ones: `%Y` would read "24" as the year 24.
const REPORT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%y",
    "%d-%m-%y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%m/%d/%Y",
];

pub const UNKNOWN_PATIENT_NAME: &str = "Unknown";

/// Patient-level fields shared by every record of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientContext {
    pub patient_id: Uuid,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub report_date: Option<NaiveDate>,
    pub source_ref: Option<String>,
}

impl PatientContext {
    /// Parses the batch header. A fresh patient id is generated per call.
    pub fn from_batch(batch: &PatientBatch) -> Self {
        let name = batch.name.trim();
        Self {
            patient_id: Uuid::new_v4(),
            name: if name.is_empty() {
                UNKNOWN_PATIENT_NAME.to_string()
            } else {
                name.to_string()
            },
            age: batch.age_text.as_deref().and_then(parse_age),
            gender: batch.gender_text.as_deref().and_then(Gender::from_text),
            report_date: batch.report_date_text.as_deref().and_then(parse_report_date),
            source_ref: batch.source_ref.clone(),
        }
    }
}

/// First integer in the text: "34 Y" → 34, "Age: 7 yrs 3 mo" → 7.
pub fn parse_age(text: &str) -> Option<u32> {
    AGE_PATTERN.find(text)?.as_str().parse().ok()
}

pub fn parse_report_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    REPORT_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// What became of one raw entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Record(Box<NormalizedTestRecord>),
    /// Name did not resolve to a canonical test.
    Unknown(String),
}

/// Per-entry normalization: resolve, parse, convert, validate, classify.
#[derive(Debug, Clone, Copy)]
pub struct EntryNormalizer<'a> {
    reference: &'a ReferenceData,
    resolver: TestResolver<'a>,
}

impl<'a> EntryNormalizer<'a> {
    pub fn new(reference: &'a ReferenceData, config: &NormalizerConfig) -> Self {
        Self {
            reference,
            resolver: TestResolver::new(&reference.aliases)
                .with_partial_match_min_len(config.partial_match_min_len),
        }
    }

    pub fn normalize(
        &self,
        entry: &RawTestEntry,
        patient: &PatientContext,
        created_at: NaiveDateTime,
    ) -> EntryOutcome {
        let Some(test) = self.resolver.resolve(&entry.raw_name) else {
            return EntryOutcome::Unknown(entry.raw_name.trim().to_string());
        };

        let parsed = parse_value(entry.raw_result_text.as_deref());
        let unit_raw = entry.raw_unit_text.as_deref().unwrap_or_default().trim();
        let standardized = normalize(&self.reference.units, parsed.value, Some(unit_raw), test);

        let reference = parse_reference(entry.raw_reference_text.as_deref());
        let range = validate(
            &self.reference.ranges,
            reference.min,
            reference.max,
            test,
            patient.gender,
        );

        // Raw value against raw-unit bounds; value_standard is display only.
        let direction = classify(parsed.value, range.min, range.max);

        EntryOutcome::Record(Box::new(NormalizedTestRecord {
            patient_id: patient.patient_id,
            patient_name: patient.name.clone(),
            age: patient.age,
            gender: patient.gender,
            canonical_test: test,
            raw_test_name: entry.raw_name.clone(),
            value: parsed.value,
            value_text: parsed.display_text,
            unit_raw: unit_raw.to_string(),
            value_standard: standardized.value,
            unit_standard: standardized.unit,
            reference_min_raw: range.min,
            reference_max_raw: range.max,
            reference_raw_text: reference.raw_text,
            used_global_reference: range.used_fallback,
            is_abnormal: direction.is_some(),
            abnormal_direction: direction,
            report_type: test.category(),
            report_date: patient.report_date,
            source_ref: patient.source_ref.clone(),
            created_at,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestionOutput {
    pub records: Vec<NormalizedTestRecord>,
    pub stats: IngestionStats,
}

/// One ingestion pass. Owns the dedup set and the counters; the first
/// occurrence of a dedup key wins for the whole run.
pub struct IngestionRun<'a> {
    normalizer: EntryNormalizer<'a>,
    config: NormalizerConfig,
    seen: HashSet<DedupKey>,
    records: Vec<NormalizedTestRecord>,
    unmapped: BTreeSet<String>,
    stats: IngestionStats,
}

impl<'a> IngestionRun<'a> {
    pub fn new(reference: &'a ReferenceData, config: NormalizerConfig) -> Self {
        Self {
            normalizer: EntryNormalizer::new(reference, &config),
            config,
            seen: HashSet::new(),
            records: Vec::new(),
            unmapped: BTreeSet::new(),
            stats: IngestionStats::default(),
        }
    }

    pub fn ingest_batch(&mut self, batch: &PatientBatch) {
        let patient = PatientContext::from_batch(batch);
        let created_at = Utc::now().naive_utc();
        let guard = SpecimenGuard::for_names(
            batch.tests.iter().map(|t| t.raw_name.as_str()),
            self.config.specimen_marker_threshold,
        );

        for entry in &batch.tests {
            let name = entry.raw_name.trim();
            if name.is_empty() {
                continue;
            }
            if guard.should_skip(name) {
                tracing::debug!(patient = %patient.name, test = name, "Skipping cross-specimen test on urine panel");
                self.stats.unknown_skipped += 1;
                self.unmapped.insert(format!("{URINE_SKIP_PREFIX}{name}"));
                continue;
            }

            match self.normalizer.normalize(entry, &patient, created_at) {
                EntryOutcome::Record(record) => self.accept(*record),
                EntryOutcome::Unknown(raw) => {
                    tracing::debug!(patient = %patient.name, test = %raw, "Unmapped test name");
                    self.stats.unknown_skipped += 1;
                    self.unmapped.insert(raw);
                }
            }
        }
        self.stats.processed += 1;
    }

    fn accept(&mut self, record: NormalizedTestRecord) {
        if !self.seen.insert(record.dedup_key()) {
            self.stats.duplicates_removed += 1;
            return;
        }
        if record.value.is_some() {
            self.stats.with_value += 1;
        }
        if record.is_abnormal {
            self.stats.abnormal += 1;
        }
        if record.used_global_reference {
            self.stats.reference_fallbacks += 1;
        }
        self.records.push(record);
    }

    pub fn finish(mut self) -> IngestionOutput {
        self.stats.extracted = self.records.len();
        self.stats.unmapped_names = self.unmapped.into_iter().collect();

        tracing::info!(
            processed = self.stats.processed,
            extracted = self.stats.extracted,
            abnormal = self.stats.abnormal,
            unknown = self.stats.unknown_skipped,
            duplicates = self.stats.duplicates_removed,
            fallbacks = self.stats.reference_fallbacks,
            "Ingestion complete"
        );
        if !self.stats.unmapped_names.is_empty() {
            tracing::warn!(count = self.stats.unmapped_names.len(), "Some test names could not be mapped");
        }

        IngestionOutput {
            records: self.records,
            stats: self.stats,
        }
    }
}

/// Ingest every batch in order and return the surviving records with stats.
pub fn ingest_batches(
    reference: &ReferenceData,
    config: NormalizerConfig,
    batches: &[PatientBatch],
) -> IngestionOutput {
    let mut run = IngestionRun::new(reference, config);
    for batch in batches {
        run.ingest_batch(batch);
    }
    run.finish()
}
