use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::*;

const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const RECORD_COLUMNS: &str = "patient_id, patient_name, age, gender, canonical_test, raw_test_name,
     value, value_text, unit_raw, value_standard, unit_standard, reference_min_raw,
     reference_max_raw, reference_raw_text, used_global_reference, is_abnormal,
     abnormal_direction, report_type, report_date, source_ref, created_at";

/// Insert all records in one transaction. Nothing is stored if any insert fails.
pub fn insert_records(conn: &mut Connection, records: &[NormalizedTestRecord]) -> Result<usize, DatabaseError> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO test_records ({RECORD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
        ))?;
        for record in records {
            stmt.execute(params![
                record.patient_id.to_string(),
                record.patient_name,
                record.age,
                record.gender.map(|g| g.as_str()),
                record.canonical_test.as_str(),
                record.raw_test_name,
                record.value,
                record.value_text,
                record.unit_raw,
                record.value_standard,
                record.unit_standard,
                record.reference_min_raw,
                record.reference_max_raw,
                record.reference_raw_text,
                record.used_global_reference,
                record.is_abnormal,
                record.abnormal_direction.map(|d| d.as_str()),
                record.report_type.as_str(),
                record.report_date.map(|d| d.to_string()),
                record.source_ref,
                record.created_at.format(CREATED_AT_FORMAT).to_string(),
            ])?;
        }
    }
    tx.commit()?;
    tracing::info!(count = records.len(), "Stored test records");
    Ok(records.len())
}

/// Records satisfying every equality condition of `filter`, in insertion order.
///
/// Other condition kinds are not applied here; callers evaluate the full
/// filter over the returned records.
pub fn fetch_records(conn: &Connection, filter: &Filter) -> Result<Vec<NormalizedTestRecord>, DatabaseError> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    for condition in &filter.conditions {
        if let Condition::Equals { field, value } = condition {
            values.push(match value {
                FieldValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
                FieldValue::Number(n) => SqlValue::Real(*n),
                FieldValue::Text(t) => SqlValue::Text(t.clone()),
            });
            // Field names are a closed set that matches the column names.
            clauses.push(format!("{} = ?{}", field.as_str(), values.len()));
        }
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let mut stmt = conn.prepare(&format!("SELECT {RECORD_COLUMNS} FROM test_records{where_clause} ORDER BY id"))?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| Ok(record_row_from_rusqlite(row)))?;

    let mut records = Vec::new();
    for row in rows {
        records.push(record_from_row(row??)?);
    }
    Ok(records)
}

pub fn count_records(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM test_records", [], |row| row.get(0))?;
    Ok(count)
}

// Internal row type for NormalizedTestRecord mapping
struct RecordRow {
    patient_id: String,
    patient_name: String,
    age: Option<u32>,
    gender: Option<String>,
    canonical_test: String,
    raw_test_name: String,
    value: Option<f64>,
    value_text: Option<String>,
    unit_raw: String,
    value_standard: Option<f64>,
    unit_standard: String,
    reference_min_raw: Option<f64>,
    reference_max_raw: Option<f64>,
    reference_raw_text: Option<String>,
    used_global_reference: bool,
    is_abnormal: bool,
    abnormal_direction: Option<String>,
    report_type: String,
    report_date: Option<String>,
    source_ref: Option<String>,
    created_at: String,
}

fn record_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<RecordRow, rusqlite::Error> {
    Ok(RecordRow {
        patient_id: row.get(0)?,
        patient_name: row.get(1)?,
        age: row.get(2)?,
        gender: row.get(3)?,
        canonical_test: row.get(4)?,
        raw_test_name: row.get(5)?,
        value: row.get(6)?,
        value_text: row.get(7)?,
        unit_raw: row.get(8)?,
        value_standard: row.get(9)?,
        unit_standard: row.get(10)?,
        reference_min_raw: row.get(11)?,
        reference_max_raw: row.get(12)?,
        reference_raw_text: row.get(13)?,
        used_global_reference: row.get(14)?,
        is_abnormal: row.get(15)?,
        abnormal_direction: row.get(16)?,
        report_type: row.get(17)?,
        report_date: row.get(18)?,
        source_ref: row.get(19)?,
        created_at: row.get(20)?,
    })
}

fn record_from_row(row: RecordRow) -> Result<NormalizedTestRecord, DatabaseError> {
    Ok(NormalizedTestRecord {
        patient_id: Uuid::parse_str(&row.patient_id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        patient_name: row.patient_name,
        age: row.age,
        gender: row.gender.as_deref().map(Gender::from_str).transpose()?,
        canonical_test: CanonicalTest::from_str(&row.canonical_test)?,
        raw_test_name: row.raw_test_name,
        value: row.value,
        value_text: row.value_text,
        unit_raw: row.unit_raw,
        value_standard: row.value_standard,
        unit_standard: row.unit_standard,
        reference_min_raw: row.reference_min_raw,
        reference_max_raw: row.reference_max_raw,
        reference_raw_text: row.reference_raw_text,
        used_global_reference: row.used_global_reference,
        is_abnormal: row.is_abnormal,
        abnormal_direction: row.abnormal_direction.as_deref().map(AbnormalDirection::from_str).transpose()?,
        report_type: ReportCategory::from_str(&row.report_type)?,
        report_date: row
            .report_date
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        source_ref: row.source_ref,
        created_at: NaiveDateTime::parse_from_str(&row.created_at, CREATED_AT_FORMAT)
            .map_err(|e| DatabaseError::ConstraintViolation(format!("created_at {}: {e}", row.created_at)))?,
    })
}
