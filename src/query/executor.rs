//! Execution collaborators for compiled plans and normalized records.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::{NormalizedTestRecord, QueryPlan};

use super::plan_eval::{self, Row};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Failures of the execution layer. Reported to the caller as-is; nothing in
/// this crate retries them.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend failure: {0}")]
    Backend(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub rows: Vec<Value>,
    pub count: usize,
}

impl QueryOutcome {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let count = rows.len();
        Self {
            rows: rows.into_iter().map(Value::Object).collect(),
            count,
        }
    }
}

/// Runs a compiled plan against a backing store. One round trip per call.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, plan: &QueryPlan) -> Result<QueryOutcome, ExecutionError>;
}

/// Persists normalized records. Either every record is stored or an error
/// is returned.
pub trait RecordSink: Send + Sync {
    fn insert_many(&self, records: &[NormalizedTestRecord]) -> Result<usize, StoreError>;
}

/// Run `executor` on the blocking pool, failing with
/// [`ExecutionError::Timeout`] once `timeout` elapses.
///
/// The timeout only stops the wait. A blocking task cannot be cancelled, so
/// a timed-out execution keeps running to completion on the pool and keeps
/// holding whatever store lock it took; later calls on the same store block
/// behind it until it finishes.
pub async fn execute_with_timeout<E>(
    executor: Arc<E>,
    plan: QueryPlan,
    timeout: Duration,
) -> Result<QueryOutcome, ExecutionError>
where
    E: QueryExecutor + ?Sized + 'static,
{
    let task = tokio::task::spawn_blocking(move || executor.execute(&plan));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(ExecutionError::Backend(format!("Execution task failed: {e}"))),
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Query execution timed out");
            Err(ExecutionError::Timeout(timeout))
        }
    }
}

/// Record store held in memory, mainly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<Row>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(rows.len())
    }
}

impl RecordSink for MemoryStore {
    fn insert_many(&self, records: &[NormalizedTestRecord]) -> Result<usize, StoreError> {
        let rows = records.iter().map(plan_eval::to_row).collect::<Result<Vec<_>, _>>()?;
        let mut guard = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;
        guard.extend(rows);
        Ok(records.len())
    }
}

impl QueryExecutor for MemoryStore {
    fn execute(&self, plan: &QueryPlan) -> Result<QueryOutcome, ExecutionError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| ExecutionError::Unavailable("memory store lock poisoned".into()))?
            .clone();
        Ok(QueryOutcome::from_rows(plan_eval::evaluate(plan, rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizerConfig;
    use crate::models::{PatientBatch, PatientRef, RawTestEntry, StructuredQuery};
    use crate::pipeline::ingest_batches;
    use crate::query::QueryCompiler;
    use crate::reference::ReferenceData;

    fn batch(name: &str, gender: &str, tests: Vec<RawTestEntry>) -> PatientBatch {
        PatientBatch {
            name: name.into(),
            age_text: Some("34 Years".into()),
            gender_text: Some(gender.into()),
            report_date_text: Some("2024-03-02".into()),
            source_ref: None,
            tests,
        }
    }

    fn seeded_store(reference: &ReferenceData) -> MemoryStore {
        let batches = vec![
            batch(
                "Niketa",
                "Female",
                vec![
                    RawTestEntry::new("Hemoglobin", "11.2", "g/dL", "12.0-15.5"),
                    RawTestEntry::new("WBC", "7200", "cells/µL", "4000-11000"),
                ],
            ),
            batch("Asha", "Female", vec![RawTestEntry::new("Hemoglobin", "10.1", "g/dL", "12.0-15.5")]),
        ];
        let output = ingest_batches(reference, NormalizerConfig::default(), &batches);
        let store = MemoryStore::new();
        assert_eq!(store.insert_many(&output.records).unwrap(), 3);
        store
    }

    #[test]
    fn deficiency_for_one_patient_stays_scoped() {
        let reference = ReferenceData::builtin();
        let store = seeded_store(&reference);
        let plan = QueryCompiler::new(&reference).compile(&StructuredQuery::Deficiency {
            patient: Some(PatientRef::Name("niketa".into())),
            canonical_test: None,
            direction: None,
            gender: None,
            report_type: None,
            limit: None,
        });
        let outcome = store.execute(&plan).unwrap();
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.rows[0]["patient_name"], "Niketa");
        assert_eq!(outcome.rows[0]["abnormal_direction"], "LOW");
    }

    #[test]
    fn empty_store_returns_no_rows() {
        let reference = ReferenceData::builtin();
        let plan = QueryCompiler::new(&reference).compile(&StructuredQuery::Summary {
            canonical_test: None,
            report_type: None,
            top_n: None,
        });
        let outcome = MemoryStore::new().execute(&plan).unwrap();
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.rows[0]["total_tests"], serde_json::json!([{"count": 0}]));
    }

    struct SlowExecutor;

    impl QueryExecutor for SlowExecutor {
        fn execute(&self, _plan: &QueryPlan) -> Result<QueryOutcome, ExecutionError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(QueryOutcome { rows: Vec::new(), count: 0 })
        }
    }

    #[tokio::test]
    async fn slow_execution_times_out() {
        let reference = ReferenceData::builtin();
        let plan = QueryCompiler::new(&reference).compile(&StructuredQuery::Summary {
            canonical_test: None,
            report_type: None,
            top_n: None,
        });
        let err = execute_with_timeout(Arc::new(SlowExecutor), plan, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout(_)));
    }

    #[derive(Default)]
    struct TrackedSlowExecutor {
        finished: std::sync::atomic::AtomicBool,
    }

    impl QueryExecutor for TrackedSlowExecutor {
        fn execute(&self, _plan: &QueryPlan) -> Result<QueryOutcome, ExecutionError> {
            std::thread::sleep(Duration::from_millis(100));
            self.finished.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(QueryOutcome { rows: Vec::new(), count: 0 })
        }
    }

    #[tokio::test]
    async fn timed_out_execution_still_runs_to_completion() {
        let executor = Arc::new(TrackedSlowExecutor::default());
        let plan = QueryPlan::Find(crate::models::FindPlan {
            filter: crate::models::Filter::new(),
            sort: Vec::new(),
            limit: None,
            projection: None,
        });
        let err = execute_with_timeout(Arc::clone(&executor), plan, Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout(_)));
        assert!(!executor.finished.load(std::sync::atomic::Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(executor.finished.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn fast_execution_completes() {
        let reference = ReferenceData::builtin();
        let store = Arc::new(seeded_store(&reference));
        let plan = QueryCompiler::new(&reference).compile(&StructuredQuery::Comparison {
            canonical_test: "HEMOGLOBIN_CBC".into(),
            group_by: None,
            gender: None,
            report_type: None,
            limit: None,
        });
        let outcome = execute_with_timeout(store, plan, Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.rows[0]["key"], "Niketa");
    }

    #[test]
    fn poisoned_store_reports_errors_instead_of_empty() {
        let reference = ReferenceData::builtin();
        let store = seeded_store(&reference);
        assert_eq!(store.len().unwrap(), 3);

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.rows.write().unwrap();
            panic!("writer died holding the lock");
        }));

        assert!(matches!(store.len(), Err(StoreError::LockPoisoned)));
        assert!(matches!(store.insert_many(&[]), Err(StoreError::LockPoisoned)));
    }
}
