use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use super::{fetch_records, insert_records, open_database, open_memory_database, DatabaseError};
use crate::models::{Filter, NormalizedTestRecord, QueryPlan, Stage};
use crate::query::plan_eval;
use crate::query::{ExecutionError, QueryExecutor, QueryOutcome, RecordSink, StoreError};

/// SQLite-backed record store.
///
/// Equality conditions of the leading filter are pushed into SQL; the rest of
/// the plan is evaluated in process over the fetched rows.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }
}

fn leading_filter(plan: &QueryPlan) -> Option<&Filter> {
    match plan {
        QueryPlan::Find(find) => Some(&find.filter),
        QueryPlan::Aggregate(aggregate) => match aggregate.stages.first() {
            Some(Stage::Match(filter)) => Some(filter),
            _ => None,
        },
    }
}

impl RecordSink for SqliteStore {
    fn insert_many(&self, records: &[NormalizedTestRecord]) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(insert_records(&mut conn, records)?)
    }
}

impl QueryExecutor for SqliteStore {
    fn execute(&self, plan: &QueryPlan) -> Result<QueryOutcome, ExecutionError> {
        let records = {
            let conn = self
                .conn
                .lock()
                .map_err(|_| ExecutionError::Unavailable("database connection lock poisoned".into()))?;
            let everything = Filter::new();
            fetch_records(&conn, leading_filter(plan).unwrap_or(&everything))?
        };
        tracing::debug!(candidates = records.len(), "Fetched candidate records");
        let rows = records
            .iter()
            .map(plan_eval::to_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(QueryOutcome::from_rows(plan_eval::evaluate(plan, rows)))
    }
}
