pub mod compiler;
pub mod executor;
pub mod plan_eval;
pub mod request;

pub use compiler::{QueryCompiler, TestTarget};
pub use executor::{
    execute_with_timeout, ExecutionError, MemoryStore, QueryExecutor, QueryOutcome, RecordSink, StoreError,
};
pub use request::{QueryRequest, QueryValidationError};
