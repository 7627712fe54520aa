pub mod classify;
pub mod ingest;
pub mod parser;
pub mod reference_range;
pub mod resolver;
pub mod specimen;
pub mod units;

pub use ingest::{ingest_batches, EntryNormalizer, IngestionOutput, IngestionRun};
pub use resolver::TestResolver;
