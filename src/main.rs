use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use labcanon_lib::config::{self, NormalizerConfig};
use labcanon_lib::db::SqliteStore;
use labcanon_lib::models::PatientBatch;
use labcanon_lib::pipeline::{ingest_batches, TestResolver};
use labcanon_lib::query::{execute_with_timeout, QueryCompiler, QueryRequest, RecordSink};
use labcanon_lib::reference::ReferenceData;

#[derive(Debug, Parser)]
#[command(name = "labcanon", version, about = "Normalize lab-test entries and query the results")]
struct Cli {
    /// Directory with reference-data overrides (aliases.json, reference_ranges.json, unit_conversions.json).
    #[arg(long = "reference-dir", value_name = "DIR", global = true, value_hint = clap::ValueHint::DirPath)]
    reference_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Normalize a JSON array of patient batches and store the records.
    Ingest(IngestArgs),
    /// Validate and compile a structured query, then run it.
    Query(QueryArgs),
    /// Show the canonical test each name resolves to.
    Resolve(ResolveArgs),
}

#[derive(Debug, clap::Args)]
struct IngestArgs {
    /// Path to the batch file. Use '-' to read from stdin.
    #[arg(long = "input", short = 'i', value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    input: PathBuf,

    /// SQLite database; defaults to the application data directory.
    #[arg(long = "db", value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    db: Option<PathBuf>,

    /// Normalize and report stats without storing anything.
    #[arg(long = "dry-run", default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, clap::Args)]
struct QueryArgs {
    /// Path to a JSON query request. Use '-' to read from stdin.
    #[arg(long = "query", short = 'q', value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    query: PathBuf,

    #[arg(long = "db", value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    db: Option<PathBuf>,

    /// Print the compiled plan instead of executing it.
    #[arg(long = "plan-only", default_value_t = false)]
    plan_only: bool,

    #[arg(long = "timeout-secs", value_name = "N")]
    timeout_secs: Option<u64>,
}

#[derive(Debug, clap::Args)]
struct ResolveArgs {
    #[arg(required = true, value_name = "NAME")]
    names: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ResolvedName<'a> {
    name: &'a str,
    canonical_test: Option<&'static str>,
    report_type: Option<&'static str>,
    step: Option<&'static str>,
}

#[tokio::main]
async fn main() -> Result<()> {
    labcanon_lib::init_tracing();
    let cli = Cli::parse();
    let reference = load_reference(cli.reference_dir.as_deref())?;

    match cli.command {
        Command::Ingest(args) => ingest(args, &reference),
        Command::Query(args) => query(args, &reference).await,
        Command::Resolve(args) => resolve(args, &reference),
    }
}

fn load_reference(dir: Option<&Path>) -> Result<ReferenceData> {
    let dir = dir.map(Path::to_path_buf).unwrap_or_else(config::reference_dir);
    ReferenceData::load(&dir).with_context(|| format!("Failed to load reference data from {}", dir.display()))
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn open_store(db: Option<PathBuf>) -> Result<SqliteStore> {
    let path = db.unwrap_or_else(config::default_database_path);
    SqliteStore::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn ingest(args: IngestArgs, reference: &ReferenceData) -> Result<()> {
    let raw = read_input(&args.input)?;
    let batches: Vec<PatientBatch> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid batch file {}", args.input.display()))?;

    let output = ingest_batches(reference, NormalizerConfig::from_env(), &batches);
    if !args.dry_run {
        let store = open_store(args.db)?;
        let stored = store.insert_many(&output.records).context("Failed to store records")?;
        tracing::info!(stored, "Ingestion persisted");
    }
    print_json(&output.stats)
}

async fn query(args: QueryArgs, reference: &ReferenceData) -> Result<()> {
    let raw = read_input(&args.query)?;
    let request: QueryRequest =
        serde_json::from_str(&raw).with_context(|| format!("Invalid query file {}", args.query.display()))?;
    let structured = request.into_structured().context("Query rejected")?;
    let plan = QueryCompiler::new(reference).compile(&structured);

    if args.plan_only {
        return print_json(&plan);
    }

    let store = Arc::new(open_store(args.db)?);
    let timeout = args.timeout_secs.map(Duration::from_secs).unwrap_or(config::DEFAULT_QUERY_TIMEOUT);
    let outcome = execute_with_timeout(store, plan, timeout).await.context("Query execution failed")?;
    print_json(&outcome)
}

fn resolve(args: ResolveArgs, reference: &ReferenceData) -> Result<()> {
    let config = NormalizerConfig::from_env();
    let resolver = TestResolver::new(&reference.aliases).with_partial_match_min_len(config.partial_match_min_len);
    let results: Vec<ResolvedName<'_>> = args
        .names
        .iter()
        .map(|name| {
            let resolution = resolver.resolve_traced(name);
            ResolvedName {
                name,
                canonical_test: resolution.map(|r| r.test.as_str()),
                report_type: resolution.map(|r| r.test.category().as_str()),
                step: resolution.map(|r| r.step.as_str()),
            }
        })
        .collect();
    print_json(&results)
}
