pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod reference;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber on stderr.
/// `RUST_LOG` wins over [`config::default_log_filter`]. Safe to call twice.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
