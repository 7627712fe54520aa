use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Application-level constants
pub const APP_NAME: &str = "labcanon";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DATABASE_FILE: &str = "labcanon.db";

/// Aliases shorter than this never take part in partial name matching
/// ("HB" inside "HBSAG" must not resolve to hemoglobin).
pub const DEFAULT_PARTIAL_MATCH_MIN_LEN: usize = 4;

/// Number of urine-only test names that marks a batch as a urine panel.
pub const DEFAULT_SPECIMEN_MARKER_THRESHOLD: usize = 3;

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Limit applied when SUMMARY asks for the top tests without a count.
pub const DEFAULT_SUMMARY_TOP_N: u32 = 10;

pub const ENV_PARTIAL_MATCH_MIN_LEN: &str = "LABCANON_PARTIAL_MATCH_MIN_LEN";
pub const ENV_SPECIMEN_MARKER_THRESHOLD: &str = "LABCANON_SPECIMEN_MARKER_THRESHOLD";
pub const ENV_DATA_DIR: &str = "LABCANON_DATA_DIR";

/// Get the application data directory.
/// `$LABCANON_DATA_DIR` when set, else ~/.labcanon, else the working directory.
pub fn app_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(ENV_DATA_DIR) {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".labcanon"),
        None => PathBuf::from(".labcanon"),
    }
}

pub fn default_database_path() -> PathBuf {
    app_data_dir().join(DATABASE_FILE)
}

/// Optional directory holding reference-data override files.
pub fn reference_dir() -> PathBuf {
    app_data_dir().join("reference")
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    format!("{}=info,labcanon_lib=info,warn", APP_NAME)
}

/// Tunable heuristics of the normalization pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizerConfig {
    pub partial_match_min_len: usize,
    pub specimen_marker_threshold: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            partial_match_min_len: DEFAULT_PARTIAL_MATCH_MIN_LEN,
            specimen_marker_threshold: DEFAULT_SPECIMEN_MARKER_THRESHOLD,
        }
    }
}

impl NormalizerConfig {
    /// Defaults overridden by environment variables. Unparseable or zero
    /// values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            partial_match_min_len: read_positive(
                &lookup,
                ENV_PARTIAL_MATCH_MIN_LEN,
                defaults.partial_match_min_len,
            ),
            specimen_marker_threshold: read_positive(
                &lookup,
                ENV_SPECIMEN_MARKER_THRESHOLD,
                defaults.specimen_marker_threshold,
            ),
        }
    }
}

fn read_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => value,
        _ => {
            tracing::warn!(key, value = %raw, default, "Ignoring invalid configuration value");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_under_app_data() {
        let db = default_database_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with(DATABASE_FILE));
    }

    #[test]
    fn app_name_is_labcanon() {
        assert_eq!(APP_NAME, "labcanon");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn normalizer_defaults() {
        let config = NormalizerConfig::default();
        assert_eq!(config.partial_match_min_len, 4);
        assert_eq!(config.specimen_marker_threshold, 3);
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = NormalizerConfig::from_lookup(|key| match key {
            ENV_SPECIMEN_MARKER_THRESHOLD => Some("5".into()),
            _ => None,
        });
        assert_eq!(config.specimen_marker_threshold, 5);
        assert_eq!(config.partial_match_min_len, DEFAULT_PARTIAL_MATCH_MIN_LEN);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = NormalizerConfig::from_lookup(|key| match key {
            ENV_PARTIAL_MATCH_MIN_LEN => Some("zero".into()),
            ENV_SPECIMEN_MARKER_THRESHOLD => Some("0".into()),
            _ => None,
        });
        assert_eq!(config, NormalizerConfig::default());
    }
}
