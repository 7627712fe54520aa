//! Immutable lookup tables shared by normalization and query compilation.

pub mod aliases;
pub mod ranges;
pub mod units;

pub use aliases::*;
pub use ranges::*;
pub use units::*;

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::models::CanonicalTest;

pub const ALIASES_FILE: &str = "aliases.json";
pub const RANGES_FILE: &str = "reference_ranges.json";
pub const UNITS_FILE: &str = "unit_conversions.json";

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Failed to read reference file {0}: {1}")]
    Load(String, String),

    #[error("Failed to parse reference file {0}: {1}")]
    Parse(String, String),

    #[error("Unknown canonical test {value} in {file}")]
    UnknownTest { file: String, value: String },
}

/// Alias table, global reference ranges and unit conversions, built once and
/// passed by reference to everything that needs them.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub aliases: AliasTable,
    pub ranges: GlobalReferenceTable,
    pub units: UnitTable,
}

impl ReferenceData {
    pub fn builtin() -> Self {
        Self {
            aliases: AliasTable::builtin(),
            ranges: GlobalReferenceTable::builtin(),
            units: UnitTable::builtin(),
        }
    }

    /// Builtin tables with optional overrides from `dir`:
    /// `aliases.json` (`{"ALIAS": "CANONICAL_ID"}`) is merged over the builtin
    /// aliases, `reference_ranges.json` replaces the range table and
    /// `unit_conversions.json` replaces the conversion rules. Missing files
    /// keep the builtin table.
    pub fn load(dir: &Path) -> Result<Self, ReferenceError> {
        let mut data = Self::builtin();

        if let Some(raw) = read_optional::<HashMap<String, String>>(dir, ALIASES_FILE)? {
            let overrides = sorted_entries(raw)
                .into_iter()
                .map(|(alias, target)| Ok((alias, parse_test(&target, ALIASES_FILE)?)))
                .collect::<Result<Vec<_>, ReferenceError>>()?;
            tracing::info!(count = overrides.len(), "Loaded alias overrides");
            data.aliases = data.aliases.with_overrides(overrides);
        }

        if let Some(raw) = read_optional::<HashMap<String, SexedRange>>(dir, RANGES_FILE)? {
            let ranges = sorted_entries(raw)
                .into_iter()
                .map(|(id, range)| Ok((parse_test(&id, RANGES_FILE)?, range)))
                .collect::<Result<Vec<_>, ReferenceError>>()?;
            let missing = CanonicalTest::ALL
                .iter()
                .filter(|t| !ranges.iter().any(|(r, _)| r == *t))
                .count();
            if missing > 0 {
                tracing::warn!(missing, "Reference range file does not cover every canonical test");
            }
            data.ranges = GlobalReferenceTable::from_ranges(ranges.into_iter().collect());
        }

        if let Some(rules) = read_optional::<Vec<UnitRule>>(dir, UNITS_FILE)? {
            tracing::info!(count = rules.len(), "Loaded unit conversion rules");
            data.units = UnitTable::from_rules(rules);
        }

        Ok(data)
    }
}

fn read_optional<T: serde::de::DeserializeOwned>(
    dir: &Path,
    file: &str,
) -> Result<Option<T>, ReferenceError> {
    let path = dir.join(file);
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(&path)
        .map_err(|e| ReferenceError::Load(path.display().to_string(), e.to_string()))?;
    let parsed =
        serde_json::from_str(&json).map_err(|e| ReferenceError::Parse(file.into(), e.to_string()))?;
    Ok(Some(parsed))
}

fn parse_test(value: &str, file: &str) -> Result<CanonicalTest, ReferenceError> {
    CanonicalTest::from_str(value.trim()).map_err(|_| ReferenceError::UnknownTest {
        file: file.into(),
        value: value.into(),
    })
}

/// JSON object entries sorted by key, so repeated loads agree.
fn sorted_entries<V>(raw: HashMap<String, V>) -> Vec<(String, V)> {
    let mut entries: Vec<(String, V)> = raw.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}
