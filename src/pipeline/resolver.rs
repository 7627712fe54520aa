//! Raw test name → canonical test.
//!
//! Steps run in a fixed priority order and the first hit wins:
//! 1. HbA1c keyword override (before anything that could see "HEMOGLOBIN")
//! 2. exact alias
//! 3. punctuation-normalized variants against the alias table
//! 4. longest-alias-first substring match, short aliases and derived lipid
//!    names (non-HDL, ratios) excluded
//!
//! Anything left over is UNKNOWN (`None`).

use serde::Serialize;

use crate::config::DEFAULT_PARTIAL_MATCH_MIN_LEN;
use crate::models::CanonicalTest;
use crate::reference::{AliasTable, DERIVED_NAME_MARKERS, HBA1C_KEYWORDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStep {
    KeywordOverride,
    ExactAlias,
    NormalizedVariant,
    PartialMatch,
}

impl ResolutionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeywordOverride => "keyword_override",
            Self::ExactAlias => "exact_alias",
            Self::NormalizedVariant => "normalized_variant",
            Self::PartialMatch => "partial_match",
        }
    }
}

/// Priority order of the resolution steps.
pub const RESOLUTION_ORDER: [ResolutionStep; 4] = [
    ResolutionStep::KeywordOverride,
    ResolutionStep::ExactAlias,
    ResolutionStep::NormalizedVariant,
    ResolutionStep::PartialMatch,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub test: CanonicalTest,
    pub step: ResolutionStep,
}

#[derive(Debug, Clone, Copy)]
pub struct TestResolver<'a> {
    aliases: &'a AliasTable,
    partial_match_min_len: usize,
}

impl<'a> TestResolver<'a> {
    pub fn new(aliases: &'a AliasTable) -> Self {
        Self {
            aliases,
            partial_match_min_len: DEFAULT_PARTIAL_MATCH_MIN_LEN,
        }
    }

    pub fn with_partial_match_min_len(mut self, min_len: usize) -> Self {
        self.partial_match_min_len = min_len;
        self
    }

    pub fn resolve(&self, raw_name: &str) -> Option<CanonicalTest> {
        self.resolve_traced(raw_name).map(|r| r.test)
    }

    /// Like [`resolve`](Self::resolve), also reporting which step matched.
    pub fn resolve_traced(&self, raw_name: &str) -> Option<Resolution> {
        let cleaned = clean_name(raw_name)?;
        let resolution = RESOLUTION_ORDER.iter().find_map(|&step| {
            self.apply(step, &cleaned)
                .map(|test| Resolution { test, step })
        });
        match &resolution {
            Some(r) => tracing::debug!(raw = raw_name, test = %r.test, step = r.step.as_str(), "Resolved test name"),
            None => tracing::debug!(raw = raw_name, "Test name did not resolve"),
        }
        resolution
    }

    /// Runs a single step against an already cleaned (trimmed, uppercased) name.
    pub fn apply(&self, step: ResolutionStep, cleaned: &str) -> Option<CanonicalTest> {
        match step {
            ResolutionStep::KeywordOverride => HBA1C_KEYWORDS
                .iter()
                .any(|keyword| cleaned.contains(keyword))
                .then_some(CanonicalTest::Hba1c),
            ResolutionStep::ExactAlias => self.aliases.get(cleaned),
            ResolutionStep::NormalizedVariant => name_variants(cleaned)
                .iter()
                .find_map(|variant| self.aliases.get(variant)),
            ResolutionStep::PartialMatch if is_derived_name(cleaned) => None,
            ResolutionStep::PartialMatch => self
                .aliases
                .longest_first()
                .filter(|(alias, _)| alias.chars().count() >= self.partial_match_min_len)
                .find(|(alias, _)| cleaned.contains(alias))
                .map(|(_, test)| test),
        }
    }
}

/// Trimmed, uppercased name; `None` for blank input.
pub fn clean_name(raw_name: &str) -> Option<String> {
    let cleaned = raw_name.trim().to_uppercase();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Punctuation variants tried against the alias table, in order.
fn name_variants(cleaned: &str) -> Vec<String> {
    let candidates = [
        cleaned.replace('.', ""),
        cleaned.replace(',', " "),
        cleaned.replace(['(', ')'], ""),
        cleaned.replace('-', " "),
        cleaned
            .replace(['.', '(', ')'], "")
            .replace([',', '-'], " "),
    ];
    let mut variants: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let collapsed = collapse_whitespace(&candidate);
        if !collapsed.is_empty() && collapsed != cleaned && !variants.contains(&collapsed) {
            variants.push(collapsed);
        }
    }
    variants
}

fn is_derived_name(cleaned: &str) -> bool {
    let spaced = collapse_whitespace(&cleaned.replace('-', " "));
    DERIVED_NAME_MARKERS.iter().any(|marker| spaced.contains(marker))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
