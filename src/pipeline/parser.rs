//! Numeric extraction from OCR result and reference-range text.
//!
//! Nothing here fails: text that holds no usable number degrades to `None`
//! and the original text is kept for display.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::ValueQualifier;

static VALUE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([<>≤≥])?\s*([-+]?(?:\d+(?:\.\d+)?|\.\d+))").expect("Invalid value regex")
});

static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:-|–|—|to)\s*(\d+(?:\.\d+)?)").expect("Invalid range regex")
});

static UPPER_BOUND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:<|≤|\bup\s*to\b|\bbelow\b|\bless\s+than\b)\s*=?\s*(\d+(?:\.\d+)?)")
        .expect("Invalid upper bound regex")
});

static LOWER_BOUND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:>|≥|\babove\b|\bmore\s+than\b|\bgreater\s+than\b)\s*=?\s*(\d+(?:\.\d+)?)")
        .expect("Invalid lower bound regex")
});

/// Reference texts that are qualitative and never carry bounds.
const QUALITATIVE_REFERENCES: &[&str] = &["negative", "positive", "nil", "absent", "-"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedValue {
    pub value: Option<f64>,
    /// Trimmed original text, `None` only for empty input.
    pub display_text: Option<String>,
    pub qualifier: Option<ValueQualifier>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedReference {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Trimmed original text, kept even when no bound could be read.
    pub raw_text: Option<String>,
}

/// Extract the first number from a result cell.
///
/// Thousands separators are dropped first, so "4,455" is 4455 and the Indian
/// grouping "1,50,000" is 150000.
pub fn parse_value(text: Option<&str>) -> ParsedValue {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return ParsedValue::default();
    };
    let without_commas = text.replace(',', "");

    let parsed = VALUE_PATTERN.captures(&without_commas).and_then(|caps| {
        let value = caps.get(2)?.as_str().parse::<f64>().ok()?;
        let qualifier = caps.get(1).map(|m| match m.as_str() {
            "<" | "≤" => ValueQualifier::LessThan,
            _ => ValueQualifier::GreaterThan,
        });
        Some((value, qualifier))
    });

    ParsedValue {
        value: parsed.map(|(value, _)| value),
        display_text: Some(text.to_string()),
        qualifier: parsed.and_then(|(_, qualifier)| qualifier),
    }
}

/// Read `(min, max)` from a reference-range cell.
///
/// Accepts "A - B" (hyphen, en dash, em dash or "to"), upper-bound forms
/// ("< B", "Up to B") and lower-bound forms ("> A", "Above A").
pub fn parse_reference(text: Option<&str>) -> ParsedReference {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return ParsedReference::default();
    };
    let raw_text = Some(text.to_string());

    if QUALITATIVE_REFERENCES.contains(&text.to_lowercase().as_str()) {
        return ParsedReference {
            min: None,
            max: None,
            raw_text,
        };
    }

    let cleaned = text.replace(',', "");
    let number = |caps: &regex::Captures<'_>, group: usize| {
        caps.get(group).and_then(|m| m.as_str().parse::<f64>().ok())
    };

    if let Some(caps) = RANGE_PATTERN.captures(&cleaned) {
        return ParsedReference {
            min: number(&caps, 1),
            max: number(&caps, 2),
            raw_text,
        };
    }
    if let Some(caps) = UPPER_BOUND_PATTERN.captures(&cleaned) {
        return ParsedReference {
            min: None,
            max: number(&caps, 1),
            raw_text,
        };
    }
    if let Some(caps) = LOWER_BOUND_PATTERN.captures(&cleaned) {
        return ParsedReference {
            min: number(&caps, 1),
            max: None,
            raw_text,
        };
    }

    ParsedReference {
        min: None,
        max: None,
        raw_text,
    }
}
