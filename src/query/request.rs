//! Loose wire form of a query and its validation into [`StructuredQuery`].

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    AbnormalDirection, AggregationKind, ComparisonOp, DateRange, Gender, GroupField, PatientRef,
    ReportCategory, StructuredQuery,
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueryValidationError {
    #[error("Unknown intent: {0}")]
    UnknownIntent(String),

    #[error("{intent} requires {field}")]
    MissingField { intent: &'static str, field: &'static str },

    #[error("Invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("BETWEEN operator requires both value and value_max")]
    IncompleteBetween,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Query as produced upstream: every field optional, enums as free strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    pub intent: String,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub canonical_test: Option<String>,
    pub operator: Option<String>,
    pub value: Option<f64>,
    pub value_max: Option<f64>,
    pub report_type: Option<String>,
    pub time_range: Option<TimeRange>,
    pub gender: Option<String>,
    pub aggregation_type: Option<String>,
    pub group_by: Option<String>,
    pub limit: Option<u32>,
    pub abnormal_direction: Option<String>,
    pub top_n: Option<u32>,
}

impl QueryRequest {
    pub fn into_structured(self) -> Result<StructuredQuery, QueryValidationError> {
        let intent = self.intent.trim().to_uppercase();
        let operator: Option<ComparisonOp> = parse_opt(self.operator.as_deref(), "operator", |s| s.to_lowercase())?;
        if operator == Some(ComparisonOp::Between) && (self.value.is_none() || self.value_max.is_none()) {
            return Err(QueryValidationError::IncompleteBetween);
        }
        let report_type: Option<ReportCategory> = parse_opt(self.report_type.as_deref(), "report_type", |s| s.to_uppercase())?;
        let gender: Option<Gender> = parse_opt(self.gender.as_deref(), "gender", |s| s.to_uppercase())?;
        let direction: Option<AbnormalDirection> =
            parse_opt(self.abnormal_direction.as_deref(), "abnormal_direction", |s| s.to_uppercase())?;
        let group_by: Option<GroupField> = parse_opt(self.group_by.as_deref(), "group_by", |s| s.to_lowercase())?;
        let patient = patient_ref(self.patient_id, self.patient_name);
        let canonical_test = non_blank(self.canonical_test);

        let query = match intent.as_str() {
            "PATIENT_LOOKUP" => StructuredQuery::PatientLookup {
                patient: patient.ok_or_else(|| missing("PATIENT_LOOKUP", "patient_id or patient_name"))?,
                canonical_test,
                report_type,
            },
            "FILTER" => StructuredQuery::Filter {
                canonical_test: canonical_test.ok_or_else(|| missing("FILTER", "canonical_test"))?,
                operator,
                value: self.value,
                value_max: self.value_max,
                direction,
                gender,
                report_type,
                limit: self.limit,
            },
            "DEFICIENCY" => StructuredQuery::Deficiency {
                patient,
                canonical_test,
                direction,
                gender,
                report_type,
                limit: self.limit,
            },
            "AGGREGATION" => {
                let raw = non_blank(self.aggregation_type)
                    .ok_or_else(|| missing("AGGREGATION", "aggregation_type (count, avg, min, max, sum)"))?;
                let metric = AggregationKind::from_str(&raw.to_lowercase()).map_err(|_| {
                    QueryValidationError::InvalidValue { field: "aggregation_type", value: raw.clone() }
                })?;
                StructuredQuery::Aggregation {
                    metric,
                    canonical_test,
                    group_by,
                    operator,
                    value: self.value,
                    value_max: self.value_max,
                    gender,
                    report_type,
                    limit: self.limit,
                }
            }
            "TREND" => StructuredQuery::Trend {
                patient: patient.ok_or_else(|| missing("TREND", "patient_id or patient_name"))?,
                canonical_test: canonical_test.ok_or_else(|| missing("TREND", "canonical_test"))?,
                date_range: self.time_range.map(date_range).transpose()?,
            },
            "COMPARISON" => StructuredQuery::Comparison {
                canonical_test: canonical_test.ok_or_else(|| missing("COMPARISON", "canonical_test"))?,
                group_by,
                gender,
                report_type,
                limit: self.limit,
            },
            "SUMMARY" => StructuredQuery::Summary {
                canonical_test,
                report_type,
                top_n: self.top_n,
            },
            _ => return Err(QueryValidationError::UnknownIntent(self.intent)),
        };
        Ok(query)
    }
}

fn missing(intent: &'static str, field: &'static str) -> QueryValidationError {
    QueryValidationError::MissingField { intent, field }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Id wins when both are supplied.
fn patient_ref(id: Option<String>, name: Option<String>) -> Option<PatientRef> {
    non_blank(id)
        .map(PatientRef::Id)
        .or_else(|| non_blank(name).map(PatientRef::Name))
}

fn parse_opt<T: FromStr>(
    raw: Option<&str>,
    field: &'static str,
    canonicalize: impl Fn(&str) -> String,
) -> Result<Option<T>, QueryValidationError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    T::from_str(&canonicalize(raw))
        .map(Some)
        .map_err(|_| QueryValidationError::InvalidValue { field, value: raw.to_string() })
}

fn date_range(range: TimeRange) -> Result<DateRange, QueryValidationError> {
    let parse = |field: &'static str, text: Option<String>| -> Result<Option<NaiveDate>, QueryValidationError> {
        match non_blank(text) {
            None => Ok(None),
            Some(text) => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| QueryValidationError::InvalidValue { field, value: text }),
        }
    };
    Ok(DateRange {
        start: parse("time_range.start", range.start)?,
        end: parse("time_range.end", range.end)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> QueryRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn deficiency_with_patient_name() {
        let query = request(serde_json::json!({"intent": "deficiency", "patient_name": "Niketa"}))
            .into_structured()
            .unwrap();
        assert_eq!(
            query,
            StructuredQuery::Deficiency {
                patient: Some(PatientRef::Name("Niketa".into())),
                canonical_test: None,
                direction: None,
                gender: None,
                report_type: None,
                limit: None,
            }
        );
    }

    #[test]
    fn patient_id_preferred_over_name() {
        let query = request(serde_json::json!({
            "intent": "PATIENT_LOOKUP", "patient_id": "p-1", "patient_name": "Asha"
        }))
        .into_structured()
        .unwrap();
        match query {
            StructuredQuery::PatientLookup { patient, .. } => assert_eq!(patient, PatientRef::Id("p-1".into())),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lookup_without_patient_is_rejected() {
        let err = request(serde_json::json!({"intent": "PATIENT_LOOKUP", "patient_name": "  "}))
            .into_structured()
            .unwrap_err();
        assert!(matches!(err, QueryValidationError::MissingField { intent: "PATIENT_LOOKUP", .. }));
    }

    #[test]
    fn filter_requires_test() {
        let err = request(serde_json::json!({"intent": "FILTER"})).into_structured().unwrap_err();
        assert_eq!(err, QueryValidationError::MissingField { intent: "FILTER", field: "canonical_test" });
    }

    #[test]
    fn trend_requires_test_and_patient() {
        let err = request(serde_json::json!({"intent": "TREND", "canonical_test": "TSH"}))
            .into_structured()
            .unwrap_err();
        assert!(matches!(err, QueryValidationError::MissingField { intent: "TREND", .. }));

        let err = request(serde_json::json!({"intent": "TREND", "patient_name": "Asha"}))
            .into_structured()
            .unwrap_err();
        assert_eq!(err, QueryValidationError::MissingField { intent: "TREND", field: "canonical_test" });
    }

    #[test]
    fn aggregation_type_is_checked() {
        let err = request(serde_json::json!({"intent": "AGGREGATION"})).into_structured().unwrap_err();
        assert!(matches!(err, QueryValidationError::MissingField { intent: "AGGREGATION", .. }));

        let err = request(serde_json::json!({"intent": "AGGREGATION", "aggregation_type": "median"}))
            .into_structured()
            .unwrap_err();
        assert_eq!(
            err,
            QueryValidationError::InvalidValue { field: "aggregation_type", value: "median".into() }
        );

        let query = request(serde_json::json!({"intent": "AGGREGATION", "aggregation_type": "AVG", "group_by": "Gender"}))
            .into_structured()
            .unwrap();
        assert!(matches!(
            query,
            StructuredQuery::Aggregation { metric: AggregationKind::Avg, group_by: Some(GroupField::Gender), .. }
        ));
    }

    #[test]
    fn between_needs_both_values() {
        let err = request(serde_json::json!({
            "intent": "FILTER", "canonical_test": "TSH", "operator": "between", "value": 1.0
        }))
        .into_structured()
        .unwrap_err();
        assert_eq!(err, QueryValidationError::IncompleteBetween);
    }

    #[test]
    fn enums_are_case_insensitive_and_validated() {
        let query = request(serde_json::json!({
            "intent": "filter", "canonical_test": "Hemoglobin", "operator": "LT",
            "gender": "f", "report_type": "cbc", "abnormal_direction": "low"
        }))
        .into_structured()
        .unwrap();
        assert_eq!(
            query,
            StructuredQuery::Filter {
                canonical_test: "Hemoglobin".into(),
                operator: Some(ComparisonOp::Lt),
                value: None,
                value_max: None,
                direction: Some(AbnormalDirection::Low),
                gender: Some(Gender::Female),
                report_type: Some(ReportCategory::Cbc),
                limit: None,
            }
        );

        let err = request(serde_json::json!({"intent": "SUMMARY", "gender": "X"}))
            .into_structured()
            .unwrap_err();
        assert_eq!(err, QueryValidationError::InvalidValue { field: "gender", value: "X".into() });
    }

    #[test]
    fn trend_time_range_parses_dates() {
        let query = request(serde_json::json!({
            "intent": "TREND", "patient_name": "Asha", "canonical_test": "TSH",
            "time_range": {"start": "2024-01-01"}
        }))
        .into_structured()
        .unwrap();
        match query {
            StructuredQuery::Trend { date_range: Some(range), .. } => {
                assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 1));
                assert_eq!(range.end, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_intent() {
        let err = request(serde_json::json!({"intent": "EXPLAIN"})).into_structured().unwrap_err();
        assert_eq!(err, QueryValidationError::UnknownIntent("EXPLAIN".into()));
    }
}
