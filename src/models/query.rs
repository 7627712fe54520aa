use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;

use super::enums::{str_enum, AbnormalDirection, AggregationKind, ComparisonOp, Gender, ReportCategory};
use super::plan::Field;

/// Patient constraint. An id is exact; a name matches case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientRef {
    Id(String),
    Name(String),
}

str_enum!(
    /// Record fields AGGREGATION and COMPARISON may group by.
    GroupField {
        PatientId => "patient_id",
        PatientName => "patient_name",
        CanonicalTest => "canonical_test",
        ReportType => "report_type",
        Gender => "gender",
        Age => "age",
        IsAbnormal => "is_abnormal",
        AbnormalDirection => "abnormal_direction",
        ReportDate => "report_date",
    }
);

impl GroupField {
    pub fn field(&self) -> Field {
        match self {
            Self::PatientId => Field::PatientId,
            Self::PatientName => Field::PatientName,
            Self::CanonicalTest => Field::CanonicalTest,
            Self::ReportType => Field::ReportType,
            Self::Gender => Field::Gender,
            Self::Age => Field::Age,
            Self::IsAbnormal => Field::IsAbnormal,
            Self::AbnormalDirection => Field::AbnormalDirection,
            Self::ReportDate => Field::ReportDate,
        }
    }
}

/// Inclusive report-date window; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Validated caller intent. Each variant carries only the fields its intent
/// accepts; `canonical_test` stays free text and is re-resolved at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructuredQuery {
    PatientLookup {
        patient: PatientRef,
        canonical_test: Option<String>,
        report_type: Option<ReportCategory>,
    },
    Filter {
        canonical_test: String,
        operator: Option<ComparisonOp>,
        value: Option<f64>,
        value_max: Option<f64>,
        direction: Option<AbnormalDirection>,
        gender: Option<Gender>,
        report_type: Option<ReportCategory>,
        limit: Option<u32>,
    },
    Deficiency {
        patient: Option<PatientRef>,
        canonical_test: Option<String>,
        direction: Option<AbnormalDirection>,
        gender: Option<Gender>,
        report_type: Option<ReportCategory>,
        limit: Option<u32>,
    },
    Aggregation {
        metric: AggregationKind,
        canonical_test: Option<String>,
        group_by: Option<GroupField>,
        operator: Option<ComparisonOp>,
        value: Option<f64>,
        value_max: Option<f64>,
        gender: Option<Gender>,
        report_type: Option<ReportCategory>,
        limit: Option<u32>,
    },
    Trend {
        patient: PatientRef,
        canonical_test: String,
        date_range: Option<DateRange>,
    },
    Comparison {
        canonical_test: String,
        group_by: Option<GroupField>,
        gender: Option<Gender>,
        report_type: Option<ReportCategory>,
        limit: Option<u32>,
    },
    Summary {
        canonical_test: Option<String>,
        report_type: Option<ReportCategory>,
        top_n: Option<u32>,
    },
}

impl StructuredQuery {
    pub fn intent(&self) -> &'static str {
        match self {
            Self::PatientLookup { .. } => "PATIENT_LOOKUP",
            Self::Filter { .. } => "FILTER",
            Self::Deficiency { .. } => "DEFICIENCY",
            Self::Aggregation { .. } => "AGGREGATION",
            Self::Trend { .. } => "TREND",
            Self::Comparison { .. } => "COMPARISON",
            Self::Summary { .. } => "SUMMARY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_fields_map_to_plan_fields() {
        for group in GroupField::ALL {
            assert_eq!(group.field().as_str(), group.as_str());
        }
    }

    #[test]
    fn serialized_intent_tag_matches_intent_name() {
        let query = StructuredQuery::Summary { canonical_test: None, report_type: None, top_n: Some(3) };
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["intent"], query.intent());
    }
}
