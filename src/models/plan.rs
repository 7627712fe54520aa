//! Store-agnostic query plans.
//!
//! A plan is either a filtered find or an ordered list of aggregation stages.
//! Field names are the serialized names of [`NormalizedTestRecord`] fields, so
//! executors can evaluate plans over JSON rows or map fields to SQL columns.
//!
//! [`NormalizedTestRecord`]: super::NormalizedTestRecord

use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;

use super::enums::str_enum;

str_enum!(
    /// Record fields a plan can reference.
    Field {
        PatientId => "patient_id",
        PatientName => "patient_name",
        Age => "age",
        Gender => "gender",
        CanonicalTest => "canonical_test",
        RawTestName => "raw_test_name",
        Value => "value",
        ValueText => "value_text",
        UnitRaw => "unit_raw",
        ValueStandard => "value_standard",
        UnitStandard => "unit_standard",
        ReferenceMinRaw => "reference_min_raw",
        ReferenceMaxRaw => "reference_max_raw",
        ReferenceRawText => "reference_raw_text",
        UsedGlobalReference => "used_global_reference",
        IsAbnormal => "is_abnormal",
        AbnormalDirection => "abnormal_direction",
        ReportType => "report_type",
        ReportDate => "report_date",
        SourceRef => "source_ref",
        CreatedAt => "created_at",
    }
);

/// Literal compared against a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

str_enum!(
    /// Strict or inclusive bound on an ordered field.
    Bound {
        Gt => "gt",
        Gte => "gte",
        Lt => "lt",
        Lte => "lte",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Equals { field: Field, value: FieldValue },
    Compare { field: Field, bound: Bound, value: FieldValue },
    /// Case-insensitive substring match on a text field.
    ContainsIgnoreCase { field: Field, text: String },
    NotNull { field: Field },
}

impl Condition {
    pub fn field(&self) -> Field {
        match self {
            Condition::Equals { field, .. }
            | Condition::Compare { field, .. }
            | Condition::ContainsIgnoreCase { field, .. }
            | Condition::NotNull { field } => *field,
        }
    }
}

/// Conjunction of conditions. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn equals(&mut self, field: Field, value: impl Into<FieldValue>) {
        self.push(Condition::Equals { field, value: value.into() });
    }

    pub fn compare(&mut self, field: Field, bound: Bound, value: impl Into<FieldValue>) {
        self.push(Condition::Compare { field, bound, value: value.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.conditions.iter().any(|c| c.field() == field)
    }

    /// Value of the first equality condition on `field`.
    pub fn equality(&self, field: Field) -> Option<&FieldValue> {
        self.conditions.iter().find_map(|c| match c {
            Condition::Equals { field: f, value } if *f == field => Some(value),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sort on a record field or on a column produced by a group stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortTarget {
    Field(Field),
    Output(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub target: SortTarget,
    pub order: SortOrder,
}

impl SortKey {
    pub fn asc(field: Field) -> Self {
        Self { target: SortTarget::Field(field), order: SortOrder::Ascending }
    }

    pub fn desc(field: Field) -> Self {
        Self { target: SortTarget::Field(field), order: SortOrder::Descending }
    }

    pub fn output_desc(name: &str) -> Self {
        Self { target: SortTarget::Output(name.to_string()), order: SortOrder::Descending }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "field", rename_all = "snake_case")]
pub enum AccumulatorOp {
    Count,
    /// Number of rows where the boolean field is true.
    CountTrue(Field),
    Sum(Field),
    Avg(Field),
    Min(Field),
    Max(Field),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulator {
    pub output: String,
    pub op: AccumulatorOp,
}

impl Accumulator {
    pub fn new(output: &str, op: AccumulatorOp) -> Self {
        Self { output: output.to_string(), op }
    }
}

/// Group rows by `key` (all rows form one group when `None`). Output rows carry
/// the group value under [`GROUP_KEY_COLUMN`] plus one column per accumulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStage {
    pub key: Option<Field>,
    pub accumulators: Vec<Accumulator>,
}

pub const GROUP_KEY_COLUMN: &str = "key";

/// Named sub-pipeline evaluated over the same input rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    pub name: String,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Match(Filter),
    Group(GroupStage),
    Sort(Vec<SortKey>),
    Limit(u32),
    /// Replace the rows with a single `{output: n}` row.
    Count { output: String },
    Facet(Vec<Facet>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindPlan {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub limit: Option<u32>,
    /// Fields to keep in each row; `None` keeps the whole record.
    pub projection: Option<Vec<Field>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatePlan {
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryPlan {
    Find(FindPlan),
    Aggregate(AggregatePlan),
}

impl QueryPlan {
    pub fn as_find(&self) -> Option<&FindPlan> {
        match self {
            QueryPlan::Find(plan) => Some(plan),
            QueryPlan::Aggregate(_) => None,
        }
    }

    pub fn as_aggregate(&self) -> Option<&AggregatePlan> {
        match self {
            QueryPlan::Aggregate(plan) => Some(plan),
            QueryPlan::Find(_) => None,
        }
    }
}
