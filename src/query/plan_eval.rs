//! In-process evaluation of query plans over JSON rows.
//!
//! Rows are serialized [`NormalizedTestRecord`]s, so plan fields are looked up
//! by their serialized names. Ordering across JSON types is null, then
//! booleans, then numbers, then strings; descending sorts reverse it.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::models::{
    AccumulatorOp, Bound, Condition, Field, FieldValue, Filter, FindPlan, GroupStage, NormalizedTestRecord, QueryPlan,
    SortKey, SortOrder, SortTarget, Stage, GROUP_KEY_COLUMN,
};

pub type Row = Map<String, Value>;

pub fn to_row(record: &NormalizedTestRecord) -> Result<Row, serde_json::Error> {
    match serde_json::to_value(record)? {
        Value::Object(row) => Ok(row),
        other => Err(serde::ser::Error::custom(format!("record serialized to non-object {other}"))),
    }
}

pub fn evaluate(plan: &QueryPlan, rows: Vec<Row>) -> Vec<Row> {
    match plan {
        QueryPlan::Find(find) => run_find(find, rows),
        QueryPlan::Aggregate(aggregate) => run_stages(&aggregate.stages, rows),
    }
}

pub fn run_find(plan: &FindPlan, rows: Vec<Row>) -> Vec<Row> {
    let mut rows: Vec<Row> = rows.into_iter().filter(|row| matches(&plan.filter, row)).collect();
    sort_rows(&mut rows, &plan.sort);
    if let Some(limit) = plan.limit {
        rows.truncate(limit as usize);
    }
    match &plan.projection {
        Some(fields) => rows
            .into_iter()
            .map(|row| {
                fields
                    .iter()
                    .map(|field| (field.as_str().to_string(), row.get(field.as_str()).cloned().unwrap_or(Value::Null)))
                    .collect::<Row>()
            })
            .collect(),
        None => rows,
    }
}

pub fn run_stages(stages: &[Stage], mut rows: Vec<Row>) -> Vec<Row> {
    for stage in stages {
        rows = match stage {
            Stage::Match(filter) => rows.into_iter().filter(|row| matches(filter, row)).collect(),
            Stage::Group(group) => group_rows(group, rows),
            Stage::Sort(keys) => {
                sort_rows(&mut rows, keys);
                rows
            }
            Stage::Limit(limit) => {
                rows.truncate(*limit as usize);
                rows
            }
            Stage::Count { output } => {
                let mut row = Row::new();
                row.insert(output.clone(), Value::from(rows.len() as u64));
                vec![row]
            }
            Stage::Facet(facets) => {
                let row: Row = facets
                    .iter()
                    .map(|facet| {
                        let facet_rows = run_stages(&facet.stages, rows.clone());
                        (facet.name.clone(), Value::Array(facet_rows.into_iter().map(Value::Object).collect()))
                    })
                    .collect();
                vec![row]
            }
        };
    }
    rows
}

pub fn matches(filter: &Filter, row: &Row) -> bool {
    filter.conditions.iter().all(|condition| condition_holds(condition, row))
}

fn condition_holds(condition: &Condition, row: &Row) -> bool {
    let actual = row.get(condition.field().as_str()).unwrap_or(&Value::Null);
    match condition {
        Condition::Equals { value, .. } => compare_literal(actual, value) == Some(Ordering::Equal),
        Condition::Compare { bound, value, .. } => match compare_literal(actual, value) {
            Some(ordering) => match bound {
                Bound::Gt => ordering == Ordering::Greater,
                Bound::Gte => ordering != Ordering::Less,
                Bound::Lt => ordering == Ordering::Less,
                Bound::Lte => ordering != Ordering::Greater,
            },
            None => false,
        },
        Condition::ContainsIgnoreCase { text, .. } => actual
            .as_str()
            .is_some_and(|s| s.to_lowercase().contains(&text.to_lowercase())),
        Condition::NotNull { .. } => !actual.is_null(),
    }
}

/// `None` when the row value and the literal are not comparable.
fn compare_literal(actual: &Value, literal: &FieldValue) -> Option<Ordering> {
    match (actual, literal) {
        (Value::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), FieldValue::Number(b)) => a.as_f64()?.partial_cmp(b),
        (Value::String(a), FieldValue::Text(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn sort_rows(rows: &mut [Row], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let column = match &key.target {
                    SortTarget::Field(field) => field.as_str(),
                    SortTarget::Output(name) => name.as_str(),
                };
                let left = a.get(column).unwrap_or(&Value::Null);
                let right = b.get(column).unwrap_or(&Value::Null);
                let ordering = compare_values(left, right);
                match key.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

/// Groups keep first-seen order so an unsorted group stage is deterministic.
fn group_rows(group: &GroupStage, rows: Vec<Row>) -> Vec<Row> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<Row>)> = Vec::new();
    for row in rows {
        let key = group
            .key
            .and_then(|field| row.get(field.as_str()).cloned())
            .unwrap_or(Value::Null);
        let slot = *index.entry(key.to_string()).or_insert_with(|| {
            groups.push((key.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(row);
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let mut out = Row::new();
            out.insert(GROUP_KEY_COLUMN.to_string(), key);
            for accumulator in &group.accumulators {
                out.insert(accumulator.output.clone(), accumulate(&accumulator.op, &members));
            }
            out
        })
        .collect()
}

fn accumulate(op: &AccumulatorOp, rows: &[Row]) -> Value {
    let numbers = |field: &Field| -> Vec<f64> {
        rows.iter()
            .filter_map(|row| row.get(field.as_str()).and_then(Value::as_f64))
            .collect()
    };
    match op {
        AccumulatorOp::Count => Value::from(rows.len() as u64),
        AccumulatorOp::CountTrue(field) => {
            let n = rows
                .iter()
                .filter(|row| row.get(field.as_str()).and_then(Value::as_bool) == Some(true))
                .count();
            Value::from(n as u64)
        }
        AccumulatorOp::Sum(field) => Value::from(numbers(field).iter().sum::<f64>()),
        AccumulatorOp::Avg(field) => {
            let values = numbers(field);
            if values.is_empty() {
                Value::Null
            } else {
                Value::from(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        AccumulatorOp::Min(field) => numbers(field).into_iter().reduce(f64::min).map_or(Value::Null, Value::from),
        AccumulatorOp::Max(field) => numbers(field).into_iter().reduce(f64::max).map_or(Value::Null, Value::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Accumulator, AggregatePlan, Facet};
    use serde_json::json;

    fn rows(values: Vec<Value>) -> Vec<Row> {
        values
            .into_iter()
            .map(|v| match v {
                Value::Object(row) => row,
                other => panic!("not an object: {other}"),
            })
            .collect()
    }

    fn sample() -> Vec<Row> {
        rows(vec![
            json!({"patient_id": "a", "patient_name": "Niketa Rao", "canonical_test": "HEMOGLOBIN_CBC", "value_standard": 11.2, "is_abnormal": true, "report_type": "CBC"}),
            json!({"patient_id": "a", "patient_name": "Niketa Rao", "canonical_test": "WBC_COUNT", "value_standard": 7200.0, "is_abnormal": false, "report_type": "CBC"}),
            json!({"patient_id": "b", "patient_name": "Asha", "canonical_test": "HEMOGLOBIN_CBC", "value_standard": 14.0, "is_abnormal": false, "report_type": "CBC"}),
            json!({"patient_id": "c", "patient_name": "Ravi", "canonical_test": "HEMOGLOBIN_CBC", "value_standard": null, "is_abnormal": false, "report_type": "CBC"}),
            json!({"patient_id": "c", "patient_name": "Ravi", "canonical_test": "TSH", "value_standard": 6.1, "is_abnormal": true, "report_type": "THYROID"}),
        ])
    }

    #[test]
    fn find_filters_sorts_and_limits() {
        let mut filter = Filter::new();
        filter.equals(Field::CanonicalTest, FieldValue::text("HEMOGLOBIN_CBC"));
        filter.compare(Field::ValueStandard, Bound::Gt, 10.0);
        let plan = FindPlan {
            filter,
            sort: vec![SortKey::desc(Field::ValueStandard)],
            limit: Some(1),
            projection: Some(vec![Field::PatientName]),
        };
        let out = run_find(&plan, sample());
        assert_eq!(out.len(), 1);
        assert_eq!(Value::Object(out[0].clone()), json!({"patient_name": "Asha"}));
    }

    #[test]
    fn name_match_ignores_case() {
        let mut filter = Filter::new();
        filter.push(Condition::ContainsIgnoreCase { field: Field::PatientName, text: "niketa".into() });
        filter.equals(Field::IsAbnormal, true);
        let matched: Vec<_> = sample().into_iter().filter(|row| matches(&filter, row)).collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0]["canonical_test"], "HEMOGLOBIN_CBC");
    }

    #[test]
    fn null_never_satisfies_a_bound() {
        let mut filter = Filter::new();
        filter.compare(Field::ValueStandard, Bound::Lt, 100.0);
        let matched = sample().into_iter().filter(|row| matches(&filter, row)).count();
        assert_eq!(matched, 3);
    }

    #[test]
    fn group_average_sorted_descending() {
        let stages = vec![
            Stage::Match({
                let mut f = Filter::new();
                f.push(Condition::NotNull { field: Field::ValueStandard });
                f.equals(Field::CanonicalTest, FieldValue::text("HEMOGLOBIN_CBC"));
                f
            }),
            Stage::Group(GroupStage {
                key: Some(Field::PatientName),
                accumulators: vec![
                    Accumulator::new("avg_value", AccumulatorOp::Avg(Field::ValueStandard)),
                    Accumulator::new("count", AccumulatorOp::Count),
                ],
            }),
            Stage::Sort(vec![SortKey::output_desc("avg_value")]),
        ];
        let out = run_stages(&stages, sample());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["key"], "Asha");
        assert_eq!(out[0]["avg_value"], json!(14.0));
        assert_eq!(out[1]["key"], "Niketa Rao");
        assert_eq!(out[1]["count"], json!(1));
    }

    #[test]
    fn facets_share_input_rows() {
        let plan = QueryPlan::Aggregate(AggregatePlan {
            stages: vec![Stage::Facet(vec![
                Facet {
                    name: "total".into(),
                    stages: vec![Stage::Count { output: "count".into() }],
                },
                Facet {
                    name: "patients".into(),
                    stages: vec![
                        Stage::Group(GroupStage { key: Some(Field::PatientId), accumulators: vec![] }),
                        Stage::Count { output: "count".into() },
                    ],
                },
                Facet {
                    name: "by_test".into(),
                    stages: vec![
                        Stage::Group(GroupStage {
                            key: Some(Field::CanonicalTest),
                            accumulators: vec![Accumulator::new("abnormal", AccumulatorOp::CountTrue(Field::IsAbnormal))],
                        }),
                        Stage::Limit(1),
                    ],
                },
            ])],
        });
        let out = evaluate(&plan, sample());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["total"], json!([{"count": 5}]));
        assert_eq!(out[0]["patients"], json!([{"count": 3}]));
        assert_eq!(out[0]["by_test"], json!([{"key": "HEMOGLOBIN_CBC", "abnormal": 1}]));
    }

    #[test]
    fn empty_group_metrics_are_null() {
        let out = run_stages(
            &[Stage::Group(GroupStage {
                key: None,
                accumulators: vec![Accumulator::new("result", AccumulatorOp::Max(Field::ValueStandard))],
            })],
            rows(vec![json!({"value_standard": null})]),
        );
        assert_eq!(out[0]["result"], Value::Null);
        assert_eq!(out[0]["key"], Value::Null);
    }
}
