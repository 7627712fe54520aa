//! Compiles a validated [`StructuredQuery`] into a store-agnostic [`QueryPlan`].
//!
//! Every intent shares two scoping rules: free-text test names are
//! re-resolved to a canonical id, and a filter naming a canonical test with no
//! explicit report type is pinned to that test's category.

use crate::config::DEFAULT_SUMMARY_TOP_N;
use crate::models::{
    Accumulator, AccumulatorOp, AggregatePlan, AggregationKind, Bound, CanonicalTest, ComparisonOp, Condition,
    DateRange, Facet, Field, FieldValue, Filter, FindPlan, Gender, GroupField, GroupStage, PatientRef, QueryPlan,
    ReportCategory, SortKey, Stage, StructuredQuery,
};
use crate::pipeline::TestResolver;
use crate::reference::ReferenceData;

/// Output column of an AGGREGATION group stage.
pub const RESULT_COLUMN: &str = "result";
pub const COUNT_COLUMN: &str = "count";
pub const AVG_COLUMN: &str = "avg_value";
pub const MIN_COLUMN: &str = "min_value";
pub const MAX_COLUMN: &str = "max_value";
pub const ABNORMAL_COLUMN: &str = "abnormal";

const TREND_PROJECTION: &[Field] = &[
    Field::PatientName,
    Field::CanonicalTest,
    Field::Value,
    Field::ValueStandard,
    Field::UnitRaw,
    Field::UnitStandard,
    Field::ReportDate,
    Field::IsAbnormal,
];

/// Test named by a query after canonical normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestTarget {
    Known(CanonicalTest),
    /// No canonical id matched; filtering on the text matches nothing.
    Unresolved(String),
}

impl TestTarget {
    pub fn canonical(&self) -> Option<CanonicalTest> {
        match self {
            TestTarget::Known(test) => Some(*test),
            TestTarget::Unresolved(_) => None,
        }
    }

    fn value(&self) -> FieldValue {
        match self {
            TestTarget::Known(test) => FieldValue::text(test.as_str()),
            TestTarget::Unresolved(text) => FieldValue::text(text.clone()),
        }
    }
}

pub struct QueryCompiler<'a> {
    reference: &'a ReferenceData,
    resolver: TestResolver<'a>,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(reference: &'a ReferenceData) -> Self {
        Self {
            reference,
            resolver: TestResolver::new(&reference.aliases),
        }
    }

    pub fn compile(&self, query: &StructuredQuery) -> QueryPlan {
        let plan = match query {
            StructuredQuery::PatientLookup { patient, canonical_test, report_type } => {
                self.patient_lookup(patient, canonical_test.as_deref(), *report_type)
            }
            StructuredQuery::Filter {
                canonical_test,
                operator,
                value,
                value_max,
                direction,
                gender,
                report_type,
                limit,
            } => {
                let target = self.normalize_test(canonical_test);
                let operator = operator.or_else(|| direction.map(|d| d.operator()));
                let mut filter = Filter::new();
                filter.equals(Field::CanonicalTest, target.value());
                match operator {
                    Some(op) => {
                        let (min, max) = self.infer_threshold(&target, op, *value, *value_max, *gender);
                        push_value_conditions(&mut filter, op, min, max);
                    }
                    None => tracing::debug!(test = %canonical_test, "FILTER without operator, no value condition"),
                }
                push_gender(&mut filter, *gender);
                push_scope(&mut filter, Some(&target), *report_type);
                QueryPlan::Find(FindPlan {
                    filter,
                    sort: vec![SortKey::desc(Field::ValueStandard)],
                    limit: *limit,
                    projection: None,
                })
            }
            StructuredQuery::Deficiency { patient, canonical_test, direction, gender, report_type, limit } => {
                let target = canonical_test.as_deref().map(|t| self.normalize_test(t));
                let mut filter = Filter::new();
                filter.equals(Field::IsAbnormal, true);
                if let Some(patient) = patient {
                    filter.push(patient_condition(patient));
                }
                if let Some(target) = &target {
                    filter.equals(Field::CanonicalTest, target.value());
                }
                if let Some(direction) = direction {
                    filter.equals(Field::AbnormalDirection, FieldValue::text(direction.as_str()));
                }
                push_gender(&mut filter, *gender);
                push_scope(&mut filter, target.as_ref(), *report_type);
                QueryPlan::Find(FindPlan {
                    filter,
                    sort: vec![SortKey::asc(Field::CanonicalTest), SortKey::asc(Field::PatientName)],
                    limit: *limit,
                    projection: None,
                })
            }
            StructuredQuery::Aggregation {
                metric,
                canonical_test,
                group_by,
                operator,
                value,
                value_max,
                gender,
                report_type,
                limit,
            } => {
                let target = canonical_test.as_deref().map(|t| self.normalize_test(t));
                let mut filter = Filter::new();
                if let Some(target) = &target {
                    filter.equals(Field::CanonicalTest, target.value());
                }
                push_gender(&mut filter, *gender);
                push_scope(&mut filter, target.as_ref(), *report_type);
                if let (Some(op), Some(value)) = (operator, value) {
                    let (min, max) = match op {
                        ComparisonOp::Between => (Some(*value), *value_max),
                        _ => (Some(*value), Some(*value)),
                    };
                    push_value_conditions(&mut filter, *op, min, max);
                }
                if *metric != AggregationKind::Count {
                    filter.push(Condition::NotNull { field: Field::ValueStandard });
                }

                let mut stages = Vec::new();
                if !filter.is_empty() {
                    stages.push(Stage::Match(filter));
                }
                stages.push(Stage::Group(GroupStage {
                    key: group_by.map(|g| g.field()),
                    accumulators: vec![Accumulator::new(RESULT_COLUMN, metric_op(*metric))],
                }));
                stages.push(Stage::Sort(vec![SortKey::output_desc(RESULT_COLUMN)]));
                stages.extend(limit.map(Stage::Limit));
                QueryPlan::Aggregate(AggregatePlan { stages })
            }
            StructuredQuery::Trend { patient, canonical_test, date_range } => {
                self.trend(patient, canonical_test, date_range.as_ref())
            }
            StructuredQuery::Comparison { canonical_test, group_by, gender, report_type, limit } => {
                let target = self.normalize_test(canonical_test);
                let mut filter = Filter::new();
                filter.equals(Field::CanonicalTest, target.value());
                push_gender(&mut filter, *gender);
                push_scope(&mut filter, Some(&target), *report_type);
                filter.push(Condition::NotNull { field: Field::ValueStandard });

                let key = group_by.unwrap_or(GroupField::PatientName).field();
                let mut stages = vec![
                    Stage::Match(filter),
                    Stage::Group(GroupStage {
                        key: Some(key),
                        accumulators: vec![
                            Accumulator::new(AVG_COLUMN, AccumulatorOp::Avg(Field::ValueStandard)),
                            Accumulator::new(MIN_COLUMN, AccumulatorOp::Min(Field::ValueStandard)),
                            Accumulator::new(MAX_COLUMN, AccumulatorOp::Max(Field::ValueStandard)),
                            Accumulator::new(COUNT_COLUMN, AccumulatorOp::Count),
                        ],
                    }),
                    Stage::Sort(vec![SortKey::output_desc(AVG_COLUMN)]),
                ];
                stages.extend(limit.map(Stage::Limit));
                QueryPlan::Aggregate(AggregatePlan { stages })
            }
            StructuredQuery::Summary { canonical_test, report_type, top_n } => {
                self.summary(canonical_test.as_deref(), *report_type, top_n.unwrap_or(DEFAULT_SUMMARY_TOP_N))
            }
        };
        tracing::debug!(intent = query.intent(), "Compiled query plan");
        plan
    }

    /// Enum id first ("hemoglobin cbc"), then the ingestion resolver ("Hb").
    pub fn normalize_test(&self, text: &str) -> TestTarget {
        if let Some(test) = CanonicalTest::from_loose_id(text) {
            return TestTarget::Known(test);
        }
        match self.resolver.resolve(text) {
            Some(test) => TestTarget::Known(test),
            None => {
                let normalized = text.trim().to_uppercase().replace(' ', "_");
                tracing::warn!(test = %text, normalized = %normalized, "Query test did not resolve to a canonical id");
                TestTarget::Unresolved(normalized)
            }
        }
    }

    /// Fill a missing threshold from the global reference range.
    /// Returns the (lower, upper) operands for `op`; equality uses `lower`.
    fn infer_threshold(
        &self,
        target: &TestTarget,
        op: ComparisonOp,
        value: Option<f64>,
        value_max: Option<f64>,
        gender: Option<Gender>,
    ) -> (Option<f64>, Option<f64>) {
        let (ref_min, ref_max) = target
            .canonical()
            .map(|test| self.reference.ranges.bounds(test, gender))
            .unwrap_or((None, None));
        match op {
            ComparisonOp::Eq => (value, None),
            ComparisonOp::Lt | ComparisonOp::Lte => (value.or(ref_min), None),
            ComparisonOp::Gt | ComparisonOp::Gte => (None, value.or(ref_max)),
            ComparisonOp::Between => (value.or(ref_min), value_max.or(ref_max)),
        }
    }

    fn patient_lookup(
        &self,
        patient: &PatientRef,
        canonical_test: Option<&str>,
        report_type: Option<ReportCategory>,
    ) -> QueryPlan {
        let target = canonical_test.map(|t| self.normalize_test(t));
        let mut filter = Filter::new();
        filter.push(patient_condition(patient));
        if let Some(target) = &target {
            filter.equals(Field::CanonicalTest, target.value());
        }
        push_scope(&mut filter, target.as_ref(), report_type);
        QueryPlan::Find(FindPlan {
            filter,
            sort: vec![SortKey::asc(Field::CanonicalTest)],
            limit: None,
            projection: None,
        })
    }

    fn trend(&self, patient: &PatientRef, canonical_test: &str, date_range: Option<&DateRange>) -> QueryPlan {
        let target = self.normalize_test(canonical_test);
        let mut filter = Filter::new();
        filter.equals(Field::CanonicalTest, target.value());
        filter.push(patient_condition(patient));
        push_scope(&mut filter, Some(&target), None);
        if let Some(range) = date_range {
            if let Some(start) = range.start {
                filter.compare(Field::ReportDate, Bound::Gte, FieldValue::text(start.to_string()));
            }
            if let Some(end) = range.end {
                filter.compare(Field::ReportDate, Bound::Lte, FieldValue::text(end.to_string()));
            }
        }
        QueryPlan::Find(FindPlan {
            filter,
            sort: vec![SortKey::asc(Field::ReportDate), SortKey::asc(Field::CreatedAt)],
            limit: None,
            projection: Some(TREND_PROJECTION.to_vec()),
        })
    }

    fn summary(&self, canonical_test: Option<&str>, report_type: Option<ReportCategory>, top_n: u32) -> QueryPlan {
        let target = canonical_test.map(|t| self.normalize_test(t));
        let mut filter = Filter::new();
        if let Some(target) = &target {
            filter.equals(Field::CanonicalTest, target.value());
        }
        push_scope(&mut filter, target.as_ref(), report_type);

        let count = || Stage::Count { output: COUNT_COLUMN.to_string() };
        let mut abnormal = Filter::new();
        abnormal.equals(Field::IsAbnormal, true);
        let facets = vec![
            Facet { name: "total_tests".into(), stages: vec![count()] },
            Facet {
                name: "unique_patients".into(),
                stages: vec![
                    Stage::Group(GroupStage { key: Some(Field::PatientId), accumulators: Vec::new() }),
                    count(),
                ],
            },
            Facet { name: "abnormal_count".into(), stages: vec![Stage::Match(abnormal), count()] },
            Facet {
                name: "by_report_type".into(),
                stages: vec![
                    Stage::Group(GroupStage {
                        key: Some(Field::ReportType),
                        accumulators: vec![Accumulator::new(COUNT_COLUMN, AccumulatorOp::Count)],
                    }),
                    Stage::Sort(vec![SortKey::output_desc(COUNT_COLUMN)]),
                ],
            },
            Facet {
                name: "by_test".into(),
                stages: vec![
                    Stage::Group(GroupStage {
                        key: Some(Field::CanonicalTest),
                        accumulators: vec![
                            Accumulator::new(COUNT_COLUMN, AccumulatorOp::Count),
                            Accumulator::new(ABNORMAL_COLUMN, AccumulatorOp::CountTrue(Field::IsAbnormal)),
                        ],
                    }),
                    Stage::Sort(vec![SortKey::output_desc(COUNT_COLUMN)]),
                    Stage::Limit(top_n),
                ],
            },
        ];

        let mut stages = Vec::new();
        if !filter.is_empty() {
            stages.push(Stage::Match(filter));
        }
        stages.push(Stage::Facet(facets));
        QueryPlan::Aggregate(AggregatePlan { stages })
    }
}

fn patient_condition(patient: &PatientRef) -> Condition {
    match patient {
        PatientRef::Id(id) => Condition::Equals { field: Field::PatientId, value: FieldValue::text(id.clone()) },
        PatientRef::Name(name) => Condition::ContainsIgnoreCase { field: Field::PatientName, text: name.clone() },
    }
}

fn push_gender(filter: &mut Filter, gender: Option<Gender>) {
    if let Some(gender) = gender {
        filter.equals(Field::Gender, FieldValue::text(gender.as_str()));
    }
}

/// Explicit report type wins; otherwise a resolved test pins its category.
fn push_scope(filter: &mut Filter, target: Option<&TestTarget>, report_type: Option<ReportCategory>) {
    let scope = report_type.or_else(|| target.and_then(TestTarget::canonical).map(|t| t.category()));
    if let Some(scope) = scope {
        filter.equals(Field::ReportType, FieldValue::text(scope.as_str()));
    }
}

/// Value conditions on `value_standard`. A side with no operand is skipped.
fn push_value_conditions(filter: &mut Filter, op: ComparisonOp, lower: Option<f64>, upper: Option<f64>) {
    let field = Field::ValueStandard;
    match op {
        ComparisonOp::Eq => {
            if let Some(v) = lower {
                filter.equals(field, v);
            }
        }
        ComparisonOp::Lt => lower.into_iter().for_each(|v| filter.compare(field, Bound::Lt, v)),
        ComparisonOp::Lte => lower.into_iter().for_each(|v| filter.compare(field, Bound::Lte, v)),
        ComparisonOp::Gt => upper.into_iter().for_each(|v| filter.compare(field, Bound::Gt, v)),
        ComparisonOp::Gte => upper.into_iter().for_each(|v| filter.compare(field, Bound::Gte, v)),
        ComparisonOp::Between => {
            if let Some(v) = lower {
                filter.compare(field, Bound::Gte, v);
            }
            if let Some(v) = upper {
                filter.compare(field, Bound::Lte, v);
            }
        }
    }
}

fn metric_op(metric: AggregationKind) -> AccumulatorOp {
    match metric {
        AggregationKind::Count => AccumulatorOp::Count,
        AggregationKind::Avg => AccumulatorOp::Avg(Field::ValueStandard),
        AggregationKind::Min => AccumulatorOp::Min(Field::ValueStandard),
        AggregationKind::Max => AccumulatorOp::Max(Field::ValueStandard),
        AggregationKind::Sum => AccumulatorOp::Sum(Field::ValueStandard),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AbnormalDirection;

    fn compile(query: StructuredQuery) -> QueryPlan {
        let reference = ReferenceData::builtin();
        QueryCompiler::new(&reference).compile(&query)
    }

    fn find(query: StructuredQuery) -> FindPlan {
        match compile(query) {
            QueryPlan::Find(plan) => plan,
            other => panic!("expected find plan, got {other:?}"),
        }
    }

    fn stages(query: StructuredQuery) -> Vec<Stage> {
        match compile(query) {
            QueryPlan::Aggregate(plan) => plan.stages,
            other => panic!("expected aggregate plan, got {other:?}"),
        }
    }

    fn filter_query(canonical_test: &str) -> StructuredQuery {
        StructuredQuery::Filter {
            canonical_test: canonical_test.into(),
            operator: None,
            value: None,
            value_max: None,
            direction: None,
            gender: None,
            report_type: None,
            limit: None,
        }
    }

    fn text(value: &str) -> FieldValue {
        FieldValue::text(value)
    }

    #[test]
    fn deficiency_for_named_patient_keeps_patient_constraint() {
        let plan = find(StructuredQuery::Deficiency {
            patient: Some(PatientRef::Name("Niketa".into())),
            canonical_test: None,
            direction: None,
            gender: None,
            report_type: None,
            limit: None,
        });
        assert_eq!(
            plan.filter.conditions,
            vec![
                Condition::Equals { field: Field::IsAbnormal, value: FieldValue::Bool(true) },
                Condition::ContainsIgnoreCase { field: Field::PatientName, text: "Niketa".into() },
            ]
        );
        assert_eq!(plan.sort, vec![SortKey::asc(Field::CanonicalTest), SortKey::asc(Field::PatientName)]);
    }

    #[test]
    fn deficiency_with_direction_and_test() {
        let plan = find(StructuredQuery::Deficiency {
            patient: Some(PatientRef::Id("p-7".into())),
            canonical_test: Some("vitamin d".into()),
            direction: Some(AbnormalDirection::Low),
            gender: None,
            report_type: None,
            limit: Some(5),
        });
        assert_eq!(plan.filter.equality(Field::PatientId), Some(&text("p-7")));
        assert_eq!(plan.filter.equality(Field::CanonicalTest), Some(&text("VITAMIN_D")));
        assert_eq!(plan.filter.equality(Field::AbnormalDirection), Some(&text("LOW")));
        assert_eq!(plan.filter.equality(Field::ReportType), Some(&text("OTHER")));
        assert_eq!(plan.limit, Some(5));
    }

    #[test]
    fn filter_without_operator_infers_scope_only() {
        let plan = find(filter_query("HEMOGLOBIN_CBC"));
        assert_eq!(plan.filter.equality(Field::CanonicalTest), Some(&text("HEMOGLOBIN_CBC")));
        assert_eq!(plan.filter.equality(Field::ReportType), Some(&text("CBC")));
        assert!(!plan.filter.has_field(Field::ValueStandard));
        assert_eq!(plan.sort, vec![SortKey::desc(Field::ValueStandard)]);
    }

    #[test]
    fn filter_direction_infers_gendered_threshold() {
        let plan = find(StructuredQuery::Filter {
            canonical_test: "Hemoglobin".into(),
            operator: None,
            value: None,
            value_max: None,
            direction: Some(AbnormalDirection::Low),
            gender: Some(Gender::Female),
            report_type: None,
            limit: None,
        });
        assert!(plan.filter.conditions.contains(&Condition::Compare {
            field: Field::ValueStandard,
            bound: Bound::Lt,
            value: FieldValue::Number(12.0),
        }));
        assert_eq!(plan.filter.equality(Field::Gender), Some(&text("F")));
        assert_eq!(plan.filter.equality(Field::CanonicalTest), Some(&text("HEMOGLOBIN_CBC")));
    }

    #[test]
    fn filter_high_uses_reference_maximum() {
        let plan = find(StructuredQuery::Filter {
            canonical_test: "TSH".into(),
            operator: Some(ComparisonOp::Gt),
            value: None,
            value_max: None,
            direction: None,
            gender: None,
            report_type: None,
            limit: Some(10),
        });
        assert!(plan.filter.conditions.contains(&Condition::Compare {
            field: Field::ValueStandard,
            bound: Bound::Gt,
            value: FieldValue::Number(4.5),
        }));
        assert_eq!(plan.filter.equality(Field::ReportType), Some(&text("THYROID")));
    }

    #[test]
    fn explicit_value_and_report_type_win() {
        let plan = find(StructuredQuery::Filter {
            canonical_test: "TSH".into(),
            operator: Some(ComparisonOp::Lte),
            value: Some(1.0),
            value_max: None,
            direction: Some(AbnormalDirection::High),
            gender: None,
            report_type: Some(ReportCategory::Other),
            limit: None,
        });
        assert!(plan.filter.conditions.contains(&Condition::Compare {
            field: Field::ValueStandard,
            bound: Bound::Lte,
            value: FieldValue::Number(1.0),
        }));
        assert_eq!(plan.filter.equality(Field::ReportType), Some(&text("OTHER")));
    }

    #[test]
    fn between_emits_both_bounds() {
        let plan = find(StructuredQuery::Filter {
            canonical_test: "TSH".into(),
            operator: Some(ComparisonOp::Between),
            value: Some(1.0),
            value_max: Some(3.0),
            direction: None,
            gender: None,
            report_type: None,
            limit: None,
        });
        let bounds: Vec<_> = plan
            .filter
            .conditions
            .iter()
            .filter(|c| c.field() == Field::ValueStandard)
            .cloned()
            .collect();
        assert_eq!(
            bounds,
            vec![
                Condition::Compare { field: Field::ValueStandard, bound: Bound::Gte, value: FieldValue::Number(1.0) },
                Condition::Compare { field: Field::ValueStandard, bound: Bound::Lte, value: FieldValue::Number(3.0) },
            ]
        );
    }

    #[test]
    fn unresolved_test_filters_on_normalized_text() {
        let plan = find(filter_query("xyzzy qq"));
        assert_eq!(plan.filter.equality(Field::CanonicalTest), Some(&text("XYZZY_QQ")));
        assert!(!plan.filter.has_field(Field::ReportType));
    }

    #[test]
    fn legacy_names_are_resolved() {
        let plan = find(filter_query("Glycated Hemoglobin"));
        assert_eq!(plan.filter.equality(Field::CanonicalTest), Some(&text("HBA1C")));
        assert_eq!(plan.filter.equality(Field::ReportType), Some(&text("DIABETES")));
    }

    #[test]
    fn patient_lookup_prefers_id() {
        let plan = find(StructuredQuery::PatientLookup {
            patient: PatientRef::Id("abc".into()),
            canonical_test: None,
            report_type: None,
        });
        assert_eq!(plan.filter.conditions, vec![Condition::Equals { field: Field::PatientId, value: text("abc") }]);
        assert_eq!(plan.sort, vec![SortKey::asc(Field::CanonicalTest)]);
    }

    #[test]
    fn trend_sorts_by_date_and_projects() {
        let plan = find(StructuredQuery::Trend {
            patient: PatientRef::Name("asha".into()),
            canonical_test: "HbA1c".into(),
            date_range: Some(DateRange {
                start: chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
                end: None,
            }),
        });
        assert_eq!(plan.sort, vec![SortKey::asc(Field::ReportDate), SortKey::asc(Field::CreatedAt)]);
        assert!(plan.filter.conditions.contains(&Condition::Compare {
            field: Field::ReportDate,
            bound: Bound::Gte,
            value: text("2024-01-01"),
        }));
        assert!(plan.filter.conditions.contains(&Condition::ContainsIgnoreCase {
            field: Field::PatientName,
            text: "asha".into(),
        }));
        let projection = plan.projection.unwrap();
        assert!(projection.contains(&Field::ValueStandard));
        assert!(projection.contains(&Field::ReportDate));
    }

    #[test]
    fn aggregation_uses_value_standard() {
        let stages = stages(StructuredQuery::Aggregation {
            metric: AggregationKind::Avg,
            canonical_test: Some("HEMOGLOBIN_CBC".into()),
            group_by: Some(GroupField::Gender),
            operator: None,
            value: None,
            value_max: None,
            gender: None,
            report_type: None,
            limit: Some(3),
        });
        assert_eq!(stages.len(), 4);
        match &stages[0] {
            Stage::Match(filter) => {
                assert!(filter.conditions.contains(&Condition::NotNull { field: Field::ValueStandard }));
                assert_eq!(filter.equality(Field::ReportType), Some(&text("CBC")));
            }
            other => panic!("unexpected stage {other:?}"),
        }
        assert_eq!(
            stages[1],
            Stage::Group(GroupStage {
                key: Some(Field::Gender),
                accumulators: vec![Accumulator::new(RESULT_COLUMN, AccumulatorOp::Avg(Field::ValueStandard))],
            })
        );
        assert_eq!(stages[2], Stage::Sort(vec![SortKey::output_desc(RESULT_COLUMN)]));
        assert_eq!(stages[3], Stage::Limit(3));
    }

    #[test]
    fn count_without_filters_is_a_single_group() {
        let stages = stages(StructuredQuery::Aggregation {
            metric: AggregationKind::Count,
            canonical_test: None,
            group_by: None,
            operator: None,
            value: None,
            value_max: None,
            gender: None,
            report_type: None,
            limit: None,
        });
        assert_eq!(
            stages[0],
            Stage::Group(GroupStage { key: None, accumulators: vec![Accumulator::new(RESULT_COLUMN, AccumulatorOp::Count)] })
        );
    }

    #[test]
    fn comparison_defaults_to_patient_name() {
        let stages = stages(StructuredQuery::Comparison {
            canonical_test: "ldl".into(),
            group_by: None,
            gender: None,
            report_type: None,
            limit: None,
        });
        match &stages[1] {
            Stage::Group(group) => {
                assert_eq!(group.key, Some(Field::PatientName));
                assert_eq!(group.accumulators.len(), 4);
            }
            other => panic!("unexpected stage {other:?}"),
        }
        assert_eq!(stages[2], Stage::Sort(vec![SortKey::output_desc(AVG_COLUMN)]));
    }

    #[test]
    fn summary_builds_facets() {
        let stages = stages(StructuredQuery::Summary { canonical_test: None, report_type: None, top_n: None });
        assert_eq!(stages.len(), 1);
        let Stage::Facet(facets) = &stages[0] else {
            panic!("expected facet stage");
        };
        let names: Vec<_> = facets.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["total_tests", "unique_patients", "abnormal_count", "by_report_type", "by_test"]);
        assert_eq!(facets[4].stages.last(), Some(&Stage::Limit(DEFAULT_SUMMARY_TOP_N)));
    }

    #[test]
    fn summary_scoped_by_report_type() {
        let stages = stages(StructuredQuery::Summary {
            canonical_test: None,
            report_type: Some(ReportCategory::Lipid),
            top_n: Some(3),
        });
        assert_eq!(stages.len(), 2);
        let mut expected = Filter::new();
        expected.equals(Field::ReportType, text("LIPID"));
        assert_eq!(stages[0], Stage::Match(expected));
    }
}
