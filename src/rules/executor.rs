//! Rule execution against a claim record.

use super::model::{Connector, RuleCondition, RuleItem, RuleOperator, RuleValue, Severity};
use crate::value::{ClaimValue, Record};
use serde::{Deserialize, Serialize};

/// Outcome of one evaluated condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionResult {
    pub field: String,
    pub operator: RuleOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<RuleValue>,
    pub actual_value: ClaimValue,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvaluation {
    pub rule_id: String,
    pub effect: Severity,
    pub matched: bool,
    /// Conditions evaluated before any short-circuit, in order.
    pub conditions: Vec<ConditionResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleExecutionResult {
    pub results: Vec<RuleEvaluation>,
    pub matched_rule_ids: Vec<String>,
    pub max_severity: Option<Severity>,
}

impl RuleExecutionResult {
    pub fn matched(&self) -> bool {
        !self.matched_rule_ids.is_empty()
    }
}

/// A compiled rule set, evaluated read-only against any number of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleEngine {
    rules: Vec<RuleItem>,
}

impl RuleEngine {
    pub fn new(rules: Vec<RuleItem>) -> Self {
        Self { rules }
    }

    pub fn push(&mut self, rule: RuleItem) {
        self.rules.push(rule);
    }

    pub fn evaluate(&self, record: &Record) -> RuleExecutionResult {
        execute_rules(record, &self.rules)
    }
}

impl From<Vec<RuleItem>> for RuleEngine {
    fn from(rules: Vec<RuleItem>) -> Self {
        Self::new(rules)
    }
}

/// Evaluate every rule in `rules` against `record`.
pub fn execute_rules(record: &Record, rules: &[RuleItem]) -> RuleExecutionResult {
    let mut out = RuleExecutionResult::default();

    for item in rules {
        let evaluation = match item {
            RuleItem::Simple(rule) => {
                let result = evaluate_condition(record, &rule.field, rule.operator, rule.value.as_ref());
                RuleEvaluation {
                    rule_id: rule.id.clone(),
                    effect: rule.effect,
                    matched: result.passed,
                    conditions: vec![result],
                }
            }
            RuleItem::Composite(rule) => {
                let (matched, conditions) = fold_conditions(record, &rule.conditions);
                RuleEvaluation { rule_id: rule.id.clone(), effect: rule.effect, matched, conditions }
            }
            RuleItem::Group(group) => {
                tracing::debug!(group = %group.id, "skipping rule group");
                continue;
            }
        };

        if evaluation.matched {
            out.matched_rule_ids.push(evaluation.rule_id.clone());
            out.max_severity = out.max_severity.max(Some(evaluation.effect));
        }
        out.results.push(evaluation);
    }

    tracing::debug!(
        rules = rules.len(),
        matched = out.matched_rule_ids.len(),
        max_severity = ?out.max_severity,
        "executed rules"
    );
    out
}

/// Left-to-right fold over a composite rule's conditions.
///
/// The connector stored on condition `i` joins it to condition `i + 1`. A
/// failed AND or a satisfied OR stops the fold; conditions after that point
/// are not evaluated and do not appear in the output.
fn fold_conditions(record: &Record, conditions: &[RuleCondition]) -> (bool, Vec<ConditionResult>) {
    let mut results = Vec::with_capacity(conditions.len());
    let Some(first) = conditions.first() else {
        return (false, results);
    };

    let head = evaluate_condition(record, &first.field, first.operator, first.value.as_ref());
    let mut acc = head.passed;
    results.push(head);

    for pair in conditions.windows(2) {
        let connector = pair[0].connector.unwrap_or(Connector::And);
        match (connector, acc) {
            (Connector::And, false) | (Connector::Or, true) => break,
            _ => {}
        }
        let next = &pair[1];
        let result = evaluate_condition(record, &next.field, next.operator, next.value.as_ref());
        acc = result.passed;
        results.push(result);
    }

    (acc, results)
}

fn evaluate_condition(
    record: &Record,
    field: &str,
    operator: RuleOperator,
    expected: Option<&RuleValue>,
) -> ConditionResult {
    let actual = lookup(record, field);
    let expected_value = expected.map(RuleValue::to_claim_value).unwrap_or_default();

    let passed = match operator {
        RuleOperator::Eq => actual.loose_eq(&expected_value),
        RuleOperator::Ne => !actual.loose_eq(&expected_value),
        RuleOperator::Gt => actual.to_numeric() > expected_value.to_numeric(),
        RuleOperator::Lt => actual.to_numeric() < expected_value.to_numeric(),
        RuleOperator::Ge => actual.to_numeric() >= expected_value.to_numeric(),
        RuleOperator::Le => actual.to_numeric() <= expected_value.to_numeric(),
        RuleOperator::Contains => actual.normalize_text().contains(&expected_value.normalize_text()),
        RuleOperator::StartsWith => actual.normalize_text().starts_with(&expected_value.normalize_text()),
        RuleOperator::EndsWith => actual.normalize_text().ends_with(&expected_value.normalize_text()),
        RuleOperator::IsEmpty => is_empty(&actual),
        RuleOperator::IsNotEmpty => !is_empty(&actual),
    };

    tracing::trace!(field, operator = operator.as_str(), actual = %actual, passed, "rule condition");

    ConditionResult {
        field: field.to_string(),
        operator,
        expected_value: expected.cloned(),
        actual_value: actual,
        passed,
    }
}

/// Exact field name first, then a case-insensitive match.
fn lookup(record: &Record, field: &str) -> ClaimValue {
    record
        .get(field)
        .or_else(|| record.iter().find(|(k, _)| k.eq_ignore_ascii_case(field)).map(|(_, v)| v))
        .cloned()
        .unwrap_or_default()
}

fn is_empty(value: &ClaimValue) -> bool {
    !value.is_truthy() || value.to_string().trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{CompositeRule, Rule, RuleGroup};

    fn record() -> Record {
        let mut r = Record::new();
        r.insert("Amount".into(), ClaimValue::Number(1500.0));
        r.insert("Country".into(), ClaimValue::Text("EG".into()));
        r.insert("Notes".into(), ClaimValue::Text("  ".into()));
        r.insert("Flag".into(), ClaimValue::Boolean(true));
        r.insert("Zip".into(), ClaimValue::Text("01234".into()));
        r
    }

    fn simple(id: &str, field: &str, operator: RuleOperator, value: Option<RuleValue>, effect: Severity) -> RuleItem {
        RuleItem::Simple(Rule { id: id.into(), field: field.into(), operator, value, effect })
    }

    fn cond(
        field: &str,
        operator: RuleOperator,
        value: Option<RuleValue>,
        connector: Option<Connector>,
    ) -> RuleCondition {
        RuleCondition { field: field.into(), operator, value, connector }
    }

    #[test]
    fn operator_table() {
        let num = |n: f64| Some(RuleValue::Number(n));
        let text = |s: &str| Some(RuleValue::Text(s.into()));
        let cases: Vec<(bool, &str, RuleOperator, Option<RuleValue>)> = vec![
            (true, "Amount", RuleOperator::Gt, num(1000.0)),
            (false, "Amount", RuleOperator::Lt, num(1000.0)),
            (true, "Amount", RuleOperator::Ge, num(1500.0)),
            (true, "Amount", RuleOperator::Le, num(1500.0)),
            (true, "Amount", RuleOperator::Eq, text("1500")),
            (true, "Country", RuleOperator::Eq, text("EG")),
            (false, "Country", RuleOperator::Eq, text("eg")),
            (true, "Country", RuleOperator::Ne, text("US")),
            (true, "Country", RuleOperator::Contains, text("g")),
            (true, "Country", RuleOperator::StartsWith, text("e")),
            (false, "Country", RuleOperator::EndsWith, text("x")),
            (true, "Flag", RuleOperator::Eq, Some(RuleValue::Boolean(true))),
            (true, "Flag", RuleOperator::Eq, num(1.0)),
            (true, "Zip", RuleOperator::Eq, num(1234.0)),
            (true, "Notes", RuleOperator::IsEmpty, None),
            (true, "Missing", RuleOperator::IsEmpty, None),
            (false, "Country", RuleOperator::IsEmpty, None),
            (true, "Amount", RuleOperator::IsNotEmpty, None),
            (false, "Missing", RuleOperator::Eq, text("")),
            (true, "Missing", RuleOperator::Lt, num(1.0)),
        ];
        let record = record();
        for (expected, field, op, value) in cases {
            let result = evaluate_condition(&record, field, op, value.as_ref());
            assert_eq!(result.passed, expected, "{field} {op} {value:?}");
        }
    }

    #[test]
    fn zero_counts_as_empty() {
        let mut r = Record::new();
        r.insert("Count".into(), ClaimValue::Number(0.0));
        r.insert("Off".into(), ClaimValue::Boolean(false));
        assert!(evaluate_condition(&r, "Count", RuleOperator::IsEmpty, None).passed);
        assert!(evaluate_condition(&r, "Off", RuleOperator::IsEmpty, None).passed);
    }

    #[test]
    fn field_lookup_falls_back_to_case_insensitive() {
        let result = evaluate_condition(&record(), "country", RuleOperator::Eq, Some(&RuleValue::Text("EG".into())));
        assert!(result.passed);
        assert_eq!(result.actual_value, ClaimValue::Text("EG".into()));
    }

    #[test]
    fn and_short_circuits_after_failure() {
        let rule = RuleItem::Composite(CompositeRule {
            id: "rule-1".into(),
            conditions: vec![
                cond("Amount", RuleOperator::Lt, Some(RuleValue::Number(10.0)), Some(Connector::And)),
                cond("Country", RuleOperator::Eq, Some(RuleValue::Text("EG".into())), None),
            ],
            effect: Severity::High,
        });
        let out = execute_rules(&record(), &[rule]);
        assert!(!out.results[0].matched);
        assert_eq!(out.results[0].conditions.len(), 1);
        assert_eq!(out.max_severity, None);
    }

    #[test]
    fn or_short_circuits_after_success() {
        let rule = RuleItem::Composite(CompositeRule {
            id: "rule-1".into(),
            conditions: vec![
                cond("Amount", RuleOperator::Gt, Some(RuleValue::Number(10.0)), Some(Connector::Or)),
                cond("Country", RuleOperator::Eq, Some(RuleValue::Text("US".into())), None),
            ],
            effect: Severity::Moderate,
        });
        let out = execute_rules(&record(), &[rule]);
        assert!(out.results[0].matched);
        assert_eq!(out.results[0].conditions.len(), 1);
    }

    #[test]
    fn fold_runs_left_to_right() {
        // (Amount < 10 OR Country = EG) AND Flag = false -> false
        let rule = RuleItem::Composite(CompositeRule {
            id: "rule-1".into(),
            conditions: vec![
                cond("Amount", RuleOperator::Lt, Some(RuleValue::Number(10.0)), Some(Connector::Or)),
                cond("Country", RuleOperator::Eq, Some(RuleValue::Text("EG".into())), Some(Connector::And)),
                cond("Flag", RuleOperator::Eq, Some(RuleValue::Boolean(false)), None),
            ],
            effect: Severity::Moderate,
        });
        let out = execute_rules(&record(), &[rule]);
        let passed: Vec<bool> = out.results[0].conditions.iter().map(|c| c.passed).collect();
        assert_eq!(passed, vec![false, true, false]);
        assert!(!out.results[0].matched);
    }

    #[test]
    fn max_severity_rolls_up_matched_rules() {
        let rules = vec![
            simple("rule-1", "Amount", RuleOperator::Gt, Some(RuleValue::Number(1.0)), Severity::Moderate),
            simple("rule-2", "Country", RuleOperator::Eq, Some(RuleValue::Text("US".into())), Severity::High),
            RuleItem::Group(RuleGroup { id: "group-1".into(), name: "legacy".into(), items: Vec::new() }),
        ];
        let engine = RuleEngine::new(rules);
        let out = engine.evaluate(&record());
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.matched_rule_ids, vec!["rule-1".to_string()]);
        assert_eq!(out.max_severity, Some(Severity::Moderate));

        let mut engine = engine;
        engine.push(simple("rule-3", "Flag", RuleOperator::IsNotEmpty, None, Severity::High));
        assert_eq!(engine.evaluate(&record()).max_severity, Some(Severity::High));
        assert_eq!(RuleEngine::default().evaluate(&record()).max_severity, None);
    }
}
