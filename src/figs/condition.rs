//! Decision conditions.
//!
//! A decision node stores its predicate as raw text (`"Amount <= 1000.500"`,
//! `"flag is Yes"`). The text is matched twice with the same per-operator
//! patterns: once to render a label for trace display, once to evaluate it
//! against a record.
//!
//! The two uses deliberately cover different operator sets:
//!
//! ```text
//! display:    <=  >=  <  >  is
//! evaluation: <=      >     is    (anything else takes the false branch)
//! ```
//!
//! `feature < 5` and `feature >= 5` therefore get a readable label but are
//! never true at evaluation time. Splits emitted by the tree fitter only
//! use `<=` (plus `is` after the boolean rewrite), so this has no effect on
//! well-formed dumps.

use crate::value::{Record, leading_number, normalize_text, to_numeric};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "is")]
    Is,
}

impl ConditionOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionOperator::Le => "<=",
            ConditionOperator::Lt => "<",
            ConditionOperator::Ge => ">=",
            ConditionOperator::Gt => ">",
            ConditionOperator::Is => "is",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            ConditionOperator::Le => "≤",
            ConditionOperator::Lt => "<",
            ConditionOperator::Ge => "≥",
            ConditionOperator::Gt => ">",
            ConditionOperator::Is => "is",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            ConditionOperator::Le => regex!(r"^(.+?)\s*<=\s*(.+)$"),
            ConditionOperator::Ge => regex!(r"^(.+?)\s*>=\s*(.+)$"),
            ConditionOperator::Lt => regex!(r"^(.+?)\s*<\s*([^=\s].*)$"),
            ConditionOperator::Gt => regex!(r"^(.+?)\s*>\s*([^=\s].*)$"),
            ConditionOperator::Is => regex!(r"^(.+)\s+is\s+(.+)$"),
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const DISPLAY_OPERATORS: [ConditionOperator; 5] =
    [ConditionOperator::Le, ConditionOperator::Ge, ConditionOperator::Lt, ConditionOperator::Gt, ConditionOperator::Is];

const EVALUATED_OPERATORS: [ConditionOperator; 3] =
    [ConditionOperator::Le, ConditionOperator::Gt, ConditionOperator::Is];

/// A condition string split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub feature: String,
    pub operator: ConditionOperator,
    pub value: String,
}

impl Condition {
    /// Parse with display coverage (`<=`, `>=`, `<`, `>`, `is`).
    pub fn parse(raw: &str) -> Option<Condition> {
        match_first(raw, &DISPLAY_OPERATORS)
    }

    /// Parse with evaluation coverage (`<=`, `>`, `is`).
    pub fn parse_evaluable(raw: &str) -> Option<Condition> {
        match_first(raw, &EVALUATED_OPERATORS)
    }

    /// Human-readable label, e.g. `Amount ≤ 1000.5` or `flag is Yes`.
    pub fn label(&self) -> String {
        let value = match self.operator {
            ConditionOperator::Is => self.value.clone(),
            _ => format_threshold(&self.value),
        };
        format!("{} {} {}", self.feature, self.operator.symbol(), value)
    }

    /// Evaluate against an already-normalized record.
    pub fn evaluate(&self, record: &Record) -> bool {
        let actual = record.get(&self.feature);
        match self.operator {
            ConditionOperator::Le => to_numeric(actual) <= threshold(&self.value),
            ConditionOperator::Gt => to_numeric(actual) > threshold(&self.value),
            ConditionOperator::Is => {
                let expected = strip_parenthetical(&self.value).to_lowercase();
                match expected.as_str() {
                    "yes" => to_numeric(actual) > 0.5,
                    "no" => to_numeric(actual) <= 0.5,
                    _ => normalize_text(actual) == expected,
                }
            }
            ConditionOperator::Lt | ConditionOperator::Ge => false,
        }
    }
}

/// Evaluate a raw condition string against an already-normalized record.
///
/// Conditions that match none of `<=`, `>`, `is` are false.
pub fn evaluate_condition(condition: &str, record: &Record) -> bool {
    match Condition::parse_evaluable(condition) {
        Some(parsed) => parsed.evaluate(record),
        None => {
            tracing::warn!(condition, "condition has no evaluable operator; taking false branch");
            false
        }
    }
}

/// Display label for a raw condition string, or the raw text when it does
/// not parse.
pub fn format_condition_label(condition: &str) -> String {
    Condition::parse(condition).map(|c| c.label()).unwrap_or_else(|| condition.trim().to_string())
}

fn match_first(raw: &str, operators: &[ConditionOperator]) -> Option<Condition> {
    let raw = raw.trim();
    operators.iter().find_map(|&operator| {
        let caps = operator.pattern().captures(raw)?;
        Some(Condition {
            feature: caps.get(1)?.as_str().trim().to_string(),
            operator,
            value: caps.get(2)?.as_str().trim().to_string(),
        })
    })
}

fn threshold(value: &str) -> f64 {
    leading_number(value).unwrap_or(0.0)
}

fn format_threshold(value: &str) -> String {
    match leading_number(value) {
        Some(n) if value.trim().parse::<f64>().is_ok() => format!("{}", n),
        _ => value.to_string(),
    }
}

/// `"Yes (1)"` -> `"Yes"`.
fn strip_parenthetical(value: &str) -> &str {
    let re = regex!(r"\s*\([^)]*\)\s*$");
    match re.find(value) {
        Some(m) => value[..m.start()].trim(),
        None => value.trim(),
    }
}
