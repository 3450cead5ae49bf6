//! Compiled rule entities.

use crate::value::ClaimValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity attached to a rule and rolled up per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Moderate,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Moderate => "moderate",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operators of the magic rule grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "starts_with")]
    StartsWith,
    #[serde(rename = "ends_with")]
    EndsWith,
    #[serde(rename = "is_empty")]
    IsEmpty,
    #[serde(rename = "is_not_empty")]
    IsNotEmpty,
}

impl RuleOperator {
    /// Every operator, longest spelling first (the tokenizer's match order).
    pub const BY_LENGTH: [RuleOperator; 11] = [
        RuleOperator::IsNotEmpty,
        RuleOperator::StartsWith,
        RuleOperator::EndsWith,
        RuleOperator::Contains,
        RuleOperator::IsEmpty,
        RuleOperator::Ne,
        RuleOperator::Ge,
        RuleOperator::Le,
        RuleOperator::Eq,
        RuleOperator::Gt,
        RuleOperator::Lt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleOperator::Eq => "=",
            RuleOperator::Ne => "!=",
            RuleOperator::Gt => ">",
            RuleOperator::Lt => "<",
            RuleOperator::Ge => ">=",
            RuleOperator::Le => "<=",
            RuleOperator::Contains => "contains",
            RuleOperator::StartsWith => "starts_with",
            RuleOperator::EndsWith => "ends_with",
            RuleOperator::IsEmpty => "is_empty",
            RuleOperator::IsNotEmpty => "is_not_empty",
        }
    }

    /// Case-insensitive lookup by spelling.
    pub fn from_symbol(symbol: &str) -> Option<RuleOperator> {
        let symbol = symbol.trim();
        Self::BY_LENGTH.iter().copied().find(|op| op.as_str().eq_ignore_ascii_case(symbol))
    }

    /// `is_empty` / `is_not_empty` take no value.
    pub fn requires_value(self) -> bool {
        !matches!(self, RuleOperator::IsEmpty | RuleOperator::IsNotEmpty)
    }

    /// Word operators must not run into a following identifier character.
    pub(crate) fn is_word(self) -> bool {
        self.as_str().chars().all(|c| c.is_ascii_alphabetic() || c == '_')
    }
}

impl fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn from_word(word: &str) -> Option<Connector> {
        if word.eq_ignore_ascii_case("and") {
            Some(Connector::And)
        } else if word.eq_ignore_ascii_case("or") {
            Some(Connector::Or)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

/// A typed comparison value written in an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl RuleValue {
    pub fn to_claim_value(&self) -> ClaimValue {
        match self {
            RuleValue::Boolean(b) => ClaimValue::Boolean(*b),
            RuleValue::Number(n) => ClaimValue::Number(*n),
            RuleValue::Text(s) => ClaimValue::Text(s.clone()),
        }
    }
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleValue::Boolean(b) => write!(f, "{}", b),
            RuleValue::Number(n) => write!(f, "{}", n),
            RuleValue::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// Single-condition rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub field: String,
    pub operator: RuleOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RuleValue>,
    pub effect: Severity,
}

/// One condition of a composite rule. `connector` links it to the next
/// condition; the last condition has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub field: String,
    pub operator: RuleOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RuleValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<Connector>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRule {
    pub id: String,
    pub conditions: Vec<RuleCondition>,
    pub effect: Severity,
}

/// Legacy grouping kept for stored rule sets. The evaluator skips it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub items: Vec<RuleItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RuleItem {
    Simple(Rule),
    Composite(CompositeRule),
    Group(RuleGroup),
}

impl RuleItem {
    pub fn id(&self) -> &str {
        match self {
            RuleItem::Simple(r) => &r.id,
            RuleItem::Composite(r) => &r.id,
            RuleItem::Group(g) => &g.id,
        }
    }

    /// Human-readable rendering of the rule's expression.
    pub fn describe(&self) -> String {
        match self {
            RuleItem::Simple(r) => describe_condition(&r.field, r.operator, r.value.as_ref()),
            RuleItem::Composite(r) => {
                let mut out = String::new();
                for c in &r.conditions {
                    out.push_str(&describe_condition(&c.field, c.operator, c.value.as_ref()));
                    if let Some(conn) = c.connector {
                        out.push(' ');
                        out.push_str(conn.as_str());
                        out.push(' ');
                    }
                }
                out
            }
            RuleItem::Group(g) => format!("group {} ({} items)", g.name, g.items.len()),
        }
    }
}

fn describe_condition(field: &str, operator: RuleOperator, value: Option<&RuleValue>) -> String {
    match value {
        Some(v) => format!("{} {} {}", field, operator, v),
        None => format!("{} {}", field, operator),
    }
}
