//! Claim values and the shared coercion rules.
//!
//! Claim rows arrive from CSV uploads, so a cell can hold almost anything:
//! numbers, free text, `true`/`false`, or nothing at all. Both evaluators
//! (tree ensembles and magic rules) read cells through the functions in this
//! module so that the same cell always coerces the same way.
//!
//! Coercion is lenient and never fails:
//!
//! ```text
//! to_numeric:      Number(n) -> n | Boolean -> 1/0 | Text -> leading numeric prefix | else 0
//! normalize_text:  Absent -> "" | otherwise stringify, trim, lowercase
//! ```
//!
//! A single malformed cell must never abort a batch of thousands of claims,
//! which is why there is no `Result` anywhere in here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One cell of a claim record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum ClaimValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    #[default]
    Absent,
}

/// A claim row: field name to cell value.
///
/// A `BTreeMap` keeps iteration (and therefore serialized traces) stable.
pub type Record = BTreeMap<String, ClaimValue>;

impl ClaimValue {
    /// Numeric view of the value. Anything that cannot be read as a number is `0.0`.
    pub fn to_numeric(&self) -> f64 {
        match self {
            ClaimValue::Number(n) if n.is_nan() => 0.0,
            ClaimValue::Number(n) => *n,
            ClaimValue::Boolean(true) => 1.0,
            ClaimValue::Boolean(false) => 0.0,
            ClaimValue::Text(s) => leading_number(s).unwrap_or(0.0),
            ClaimValue::Absent => 0.0,
        }
    }

    /// Trimmed, lowercased text view. `Absent` becomes the empty string.
    pub fn normalize_text(&self) -> String {
        match self {
            ClaimValue::Absent => String::new(),
            other => other.to_string().trim().to_lowercase(),
        }
    }

    /// Truthiness as loosely-typed row data understands it:
    /// empty text, zero, NaN, `false` and absent cells are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            ClaimValue::Number(n) => *n != 0.0 && !n.is_nan(),
            ClaimValue::Text(s) => !s.is_empty(),
            ClaimValue::Boolean(b) => *b,
            ClaimValue::Absent => false,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ClaimValue::Absent)
    }

    /// Loose equality.
    ///
    /// Text compares to numbers by converting the whole (trimmed) text to a
    /// number; booleans compare as 1/0; an absent cell only equals another
    /// absent cell.
    pub fn loose_eq(&self, other: &ClaimValue) -> bool {
        use ClaimValue::*;
        match (self, other) {
            (Absent, Absent) => true,
            (Absent, _) | (_, Absent) => false,
            (Number(a), Number(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Boolean(b), other) | (other, Boolean(b)) => Number(if *b { 1.0 } else { 0.0 }).loose_eq(other),
            (Number(n), Text(s)) | (Text(s), Number(n)) => strict_number(s).is_some_and(|v| v == *n),
        }
    }
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimValue::Number(n) => write!(f, "{}", n),
            ClaimValue::Text(s) => f.write_str(s),
            ClaimValue::Boolean(b) => write!(f, "{}", b),
            ClaimValue::Absent => Ok(()),
        }
    }
}

impl From<f64> for ClaimValue {
    fn from(value: f64) -> Self {
        ClaimValue::Number(value)
    }
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        ClaimValue::Number(value as f64)
    }
}

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        ClaimValue::Boolean(value)
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        ClaimValue::Text(value.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        ClaimValue::Text(value)
    }
}

impl<T: Into<ClaimValue>> From<Option<T>> for ClaimValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ClaimValue::Absent)
    }
}

impl From<serde_json::Value> for ClaimValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ClaimValue::Absent,
            serde_json::Value::Bool(b) => ClaimValue::Boolean(b),
            serde_json::Value::Number(n) => n.as_f64().map(ClaimValue::Number).unwrap_or(ClaimValue::Absent),
            serde_json::Value::String(s) => ClaimValue::Text(s),
            // Nested structures are kept as their JSON text.
            other => ClaimValue::Text(other.to_string()),
        }
    }
}

impl From<ClaimValue> for serde_json::Value {
    fn from(value: ClaimValue) -> Self {
        match value {
            ClaimValue::Number(n) => {
                serde_json::Number::from_f64(n).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
            }
            ClaimValue::Text(s) => serde_json::Value::String(s),
            ClaimValue::Boolean(b) => serde_json::Value::Bool(b),
            ClaimValue::Absent => serde_json::Value::Null,
        }
    }
}

/// Numeric view of an optional cell (`None` reads as absent).
pub fn to_numeric(value: Option<&ClaimValue>) -> f64 {
    value.map(ClaimValue::to_numeric).unwrap_or(0.0)
}

/// Text view of an optional cell (`None` reads as absent).
pub fn normalize_text(value: Option<&ClaimValue>) -> String {
    value.map(ClaimValue::normalize_text).unwrap_or_default()
}

/// Prepare a record for tree evaluation: booleans become 1/0 and absent
/// cells are dropped.
pub fn normalize_record(record: &Record) -> Record {
    record
        .iter()
        .filter(|(_, v)| !v.is_absent())
        .map(|(k, v)| {
            let v = match v {
                ClaimValue::Boolean(b) => ClaimValue::Number(if *b { 1.0 } else { 0.0 }),
                other => other.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}

/// Parse the longest numeric prefix of `s`, ignoring leading whitespace and
/// any trailing content (`"4.5 (split)"` reads as `4.5`).
pub fn leading_number(s: &str) -> Option<f64> {
    let re = regex!(r"^\s*[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?");
    let m = re.find(s)?;
    m.as_str().trim().parse::<f64>().ok()
}

/// Whole-string numeric conversion used by loose equality.
/// Blank text converts to `0`.
fn strict_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return Some(0.0);
    }
    let re = regex!(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$");
    if re.is_match(t) { t.parse::<f64>().ok() } else { None }
}
