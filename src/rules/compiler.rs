//! Token stream to rule compilation.
//!
//! The token stream is cut at every connector. Each resulting group must be
//! `field operator [value]`, and the connector that closed a group is kept
//! on that group's condition so the AND/OR chain survives compilation.

use super::model::{CompositeRule, Connector, Rule, RuleCondition, RuleItem, RuleOperator, RuleValue, Severity};
use super::tokenizer::{KnownFields, Token, TokenType, is_number, tokenize};
use super::validator::validate_tokens;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub rules: Vec<RuleItem>,
}

impl CompileResult {
    fn failed(errors: Vec<String>) -> Self {
        Self { is_valid: false, errors, rules: Vec::new() }
    }
}

/// Compiles token streams into rules, numbering them `rule-1`, `rule-2`, ...
#[derive(Debug, Clone)]
pub struct RuleCompiler {
    next_id: usize,
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleCompiler {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Compile one expression's tokens into a single rule.
    ///
    /// Ids are only consumed by successful compilations.
    pub fn compile(&mut self, tokens: &[Token], effect: Severity) -> CompileResult {
        let flagged: Vec<String> = tokens.iter().filter_map(|t| t.error_message.clone()).collect();
        if !flagged.is_empty() {
            return CompileResult::failed(flagged);
        }
        if tokens.is_empty() {
            return CompileResult::failed(vec!["Expression is empty".to_string()]);
        }

        let mut conditions = Vec::new();
        let mut errors = Vec::new();
        for (index, (group, connector)) in split_groups(tokens).into_iter().enumerate() {
            match compile_group(group) {
                Ok((field, operator, value)) => conditions.push(RuleCondition { field, operator, value, connector }),
                Err(reason) => errors.push(format!("Condition {}: {}", index + 1, reason)),
            }
        }

        if !errors.is_empty() {
            tracing::warn!(errors = ?errors, "rejected rule expression");
            return CompileResult::failed(errors);
        }

        let id = format!("rule-{}", self.next_id);
        self.next_id += 1;

        let item = if conditions.len() == 1 {
            let RuleCondition { field, operator, value, .. } = conditions.remove(0);
            RuleItem::Simple(Rule { id, field, operator, value, effect })
        } else {
            RuleItem::Composite(CompositeRule { id, conditions, effect })
        };
        tracing::debug!(rule = item.id(), expression = %item.describe(), "compiled rule");

        CompileResult { is_valid: true, errors: Vec::new(), rules: vec![item] }
    }
}

/// Compile `tokens` with a fresh [`RuleCompiler`].
pub fn compile_rules(tokens: &[Token], effect: Severity) -> CompileResult {
    RuleCompiler::new().compile(tokens, effect)
}

/// Tokenize, validate and compile `text` in one step.
///
/// Grammar errors come back as the compile errors, first error first.
pub fn compile_expression(text: &str, known_fields: &KnownFields, effect: Severity) -> CompileResult {
    let validation = validate_tokens(tokenize(text, known_fields), known_fields);
    if !validation.is_valid {
        let mut errors: Vec<String> = validation.error_message.into_iter().collect();
        for message in validation.tokens.into_iter().filter_map(|t| t.error_message) {
            if !errors.contains(&message) {
                errors.push(message);
            }
        }
        return CompileResult::failed(errors);
    }
    compile_rules(&validation.tokens, effect)
}

fn split_groups(tokens: &[Token]) -> Vec<(&[Token], Option<Connector>)> {
    let mut groups = Vec::new();
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        if token.token_type == TokenType::Connector {
            groups.push((&tokens[start..i], Connector::from_word(&token.value)));
            start = i + 1;
        }
    }
    groups.push((&tokens[start..], None));
    groups
}

fn compile_group(group: &[Token]) -> Result<(String, RuleOperator, Option<RuleValue>), String> {
    let (field, rest) = match group.split_first() {
        Some((t, rest)) if t.token_type == TokenType::Field => (t, rest),
        Some((t, _)) => return Err(format!("expected a field but found '{}'", t.value)),
        None => return Err("missing field".to_string()),
    };
    let (operator, rest) = match rest.split_first() {
        Some((t, rest)) if t.token_type == TokenType::Operator => match RuleOperator::from_symbol(&t.value) {
            Some(op) => (op, rest),
            None => return Err(format!("unknown operator '{}'", t.value)),
        },
        Some((t, _)) => return Err(format!("expected an operator after '{}' but found '{}'", field.value, t.value)),
        None => return Err(format!("missing operator after '{}'", field.value)),
    };

    let value = match (operator.requires_value(), rest) {
        (false, []) => None,
        (false, [extra, ..]) => return Err(format!("'{}' takes no value but found '{}'", operator, extra.value)),
        (true, []) => return Err(format!("missing value after '{}'", operator)),
        (true, [t]) if matches!(t.token_type, TokenType::Value | TokenType::Unknown) => Some(detype(t)),
        (true, [t]) => return Err(format!("expected a value but found '{}'", t.value)),
        (true, [_, extra, ..]) => return Err(format!("unexpected '{}' after value", extra.value)),
    };

    Ok((field.value.clone(), operator, value))
}

/// Typed value of a value token.
pub(crate) fn detype(token: &Token) -> RuleValue {
    let raw = token.value.as_str();
    if token.is_quoted() {
        return RuleValue::Text(unquote(raw));
    }
    if raw.eq_ignore_ascii_case("true") {
        return RuleValue::Boolean(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return RuleValue::Boolean(false);
    }
    if is_number(raw) {
        if let Ok(n) = raw.parse::<f64>() {
            return RuleValue::Number(n);
        }
    }
    RuleValue::Text(raw.to_string())
}

/// Strip the quotes (and backslash escapes) of a quoted literal.
fn unquote(raw: &str) -> String {
    let mut chars = raw.chars();
    let quote = chars.next();
    let mut out = String::new();
    let mut escaped = false;
    for c in chars {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if Some(c) == quote {
            break;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> KnownFields {
        KnownFields::new(["Amount", "Country", "Notes", "Flag"])
    }

    #[test]
    fn compiles_composite_rule() {
        let result = compile_expression(r#"Amount > 1000 AND Country = "EG""#, &fields(), Severity::High);
        assert!(result.is_valid, "{:?}", result.errors);
        assert_eq!(result.rules.len(), 1);

        let RuleItem::Composite(rule) = &result.rules[0] else {
            panic!("expected a composite rule, got {:?}", result.rules[0]);
        };
        assert_eq!(rule.id, "rule-1");
        assert_eq!(rule.effect, Severity::High);
        assert_eq!(
            rule.conditions,
            vec![
                RuleCondition {
                    field: "Amount".into(),
                    operator: RuleOperator::Gt,
                    value: Some(RuleValue::Number(1000.0)),
                    connector: Some(Connector::And),
                },
                RuleCondition {
                    field: "Country".into(),
                    operator: RuleOperator::Eq,
                    value: Some(RuleValue::Text("EG".into())),
                    connector: None,
                },
            ]
        );
    }

    #[test]
    fn single_condition_is_a_simple_rule() {
        let result = compile_expression("Notes is_empty", &fields(), Severity::Moderate);
        assert_eq!(
            result.rules,
            vec![RuleItem::Simple(Rule {
                id: "rule-1".into(),
                field: "Notes".into(),
                operator: RuleOperator::IsEmpty,
                value: None,
                effect: Severity::Moderate,
            })]
        );
    }

    #[test]
    fn connector_chain_is_preserved() {
        let text = "Amount > 1 or Flag = true AND Notes is_not_empty";
        let result = compile_expression(text, &fields(), Severity::Moderate);
        let RuleItem::Composite(rule) = &result.rules[0] else {
            panic!("expected a composite rule");
        };
        let chain: Vec<Option<Connector>> = rule.conditions.iter().map(|c| c.connector).collect();
        assert_eq!(chain, vec![Some(Connector::Or), Some(Connector::And), None]);
        assert_eq!(rule.conditions[1].value, Some(RuleValue::Boolean(true)));
    }

    #[test]
    fn detypes_values() {
        let cases = vec![
            (RuleValue::Text("EG".into()), r#""EG""#),
            (RuleValue::Text("it's".into()), r"'it\'s'"),
            (RuleValue::Text("open".into()), "'open"),
            (RuleValue::Boolean(false), "FALSE"),
            (RuleValue::Number(-2.5), "-2.5"),
            (RuleValue::Number(1000.0), "1e3"),
            (RuleValue::Text("EG".into()), "EG"),
            (RuleValue::Text("12".into()), "'12'"),
        ];
        for (expected, raw) in cases {
            let token = Token::new(TokenType::Value, raw, 0, raw.chars().count());
            assert_eq!(detype(&token), expected, "{raw}");
        }
    }

    #[test]
    fn invalid_expression_reports_grammar_errors() {
        let result = compile_expression("Amount >", &fields(), Severity::Moderate);
        assert!(!result.is_valid);
        assert!(result.rules.is_empty());
        assert_eq!(result.errors, vec!["Expected a value after '>'".to_string()]);
    }

    #[test]
    fn malformed_groups_are_rejected() {
        let tokens = vec![
            Token::new(TokenType::Field, "Amount", 0, 6),
            Token::new(TokenType::Operator, "is_empty", 7, 15),
            Token::new(TokenType::Value, "3", 16, 17),
        ];
        let result = compile_rules(&tokens, Severity::Moderate);
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["Condition 1: 'is_empty' takes no value but found '3'".to_string()]);
    }

    #[test]
    fn ids_are_sequential_across_compilations() {
        let mut compiler = RuleCompiler::new();
        let known = fields();
        let first = compiler.compile(&tokenize("Amount > 1", &known), Severity::Moderate);
        let failed = compiler.compile(&[], Severity::Moderate);
        let second = compiler.compile(&tokenize("Country = 'EG'", &known), Severity::High);
        assert_eq!(first.rules[0].id(), "rule-1");
        assert!(!failed.is_valid);
        assert_eq!(second.rules[0].id(), "rule-2");
    }
}
