//! Grammar validation for magic rule token streams.
//!
//! The grammar is a four-state machine:
//!
//! ```text
//!            field            operator (needs value)        value
//!  [Field] ────────► [Operator] ─────────────────► [Value] ───────► [ConnectorOrEnd]
//!     ▲                   │                                              │
//!     │                   └──── is_empty / is_not_empty ─────────────────┤
//!     └──────────────────────────── AND / OR ───────────────────────────┘
//! ```
//!
//! A token that does not fit the current state is annotated with an error
//! and the state stays put, so the next token is checked against the same
//! expectation. One stray token therefore produces one error, not a cascade.
//! Validation never fails: incomplete input (the user is still typing) is
//! reported through the annotations and [`ValidationResult::expected`].

use super::model::RuleOperator;
use super::tokenizer::{KnownFields, Token, TokenType};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Token kinds acceptable at a position.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ExpectedKinds: u8 {
        const FIELD     = 1 << 0;
        const OPERATOR  = 1 << 1;
        const VALUE     = 1 << 2;
        const CONNECTOR = 1 << 3;
        /// The expression may end here.
        const END       = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GrammarState {
    Field,
    Operator,
    Value,
    ConnectorOrEnd,
}

impl GrammarState {
    fn expected(self) -> ExpectedKinds {
        match self {
            GrammarState::Field => ExpectedKinds::FIELD,
            GrammarState::Operator => ExpectedKinds::OPERATOR,
            GrammarState::Value => ExpectedKinds::VALUE,
            GrammarState::ConnectorOrEnd => ExpectedKinds::CONNECTOR | ExpectedKinds::END,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub tokens: Vec<Token>,
    /// First error in the expression, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// What the next token may be.
    pub expected: ExpectedKinds,
}

/// Annotate `tokens` with grammar errors.
///
/// Any annotations left over from an earlier validation are cleared first.
pub fn validate_tokens(mut tokens: Vec<Token>, known_fields: &KnownFields) -> ValidationResult {
    for token in tokens.iter_mut() {
        token.clear_error();
    }

    if tokens.is_empty() {
        return ValidationResult {
            is_valid: false,
            tokens,
            error_message: Some("Expression is empty".to_string()),
            expected: ExpectedKinds::FIELD,
        };
    }

    let mut state = GrammarState::Field;
    let mut first_error: Option<String> = None;

    for idx in 0..tokens.len() {
        let token = &tokens[idx];
        let outcome = step(state, token, known_fields);
        tracing::trace!(
            ?state,
            token = %token.value,
            kind = token.token_type.as_str(),
            ok = outcome.is_ok(),
            "validate"
        );

        match outcome {
            Ok(next) => state = next,
            Err(message) => {
                if first_error.is_none() {
                    first_error = Some(message.clone());
                }
                tokens[idx].flag(message);
            }
        }
    }

    if state != GrammarState::ConnectorOrEnd {
        let message = missing_message(state, tokens.last());
        if first_error.is_none() {
            first_error = Some(message.clone());
        }
        if let Some(last) = tokens.last_mut() {
            if !last.has_error {
                last.flag(message);
            }
        }
    }

    ValidationResult { is_valid: first_error.is_none(), tokens, error_message: first_error, expected: state.expected() }
}

fn step(state: GrammarState, token: &Token, known_fields: &KnownFields) -> Result<GrammarState, String> {
    match state {
        GrammarState::Field => match token.token_type {
            TokenType::Field if known_fields.contains(&token.value) => Ok(GrammarState::Operator),
            TokenType::Field | TokenType::Unknown => Err(format!("Unknown field '{}'", token.value)),
            other => Err(format!("Expected a field name but found {} '{}'", other.as_str(), token.value)),
        },
        GrammarState::Operator => match token.token_type {
            TokenType::Operator => match RuleOperator::from_symbol(&token.value) {
                Some(op) if op.requires_value() => Ok(GrammarState::Value),
                Some(_) => Ok(GrammarState::ConnectorOrEnd),
                None => Err(format!("Unknown operator '{}'", token.value)),
            },
            other => Err(format!("Expected an operator but found {} '{}'", other.as_str(), token.value)),
        },
        // Bare words that are neither fields nor literals are accepted as text values.
        GrammarState::Value => match token.token_type {
            TokenType::Value | TokenType::Unknown => Ok(GrammarState::ConnectorOrEnd),
            other => Err(format!("Expected a value but found {} '{}'", other.as_str(), token.value)),
        },
        GrammarState::ConnectorOrEnd => match token.token_type {
            TokenType::Connector => Ok(GrammarState::Field),
            other => Err(format!("Expected AND or OR but found {} '{}'", other.as_str(), token.value)),
        },
    }
}

fn missing_message(state: GrammarState, last: Option<&Token>) -> String {
    let after = last.map(|t| t.value.as_str()).unwrap_or_default();
    match state {
        GrammarState::Field => format!("Expected a field name after '{}'", after),
        GrammarState::Operator => format!("Expected an operator after '{}'", after),
        GrammarState::Value => format!("Expected a value after '{}'", after),
        GrammarState::ConnectorOrEnd => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::tokenizer::tokenize;

    fn fields() -> KnownFields {
        KnownFields::new(["Amount", "Country", "Notes"])
    }

    fn validate(text: &str) -> ValidationResult {
        validate_tokens(tokenize(text, &fields()), &fields())
    }

    fn errors(result: &ValidationResult) -> Vec<(usize, &str)> {
        result
            .tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.has_error)
            .map(|(i, t)| (i, t.error_message.as_deref().unwrap_or("")))
            .collect()
    }

    #[test]
    fn accepts_valid_expressions() {
        let cases = vec![
            r#"Amount > 1000 AND Country = "EG""#,
            "Notes is_empty",
            "Notes is_not_empty OR Amount <= 10",
            "Country = EG",
            "country != 'US' and amount >= 1e3",
        ];
        for text in cases {
            let result = validate(text);
            assert!(result.is_valid, "{text}: {:?}", result.error_message);
            assert!(result.error_message.is_none());
            assert_eq!(result.expected, ExpectedKinds::CONNECTOR | ExpectedKinds::END);
            assert!(result.tokens.iter().all(|t| !t.has_error));
        }
    }

    #[test]
    fn trailing_operator_flags_missing_value() {
        let result = validate("Amount >");
        assert!(!result.is_valid);
        assert_eq!(result.expected, ExpectedKinds::VALUE);
        assert_eq!(errors(&result), vec![(1, "Expected a value after '>'")]);
        assert_eq!(result.error_message.as_deref(), Some("Expected a value after '>'"));
    }

    #[test]
    fn partial_inputs_report_next_expectation() {
        let cases: Vec<(&str, ExpectedKinds)> = vec![
            ("Amount", ExpectedKinds::OPERATOR),
            ("Amount > 5 AND", ExpectedKinds::FIELD),
            ("Amount > 5", ExpectedKinds::CONNECTOR | ExpectedKinds::END),
        ];
        for (text, expected) in cases {
            assert_eq!(validate(text).expected, expected, "{text}");
        }
        assert_eq!(validate("Amount > 5 AND").error_message.as_deref(), Some("Expected a field name after 'AND'"));
    }

    #[test]
    fn bad_token_does_not_cascade() {
        let result = validate("Amount > > 1000 AND Country = 'EG'");
        assert!(!result.is_valid);
        assert_eq!(errors(&result), vec![(2, "Expected a value but found operator '>'")]);
    }

    #[test]
    fn unknown_field_is_reported() {
        let result = validate("Amout > 3");
        assert_eq!(result.error_message.as_deref(), Some("Unknown field 'Amout'"));
        // The state stayed on Field, so the operator and value are also out of place.
        assert_eq!(errors(&result).len(), 3);
    }

    #[test]
    fn empty_registry_knows_no_fields() {
        let none = KnownFields::default();
        let result = validate_tokens(tokenize("Amount > 5", &none), &none);
        assert!(!result.is_valid);
        assert_eq!(result.tokens[0].token_type, TokenType::Unknown);
        assert_eq!(result.error_message.as_deref(), Some("Unknown field 'Amount'"));

        // A field token from a wider registry is still checked against this one.
        let narrow = KnownFields::new(["Country"]);
        let result = validate_tokens(tokenize("Amount > 5", &fields()), &narrow);
        assert_eq!(result.tokens[0].token_type, TokenType::Field);
        assert_eq!(result.error_message.as_deref(), Some("Unknown field 'Amount'"));
    }

    #[test]
    fn missing_connector_is_reported() {
        let result = validate("Amount > 3 Country = 'EG'");
        assert!(!result.is_valid);
        assert_eq!(errors(&result)[0], (3, "Expected AND or OR but found field 'Country'"));
    }

    #[test]
    fn empty_expression_is_invalid() {
        let result = validate("");
        assert!(!result.is_valid);
        assert_eq!(result.error_message.as_deref(), Some("Expression is empty"));
        assert_eq!(result.expected, ExpectedKinds::FIELD);
    }

    #[test]
    fn revalidation_clears_stale_errors() {
        let mut tokens = tokenize("Amount > 3", &fields());
        tokens[0].flag("stale");
        let result = validate_tokens(tokens, &fields());
        assert!(result.is_valid);
        assert!(result.tokens[0].error_message.is_none());
    }
}
