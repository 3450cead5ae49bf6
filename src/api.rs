use crate::error::ParseError;
use crate::figs::{self, Forest, TraceResult};
use crate::rules::{self, CompileResult, KnownFields, RuleExecutionResult, RuleItem, Severity, Token, ValidationResult};
use crate::value::Record;

/// Parse a FIGS text dump into a [`Forest`].
///
/// Any structural problem (a decision without a false branch, an unreadable
/// leaf, left-over lines) rejects the whole input.
///
/// # Example
/// ```
/// let forest = claimlogic::parse_forest("x <= 0.500 (Tree #0 root)\n\tVal: 0.1\n\tVal: -0.1\n").unwrap();
/// assert_eq!(forest.len(), 1);
/// assert_eq!(forest.trees()[0].title, "Tree #0");
/// ```
pub fn parse_forest(text: &str) -> Result<Forest, ParseError> {
    figs::parse_forest(text)
}

/// Score one record against `forest` and return the full path trace.
///
/// # Example
/// ```
/// use claimlogic::{ClaimValue, Record, RiskLevel};
///
/// let forest = claimlogic::parse_forest("x <= 0.500 (Tree #0 root)\n\tVal: 0.1\n\tVal: -0.1\n").unwrap();
/// let mut record = Record::new();
/// record.insert("x".into(), ClaimValue::Number(0.2));
///
/// let trace = claimlogic::evaluate_forest(&record, &forest);
/// assert_eq!(trace.total_score, 0.1);
/// assert_eq!(trace.paths[0].node_ids, vec!["t0-root", "t0-root-1"]);
/// assert_eq!(trace.risk_level, RiskLevel::Moderate);
/// ```
pub fn evaluate_forest(record: &Record, forest: &Forest) -> TraceResult {
    figs::evaluate_claim(record, forest)
}

/// Split a magic rule expression into typed tokens with character spans.
///
/// # Example
/// ```
/// use claimlogic::{KnownFields, TokenType};
///
/// let fields = KnownFields::new(["Amount"]);
/// let tokens = claimlogic::tokenize("Amount > 1000", &fields);
/// let kinds: Vec<TokenType> = tokens.iter().map(|t| t.token_type).collect();
/// assert_eq!(kinds, vec![TokenType::Field, TokenType::Operator, TokenType::Value]);
/// assert_eq!((tokens[2].start, tokens[2].end), (9, 13));
/// ```
pub fn tokenize(text: &str, known_fields: &KnownFields) -> Vec<Token> {
    rules::tokenize(text, known_fields)
}

/// Check a token stream against the rule grammar.
///
/// Never fails. Problems are reported on the returned tokens.
///
/// # Example
/// ```
/// use claimlogic::KnownFields;
///
/// let fields = KnownFields::new(["Amount"]);
/// let result = claimlogic::validate_tokens(claimlogic::tokenize("Amount >", &fields), &fields);
/// assert!(!result.is_valid);
/// assert!(result.tokens[1].has_error);
/// ```
pub fn validate_tokens(tokens: Vec<Token>, known_fields: &KnownFields) -> ValidationResult {
    rules::validate_tokens(tokens, known_fields)
}

/// Compile a valid token stream into a rule.
///
/// # Example
/// ```
/// use claimlogic::{KnownFields, RuleItem, Severity};
///
/// let fields = KnownFields::new(["Amount", "Country"]);
/// let tokens = claimlogic::tokenize(r#"Amount > 1000 AND Country = "EG""#, &fields);
/// let compiled = claimlogic::compile_rules(&tokens, Severity::High);
/// assert!(compiled.is_valid);
/// assert!(matches!(&compiled.rules[0], RuleItem::Composite(rule) if rule.conditions.len() == 2));
/// ```
pub fn compile_rules(tokens: &[Token], effect: Severity) -> CompileResult {
    rules::compile_rules(tokens, effect)
}

/// Evaluate compiled rules against one record.
///
/// # Example
/// ```
/// use claimlogic::{ClaimValue, KnownFields, Record, Severity};
///
/// let fields = KnownFields::new(["Amount"]);
/// let compiled = claimlogic::compile_expression("Amount > 1000", &fields, Severity::High);
///
/// let mut record = Record::new();
/// record.insert("Amount".into(), ClaimValue::Number(1500.0));
/// let result = claimlogic::execute_rules(&record, &compiled.rules);
/// assert_eq!(result.matched_rule_ids, vec!["rule-1"]);
/// assert_eq!(result.max_severity, Some(Severity::High));
/// ```
pub fn execute_rules(record: &Record, rules: &[RuleItem]) -> RuleExecutionResult {
    crate::rules::execute_rules(record, rules)
}
