//! Magic rule tokenizer.
//!
//! One left-to-right pass over the expression, no backtracking. At each
//! position the first matching alternative wins:
//!
//! ```text
//! whitespace          -> skipped
//! "..." or '...'      -> value     (backslash escapes, span includes quotes)
//! operator table      -> operator  (longest spelling first)
//! AND / OR + space    -> connector (case-insensitive, whole word)
//! run of non-space,
//! non-<>=! chars      -> field | value | unknown
//! ```
//!
//! `start`/`end` are character offsets (not bytes) into the original text,
//! end exclusive, so an editor can map the cursor straight onto a token.

use super::model::{Connector, RuleOperator};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Field,
    Operator,
    Value,
    Connector,
    Unknown,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::Field => "field",
            TokenType::Operator => "operator",
            TokenType::Value => "value",
            TokenType::Connector => "connector",
            TokenType::Unknown => "unknown",
        }
    }
}

/// A lexical token. Only the error annotations change after tokenizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub value: String,
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub has_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Token {
    pub fn new(token_type: TokenType, value: impl Into<String>, start: usize, end: usize) -> Self {
        Self { token_type, value: value.into(), start, end, has_error: false, error_message: None }
    }

    pub(crate) fn flag(&mut self, message: impl Into<String>) {
        self.has_error = true;
        self.error_message = Some(message.into());
    }

    pub(crate) fn clear_error(&mut self) {
        self.has_error = false;
        self.error_message = None;
    }

    /// Whether this token is a quoted string literal.
    pub fn is_quoted(&self) -> bool {
        matches!(self.value.chars().next(), Some('"') | Some('\''))
    }
}

/// Case-insensitive set of field names the tokenizer classifies as `field`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownFields {
    names: HashSet<String>,
}

impl KnownFields {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { names: names.into_iter().map(|s| s.as_ref().trim().to_lowercase()).collect() }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.trim().to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

impl<S: AsRef<str>> FromIterator<S> for KnownFields {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        KnownFields::new(iter)
    }
}

const OPERATOR_CHARS: [char; 4] = ['<', '>', '=', '!'];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split `text` into typed tokens.
pub fn tokenize(text: &str, known_fields: &KnownFields) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < n {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '"' || c == '\'' {
            let end = scan_quoted(&chars, i);
            tokens.push(Token::new(TokenType::Value, slice(&chars, i, end), i, end));
            i = end;
            continue;
        }

        if let Some(op) = match_operator(&chars, i) {
            let end = i + op.as_str().chars().count();
            tokens.push(Token::new(TokenType::Operator, slice(&chars, i, end), i, end));
            i = end;
            continue;
        }

        if let Some(len) = match_connector(&chars, i) {
            let end = i + len;
            tokens.push(Token::new(TokenType::Connector, slice(&chars, i, end), i, end));
            i = end;
            continue;
        }

        let mut end = i;
        while end < n && !chars[end].is_whitespace() && !OPERATOR_CHARS.contains(&chars[end]) {
            end += 1;
        }
        // A lone operator character that did not form an operator (e.g. `!`).
        if end == i {
            end = i + 1;
        }
        let word = slice(&chars, i, end);
        let token_type = classify(&word, known_fields);
        tokens.push(Token::new(token_type, word, i, end));
        i = end;
    }

    tracing::trace!(text, tokens = tokens.len(), "tokenized rule expression");
    tokens
}

/// End (exclusive) of a quoted span starting at `start`. Unterminated
/// quotes run to the end of input.
fn scan_quoted(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    chars.len()
}

fn match_operator(chars: &[char], at: usize) -> Option<RuleOperator> {
    RuleOperator::BY_LENGTH.iter().copied().find(|op| {
        let symbol: Vec<char> = op.as_str().chars().collect();
        let end = at + symbol.len();
        if end > chars.len() {
            return false;
        }
        let matches = chars[at..end].iter().zip(&symbol).all(|(a, b)| a.to_ascii_lowercase() == *b);
        if !matches {
            return false;
        }
        if op.is_word() && symbol.len() > 2 {
            return chars.get(end).is_none_or(|c| !is_word_char(*c));
        }
        true
    })
}

fn match_connector(chars: &[char], at: usize) -> Option<usize> {
    [Connector::And, Connector::Or].iter().find_map(|conn| {
        let len = conn.as_str().len();
        let end = at + len;
        if end > chars.len() {
            return None;
        }
        let word: String = chars[at..end].iter().collect();
        if !word.eq_ignore_ascii_case(conn.as_str()) {
            return None;
        }
        match chars.get(end) {
            None => Some(len),
            Some(c) if c.is_whitespace() => Some(len),
            _ => None,
        }
    })
}

fn classify(word: &str, known_fields: &KnownFields) -> TokenType {
    if known_fields.contains(word) {
        TokenType::Field
    } else if is_number(word) || word.eq_ignore_ascii_case("true") || word.eq_ignore_ascii_case("false") {
        TokenType::Value
    } else {
        TokenType::Unknown
    }
}

pub(crate) fn is_number(word: &str) -> bool {
    regex!(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").is_match(word)
}

fn slice(chars: &[char], start: usize, end: usize) -> String {
    chars[start..end.min(chars.len())].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> KnownFields {
        KnownFields::new(["Amount", "Country", "Notes", "containsFraud", "order"])
    }

    fn kinds(tokens: &[Token]) -> Vec<(TokenType, &str)> {
        tokens.iter().map(|t| (t.token_type, t.value.as_str())).collect()
    }

    #[test]
    fn tokenizes_composite_expression() {
        let tokens = tokenize(r#"Amount > 1000 AND Country = "EG""#, &fields());
        assert_eq!(
            kinds(&tokens),
            vec![
                (TokenType::Field, "Amount"),
                (TokenType::Operator, ">"),
                (TokenType::Value, "1000"),
                (TokenType::Connector, "AND"),
                (TokenType::Field, "Country"),
                (TokenType::Operator, "="),
                (TokenType::Value, "\"EG\""),
            ]
        );
        assert_eq!((tokens[0].start, tokens[0].end), (0, 6));
        assert_eq!((tokens[6].start, tokens[6].end), (28, 32));
    }

    #[test]
    fn longest_operator_wins() {
        let tokens = tokenize("Amount>=5", &fields());
        assert_eq!(
            kinds(&tokens),
            vec![(TokenType::Field, "Amount"), (TokenType::Operator, ">="), (TokenType::Value, "5")]
        );

        let tokens = tokenize("Notes is_not_empty", &fields());
        assert_eq!(kinds(&tokens), vec![(TokenType::Field, "Notes"), (TokenType::Operator, "is_not_empty")]);
    }

    #[test]
    fn word_operators_need_a_boundary() {
        let tokens = tokenize("containsFraud contains x", &fields());
        assert_eq!(
            kinds(&tokens),
            vec![(TokenType::Field, "containsFraud"), (TokenType::Operator, "contains"), (TokenType::Unknown, "x")]
        );
        let tokens = tokenize("Country STARTS_WITH 'E'", &fields());
        assert_eq!(tokens[1].token_type, TokenType::Operator);
    }

    #[test]
    fn connectors_are_whole_words() {
        let tokens = tokenize("order = 1 or Amount < 2", &fields());
        assert_eq!(tokens[0].token_type, TokenType::Field);
        assert_eq!(tokens[3].token_type, TokenType::Connector);
        assert_eq!(tokens[3].value, "or");

        let tokens = tokenize("Amount = ANDROID", &fields());
        assert_eq!(tokens[2].token_type, TokenType::Unknown);
    }

    #[test]
    fn quoted_values_keep_escapes_and_spans() {
        let tokens = tokenize(r#"Notes contains "say \"hi\" now""#, &fields());
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[2].token_type, TokenType::Value);
        assert_eq!(tokens[2].value, r#""say \"hi\" now""#);
        assert_eq!(tokens[2].end, 31);
    }

    #[test]
    fn unterminated_quote_runs_to_end() {
        let tokens = tokenize("Country = 'EG", &fields());
        assert_eq!(tokens[2].value, "'EG");
        assert_eq!(tokens[2].end, 13);
    }

    #[test]
    fn classifies_values_and_unknowns() {
        let tokens = tokenize("amount = TRUE -3.5 foo", &fields());
        assert_eq!(
            kinds(&tokens),
            vec![
                (TokenType::Field, "amount"),
                (TokenType::Operator, "="),
                (TokenType::Value, "TRUE"),
                (TokenType::Value, "-3.5"),
                (TokenType::Unknown, "foo"),
            ]
        );
    }

    #[test]
    fn stray_bang_does_not_stall() {
        let tokens = tokenize("Amount ! 3", &fields());
        assert_eq!(
            kinds(&tokens),
            vec![(TokenType::Field, "Amount"), (TokenType::Unknown, "!"), (TokenType::Value, "3")]
        );
    }

    #[test]
    fn offsets_count_characters() {
        let tokens = tokenize("Country = 'Égypte' AND Amount > 1", &fields());
        assert_eq!((tokens[2].start, tokens[2].end), (10, 18));
        assert_eq!(tokens[3].start, 19);
    }

    #[test]
    fn empty_input_has_no_tokens() {
        assert!(tokenize("   ", &fields()).is_empty());
    }
}
