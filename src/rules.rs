//! Magic rules: a one-line expression language over claim fields.
//!
//! ```text
//! <field> <operator> [<value>] (AND|OR <field> <operator> [<value>])*
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! text ── tokenize ──► Vec<Token> ── validate_tokens ──► ValidationResult   (live feedback)
//!                          │
//!                          └── RuleCompiler::compile ──► Vec<RuleItem>
//!                                                          │
//! record ─────────────── execute_rules / RuleEngine ◄──────┘
//!                          │
//!                          v
//!                   RuleExecutionResult
//! ```
//!
//! Tokenizing and validating never fail. Grammar problems are carried on the
//! tokens themselves so an editor can underline them while the user types.

#[path = "rules/compiler.rs"]
mod compiler;
#[path = "rules/executor.rs"]
mod executor;
#[path = "rules/model.rs"]
mod model;
#[path = "rules/tokenizer.rs"]
mod tokenizer;
#[path = "rules/validator.rs"]
mod validator;

pub use compiler::{CompileResult, RuleCompiler, compile_expression, compile_rules};
pub use executor::{ConditionResult, RuleEngine, RuleEvaluation, RuleExecutionResult, execute_rules};
pub use model::{CompositeRule, Connector, Rule, RuleCondition, RuleGroup, RuleItem, RuleOperator, RuleValue, Severity};
pub use tokenizer::{KnownFields, Token, TokenType, tokenize};
pub use validator::{ExpectedKinds, ValidationResult, validate_tokens};
