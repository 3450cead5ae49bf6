//! Claim-risk logic: FIGS tree-ensemble scoring and magic rules over claim records.
//!
//! Two independent engines share one value model ([`ClaimValue`], [`Record`]):
//!
//! - [`figs`] parses FIGS tree dumps into a [`Forest`] and scores records
//!   with an explainable [`TraceResult`].
//! - [`rules`] tokenizes, validates and compiles one-line rule expressions
//!   and executes them against records.
//!
//! Everything here is pure and synchronous. [`evaluate_batch`] and
//! [`execute_batch`] fan large record sets out over scoped threads.

#[macro_use]
mod macros;
mod api;
mod batch;
mod config;
mod error;
pub mod figs;
pub mod rules;
mod value;

pub use api::{compile_rules, evaluate_forest, execute_rules, parse_forest, tokenize, validate_tokens};
pub use batch::{
    BatchMetrics, BatchOptions, BatchRun, evaluate_batch, evaluate_batch_with_metrics, execute_batch,
    execute_batch_with_metrics,
};
pub use config::EngineConfig;
pub use error::{ConfigError, ParseError};
pub use figs::{
    BooleanCandidate, BooleanDecisions, Forest, ForestLayout, RiskLevel, TraceResult, Tree, TreeNode, TreePath,
    apply_boolean_conversion, detect_boolean_candidates, sigmoid,
};
pub use rules::{
    CompileResult, CompositeRule, Connector, ExpectedKinds, KnownFields, Rule, RuleCompiler, RuleEngine,
    RuleExecutionResult, RuleItem, RuleOperator, RuleValue, Severity, Token, TokenType, ValidationResult,
    compile_expression,
};
pub use value::{ClaimValue, Record};
