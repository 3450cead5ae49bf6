//! FIGS tree-ensemble engine.
//!
//! FIGS dumps are the text form of a sum of binary decision trees. This
//! module turns such a dump into a [`Forest`] and scores claim records
//! against it with a full path trace.
//!
//! ## How the parts work together
//!
//! ```text
//! dump text ── parse_forest ──────────────── Forest        (parser.rs, tree.rs)
//!                                              │
//!              detect_boolean_candidates ◄─────┤           (boolean.rs)
//!              apply_boolean_conversion  ──► Forest'
//!                                              │
//! record ───── evaluate_claim ◄────────────────┘           (evaluate.rs)
//!                │   per decision: evaluate_condition      (condition.rs)
//!                v
//!            TraceResult ── ForestLayout::highlighted      (layout.rs)
//! ```
//!
//! ## Responsibilities by module
//!
//! - `tree.rs`: `TreeNode`, `Tree`, `Forest` and serialization back to dump text.
//! - `parser.rs`: indentation-driven recursive descent over dump lines.
//! - `condition.rs`: condition-string matching for labels and evaluation.
//! - `boolean.rs`: detection and rewrite of 0/1-encoded `0.5` splits.
//! - `evaluate.rs`: per-record traversal, score, sigmoid, risk level.
//! - `layout.rs`: flattened node listing keyed by trace node ids.

#[path = "figs/boolean.rs"]
mod boolean;
#[path = "figs/condition.rs"]
mod condition;
#[path = "figs/evaluate.rs"]
mod evaluate;
#[path = "figs/layout.rs"]
mod layout;
#[path = "figs/parser.rs"]
mod parser;
#[path = "figs/tree.rs"]
mod tree;

pub use boolean::{
    BooleanCandidate, BooleanDecisions, BooleanSplit, apply_boolean_conversion, detect_boolean_candidates,
};
pub use condition::{Condition, ConditionOperator, evaluate_condition, format_condition_label};
pub use evaluate::{RiskLevel, TraceResult, TreePath, child_id, claim_number, evaluate_claim, root_id, sigmoid};
pub use layout::{ForestLayout, LayoutKind, LayoutNode};
pub use parser::parse_forest;
pub use tree::{Forest, Tree, TreeNode};
