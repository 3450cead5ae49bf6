//! Tree ensemble evaluation with path tracing.
//!
//! ```text
//! record ── normalize_record ──┐
//!                              v
//! for each tree:  t{i}-root ─ condition? ─ true  -> {id}-1
//!                                        └ false -> {id}-2
//!                 ... until a Leaf; leaf value is the tree's contribution
//!                              │
//!                              v
//! total = Σ leaf values,  probability = sigmoid(total),  risk = bucket(probability)
//! ```
//!
//! Evaluation is pure: a fresh [`EvaluationContext`] is allocated for every
//! `(record, forest)` pair, so one forest can be shared across threads.

use super::condition::evaluate_condition;
use super::tree::{Forest, TreeNode};
use crate::value::{ClaimValue, Record, normalize_record};
use serde::{Deserialize, Serialize};

/// Record keys (compared case-insensitively) that identify a claim.
const CLAIM_NUMBER_KEYS: &[&str] = &["claim_number", "claimnumber", "claim number", "claim_id", "claimid", "id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// `>= 0.75` is high, `>= 0.5` is moderate, anything lower is low.
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 0.75 {
            RiskLevel::High
        } else if probability >= 0.5 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
        }
    }
}

/// Node ids visited in one tree, ending at the leaf that was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreePath {
    pub tree_index: usize,
    pub node_ids: Vec<String>,
    pub leaf_value: f64,
}

/// Explainable result of scoring one claim against a forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceResult {
    pub claim_number: String,
    pub claim: Record,
    pub paths: Vec<TreePath>,
    pub total_score: f64,
    pub probability: f64,
    pub risk_level: RiskLevel,
}

impl TraceResult {
    /// Whether `node_id` lies on any evaluated path.
    pub fn visited(&self, node_id: &str) -> bool {
        self.paths.iter().any(|p| p.node_ids.iter().any(|id| id == node_id))
    }
}

/// Per-evaluation scratch state. Never shared between evaluations.
#[derive(Debug, Default)]
struct EvaluationContext {
    path: Vec<String>,
    leaf_counter: usize,
}

impl EvaluationContext {
    fn take_path(&mut self) -> Vec<String> {
        std::mem::take(&mut self.path)
    }
}

/// Logistic function mapping a summed score to a probability.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Id of tree `index`'s root node.
pub fn root_id(index: usize) -> String {
    format!("t{}-root", index)
}

/// Id of a child: `-1` for the true branch, `-2` for the false branch.
pub fn child_id(parent: &str, took_true_branch: bool) -> String {
    format!("{}-{}", parent, if took_true_branch { 1 } else { 2 })
}

/// Score `record` against every tree of `forest`.
pub fn evaluate_claim(record: &Record, forest: &Forest) -> TraceResult {
    let normalized = normalize_record(record);
    let mut ctx = EvaluationContext::default();
    let mut paths = Vec::with_capacity(forest.len());
    let mut total_score = 0.0;

    for (tree_index, tree) in forest.iter().enumerate() {
        let leaf_value = walk(&tree.root, root_id(tree_index), &normalized, &mut ctx);
        total_score += leaf_value;
        paths.push(TreePath { tree_index, node_ids: ctx.take_path(), leaf_value });
    }

    let probability = sigmoid(total_score);
    let risk_level = RiskLevel::from_probability(probability);
    let claim_number = claim_number(record);

    tracing::debug!(
        claim = %claim_number,
        trees = forest.len(),
        leaves = ctx.leaf_counter,
        total_score,
        probability,
        risk = risk_level.as_str(),
        "evaluated claim"
    );

    TraceResult { claim_number, claim: record.clone(), paths, total_score, probability, risk_level }
}

fn walk(node: &TreeNode, id: String, record: &Record, ctx: &mut EvaluationContext) -> f64 {
    let mut node = node;
    let mut id = id;
    loop {
        match node {
            TreeNode::Leaf { value } => {
                ctx.path.push(id);
                ctx.leaf_counter += 1;
                return *value;
            }
            TreeNode::Decision { condition, true_branch, false_branch } => {
                let taken = evaluate_condition(condition, record);
                tracing::trace!(node = %id, condition = %condition, taken, "decision");
                let next = child_id(&id, taken);
                ctx.path.push(id);
                node = if taken { true_branch.as_ref() } else { false_branch.as_ref() };
                id = next;
            }
        }
    }
}

/// Best-effort claim identifier from well-known record keys.
pub fn claim_number(record: &Record) -> String {
    CLAIM_NUMBER_KEYS
        .iter()
        .find_map(|key| {
            record
                .iter()
                .find(|(k, v)| k.trim().to_lowercase() == *key && !v.is_absent())
                .map(|(_, v)| match v {
                    ClaimValue::Text(s) => s.trim().to_string(),
                    other => other.to_string(),
                })
        })
        .unwrap_or_default()
}
