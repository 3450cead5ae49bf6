//! Boolean-threshold detection and rewriting.
//!
//! Tree fitters only know numeric features, so a yes/no column encoded as
//! 0/1 shows up as a split at exactly `0.5`. This module finds those splits
//! and, when asked, rewrites them into `is` conditions that read naturally:
//!
//! ```text
//! "Prior Fraud <= 0.500"  ->  "Prior Fraud is No"
//! "Prior Fraud >= 0.500"  ->  "Prior Fraud is Yes"
//! ```
//!
//! Candidates are keyed by tree index plus a dotted path from the root
//! (`root`, `root.T`, `root.T.F`, ...). Rewriting always builds a new forest.

use super::tree::{Forest, Tree, TreeNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const BOOLEAN_THRESHOLD: f64 = 0.5;
const THRESHOLD_TOLERANCE: f64 = 1e-6;

/// Direction of a detected boolean split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BooleanSplit {
    #[serde(rename = "<=")]
    AtMostHalf,
    #[serde(rename = ">=")]
    AtLeastHalf,
}

impl BooleanSplit {
    fn rewritten_value(self) -> &'static str {
        match self {
            BooleanSplit::AtMostHalf => "No",
            BooleanSplit::AtLeastHalf => "Yes",
        }
    }
}

/// A decision whose condition looks like a binary-encoded feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanCandidate {
    pub tree_index: usize,
    pub path: String,
    pub feature: String,
    pub operator: BooleanSplit,
    pub threshold: f64,
    pub condition: String,
}

impl BooleanCandidate {
    /// The condition this candidate becomes when converted.
    pub fn rewritten(&self) -> String {
        format!("{} is {}", self.feature, self.operator.rewritten_value())
    }
}

/// Per-candidate convert/keep choices. Candidates without an entry are converted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooleanDecisions {
    choices: HashMap<(usize, String), bool>,
}

impl BooleanDecisions {
    /// Convert every candidate.
    pub fn convert_all() -> Self {
        Self::default()
    }

    pub fn set(&mut self, tree_index: usize, path: impl Into<String>, convert: bool) -> &mut Self {
        self.choices.insert((tree_index, path.into()), convert);
        self
    }

    /// Keep the numeric condition for this candidate.
    pub fn keep(&mut self, tree_index: usize, path: impl Into<String>) -> &mut Self {
        self.set(tree_index, path, false)
    }

    pub fn should_convert(&self, tree_index: usize, path: &str) -> bool {
        self.choices.get(&(tree_index, path.to_string())).copied().unwrap_or(true)
    }
}

/// Match `feature <= 0.5` / `feature >= 0.5` (threshold within `1e-6` of `0.5`).
fn match_boolean_split(condition: &str) -> Option<(String, BooleanSplit, f64)> {
    let re = regex!(r"^(.+?)\s*(<=|>=)\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)$");
    let caps = re.captures(condition.trim())?;
    let threshold: f64 = caps[3].parse().ok()?;
    if (threshold - BOOLEAN_THRESHOLD).abs() > THRESHOLD_TOLERANCE {
        return None;
    }
    let split = if &caps[2] == "<=" { BooleanSplit::AtMostHalf } else { BooleanSplit::AtLeastHalf };
    Some((caps[1].trim().to_string(), split, threshold))
}

/// List every boolean-looking split in the forest, in pre-order per tree.
pub fn detect_boolean_candidates(forest: &Forest) -> Vec<BooleanCandidate> {
    let mut out = Vec::new();
    for (tree_index, tree) in forest.iter().enumerate() {
        collect(&tree.root, tree_index, "root".to_string(), &mut out);
    }
    tracing::debug!(candidates = out.len(), "boolean split scan");
    out
}

fn collect(node: &TreeNode, tree_index: usize, path: String, out: &mut Vec<BooleanCandidate>) {
    let TreeNode::Decision { condition, true_branch, false_branch } = node else {
        return;
    };
    if let Some((feature, operator, threshold)) = match_boolean_split(condition) {
        out.push(BooleanCandidate {
            tree_index,
            path: path.clone(),
            feature,
            operator,
            threshold,
            condition: condition.clone(),
        });
    }
    collect(true_branch, tree_index, format!("{path}.T"), out);
    collect(false_branch, tree_index, format!("{path}.F"), out);
}

/// Build a new forest with the chosen boolean splits rewritten to `is` conditions.
pub fn apply_boolean_conversion(forest: &Forest, decisions: &BooleanDecisions) -> Forest {
    forest
        .iter()
        .enumerate()
        .map(|(tree_index, tree)| Tree {
            title: tree.title.clone(),
            root: rewrite(&tree.root, tree_index, "root".to_string(), decisions),
        })
        .collect::<Vec<_>>()
        .into()
}

fn rewrite(node: &TreeNode, tree_index: usize, path: String, decisions: &BooleanDecisions) -> TreeNode {
    match node {
        TreeNode::Leaf { value } => TreeNode::Leaf { value: *value },
        TreeNode::Decision { condition, true_branch, false_branch } => {
            let condition = match match_boolean_split(condition) {
                Some((feature, split, _)) if decisions.should_convert(tree_index, &path) => {
                    format!("{} is {}", feature, split.rewritten_value())
                }
                _ => condition.clone(),
            };
            TreeNode::Decision {
                condition,
                true_branch: Box::new(rewrite(true_branch, tree_index, format!("{path}.T"), decisions)),
                false_branch: Box::new(rewrite(false_branch, tree_index, format!("{path}.F"), decisions)),
            }
        }
    }
}
