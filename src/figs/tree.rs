//! Tree ensemble data model.
//!
//! A [`Forest`] is an ordered list of [`Tree`]s. Order matters: tree `i` is
//! addressed as `t{i}-root` in trace paths. Forests are immutable once
//! parsed; transforms such as the boolean rewrite build a new forest.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// A node of a binary decision tree.
///
/// `Decision` owns both branches outright; there is no sharing and no cycles,
/// so every path from the root ends in a `Leaf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TreeNode {
    Leaf { value: f64 },
    Decision { condition: String, true_branch: Box<TreeNode>, false_branch: Box<TreeNode> },
}

impl TreeNode {
    pub fn leaf(value: f64) -> Self {
        TreeNode::Leaf { value }
    }

    pub fn decision(condition: impl Into<String>, true_branch: TreeNode, false_branch: TreeNode) -> Self {
        TreeNode::Decision {
            condition: condition.into(),
            true_branch: Box::new(true_branch),
            false_branch: Box::new(false_branch),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    /// Number of `Decision` nodes in this subtree.
    pub fn decision_count(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Decision { true_branch, false_branch, .. } => {
                1 + true_branch.decision_count() + false_branch.decision_count()
            }
        }
    }

    /// Maximum number of decisions on any root-to-leaf path.
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Decision { true_branch, false_branch, .. } => {
                1 + true_branch.depth().max(false_branch.depth())
            }
        }
    }
}

/// One titled tree of the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub title: String,
    pub root: TreeNode,
}

impl Tree {
    pub fn new(title: impl Into<String>, root: TreeNode) -> Self {
        Self { title: title.into(), root }
    }
}

/// Ordered sequence of trees whose leaf values are summed at evaluation time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Forest {
    trees: Vec<Tree>,
}

impl Forest {
    pub fn new(trees: Vec<Tree>) -> Self {
        Self { trees }
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tree> {
        self.trees.iter()
    }

    /// Serialize back into the tab-indented dump format.
    ///
    /// Both children of a decision are written one tab deeper than the
    /// decision itself, true branch first. Trees are separated by a `+` line.
    /// A root is tagged `(Tree #N root)` only when its title carries a
    /// number; other titles are written as a bare `(root)` and read back as
    /// `Tree`.
    pub fn to_figs_text(&self) -> String {
        let mut out = String::new();
        for (idx, tree) in self.trees.iter().enumerate() {
            if idx > 0 {
                out.push_str("\t+\n");
            }
            let root_tag = match regex!(r"^Tree #(\d+)$").captures(tree.title.trim()) {
                Some(caps) => format!("(Tree #{} root)", &caps[1]),
                None => "(root)".to_string(),
            };
            write_node(&mut out, &tree.root, 0, Some(&root_tag));
        }
        out
    }
}

impl From<Vec<Tree>> for Forest {
    fn from(trees: Vec<Tree>) -> Self {
        Forest::new(trees)
    }
}

impl<'a> IntoIterator for &'a Forest {
    type Item = &'a Tree;
    type IntoIter = std::slice::Iter<'a, Tree>;

    fn into_iter(self) -> Self::IntoIter {
        self.trees.iter()
    }
}

fn write_node(out: &mut String, node: &TreeNode, level: usize, root_tag: Option<&str>) {
    let tag = match (root_tag, node) {
        (Some(tag), _) => tag,
        (None, TreeNode::Leaf { .. }) => "(leaf)",
        (None, TreeNode::Decision { .. }) => "(split)",
    };

    for _ in 0..level {
        out.push('\t');
    }
    match node {
        TreeNode::Leaf { value } => {
            let _ = writeln!(out, "Val: {} {}", leaf_text(*value), tag);
        }
        TreeNode::Decision { condition, true_branch, false_branch } => {
            let _ = writeln!(out, "{} {}", condition, tag);
            write_node(out, true_branch, level + 1, None);
            write_node(out, false_branch, level + 1, None);
        }
    }
}

/// Infinities overflow to `±1e999` so the leaf reader parses them back.
fn leaf_text(value: f64) -> String {
    if value.is_infinite() {
        if value > 0.0 { "1e999".to_string() } else { "-1e999".to_string() }
    } else {
        value.to_string()
    }
}
