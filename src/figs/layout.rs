//! Flattened node listing used to render a forest and highlight a trace.
//!
//! Node ids follow the evaluator's scheme (`t{i}-root`, `{parent}-1` for
//! the true branch, `{parent}-2` for the false branch), so a
//! [`TraceResult`]'s `node_ids` can be looked up here directly.

use super::condition::format_condition_label;
use super::evaluate::{TraceResult, child_id, root_id};
use super::tree::{Forest, TreeNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LayoutKind {
    Decision { condition: String },
    /// `ordinal` counts leaves in pre-order within the whole forest, starting at 1.
    Leaf { value: f64, ordinal: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode {
    pub id: String,
    pub tree_index: usize,
    pub depth: usize,
    pub label: String,
    #[serde(flatten)]
    pub kind: LayoutKind,
}

/// Every node of a forest in pre-order (true branch before false branch).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForestLayout {
    pub nodes: Vec<LayoutNode>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ForestLayout {
    pub fn build(forest: &Forest) -> Self {
        let mut nodes = Vec::new();
        let mut leaf_counter = 0usize;
        for (tree_index, tree) in forest.iter().enumerate() {
            push_node(&tree.root, root_id(tree_index), tree_index, 0, &mut leaf_counter, &mut nodes);
        }
        let index = nodes.iter().enumerate().map(|(i, n)| (n.id.clone(), i)).collect();
        Self { nodes, index }
    }

    pub fn node(&self, id: &str) -> Option<&LayoutNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn tree_nodes(&self, tree_index: usize) -> impl Iterator<Item = &LayoutNode> {
        self.nodes.iter().filter(move |n| n.tree_index == tree_index)
    }

    /// Nodes on the evaluated paths of `trace`, in path order.
    pub fn highlighted<'a>(&'a self, trace: &'a TraceResult) -> impl Iterator<Item = &'a LayoutNode> + 'a {
        trace.paths.iter().flat_map(|p| p.node_ids.iter()).filter_map(|id| self.node(id))
    }
}

fn push_node(
    node: &TreeNode,
    id: String,
    tree_index: usize,
    depth: usize,
    leaf_counter: &mut usize,
    out: &mut Vec<LayoutNode>,
) {
    match node {
        TreeNode::Leaf { value } => {
            *leaf_counter += 1;
            out.push(LayoutNode {
                label: format!("Leaf #{}: {:+.4}", leaf_counter, value),
                id,
                tree_index,
                depth,
                kind: LayoutKind::Leaf { value: *value, ordinal: *leaf_counter },
            });
        }
        TreeNode::Decision { condition, true_branch, false_branch } => {
            let true_id = child_id(&id, true);
            let false_id = child_id(&id, false);
            out.push(LayoutNode {
                label: format_condition_label(condition),
                id,
                tree_index,
                depth,
                kind: LayoutKind::Decision { condition: condition.clone() },
            });
            push_node(true_branch, true_id, tree_index, depth + 1, leaf_counter, out);
            push_node(false_branch, false_id, tree_index, depth + 1, leaf_counter, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figs::evaluate::evaluate_claim;
    use crate::figs::tree::Tree;
    use crate::value::{ClaimValue, Record};

    fn forest() -> Forest {
        Forest::new(vec![
            Tree::new(
                "Tree #0",
                TreeNode::decision(
                    "Amount <= 1000.500",
                    TreeNode::decision("Prior <= 0.500", TreeNode::leaf(-0.2), TreeNode::leaf(0.1)),
                    TreeNode::leaf(0.5),
                ),
            ),
            Tree::new("Tree #1", TreeNode::leaf(0.05)),
        ])
    }

    #[test]
    fn lists_nodes_in_preorder_with_ids() {
        let layout = ForestLayout::build(&forest());
        let ids: Vec<&str> = layout.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["t0-root", "t0-root-1", "t0-root-1-1", "t0-root-1-2", "t0-root-2", "t1-root"]);

        let root = layout.node("t0-root").unwrap();
        assert_eq!(root.label, "Amount ≤ 1000.5");
        assert_eq!(root.depth, 0);

        let leaf = layout.node("t1-root").unwrap();
        assert_eq!(leaf.kind, LayoutKind::Leaf { value: 0.05, ordinal: 4 });
        assert_eq!(layout.tree_nodes(0).count(), 5);
    }

    #[test]
    fn every_trace_id_resolves() {
        let layout = ForestLayout::build(&forest());
        let mut record = Record::new();
        record.insert("Amount".into(), ClaimValue::Number(500.0));
        record.insert("Prior".into(), ClaimValue::Number(1.0));
        let trace = evaluate_claim(&record, &forest());

        let ids: Vec<&str> = layout.highlighted(&trace).map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["t0-root", "t0-root-1", "t0-root-1-2", "t1-root"]);
        assert_eq!(layout.highlighted(&trace).count(), trace.paths.iter().map(|p| p.node_ids.len()).sum::<usize>());
    }
}
