//! FIGS tree dump parser.
//!
//! The input is one or more tab-indented tree dumps separated by a line that
//! holds only `+`:
//!
//! ```text
//! Amount <= 1000.500 (Tree #0 root)
//! 	Prior Claims <= 0.500 (split)
//! 		Val: -0.212 (leaf)
//! 		Val: 0.134 (leaf)
//! 	Val: 0.481 (leaf)
//! 	+
//! Age <= 30.500 (Tree #1 root)
//! 	...
//! ```
//!
//! Each line's depth is its count of leading tabs. A decision line is
//! followed by its true branch and then, once that subtree is fully
//! consumed, its false branch. The parser is a recursive descent over a
//! shared cursor:
//!
//! ```text
//! parse_node(level)
//!   line.level < level   -> None (branch missing)
//!   "Val: x"             -> Leaf(x)
//!   otherwise            -> consume, true = parse_node(level + 1),
//!                                    false = parse_node(level)
//! ```
//!
//! A missing branch is a structural error that rejects the whole input.

use super::tree::{Forest, Tree, TreeNode};
use crate::error::ParseError;
use crate::value::leading_number;

#[derive(Debug, Clone)]
struct Line {
    level: usize,
    content: String,
    raw: String,
}

/// Parse a multi-tree FIGS dump into a [`Forest`].
pub fn parse_forest(text: &str) -> Result<Forest, ParseError> {
    let mut trees = Vec::new();

    for segment in split_segments(text) {
        let lines = read_lines(&segment);
        if lines.is_empty() {
            continue;
        }

        let tree_index = trees.len();
        let title = extract_title(&lines[0].raw);
        let mut cursor = 0usize;
        let base = lines[0].level;

        let root = match parse_node(&lines, &mut cursor, base)? {
            Some(root) => root,
            None => return Err(ParseError::EmptyInput),
        };

        if let Some(extra) = lines.get(cursor) {
            return Err(ParseError::TrailingLines { tree_index, line: extra.content.clone() });
        }

        tracing::debug!(
            tree_index,
            title = %title,
            decisions = root.decision_count(),
            depth = root.depth(),
            "parsed tree"
        );
        trees.push(Tree { title, root });
    }

    if trees.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    Ok(Forest::new(trees))
}

/// Split the raw text on `+` separator lines.
fn split_segments(text: &str) -> Vec<Vec<&str>> {
    let mut segments = vec![Vec::new()];
    for raw in text.lines() {
        if raw.trim() == "+" {
            segments.push(Vec::new());
        } else if let Some(current) = segments.last_mut() {
            current.push(raw);
        }
    }
    segments
}

fn read_lines(raw_lines: &[&str]) -> Vec<Line> {
    raw_lines
        .iter()
        .filter_map(|raw| {
            let raw = raw.trim_end_matches('\r');
            let level = raw.chars().take_while(|c| *c == '\t').count();
            let content = strip_tag(raw.trim());
            // Blank lines and `>`-prefixed banner lines carry no nodes.
            if content.is_empty() || content.starts_with('>') {
                return None;
            }
            Some(Line { level, content: content.to_string(), raw: raw.trim().to_string() })
        })
        .collect()
}

/// Remove the trailing `(split)`, `(root)`, `(leaf)` or `(Tree #N root)` tag.
fn strip_tag(content: &str) -> &str {
    let re = regex!(r"\s*\((?:split|root|leaf|Tree #\d+[^)]*)\)\s*$");
    match re.find(content) {
        Some(m) => content[..m.start()].trim_end(),
        None => content,
    }
}

fn extract_title(first_line: &str) -> String {
    let re = regex!(r"\(Tree #(\d+)[^)]*\)");
    match re.captures(first_line) {
        Some(caps) => format!("Tree #{}", &caps[1]),
        None => "Tree".to_string(),
    }
}

fn parse_node(lines: &[Line], cursor: &mut usize, level: usize) -> Result<Option<TreeNode>, ParseError> {
    let Some(line) = lines.get(*cursor) else {
        return Ok(None);
    };
    if line.level < level {
        return Ok(None);
    }
    *cursor += 1;

    if let Some(rest) = line.content.strip_prefix("Val:") {
        let value = leading_number(rest).ok_or_else(|| ParseError::InvalidLeaf { line: line.content.clone() })?;
        tracing::trace!(level, value, "leaf");
        return Ok(Some(TreeNode::Leaf { value }));
    }

    let condition = line.content.clone();
    tracing::trace!(level, condition = %condition, "decision");

    let Some(true_branch) = parse_node(lines, cursor, level + 1)? else {
        return Err(ParseError::InvalidStructure { condition });
    };
    let Some(false_branch) = parse_node(lines, cursor, level)? else {
        return Err(ParseError::InvalidStructure { condition });
    };

    Ok(Some(TreeNode::Decision { condition, true_branch: Box::new(true_branch), false_branch: Box::new(false_branch) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TREES: &str = "\
Amount <= 1000.500 (Tree #0 root)
\tPrior Claims <= 0.500 (split)
\t\tVal: -0.212 (leaf)
\t\tVal: 0.134 (leaf)
\tVal: 0.481 (leaf)

\t+
Age <= 30.500 (Tree #1 root)
\tVal: 0.050 (leaf)
\tVal: -0.075 (leaf)
";

    #[test]
    fn parses_multiple_trees() {
        let forest = parse_forest(TWO_TREES).unwrap();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest.trees()[0].title, "Tree #0");
        assert_eq!(forest.trees()[1].title, "Tree #1");

        let expected = TreeNode::decision(
            "Amount <= 1000.500",
            TreeNode::decision("Prior Claims <= 0.500", TreeNode::leaf(-0.212), TreeNode::leaf(0.134)),
            TreeNode::leaf(0.481),
        );
        assert_eq!(forest.trees()[0].root, expected);
        assert_eq!(
            forest.trees()[1].root,
            TreeNode::decision("Age <= 30.500", TreeNode::leaf(0.05), TreeNode::leaf(-0.075))
        );
    }

    #[test]
    fn accepts_false_branch_at_decision_indent() {
        let text = "x <= 0.5 (root)\n\tVal: 0.1\nVal: -0.1\n";
        let forest = parse_forest(text).unwrap();
        assert_eq!(forest.trees()[0].title, "Tree");
        assert_eq!(forest.trees()[0].root, TreeNode::decision("x <= 0.5", TreeNode::leaf(0.1), TreeNode::leaf(-0.1)));
    }

    #[test]
    fn single_leaf_tree() {
        let forest = parse_forest("Val: 0.25 (Tree #3 root)").unwrap();
        assert_eq!(forest.trees()[0].title, "Tree #3");
        assert_eq!(forest.trees()[0].root, TreeNode::leaf(0.25));
    }

    #[test]
    fn skips_banner_lines() {
        let text = "> FIGS banner\n> ------\nx <= 0.5 (Tree #0 root)\n\tVal: 1.0\n\tVal: 2.0\n";
        let forest = parse_forest(text).unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest.trees()[0].title, "Tree #0");
    }

    #[test]
    fn missing_false_branch_names_condition() {
        let text = "x <= 0.5 (Tree #0 root)\n\ty <= 2 (split)\n\t\tVal: 0.1\n\t\tVal: 0.2\n";
        let err = parse_forest(text).unwrap_err();
        assert_eq!(err, ParseError::InvalidStructure { condition: "x <= 0.5".to_string() });
        assert_eq!(err.to_string(), "Invalid tree structure at condition: x <= 0.5");
    }

    #[test]
    fn missing_true_branch_is_rejected() {
        let err = parse_forest("x <= 0.5 (Tree #0 root)\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidStructure { .. }));
    }

    #[test]
    fn invalid_leaf_is_rejected() {
        let err = parse_forest("x <= 0.5\n\tVal: abc\n\tVal: 1\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidLeaf { .. }));
    }

    #[test]
    fn trailing_lines_are_rejected() {
        let err = parse_forest("Val: 0.1 (Tree #0 root)\nVal: 0.2\n").unwrap_err();
        assert_eq!(err, ParseError::TrailingLines { tree_index: 0, line: "Val: 0.2".to_string() });
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(parse_forest("").unwrap_err(), ParseError::EmptyInput);
        assert_eq!(parse_forest("\n  \n\t+\n").unwrap_err(), ParseError::EmptyInput);
    }

    #[test]
    fn round_trips_through_figs_text() {
        let forest = parse_forest(TWO_TREES).unwrap();
        let reparsed = parse_forest(&forest.to_figs_text()).unwrap();
        assert_eq!(forest, reparsed);
    }
}
