use claimlogic::figs::LayoutKind;
use claimlogic::{
    BatchMetrics, BooleanCandidate, CompileResult, ForestLayout, RiskLevel, RuleExecutionResult, TokenType, TraceResult,
    ValidationResult,
};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub struct Report {
    palette: ansi::Palette,
}

impl Report {
    pub fn new(color: bool) -> Self {
        Self { palette: ansi::Palette::new(color) }
    }

    fn section(&self, title: &str) {
        println!("\n{}", self.palette.paint(format!("━━━ {} ━━━", title), ansi::GRAY));
    }

    pub fn model_header(&self, source: &str, layout: &ForestLayout, trees: usize) {
        let p = &self.palette;
        println!("\n{}", p.bold(p.paint(format!("🌲 Model: {}", source), ansi::CYAN)));
        println!(
            "  {} {}  {} {}",
            p.dim("trees:"),
            p.paint(trees.to_string(), ansi::BLUE),
            p.dim("nodes:"),
            p.paint(layout.nodes.len().to_string(), ansi::BLUE)
        );
    }

    pub fn boolean_candidates(&self, candidates: &[BooleanCandidate], applied: bool) {
        let p = &self.palette;
        self.section("Boolean splits");
        if candidates.is_empty() {
            println!("  {}", p.dim("none detected"));
            return;
        }
        for c in candidates {
            let arrow = if applied { p.paint("→", ansi::GREEN) } else { p.dim("(kept)") };
            println!(
                "  {} {} {} {}",
                p.paint(format!("t{} {}", c.tree_index, c.path), ansi::GRAY),
                p.paint(&c.condition, ansi::YELLOW),
                arrow,
                if applied { p.paint(c.rewritten(), ansi::GREEN) } else { String::new() }
            );
        }
    }

    pub fn trace(&self, index: usize, trace: &TraceResult, layout: &ForestLayout) {
        let p = &self.palette;
        let name = if trace.claim_number.is_empty() {
            format!("record {}", index + 1)
        } else {
            trace.claim_number.clone()
        };
        self.section(&format!("Claim {}", name));

        for path in &trace.paths {
            println!("  {}", p.paint(format!("Tree #{}", path.tree_index), ansi::BLUE));
            for id in &path.node_ids {
                let Some(node) = layout.node(id) else {
                    continue;
                };
                let indent = "  ".repeat(node.depth + 2);
                match &node.kind {
                    LayoutKind::Decision { .. } => {
                        let took_true = path.node_ids.iter().any(|other| *other == format!("{}-1", id));
                        let branch = if took_true { p.paint("yes", ansi::GREEN) } else { p.paint("no", ansi::RED) };
                        println!("{}{} {} {}", indent, p.paint(&node.label, ansi::YELLOW), p.dim("→"), branch);
                    }
                    LayoutKind::Leaf { .. } => {
                        println!("{}{}", indent, p.paint(&node.label, ansi::MAGENTA));
                    }
                }
            }
        }

        let risk_color = match trace.risk_level {
            RiskLevel::High => ansi::RED,
            RiskLevel::Moderate => ansi::YELLOW,
            RiskLevel::Low => ansi::GREEN,
        };
        println!(
            "  {} {}  │  {} {}  │  {} {}",
            p.dim("score:"),
            p.paint(format!("{:+.4}", trace.total_score), ansi::CYAN),
            p.dim("probability:"),
            p.paint(format!("{:.4}", trace.probability), ansi::CYAN),
            p.dim("risk:"),
            p.bold(p.paint(trace.risk_level.as_str(), risk_color))
        );
    }

    pub fn expression(&self, text: &str, validation: &ValidationResult) {
        let p = &self.palette;
        println!("\n{}", p.bold(p.paint(format!("⚙  Rule: \"{}\"", text), ansi::CYAN)));
        self.section("Tokens");

        for (idx, token) in validation.tokens.iter().enumerate() {
            let color = match token.token_type {
                TokenType::Field => ansi::BLUE,
                TokenType::Operator => ansi::MAGENTA,
                TokenType::Value => ansi::GREEN,
                TokenType::Connector => ansi::CYAN,
                TokenType::Unknown => ansi::YELLOW,
            };
            println!(
                "  {} {} {} {} {}",
                p.paint(format!("[{}]", idx), ansi::GRAY),
                p.paint(format!("{:<9}", token.token_type.as_str()), color),
                p.bold(&token.value),
                p.dim("│"),
                p.paint(format!("span {}..{}", token.start, token.end), ansi::YELLOW),
            );
            if let Some(message) = &token.error_message {
                println!("      {} {}", p.paint("✗", ansi::RED), p.paint(message, ansi::RED));
            }
        }

        if validation.is_valid {
            println!("  {}", p.paint("✓ valid", ansi::GREEN));
        } else {
            let message = validation.error_message.as_deref().unwrap_or("invalid expression");
            println!("  {} {}", p.paint("✗", ansi::RED), p.paint(message, ansi::RED));
            println!("  {} {:?}", p.dim("expected next:"), validation.expected);
        }
    }

    pub fn compiled(&self, result: &CompileResult) {
        let p = &self.palette;
        self.section("Compiled");
        for error in &result.errors {
            println!("  {} {}", p.paint("✗", ansi::RED), error);
        }
        for rule in &result.rules {
            println!("  {} {}", p.paint(rule.id(), ansi::CYAN), p.bold(rule.describe()));
        }
    }

    pub fn execution(&self, index: usize, result: &RuleExecutionResult) {
        let p = &self.palette;
        let severity = match result.max_severity {
            Some(s) => p.bold(p.paint(s.as_str(), ansi::RED)),
            None => p.dim("none"),
        };
        let label = p.paint(format!("[record {}]", index + 1), ansi::GRAY);
        println!("  {} {} {}", label, p.dim("max severity:"), severity);

        for evaluation in &result.results {
            let mark = if evaluation.matched { p.paint("✓", ansi::GREEN) } else { p.dim("✗") };
            println!("    {} {}", mark, p.paint(&evaluation.rule_id, ansi::CYAN));
            for c in &evaluation.conditions {
                let expected = c.expected_value.as_ref().map(|v| v.to_string()).unwrap_or_default();
                println!(
                    "      {} {} {} {} {} {}",
                    if c.passed { p.paint("•", ansi::GREEN) } else { p.paint("•", ansi::RED) },
                    p.paint(&c.field, ansi::BLUE),
                    c.operator,
                    expected,
                    p.dim("│ actual:"),
                    p.paint(c.actual_value.to_string(), ansi::YELLOW)
                );
            }
        }
    }

    pub fn timing(&self, metrics: &BatchMetrics) {
        let p = &self.palette;
        self.section("Timing");
        println!(
            "  Total: {}  │  Records: {}  │  Chunks: {}  │  Workers: {}",
            p.paint(format!("{:?}", metrics.total), ansi::GREEN),
            p.paint(metrics.records.to_string(), ansi::CYAN),
            p.dim(metrics.chunks.to_string()),
            p.dim(metrics.workers.to_string()),
        );
        println!();
    }
}
