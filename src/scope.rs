//! Nested lexical scopes (package, type, function, block constructs) enclosing a line.

use std::fmt;

use tree_sitter::Node;

use crate::cache::SourceFile;
use crate::decls::{end_line, is_function_node, start_line, top_level_nodes, Declaration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    If,
    For,
    Range,
    Switch,
    TypeSwitch,
    Select,
    Block,
}

impl BlockKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::For => "for",
            BlockKind::Range => "range",
            BlockKind::Switch => "switch",
            BlockKind::TypeSwitch => "type-switch",
            BlockKind::Select => "select",
            BlockKind::Block => "block",
        }
    }

    fn of(node: Node) -> Option<Self> {
        let kind = match node.kind() {
            "if_statement" => BlockKind::If,
            "for_statement" => {
                let mut cursor = node.walk();
                let ranged = node
                    .named_children(&mut cursor)
                    .any(|c| c.kind() == "range_clause");
                if ranged {
                    BlockKind::Range
                } else {
                    BlockKind::For
                }
            }
            "expression_switch_statement" => BlockKind::Switch,
            "type_switch_statement" => BlockKind::TypeSwitch,
            "select_statement" => BlockKind::Select,
            "block" if !is_construct_body(node) => BlockKind::Block,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Package,
    Type,
    Function,
    Method,
    Block { construct: BlockKind },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFrame {
    pub kind: FrameKind,
    pub label: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl fmt::Display for ScopeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// A block owned by a function, literal, `if`/`for`, or case clause is that construct's
/// body and gets no frame of its own.
fn is_construct_body(block: Node) -> bool {
    let Some(mut parent) = block.parent() else {
        return false;
    };
    if parent.kind() == "statement_list" {
        match parent.parent() {
            Some(p) => parent = p,
            None => return false,
        }
    }
    matches!(
        parent.kind(),
        "function_declaration"
            | "method_declaration"
            | "func_literal"
            | "if_statement"
            | "for_statement"
            | "expression_case"
            | "default_case"
            | "type_case"
            | "communication_case"
    )
}

fn contains(node: Node, line: usize) -> bool {
    line >= start_line(node) && line <= end_line(node)
}

/// Build the scope chain for `line`, outermost first. The package frame is always present.
pub fn scope_hierarchy(file: &SourceFile, line: usize) -> Vec<ScopeFrame> {
    let package = file.package_name().unwrap_or_default();
    let mut frames = vec![ScopeFrame {
        kind: FrameKind::Package,
        label: format!("package {package}"),
        start_line: 1,
        end_line: file.line_count(),
    }];

    let decls = file.declarations();
    for decl in &decls {
        if let Declaration::Type(t) = decl {
            if t.span.contains(line) {
                frames.push(ScopeFrame {
                    kind: FrameKind::Type,
                    label: format!("type {} (lines {}-{})", t.name, t.span.start_line, t.span.end_line),
                    start_line: t.span.start_line,
                    end_line: t.span.end_line,
                });
            }
        }
    }

    for node in top_level_nodes(file.root()) {
        if !is_function_node(node) || !contains(node, line) {
            continue;
        }
        let Some(Declaration::Function(f)) = decls
            .iter()
            .find(|d| matches!(d, Declaration::Function(f) if f.span.start_line == start_line(node)))
        else {
            continue;
        };

        let (kind, label) = match &f.receiver {
            Some(recv) => (
                FrameKind::Method,
                format!("method {recv}.{} (lines {}-{})", f.name, f.span.start_line, f.span.end_line),
            ),
            None => (
                FrameKind::Function,
                format!("function {} (lines {}-{})", f.name, f.span.start_line, f.span.end_line),
            ),
        };
        frames.push(ScopeFrame {
            kind,
            label,
            start_line: f.span.start_line,
            end_line: f.span.end_line,
        });

        if let Some(body) = node.child_by_field_name("body") {
            collect_block_frames(body, line, &mut frames);
        }
    }

    frames
}

fn collect_block_frames(node: Node, line: usize, frames: &mut Vec<ScopeFrame>) {
    if !contains(node, line) {
        return;
    }
    if let Some(construct) = BlockKind::of(node) {
        let (start, end) = (start_line(node), end_line(node));
        frames.push(ScopeFrame {
            kind: FrameKind::Block { construct },
            label: format!("{} (lines {start}-{end})", construct.as_str()),
            start_line: start,
            end_line: end,
        });
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_block_frames(child, line, frames);
    }
}

/// Render the chain one frame per line, indented two spaces per depth.
pub fn render_hierarchy(frames: &[ScopeFrame]) -> String {
    frames
        .iter()
        .enumerate()
        .map(|(depth, frame)| format!("{}{}", "  ".repeat(depth), frame.label))
        .collect::<Vec<_>>()
        .join("\n")
}
