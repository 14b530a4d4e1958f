//! Typed view over a parsed Go file: package clause, file doc, imports, and the
//! declarations (functions, methods, types, vars, consts) in source order.

use std::fmt;

use tree_sitter::Node;

use crate::cache::{node_text, SourceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Function,
    Method,
    Type,
    Variable,
    Constant,
}

impl DeclKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeclKind::Function => "function",
            DeclKind::Method => "method",
            DeclKind::Type => "type",
            DeclKind::Variable => "variable",
            DeclKind::Constant => "constant",
        }
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-based inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
}

impl Span {
    pub fn of(node: Node) -> Self {
        Self {
            start_line: start_line(node),
            end_line: end_line(node),
        }
    }

    pub fn contains(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }
}

pub(crate) fn start_line(node: Node) -> usize {
    node.start_position().row + 1
}

/// Last line a node occupies. An end point at column 0 belongs to the previous line.
pub(crate) fn end_line(node: Node) -> usize {
    let end = node.end_position();
    if end.column == 0 && end.row > node.start_position().row {
        end.row
    } else {
        end.row + 1
    }
}

/// The parenthesized `type (…)` / `var (…)` / `const (…)` block a spec belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub span: Span,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    pub type_name: String,
    pub pointer: bool,
}

impl fmt::Display for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pointer {
            write!(f, "*{}", self.type_name)
        } else {
            f.write_str(&self.type_name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub receiver: Option<Receiver>,
    pub span: Span,
    pub doc: Option<String>,
    /// Last line of the signature: the line holding the body's `{`, or the end of a
    /// body-less declaration.
    pub signature_end_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: String,
    pub is_interface: bool,
    pub span: Span,
    pub doc: Option<String>,
    pub group: Option<Group>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDecl {
    pub names: Vec<String>,
    pub constant: bool,
    /// Declared inside a function body.
    pub local: bool,
    pub span: Span,
    pub doc: Option<String>,
    pub group: Option<Group>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Function(FunctionDecl),
    Type(TypeDecl),
    Value(ValueDecl),
}

pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

impl Declaration {
    pub fn kind(&self) -> DeclKind {
        match self {
            Declaration::Function(f) if f.receiver.is_some() => DeclKind::Method,
            Declaration::Function(_) => DeclKind::Function,
            Declaration::Type(_) => DeclKind::Type,
            Declaration::Value(v) if v.constant => DeclKind::Constant,
            Declaration::Value(_) => DeclKind::Variable,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            Declaration::Function(f) => vec![f.name.as_str()],
            Declaration::Type(t) => vec![t.name.as_str()],
            Declaration::Value(v) => v.names.iter().map(String::as_str).collect(),
        }
    }

    /// First declared name.
    pub fn name(&self) -> &str {
        match self {
            Declaration::Function(f) => &f.name,
            Declaration::Type(t) => &t.name,
            Declaration::Value(v) => v.names.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.names().iter().any(|n| *n == name)
    }

    /// Public when any declared name is exported.
    pub fn is_public(&self) -> bool {
        self.names().iter().any(|n| is_exported(n))
    }

    pub fn span(&self) -> Span {
        match self {
            Declaration::Function(f) => f.span,
            Declaration::Type(t) => t.span,
            Declaration::Value(v) => v.span,
        }
    }

    pub fn contains_line(&self, line: usize) -> bool {
        self.span().contains(line)
    }

    pub fn group(&self) -> Option<&Group> {
        match self {
            Declaration::Function(_) => None,
            Declaration::Type(t) => t.group.as_ref(),
            Declaration::Value(v) => v.group.as_ref(),
        }
    }

    /// Own doc comment, falling back to the enclosing group's.
    pub fn doc(&self) -> Option<&str> {
        let own = match self {
            Declaration::Function(f) => f.doc.as_deref(),
            Declaration::Type(t) => t.doc.as_deref(),
            Declaration::Value(v) => v.doc.as_deref(),
        };
        own.or_else(|| self.group().and_then(|g| g.doc.as_deref()))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Declaration::Value(v) if v.local)
    }
}

/// One ERROR or MISSING node found in the tree. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

pub(crate) fn collect_syntax_issues(root: Node, source: &[u8]) -> Vec<SyntaxIssue> {
    let mut out = Vec::new();
    if root.has_error() {
        walk_syntax_issues(root, source, &mut out);
    }
    out
}

fn walk_syntax_issues(node: Node, source: &[u8], out: &mut Vec<SyntaxIssue>) {
    let pos = node.start_position();
    if node.is_missing() {
        out.push(SyntaxIssue {
            line: pos.row + 1,
            column: pos.column + 1,
            message: format!("expected {}", node.kind()),
        });
        return;
    }
    if node.is_error() {
        let snippet: String = node_text(source, node)
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .chars()
            .take(24)
            .collect();
        let message = if snippet.is_empty() {
            "syntax error".to_string()
        } else {
            format!("syntax error near `{snippet}`")
        };
        out.push(SyntaxIssue {
            line: pos.row + 1,
            column: pos.column + 1,
            message,
        });
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            walk_syntax_issues(child, source, out);
        }
    }
}

/// Named top-level nodes. Declarations swallowed by an ERROR node are still reachable.
pub(crate) fn top_level_nodes(root: Node) -> Vec<Node> {
    let mut out = Vec::new();
    collect_top_level(root, &mut out);
    out
}

fn collect_top_level<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.is_error() {
            collect_top_level(child, out);
        } else if child.is_named() {
            out.push(child);
        }
    }
}

impl SourceFile {
    pub fn package_name(&self) -> Option<String> {
        let root = self.root();
        let mut cursor = root.walk();
        let clause = root.children(&mut cursor).find(|n| n.kind() == "package_clause")?;
        let mut inner = clause.walk();
        let ident = clause
            .named_children(&mut inner)
            .find(|n| n.kind() == "package_identifier")?;
        Some(self.node_text(ident).to_string())
    }

    /// Comment group directly above the package clause.
    pub fn file_doc(&self) -> Option<String> {
        let root = self.root();
        let mut cursor = root.walk();
        let clause = root.children(&mut cursor).find(|n| n.kind() == "package_clause")?;
        doc_comment(self.source().as_bytes(), clause)
    }

    /// Import specs, each as the trimmed text of the lines it spans.
    pub fn imports(&self) -> Vec<String> {
        let mut out = Vec::new();
        for node in top_level_nodes(self.root()) {
            if node.kind() != "import_declaration" {
                continue;
            }
            for spec in specs_of(node, "import_spec") {
                let span = Span::of(spec);
                out.push(self.lines(span.start_line, span.end_line).trim().to_string());
            }
        }
        out
    }

    /// Top-level declarations in source order.
    pub fn declarations(&self) -> Vec<Declaration> {
        let source = self.source().as_bytes();
        let mut out = Vec::new();
        for node in top_level_nodes(self.root()) {
            declarations_from_node(source, node, false, &mut out);
        }
        out
    }

    /// `var` / `const` specs declared inside function bodies, in source order.
    pub fn local_values(&self) -> Vec<Declaration> {
        let source = self.source().as_bytes();
        let mut out = Vec::new();
        for node in top_level_nodes(self.root()) {
            if !is_function_node(node) {
                continue;
            }
            if let Some(body) = node.child_by_field_name("body") {
                collect_local_values(source, body, &mut out);
            }
        }
        out
    }

    pub fn functions(&self) -> Vec<FunctionDecl> {
        self.declarations()
            .into_iter()
            .filter_map(|d| match d {
                Declaration::Function(f) => Some(f),
                _ => None,
            })
            .collect()
    }
}

pub(crate) fn is_function_node(node: Node) -> bool {
    matches!(node.kind(), "function_declaration" | "method_declaration")
}

fn collect_local_values(source: &[u8], node: Node, out: &mut Vec<Declaration>) {
    if matches!(node.kind(), "var_declaration" | "const_declaration") {
        declarations_from_node(source, node, true, out);
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_local_values(source, child, out);
    }
}

fn declarations_from_node(source: &[u8], node: Node, local: bool, out: &mut Vec<Declaration>) {
    match node.kind() {
        "function_declaration" | "method_declaration" => {
            if let Some(f) = function_decl(source, node) {
                out.push(Declaration::Function(f));
            }
        }
        "type_declaration" => {
            let group = group_of(source, node);
            let specs = specs_of(node, "type_spec")
                .into_iter()
                .chain(specs_of(node, "type_alias"));
            let mut types: Vec<TypeDecl> = specs
                .filter_map(|spec| type_decl(source, node, spec, group.clone()))
                .collect();
            types.sort_by_key(|t| t.span.start_line);
            out.extend(types.into_iter().map(Declaration::Type));
        }
        "var_declaration" | "const_declaration" => {
            let constant = node.kind() == "const_declaration";
            let spec_kind = if constant { "const_spec" } else { "var_spec" };
            let group = group_of(source, node);
            for spec in specs_of(node, spec_kind) {
                if let Some(v) = value_decl(source, node, spec, constant, local, group.clone()) {
                    out.push(Declaration::Value(v));
                }
            }
        }
        _ => {}
    }
}

/// Specs of `kind` directly under a declaration or under its `*_spec_list` child.
fn specs_of<'t>(decl: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        if child.kind() == kind {
            out.push(child);
        } else if child.kind().ends_with("_spec_list") {
            let mut inner = child.walk();
            out.extend(child.named_children(&mut inner).filter(|n| n.kind() == kind));
        }
    }
    out
}

fn is_parenthesized(decl: Node) -> bool {
    let mut cursor = decl.walk();
    let found = decl
        .children(&mut cursor)
        .any(|c| c.kind() == "(" || c.kind().ends_with("_spec_list"));
    found
}

fn group_of(source: &[u8], decl: Node) -> Option<Group> {
    is_parenthesized(decl).then(|| Group {
        span: Span::of(decl),
        doc: doc_comment(source, decl),
    })
}

/// Own doc: the comments above the spec inside a group, or above the whole
/// declaration when it is not grouped.
fn spec_doc(source: &[u8], decl: Node, spec: Node) -> Option<String> {
    if is_parenthesized(decl) {
        doc_comment(source, spec)
    } else {
        doc_comment(source, decl)
    }
}

fn function_decl(source: &[u8], node: Node) -> Option<FunctionDecl> {
    let name = node_text(source, node.child_by_field_name("name")?).to_string();
    let span = Span::of(node);

    let receiver = if node.kind() == "method_declaration" {
        node.child_by_field_name("receiver")
            .and_then(|list| receiver_of(source, list))
    } else {
        None
    };

    let signature_end_line = match node.child_by_field_name("body") {
        Some(body) => {
            let pos = body.start_position();
            let line = if pos.column == 0 { pos.row } else { pos.row + 1 };
            line.max(span.start_line)
        }
        None => span.end_line,
    };

    Some(FunctionDecl {
        name,
        receiver,
        span,
        doc: doc_comment(source, node),
        signature_end_line,
    })
}

fn receiver_of(source: &[u8], list: Node) -> Option<Receiver> {
    let mut cursor = list.walk();
    let param = list
        .named_children(&mut cursor)
        .find(|n| n.kind() == "parameter_declaration")?;
    let ty = param.child_by_field_name("type")?;

    let (pointer, inner) = if ty.kind() == "pointer_type" {
        let mut c = ty.walk();
        let inner = ty.named_children(&mut c).next()?;
        (true, inner)
    } else {
        (false, ty)
    };

    // `T[K, V]` receivers keep only the base name.
    let base = if inner.kind() == "generic_type" {
        inner.child_by_field_name("type").unwrap_or(inner)
    } else {
        inner
    };
    let text = node_text(source, base);
    let type_name = text.split('[').next().unwrap_or(text).trim().to_string();

    Some(Receiver { type_name, pointer })
}

fn type_decl(source: &[u8], decl: Node, spec: Node, group: Option<Group>) -> Option<TypeDecl> {
    let name = node_text(source, spec.child_by_field_name("name")?).to_string();
    let is_interface = spec
        .child_by_field_name("type")
        .is_some_and(|t| t.kind() == "interface_type");
    Some(TypeDecl {
        name,
        is_interface,
        span: Span::of(spec),
        doc: spec_doc(source, decl, spec),
        group,
    })
}

fn value_decl(
    source: &[u8],
    decl: Node,
    spec: Node,
    constant: bool,
    local: bool,
    group: Option<Group>,
) -> Option<ValueDecl> {
    let mut cursor = spec.walk();
    let names: Vec<String> = spec
        .children_by_field_name("name", &mut cursor)
        .map(|n| node_text(source, n).to_string())
        .collect();
    if names.is_empty() {
        return None;
    }
    Some(ValueDecl {
        names,
        constant,
        local,
        span: Span::of(spec),
        doc: spec_doc(source, decl, spec),
        group,
    })
}

/// The comment group directly above `node`: contiguous comment siblings with no blank
/// line in between, excluding a comment that trails code on its line.
pub(crate) fn doc_comment(source: &[u8], node: Node) -> Option<String> {
    let mut comments: Vec<Node> = Vec::new();
    let mut next_row = node.start_position().row;
    let mut cur = node.prev_sibling();

    while let Some(c) = cur {
        if c.kind() != "comment" || c.end_position().row + 1 < next_row {
            break;
        }
        comments.push(c);
        next_row = c.start_position().row;
        cur = c.prev_sibling();
    }

    if let (Some(first), Some(prev)) = (comments.last(), cur) {
        let end = prev.end_position();
        if prev.kind() != "comment" && end.row == first.start_position().row && end.column > 0 {
            comments.pop();
        }
    }

    if comments.is_empty() {
        return None;
    }
    comments.reverse();

    let raw: Vec<&str> = comments.iter().map(|c| node_text(source, *c)).collect();
    let text = comment_text(&raw);
    (!text.is_empty()).then_some(text)
}

/// Strip comment markers the way Go doc tooling does: `//`, `/*`, `*/`, the first space
/// of a line comment, and tool directives. Runs of blank lines collapse to one.
fn comment_text(raw: &[&str]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for c in raw {
        if let Some(rest) = c.strip_prefix("//") {
            if is_directive(rest) {
                continue;
            }
            lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        } else if let Some(body) = c.strip_prefix("/*") {
            let body = body.strip_suffix("*/").unwrap_or(body);
            let body = body.trim_start_matches([' ', '\t']);
            lines.extend(body.split('\n').map(str::to_string));
        }
    }

    let mut out: Vec<String> = Vec::new();
    for line in lines {
        let line = line.trim_end().to_string();
        if line.is_empty() && out.last().map_or(true, |l: &String| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

fn is_directive(rest: &str) -> bool {
    if ["line ", "extern ", "export "].iter().any(|p| rest.starts_with(p)) {
        return true;
    }
    // `go:generate`, `nolint:errcheck`, ...
    let Some((head, tail)) = rest.split_once(':') else {
        return false;
    };
    !head.is_empty()
        && head.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && tail.chars().next().is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}
