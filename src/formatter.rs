//! Text rendering of declarations, files and packages.
//!
//! A declaration renders as a `Lines:` / `Docstring:` / `Code:` block followed by optional
//! sections separated by blank lines. Cross-file sections (implementers, references, call
//! hierarchy) are only produced for files inside the active workspace and never abort the
//! rendering: collaborator failures show up inline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cache::{ParseCache, SourceFile};
use crate::decls::{Declaration, FunctionDecl};
use crate::error::Result;
use crate::intel::{parse_locations, CodeIntel};
use crate::module::GoPackage;
use crate::position::resolve_position;
use crate::references::{group_references, RefScope};
use crate::scope::{render_hierarchy, scope_hierarchy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSpan {
    /// Functions show only their signature; other declarations are always shown whole.
    Signature,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    pub references: bool,
    pub implementers: bool,
    pub methods: bool,
    pub scope: bool,
    pub call_hierarchy: bool,
    pub code: CodeSpan,
}

impl FormatOptions {
    /// Every section on; used for a directly inspected declaration.
    pub fn full() -> Self {
        Self {
            references: true,
            implementers: true,
            methods: true,
            scope: true,
            call_hierarchy: true,
            code: CodeSpan::Signature,
        }
    }

    /// No extra sections; used for file listings.
    pub fn plain() -> Self {
        Self {
            references: false,
            implementers: false,
            methods: false,
            scope: false,
            call_hierarchy: false,
            code: CodeSpan::Signature,
        }
    }

    /// Whole body, no extra sections; used for declarations nested in another's output.
    pub fn nested() -> Self {
        Self {
            code: CodeSpan::Full,
            ..Self::plain()
        }
    }
}

pub struct DeclarationFormatter<'a> {
    cache: &'a ParseCache,
    intel: &'a dyn CodeIntel,
    workspace: Option<PathBuf>,
}

impl<'a> DeclarationFormatter<'a> {
    pub fn new(cache: &'a ParseCache, intel: &'a dyn CodeIntel, workspace: Option<&Path>) -> Self {
        Self {
            cache,
            intel,
            workspace: workspace.map(canonical),
        }
    }

    fn in_workspace(&self, path: &Path) -> bool {
        match &self.workspace {
            Some(root) => canonical(path).starts_with(root),
            None => false,
        }
    }

    pub fn format(&self, file: &SourceFile, decl: &Declaration, opts: FormatOptions) -> String {
        let mut sections = vec![self.head(file, decl, opts.code)];
        let span = decl.span();
        let cross_file = self.in_workspace(file.path());

        match decl {
            Declaration::Function(f) => {
                if opts.references && cross_file {
                    sections.push(self.references_section("References:", file, span.start_line, &f.name));
                }
                if opts.call_hierarchy && cross_file {
                    sections.push(self.call_hierarchy_section(file, span.start_line, &f.name));
                }
            }
            Declaration::Type(t) => {
                if t.is_interface && opts.implementers && cross_file {
                    sections.push(self.implementers_section(file, span.start_line, &t.name));
                }
                if opts.methods {
                    for method in file.functions() {
                        let owned = method
                            .receiver
                            .as_ref()
                            .is_some_and(|r| r.type_name == t.name);
                        if owned {
                            let method = Declaration::Function(method);
                            sections.push(self.format(file, &method, FormatOptions::nested()));
                        }
                    }
                }
                if opts.references && cross_file {
                    sections.push(self.references_section("References:", file, span.start_line, &t.name));
                }
            }
            Declaration::Value(v) => {
                if opts.scope {
                    let frames = scope_hierarchy(file, span.start_line);
                    sections.push(format!("Scope:\n{}", render_hierarchy(&frames)));
                }
                if opts.references && cross_file {
                    for name in &v.names {
                        let label = if v.names.len() > 1 {
                            format!("References to {name}:")
                        } else {
                            "References:".to_string()
                        };
                        sections.push(self.references_section(&label, file, span.start_line, name));
                    }
                }
            }
        }

        sections.join("\n\n")
    }

    fn head(&self, file: &SourceFile, decl: &Declaration, code: CodeSpan) -> String {
        let span = decl.span();
        let mut out = if span.end_line > span.start_line {
            format!("Lines: {}-{}\n", span.start_line, span.end_line)
        } else {
            format!("Lines: {}\n", span.start_line)
        };

        if let Some(doc) = decl.doc() {
            out.push_str(&format!("Docstring: {}\n", doc.trim()));
        }

        out.push_str("Code:\n");
        match (decl, code) {
            (Declaration::Function(f), CodeSpan::Signature) => out.push_str(&signature(file, f)),
            _ => out.push_str(&file.lines(span.start_line, span.end_line)),
        }
        out
    }

    fn references_section(&self, label: &str, file: &SourceFile, line: usize, name: &str) -> String {
        let mut out = format!("{label}\n");
        let position = match resolve_position(file.path(), line, name) {
            Ok(p) => p,
            Err(e) => {
                out.push_str(&format!("Failed to find references: {e}"));
                return out;
            }
        };
        let raw = match self.intel.references(&position) {
            Ok(raw) => raw,
            Err(e) => {
                out.push_str(&e.to_string());
                return out;
            }
        };

        let groups = group_references(self.cache, &raw);
        if groups.is_empty() {
            out.push_str("No references found");
            return out;
        }

        let mut rendered = Vec::with_capacity(groups.len());
        for group in groups {
            match (&group.key.scope, group.function) {
                (RefScope::Function { .. }, Some(f)) => {
                    let owner = self.cache.get_or_parse(&group.key.path);
                    match owner {
                        Ok(owner) => {
                            let decl = Declaration::Function(f);
                            rendered.push(indent(&self.format(&owner, &decl, FormatOptions::nested())));
                        }
                        Err(e) => rendered.push(format!(
                            "  Error parsing file {}: {e}",
                            group.key.path.display()
                        )),
                    }
                }
                _ => rendered.push(format!("  Package scope: {}", group.key.path.display())),
            }
        }
        out.push_str(&rendered.join("\n\n"));
        out
    }

    fn implementers_section(&self, file: &SourceFile, line: usize, name: &str) -> String {
        let mut out = String::from("Implementers:\n");
        let position = match resolve_position(file.path(), line, name) {
            Ok(p) => p,
            Err(e) => {
                out.push_str(&format!("Failed to find implementers: {e}"));
                return out;
            }
        };
        let raw = match self.intel.implementers(&position) {
            Ok(raw) => raw,
            Err(e) => {
                out.push_str(&e.to_string());
                return out;
            }
        };

        let mut by_file: BTreeMap<PathBuf, Vec<usize>> = BTreeMap::new();
        for loc in parse_locations(&raw) {
            let lines = by_file.entry(loc.path).or_default();
            if !lines.contains(&loc.line) {
                lines.push(loc.line);
            }
        }
        if by_file.is_empty() {
            out.push_str("No implementers found");
            return out;
        }

        let mut rendered = Vec::new();
        for (path, lines) in by_file {
            let owner = match self.cache.get_or_parse(&path) {
                Ok(owner) => owner,
                Err(e) => {
                    rendered.push(format!("  Error parsing file {}: {e}", path.display()));
                    continue;
                }
            };
            let decls = owner.declarations();
            for line in lines {
                let found = decls
                    .iter()
                    .find(|d| matches!(d, Declaration::Type(_)) && d.contains_line(line));
                match found {
                    Some(decl) => rendered.push(indent(&self.format(&owner, decl, FormatOptions::plain()))),
                    None => rendered.push(format!("  No type found at {}:{line}", path.display())),
                }
            }
        }
        out.push_str(&rendered.join("\n\n"));
        out
    }

    fn call_hierarchy_section(&self, file: &SourceFile, line: usize, name: &str) -> String {
        let mut out = String::from("Call Hierarchy:\n");
        let result = resolve_position(file.path(), line, name)
            .and_then(|position| self.intel.call_hierarchy(&position));
        match result {
            Ok(text) if text.trim().is_empty() => out.push_str("No call hierarchy found"),
            Ok(text) => out.push_str(text.trim_end()),
            Err(e) => out.push_str(&format!("Failed to find call hierarchy: {e}")),
        }
        out
    }

    /// Render a whole file: path, file doc, optional imports, then each eligible
    /// declaration in source order.
    pub fn format_file(&self, file: &SourceFile, include_private: bool, include_imports: bool) -> String {
        let mut blocks = vec![format!("File: {}", file.path().display())];

        if let Some(doc) = file.file_doc() {
            blocks.push(format!("File Docstring:\n{}", doc.trim()));
        }

        if include_imports {
            let imports = file.imports();
            if !imports.is_empty() {
                blocks.push(format!("Imports:\n{}", imports.join("\n")));
            }
        }

        for decl in file.declarations() {
            if include_private || decl.is_public() {
                blocks.push(self.format(file, &decl, FormatOptions::plain()));
            }
        }

        blocks.join("\n\n")
    }

    pub fn format_package(&self, package: &GoPackage, include_private: bool) -> Result<String> {
        let mut files = Vec::with_capacity(package.files.len());
        for path in &package.files {
            let file = self.cache.get_or_parse(path)?;
            files.push(self.format_file(&file, include_private, false));
        }

        Ok(format!(
            "Directory: {}\nImport Path: {}\n\n\n{}",
            package.dir.display(),
            package.import_path,
            files.join("\n---\n")
        ))
    }
}

/// Signature lines from `func` through the body's opening brace, with the brace dropped.
fn signature(file: &SourceFile, f: &FunctionDecl) -> String {
    let raw = file.lines(f.span.start_line, f.signature_end_line);
    let trimmed = raw.trim();
    match trimmed.strip_suffix('{') {
        Some(rest) => rest.trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// Indent every non-empty line by two spaces.
fn indent(text: &str) -> String {
    text.lines()
        .filter(|l| !l.is_empty())
        .map(|l| format!("  {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intel::testing::StubIntel;
    use std::sync::Arc;
    use tempfile::TempDir;

    const SHAPES: &str = r#"package shapes

// Shape has an area.
type Shape interface {
	Area() float64
}

// Square is a square.
type Square struct {
	Side float64
}

// Area returns the area.
func (s Square) Area() float64 {
	return s.Side * s.Side
}

func describe(s Shape) string {
	var (
		label, unit = "area", "m2"
	)
	_ = unit
	return label
}
"#;

    struct Fixture {
        _tmp: TempDir,
        root: PathBuf,
        path: PathBuf,
        cache: ParseCache,
        intel: StubIntel,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let root = std::fs::canonicalize(tmp.path()).unwrap();
            let path = root.join("shapes.go");
            std::fs::write(&path, SHAPES).unwrap();
            Self {
                _tmp: tmp,
                root,
                path,
                cache: ParseCache::new(),
                intel: StubIntel::default(),
            }
        }

        fn file(&self) -> Arc<SourceFile> {
            self.cache.get_or_parse(&self.path).unwrap()
        }

        fn decl(&self, name: &str) -> Declaration {
            self.file()
                .declarations()
                .into_iter()
                .find(|d| d.has_name(name))
                .unwrap()
        }

        fn formatter(&self) -> DeclarationFormatter<'_> {
            DeclarationFormatter::new(&self.cache, &self.intel, Some(&self.root))
        }
    }

    #[test]
    fn function_signature_without_brace() {
        let fx = Fixture::new();
        let out = fx
            .formatter()
            .format(&fx.file(), &fx.decl("describe"), FormatOptions::plain());
        assert_eq!(out, "Lines: 18-24\nCode:\nfunc describe(s Shape) string");
    }

    #[test]
    fn nested_mode_shows_body() {
        let fx = Fixture::new();
        let out = fx
            .formatter()
            .format(&fx.file(), &fx.decl("Area"), FormatOptions::nested());
        assert_eq!(
            out,
            "Lines: 14-16\nDocstring: Area returns the area.\nCode:\nfunc (s Square) Area() float64 {\n\treturn s.Side * s.Side\n}"
        );
    }

    #[test]
    fn interface_lists_implementers() {
        let fx = Fixture::new();
        fx.intel
            .respond("implementation", &fx.path, 4, &format!("{}:9:6-12", fx.path.display()));
        let out = fx
            .formatter()
            .format(&fx.file(), &fx.decl("Shape"), FormatOptions::full());

        assert!(out.contains("Implementers:\n  Lines: 9-11\n  Docstring: Square is a square.\n  Code:\n  type Square struct {"));
        assert!(out.contains("References:\nNo references found"));
    }

    #[test]
    fn struct_has_no_implementers_but_shows_methods() {
        let fx = Fixture::new();
        let out = fx
            .formatter()
            .format(&fx.file(), &fx.decl("Square"), FormatOptions::full());

        assert!(!out.contains("Implementers:"));
        assert!(out.contains("Lines: 14-16\nDocstring: Area returns the area.\nCode:\nfunc (s Square) Area() float64 {"));
        assert!(!fx.intel.calls().iter().any(|c| c.starts_with("implementation")));
    }

    #[test]
    fn references_are_grouped_and_indented() {
        let fx = Fixture::new();
        let p = fx.path.display().to_string();
        fx.intel.respond(
            "references",
            &fx.path,
            9,
            &format!("{p}:18:17-22\n{p}:14:9-15\n{p}:9:6-12\n"),
        );
        let out = fx
            .formatter()
            .format(&fx.file(), &fx.decl("Square"), FormatOptions::full());

        let refs = out.split("References:\n").nth(1).unwrap();
        assert!(refs.starts_with("  Lines: 14-16\n  Docstring: Area returns the area.\n  Code:\n  func (s Square) Area() float64 {"));
        assert!(refs.contains("\n\n  Lines: 18-24\n"));
        assert!(refs.ends_with(&format!("\n\n  Package scope: {p}")));
    }

    #[test]
    fn collaborator_failure_is_inline() {
        let fx = Fixture::new();
        fx.intel.fail("references", &fx.path, 18, "exit status 2");
        let out = fx
            .formatter()
            .format(&fx.file(), &fx.decl("describe"), FormatOptions::full());
        assert!(out.contains("References:\ngopls references failed: exit status 2"));
        assert!(out.contains("Call Hierarchy:\nNo call hierarchy found"));
    }

    #[test]
    fn multi_name_value_gets_scope_and_per_name_references() {
        let fx = Fixture::new();
        let file = fx.file();
        let label = file
            .local_values()
            .into_iter()
            .find(|d| d.has_name("label"))
            .unwrap();
        let out = fx.formatter().format(&file, &label, FormatOptions::full());

        assert!(out.starts_with("Lines: 20\nCode:\n\t\tlabel, unit = \"area\", \"m2\"\n\nScope:\npackage shapes\n  function describe (lines 18-24)"));
        assert!(out.contains("References to label:\nNo references found"));
        assert!(out.contains("References to unit:\nNo references found"));
    }

    #[test]
    fn outside_workspace_skips_cross_file_sections() {
        let fx = Fixture::new();
        let elsewhere = TempDir::new().unwrap();
        let f = DeclarationFormatter::new(&fx.cache, &fx.intel, Some(elsewhere.path()));
        let out = f.format(&fx.file(), &fx.decl("Shape"), FormatOptions::full());
        assert!(!out.contains("Implementers:"));
        assert!(!out.contains("References:"));
        assert!(fx.intel.calls().is_empty());
    }

    #[test]
    fn file_rendering_filters_private() {
        let fx = Fixture::new();
        let public = fx.formatter().format_file(&fx.file(), false, true);
        assert!(public.starts_with(&format!("File: {}\n\n", fx.path.display())));
        assert!(public.contains("type Shape interface"));
        assert!(public.contains("func (s Square) Area() float64"));
        assert!(!public.contains("func describe"));

        let all = fx.formatter().format_file(&fx.file(), true, true);
        assert!(all.contains("func describe(s Shape) string"));
        assert!(fx.intel.calls().is_empty(), "file listings never consult the collaborator");
    }

    #[test]
    fn package_rendering_separates_files() {
        let fx = Fixture::new();
        let extra = fx.root.join("extra.go");
        std::fs::write(&extra, "package shapes\n\n// Pi is pi.\nconst Pi = 3.14\n").unwrap();
        let pkg = GoPackage {
            dir: fx.root.clone(),
            import_path: "example.com/shapes".to_string(),
            name: "shapes".to_string(),
            files: vec![extra.clone(), fx.path.clone()],
        };

        let out = fx.formatter().format_package(&pkg, false).unwrap();
        assert!(out.starts_with(&format!(
            "Directory: {}\nImport Path: example.com/shapes\n\n\nFile: {}",
            fx.root.display(),
            extra.display()
        )));
        assert!(out.contains("Docstring: Pi is pi.\nCode:\nconst Pi = 3.14\n---\nFile: "));
    }

    #[test]
    fn rendering_is_deterministic() {
        let fx = Fixture::new();
        let p = fx.path.display().to_string();
        fx.intel
            .respond("references", &fx.path, 4, &format!("{p}:18:17-22\n{p}:14:9-15\n"));
        let f = fx.formatter();
        let a = f.format(&fx.file(), &fx.decl("Shape"), FormatOptions::full());
        let b = f.format(&fx.file(), &fx.decl("Shape"), FormatOptions::full());
        assert_eq!(a, b);
    }
}
