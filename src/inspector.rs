//! The inspection engine: turns a target string into rendered declaration text, and forwards
//! renames to the collaborator.

use std::path::Path;
use std::sync::Arc;

use crate::cache::{ParseCache, SourceFile};
use crate::config::{Config, GoToolchainConfig};
use crate::decls::Declaration;
use crate::error::{InspectError, Result};
use crate::formatter::{DeclarationFormatter, FormatOptions};
use crate::intel::{CodeIntel, GoplsCli};
use crate::module::load_package;
use crate::position::resolve_position;
use crate::target::{resolve_file_path, Target};

pub struct Inspector {
    cache: Arc<ParseCache>,
    intel: Arc<dyn CodeIntel>,
    toolchain: GoToolchainConfig,
}

impl Inspector {
    pub fn new(cache: Arc<ParseCache>, intel: Arc<dyn CodeIntel>) -> Self {
        Self {
            cache,
            intel,
            toolchain: GoToolchainConfig::default(),
        }
    }

    /// Engine backed by the `gopls` binary and toolchain named in `config`.
    pub fn from_config(cache: Arc<ParseCache>, config: &Config) -> Self {
        Self::new(cache, Arc::new(GoplsCli::from_config(config))).with_toolchain(config.go.clone())
    }

    pub fn with_toolchain(mut self, toolchain: GoToolchainConfig) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn cache(&self) -> &Arc<ParseCache> {
        &self.cache
    }

    /// Inspect `target` (see [`Target::parse`]) inside the absolute `workspace` root.
    pub fn inspect(&self, target: &str, workspace: &Path, include_private: bool) -> Result<String> {
        let target = Target::parse(target)?;
        self.inspect_target(&target, workspace, include_private)
    }

    pub fn inspect_target(&self, target: &Target, workspace: &Path, include_private: bool) -> Result<String> {
        if workspace.as_os_str().is_empty() {
            return Err(InspectError::invalid("workspace_dir is required for file analysis"));
        }
        if !workspace.is_absolute() {
            return Err(InspectError::invalid(format!(
                "workspace_dir must be an absolute path, got: {}",
                workspace.display()
            )));
        }

        let formatter = DeclarationFormatter::new(&self.cache, self.intel.as_ref(), Some(workspace));

        if target.is_file() {
            let path = resolve_file_path(&target.path, workspace)?;
            let file = self.cache.get_or_parse(&path)?;
            let warning = syntax_warning(&file);

            if target.line.is_none() && target.symbol.is_none() {
                return Ok(warning + &formatter.format_file(&file, include_private, true));
            }

            let symbol = target.symbol.as_deref();
            let Some(decl) = locate_declaration(&file, target.line, symbol) else {
                return Err(match (symbol, target.line) {
                    (Some(symbol), _) => InspectError::SymbolNotFound {
                        symbol: symbol.to_string(),
                        scope: format!("file {}", path.display()),
                    },
                    (None, line) => InspectError::NoDeclarationAtLine {
                        path,
                        line: line.unwrap_or_default(),
                    },
                });
            };
            return Ok(warning + &formatter.format(&file, &decl, FormatOptions::full()));
        }

        let package = load_package(&self.cache, &target.path, workspace, &self.toolchain)?;
        let Some(symbol) = target.symbol.as_deref() else {
            return formatter.format_package(&package, include_private);
        };

        for path in &package.files {
            let file = self.cache.get_or_parse(path)?;
            if let Some(decl) = file.declarations().into_iter().find(|d| d.has_name(symbol)) {
                return Ok(formatter.format(&file, &decl, FormatOptions::full()));
            }
        }

        Err(InspectError::SymbolNotFound {
            symbol: symbol.to_string(),
            scope: format!("package {}", package.import_path),
        })
    }

    /// Rename the symbol `old_name` found on `line` of `path` to `new_name`, delegating the
    /// edit to the collaborator.
    pub fn rename(&self, path: &Path, line: usize, old_name: &str, new_name: &str) -> Result<String> {
        if path.as_os_str().is_empty() {
            return Err(InspectError::invalid("file path cannot be empty"));
        }
        if line == 0 {
            return Err(InspectError::invalid(format!("line number must be positive, got {line}")));
        }
        if old_name.is_empty() {
            return Err(InspectError::invalid("symbol name cannot be empty"));
        }
        if new_name.is_empty() {
            return Err(InspectError::invalid("new name cannot be empty"));
        }

        if old_name == new_name {
            return Ok(format!("Symbol '{old_name}' already has the desired name"));
        }

        let position = resolve_position(path, line, old_name)?;
        let output = self.intel.rename(&position, new_name)?;
        // Every file gopls rewrote is dropped, not only the one holding the position.
        self.cache.remove(&position.path);
        let dir = position.path.parent().unwrap_or_else(|| Path::new("."));
        for changed in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
            self.cache.remove(&dir.join(changed));
        }

        if output.trim().is_empty() {
            Ok(format!("Symbol '{old_name}' renamed to '{new_name}'"))
        } else {
            Ok(output)
        }
    }
}

/// Find the declaration a file target points at.
///
/// With both a line and a symbol, a top-level declaration matching both wins, then a local
/// `var`/`const` matching both; otherwise the first top-level declaration that has the name
/// or spans the line.
pub fn locate_declaration(file: &SourceFile, line: Option<usize>, symbol: Option<&str>) -> Option<Declaration> {
    let decls = file.declarations();

    if let (Some(line), Some(symbol)) = (line, symbol) {
        let both = |d: &Declaration| d.has_name(symbol) && d.contains_line(line);
        if let Some(d) = decls.iter().find(|d| both(*d)) {
            return Some(d.clone());
        }
        if let Some(d) = file.local_values().into_iter().find(|d| both(d)) {
            return Some(d);
        }
    }

    decls.into_iter().find(|d| {
        symbol.is_some_and(|s| d.has_name(s)) || line.is_some_and(|l| d.contains_line(l))
    })
}

fn syntax_warning(file: &SourceFile) -> String {
    if !file.has_syntax_errors() {
        return String::new();
    }
    let issues: Vec<String> = file
        .syntax_issues()
        .iter()
        .map(|i| format!("{}:{}:{}: {}", file.path().display(), i.line, i.column, i.message))
        .collect();
    format!(
        "WARNING: Syntax errors found, analysis may be incomplete:\n{}\n\n",
        issues.join("\n")
    )
}
