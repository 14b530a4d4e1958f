//! Process-lifetime cache of parsed Go files.
//!
//! Keyed by absolute path. An entry is reused while the file's modification time is not
//! newer than the one recorded at parse time; otherwise the file is parsed again and the
//! entry replaced. One reader/writer lock guards the whole map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use tree_sitter::{Node, Parser, Tree};

use crate::decls::{collect_syntax_issues, SyntaxIssue};
use crate::error::{InspectError, Result};

/// A parsed Go source file. Immutable once built.
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    source: String,
    tree: Tree,
    modified: SystemTime,
    syntax_issues: Vec<SyntaxIssue>,
}

impl SourceFile {
    /// Parse `source` as Go. Syntax errors still produce a (partial) tree.
    pub fn parse(path: impl Into<PathBuf>, source: String, modified: SystemTime) -> Result<Self> {
        let path = path.into();
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::language())
            .map_err(|e| InspectError::ParseFailure {
                path: path.clone(),
                reason: format!("failed to set tree-sitter language: {e}"),
            })?;

        let tree = parser
            .parse(source.as_str(), None)
            .ok_or_else(|| InspectError::ParseFailure {
                path: path.clone(),
                reason: "no syntax tree generated".to_string(),
            })?;

        let syntax_issues = collect_syntax_issues(tree.root_node(), source.as_bytes());

        Ok(Self {
            path,
            source,
            tree,
            modified,
            syntax_issues,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn syntax_issues(&self) -> &[SyntaxIssue] {
        &self.syntax_issues
    }

    pub fn has_syntax_errors(&self) -> bool {
        !self.syntax_issues.is_empty()
    }

    /// Number of lines, counting a trailing empty line after a final newline.
    pub fn line_count(&self) -> usize {
        self.source.split('\n').count()
    }

    /// Raw text of the 1-based inclusive line range, joined with `\n`.
    pub fn lines(&self, start: usize, end: usize) -> String {
        self.source
            .lines()
            .enumerate()
            .skip(start.saturating_sub(1))
            .take_while(|(idx, _)| idx + 1 <= end)
            .map(|(_, l)| l)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn node_text(&self, node: Node) -> &str {
        node_text(self.source.as_bytes(), node)
    }
}

pub(crate) fn node_text<'a>(source: &'a [u8], node: Node) -> &'a str {
    let start = node.start_byte();
    let end = node.end_byte();
    std::str::from_utf8(&source[start..end]).unwrap_or("")
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub cached_files: usize,
    pub files: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ParseCache {
    entries: RwLock<HashMap<PathBuf, Arc<SourceFile>>>,
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached parse of `path`, parsing (or reparsing a stale entry) on demand.
    pub fn get_or_parse(&self, path: &Path) -> Result<Arc<SourceFile>> {
        let abs: PathBuf = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let cached = self.entries.read().get(&abs).cloned();
        if let Some(entry) = cached {
            match std::fs::metadata(&abs).and_then(|m| m.modified()) {
                Ok(mtime) if mtime <= entry.modified => {
                    crate::debug_log!("[gosight] cache hit: {}", abs.display());
                    return Ok(entry);
                }
                _ => crate::debug_log!("[gosight] cache stale: {}", abs.display()),
            }
        }

        // Stat before reading so a write racing the read leaves the entry stale, not fresh.
        let modified = std::fs::metadata(&abs)
            .and_then(|m| m.modified())
            .map_err(|e| InspectError::from_io(&abs, e))?;
        let raw = std::fs::read(&abs).map_err(|e| InspectError::from_io(&abs, e))?;
        let source = String::from_utf8_lossy(&raw).into_owned();

        let parsed = Arc::new(SourceFile::parse(abs.clone(), source, modified)?);
        crate::debug_log!(
            "[gosight] parsed {} ({} syntax issues)",
            abs.display(),
            parsed.syntax_issues().len()
        );

        self.entries.write().insert(abs, Arc::clone(&parsed));
        Ok(parsed)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Drop the entry for `path`. Returns whether one existed.
    pub fn remove(&self, path: &Path) -> bool {
        self.entries.write().remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let guard = self.entries.read();
        let mut files: Vec<String> = guard.keys().map(|p| p.to_string_lossy().to_string()).collect();
        files.sort();
        CacheStats {
            cached_files: guard.len(),
            files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, content).unwrap();
        p
    }

    fn bump_mtime(path: &Path, ahead: Duration) {
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + ahead).unwrap();
    }

    #[test]
    fn repeated_lookups_share_one_parse() {
        let tmp = TempDir::new().unwrap();
        let p = write(tmp.path(), "a.go", "package a\n\nfunc A() {}\n");
        let cache = ParseCache::new();

        let first = cache.get_or_parse(&p).unwrap();
        let second = cache.get_or_parse(&p).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn newer_mtime_forces_reparse() {
        let tmp = TempDir::new().unwrap();
        let p = write(tmp.path(), "a.go", "package a\n\nfunc A() {}\n");
        let cache = ParseCache::new();

        let first = cache.get_or_parse(&p).unwrap();
        std::fs::write(&p, "package a\n\nfunc B() {}\n").unwrap();
        bump_mtime(&p, Duration::from_secs(10));

        let second = cache.get_or_parse(&p).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.source().contains("func B"));
        assert_eq!(cache.len(), 1, "stale entry is replaced, not duplicated");
    }

    #[test]
    fn syntax_errors_still_yield_a_tree() {
        let tmp = TempDir::new().unwrap();
        let p = write(tmp.path(), "bad.go", "package bad\n\nfunc BadFunc( {\n    return\n}\n");
        let cache = ParseCache::new();

        let file = cache.get_or_parse(&p).unwrap();
        assert!(file.has_syntax_errors());
        assert_eq!(file.root().kind(), "source_file");
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let tmp = TempDir::new().unwrap();
        let cache = ParseCache::new();
        let err = cache.get_or_parse(&tmp.path().join("missing.go")).unwrap_err();
        assert!(matches!(err, InspectError::FileNotFound { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_and_remove() {
        let tmp = TempDir::new().unwrap();
        let a = write(tmp.path(), "a.go", "package a\n");
        let b = write(tmp.path(), "b.go", "package a\n");
        let cache = ParseCache::new();
        cache.get_or_parse(&a).unwrap();
        cache.get_or_parse(&b).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.cached_files, 2);
        assert!(stats.files[0].ends_with("a.go"));

        assert!(cache.remove(&a));
        assert!(!cache.remove(&a));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn lines_are_one_based_and_inclusive() {
        let file = SourceFile::parse("x.go", "l1\nl2\nl3\n".to_string(), SystemTime::now()).unwrap();
        assert_eq!(file.lines(2, 3), "l2\nl3");
        assert_eq!(file.lines(1, 1), "l1");
        assert_eq!(file.line_count(), 4);
    }

    #[test]
    fn concurrent_lookups_agree() {
        let tmp = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..4)
            .map(|i| write(tmp.path(), &format!("f{i}.go"), &format!("package p\n\nvar V{i} = {i}\n")))
            .collect();
        let cache = ParseCache::new();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for p in &paths {
                        cache.get_or_parse(p).unwrap();
                    }
                });
            }
        });

        assert_eq!(cache.len(), 4);
    }
}
