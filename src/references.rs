//! Groups raw collaborator locations by the top-level function that encloses them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::cache::ParseCache;
use crate::decls::FunctionDecl;
use crate::intel::{parse_locations, Location};

/// Where a group of references lives. Ordering is by path, then function start line,
/// with the package-scope group of a path after its functions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScopeKey {
    pub path: PathBuf,
    pub scope: RefScope,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum RefScope {
    Function { start_line: usize, name: String },
    Package,
}

#[derive(Debug, Clone)]
pub struct ReferenceGroup {
    pub key: ScopeKey,
    /// The enclosing function, when the key is a function scope.
    pub function: Option<FunctionDecl>,
    pub locations: Vec<Location>,
}

/// Parse `raw` collaborator output and bucket each location by enclosing scope.
///
/// Files are parsed through `cache`; a file that cannot be read or parsed lands in its
/// package-scope group.
pub fn group_references(cache: &ParseCache, raw: &str) -> Vec<ReferenceGroup> {
    let mut groups: BTreeMap<ScopeKey, ReferenceGroup> = BTreeMap::new();

    for loc in parse_locations(raw) {
        let enclosing = match cache.get_or_parse(&loc.path) {
            Ok(file) => file
                .functions()
                .into_iter()
                .find(|f| f.span.contains(loc.line)),
            Err(e) => {
                crate::debug_log!("[gosight] reference in unreadable file {}: {e}", loc.path.display());
                None
            }
        };

        let key = ScopeKey {
            path: loc.path.clone(),
            scope: match &enclosing {
                Some(f) => RefScope::Function {
                    start_line: f.span.start_line,
                    name: f.name.clone(),
                },
                None => RefScope::Package,
            },
        };

        groups
            .entry(key.clone())
            .or_insert_with(|| ReferenceGroup {
                key,
                function: enclosing,
                locations: Vec::new(),
            })
            .locations
            .push(loc);
    }

    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MAIN: &str = "package main

var Global = helper()

func main() {
	x := helper()
	_ = x
}

func other() {
	helper()
	helper()
}
";

    #[test]
    fn groups_by_function_and_package_scope() {
        let tmp = TempDir::new().unwrap();
        let main = tmp.path().join("main.go");
        std::fs::write(&main, MAIN).unwrap();
        let m = main.display();

        let raw = format!("{m}:12:2-8\n{m}:3:15-21\n{m}:6:7-13\n{m}:11:2-8\n");
        let cache = ParseCache::new();
        let groups = group_references(&cache, &raw);

        let keys: Vec<&RefScope> = groups.iter().map(|g| &g.key.scope).collect();
        assert_eq!(
            keys,
            vec![
                &RefScope::Function { start_line: 5, name: "main".to_string() },
                &RefScope::Function { start_line: 10, name: "other".to_string() },
                &RefScope::Package,
            ]
        );
        assert_eq!(groups[1].locations.len(), 2);
        assert_eq!(groups[1].function.as_ref().map(|f| f.name.as_str()), Some("other"));
        assert!(groups[2].function.is_none());
    }

    #[test]
    fn unreadable_files_fall_back_to_package_scope() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("gone.go");
        let raw = format!("{}:4:1-3", missing.display());
        let groups = group_references(&ParseCache::new(), &raw);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key.scope, RefScope::Package);
        assert_eq!(groups[0].key.path, missing);
    }

    #[test]
    fn paths_sort_before_scopes() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.go");
        let b = tmp.path().join("b.go");
        std::fs::write(&a, "package p\n\nvar A = 1\n").unwrap();
        std::fs::write(&b, MAIN).unwrap();

        let raw = format!("{}:6:7-13\n{}:3:5-6\n", b.display(), a.display());
        let groups = group_references(&ParseCache::new(), &raw);
        assert_eq!(groups[0].key.path, a);
        assert_eq!(groups[1].key.path, b);
    }

    #[test]
    fn empty_output_has_no_groups() {
        assert!(group_references(&ParseCache::new(), "").is_empty());
    }
}
