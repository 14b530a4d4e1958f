//! Resolving a package target (directory or Go import path) to its source files.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use crate::cache::ParseCache;
use crate::config::GoToolchainConfig;
use crate::error::{InspectError, Result};
use crate::scanner::{scan_package_dir, Platform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoPackage {
    pub dir: PathBuf,
    pub import_path: String,
    /// Package clause name shared by `files`.
    pub name: String,
    /// Absolute paths, ordered by file name.
    pub files: Vec<PathBuf>,
}

/// The `go.mod` that governs a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoModule {
    pub root: PathBuf,
    pub path: String,
}

/// Walk up from `start` to the nearest `go.mod` and read its `module` directive.
pub fn find_go_mod(start: &Path) -> Option<GoModule> {
    for dir in start.ancestors() {
        let go_mod = dir.join("go.mod");
        let Ok(text) = std::fs::read_to_string(&go_mod) else {
            continue;
        };
        let path = text.lines().find_map(|line| {
            let line = line.split("//").next().unwrap_or("").trim();
            let rest = line.strip_prefix("module")?;
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }
            let name = rest.trim().trim_matches('"');
            (!name.is_empty()).then(|| name.to_string())
        })?;
        return Some(GoModule {
            root: dir.to_path_buf(),
            path,
        });
    }
    None
}

/// GOROOT from config, then the `GOROOT` environment variable, then `go env GOROOT`.
pub fn goroot(config: &GoToolchainConfig) -> Option<PathBuf> {
    if let Some(root) = &config.goroot {
        return Some(root.clone());
    }
    if let Some(root) = std::env::var_os("GOROOT").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(root));
    }

    let output = Command::new(&config.binary).args(["env", "GOROOT"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!root.is_empty()).then(|| PathBuf::from(root))
}

/// Lexically normalize `.` and `..` without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn is_relative_spec(spec: &str) -> bool {
    spec == "." || spec == ".." || spec.starts_with("./") || spec.starts_with("../")
}

/// Resolve a package target to a directory.
///
/// Relative (`.`, `./x`, `../x`) targets join the workspace and absolute ones are used as-is.
/// Import paths are tried against the enclosing module, its `vendor/` tree, then `$GOROOT/src`.
pub fn resolve_package_dir(spec: &str, workspace: &Path, config: &GoToolchainConfig) -> Result<PathBuf> {
    let spec = spec.trim_end_matches('/');
    if spec.is_empty() {
        return Err(InspectError::invalid("package path cannot be empty"));
    }

    if is_relative_spec(spec) || Path::new(spec).is_absolute() {
        let dir = normalize(&workspace.join(spec));
        if dir.is_dir() {
            return Ok(dir);
        }
        return Err(InspectError::ModuleNotFound(format!(
            "{spec} (no directory at {})",
            dir.display()
        )));
    }

    let module = find_go_mod(workspace);
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(m) = &module {
        if spec == m.path {
            candidates.push(m.root.clone());
        } else if let Some(rest) = spec.strip_prefix(&format!("{}/", m.path)) {
            candidates.push(m.root.join(rest));
        }
        candidates.push(m.root.join("vendor").join(spec));
    } else {
        candidates.push(workspace.join("vendor").join(spec));
    }

    if let Some(root) = goroot(config) {
        candidates.push(root.join("src").join(spec));
    }

    for dir in candidates {
        crate::debug_log!("[gosight] package {spec}: trying {}", dir.display());
        if dir.is_dir() {
            return Ok(dir);
        }
    }

    Err(InspectError::ModuleNotFound(spec.to_string()))
}

/// Import path to display for a package directory.
pub fn import_path_for(dir: &Path, workspace: &Path, config: &GoToolchainConfig) -> String {
    if let Some(m) = find_go_mod(dir).or_else(|| find_go_mod(workspace)) {
        if let Ok(rel) = dir.strip_prefix(&m.root) {
            let rel = rel.to_string_lossy().replace('\\', "/");
            if rel.starts_with("vendor/") {
                return rel.trim_start_matches("vendor/").to_string();
            }
            return if rel.is_empty() {
                m.path
            } else {
                format!("{}/{rel}", m.path)
            };
        }
    }
    if let Some(root) = goroot(config) {
        if let Ok(rel) = dir.strip_prefix(root.join("src")) {
            return rel.to_string_lossy().replace('\\', "/");
        }
    }
    dir.to_string_lossy().to_string()
}

/// Load the package named by `spec`. Only files of the most common package clause are kept,
/// so a stray `package main` generator or external test package does not leak in.
pub fn load_package(
    cache: &ParseCache,
    spec: &str,
    workspace: &Path,
    config: &GoToolchainConfig,
) -> Result<GoPackage> {
    let dir = resolve_package_dir(spec, workspace, config)?;
    let entries = scan_package_dir(&dir, &Platform::host())?;

    let mut named: Vec<(PathBuf, String)> = Vec::with_capacity(entries.len());
    for entry in entries {
        let file = cache.get_or_parse(&entry.abs_path)?;
        if let Some(name) = file.package_name() {
            named.push((entry.abs_path, name));
        }
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (_, name) in &named {
        *counts.entry(name.as_str()).or_default() += 1;
    }
    // Ties go to the package of the first file by name.
    let dominant = named
        .iter()
        .map(|(_, n)| n.as_str())
        .fold(None::<(&str, usize)>, |best, n| {
            let c = counts.get(n).copied().unwrap_or(0);
            match best {
                Some((_, bc)) if bc >= c => best,
                _ => Some((n, c)),
            }
        })
        .map(|(n, _)| n.to_string());

    let Some(name) = dominant else {
        return Err(InspectError::NoSourceFiles(dir));
    };

    let files: Vec<PathBuf> = named
        .into_iter()
        .filter(|(_, n)| *n == name)
        .map(|(p, _)| p)
        .collect();

    let import_path = import_path_for(&dir, workspace, config);
    crate::debug_log!(
        "[gosight] package {import_path} ({name}) in {}: {} files",
        dir.display(),
        files.len()
    );

    Ok(GoPackage {
        dir,
        import_path,
        name,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn toolchain(goroot: Option<PathBuf>) -> GoToolchainConfig {
        GoToolchainConfig {
            binary: "gosight-no-such-go-binary".to_string(),
            goroot,
        }
    }

    fn module_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::write(root.join("go.mod"), "// comment\nmodule example.com/app\n\ngo 1.22\n").unwrap();
        std::fs::write(root.join("main.go"), "package main\n\nfunc main() {}\n").unwrap();
        std::fs::create_dir_all(root.join("internal/util")).unwrap();
        std::fs::write(root.join("internal/util/util.go"), "package util\n\nfunc Help() {}\n").unwrap();
        std::fs::write(root.join("internal/util/more.go"), "package util\n\nvar X = 1\n").unwrap();
        std::fs::write(root.join("internal/util/gen.go"), "package main\n\nfunc main() {}\n").unwrap();
        std::fs::create_dir_all(root.join("vendor/github.com/dep/lib")).unwrap();
        std::fs::write(root.join("vendor/github.com/dep/lib/lib.go"), "package lib\n").unwrap();
        std::fs::create_dir_all(root.join("empty")).unwrap();
        tmp
    }

    #[test]
    fn go_mod_is_found_from_subdirectories() {
        let tmp = module_tree();
        let m = find_go_mod(&tmp.path().join("internal/util")).unwrap();
        assert_eq!(m.path, "example.com/app");
        assert_eq!(m.root, tmp.path());
    }

    #[test]
    fn resolves_relative_module_vendor_and_goroot() {
        let tmp = module_tree();
        let ws = tmp.path();
        let fake_goroot = TempDir::new().unwrap();
        std::fs::create_dir_all(fake_goroot.path().join("src/strings")).unwrap();
        let cfg = toolchain(Some(fake_goroot.path().to_path_buf()));

        assert_eq!(resolve_package_dir(".", ws, &cfg).unwrap(), ws);
        assert_eq!(
            resolve_package_dir("./internal/util", ws, &cfg).unwrap(),
            ws.join("internal/util")
        );
        assert_eq!(
            resolve_package_dir("example.com/app/internal/util", ws, &cfg).unwrap(),
            ws.join("internal/util")
        );
        assert_eq!(
            resolve_package_dir("github.com/dep/lib", ws, &cfg).unwrap(),
            ws.join("vendor/github.com/dep/lib")
        );
        assert_eq!(
            resolve_package_dir("strings", ws, &cfg).unwrap(),
            fake_goroot.path().join("src/strings")
        );
        assert!(matches!(
            resolve_package_dir("nowhere.example/x", ws, &cfg),
            Err(InspectError::ModuleNotFound(_))
        ));
    }

    #[test]
    fn dominant_package_wins() {
        let tmp = module_tree();
        let cache = ParseCache::new();
        let pkg = load_package(&cache, "./internal/util", tmp.path(), &toolchain(None)).unwrap();
        assert_eq!(pkg.name, "util");
        assert_eq!(pkg.import_path, "example.com/app/internal/util");
        let names: Vec<String> = pkg
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["more.go", "util.go"]);
    }

    #[test]
    fn vendored_import_path_drops_vendor_prefix() {
        let tmp = module_tree();
        let dir = tmp.path().join("vendor/github.com/dep/lib");
        assert_eq!(import_path_for(&dir, tmp.path(), &toolchain(None)), "github.com/dep/lib");
    }

    #[test]
    fn empty_directory_has_no_source_files() {
        let tmp = module_tree();
        let err = load_package(&ParseCache::new(), "./empty", tmp.path(), &toolchain(None)).unwrap_err();
        assert!(matches!(err, InspectError::NoSourceFiles(_)));
        assert!(err.to_string().contains("module has no eligible source files"));
    }
}
