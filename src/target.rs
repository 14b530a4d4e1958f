//! Inspection targets: `file.go[:line[:symbol]]`, `file.go:symbol`, or `package/path[:symbol]`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{InspectError, Result};
use crate::module::normalize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub path: String,
    pub line: Option<usize>,
    pub symbol: Option<String>,
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

fn is_file_shaped(raw: &str) -> bool {
    raw.contains(".go") || raw.starts_with('/') || raw.starts_with("./") || raw.starts_with("../")
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(InspectError::invalid("target cannot be empty"));
        }

        if is_file_shaped(raw) {
            let mut parts = raw.split(':');
            let path = parts.next().unwrap_or_default().to_string();
            let second = parts.next();
            let third = parts.next();

            let (line, symbol) = match second {
                None => (None, None),
                Some(seg) => match seg.trim().parse::<usize>() {
                    Ok(n) => ((n > 0).then_some(n), third.and_then(non_empty)),
                    Err(_) => (None, non_empty(seg)),
                },
            };
            if path.is_empty() {
                return Err(InspectError::invalid(format!("target has no path: {raw}")));
            }
            return Ok(Self { path, line, symbol });
        }

        if let Some((base, suffix)) = raw.rsplit_once(':') {
            if identifier_re().is_match(suffix) && !base.is_empty() {
                return Ok(Self {
                    path: base.to_string(),
                    line: None,
                    symbol: Some(suffix.to_string()),
                });
            }
        }

        Ok(Self {
            path: raw.to_string(),
            line: None,
            symbol: None,
        })
    }

    /// A `.go` base path is a single file; anything else names a package.
    pub fn is_file(&self) -> bool {
        self.path.ends_with(".go")
    }
}

/// Locate a `.go` file relative to the workspace.
///
/// Absolute paths must exist. Explicit `./`/`../` paths join the workspace; bare paths try
/// the plain join and then the explicit-relative join.
pub fn resolve_file_path(path: &str, workspace: &Path) -> Result<PathBuf> {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        if candidate.is_file() {
            return Ok(candidate.to_path_buf());
        }
        return Err(InspectError::file_not_found(candidate));
    }

    let candidates: Vec<PathBuf> = if path.starts_with("./") || path.starts_with("../") {
        vec![workspace.join(path)]
    } else {
        vec![workspace.join(path), workspace.join(format!("./{path}"))]
    };

    candidates
        .into_iter()
        .map(|c| normalize(&c))
        .find(|c| c.is_file())
        .ok_or_else(|| InspectError::FileNotFound {
            path: PathBuf::from(path),
            searched: Some(workspace.to_path_buf()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn t(path: &str, line: Option<usize>, symbol: Option<&str>) -> Target {
        Target {
            path: path.to_string(),
            line,
            symbol: symbol.map(str::to_string),
        }
    }

    #[test]
    fn file_targets() {
        assert_eq!(Target::parse("main.go").unwrap(), t("main.go", None, None));
        assert_eq!(Target::parse("main.go:12").unwrap(), t("main.go", Some(12), None));
        assert_eq!(Target::parse("main.go:12:Run").unwrap(), t("main.go", Some(12), Some("Run")));
        assert_eq!(Target::parse("main.go:Run").unwrap(), t("main.go", None, Some("Run")));
        assert_eq!(Target::parse("main.go:0:Run").unwrap(), t("main.go", None, Some("Run")));
        assert_eq!(
            Target::parse("/abs/pkg/x.go:3").unwrap(),
            t("/abs/pkg/x.go", Some(3), None)
        );
    }

    #[test]
    fn explicit_relative_directory_is_file_shaped_but_a_package() {
        let target = Target::parse("./internal/util:Help").unwrap();
        assert_eq!(target, t("./internal/util", None, Some("Help")));
        assert!(!target.is_file());
    }

    #[test]
    fn module_targets() {
        assert_eq!(Target::parse("fmt").unwrap(), t("fmt", None, None));
        assert_eq!(Target::parse("fmt:Println").unwrap(), t("fmt", None, Some("Println")));
        assert_eq!(
            Target::parse("github.com/a/b:Thing").unwrap(),
            t("github.com/a/b", None, Some("Thing"))
        );
        // Digits and non-identifiers are not symbols.
        assert_eq!(Target::parse("example.com/x:42").unwrap(), t("example.com/x:42", None, None));
        assert_eq!(Target::parse("example.com/x:a-b").unwrap(), t("example.com/x:a-b", None, None));
        assert!(!Target::parse("fmt").unwrap().is_file());
        assert!(Target::parse("a/b.go").unwrap().is_file());
    }

    #[test]
    fn empty_target_is_invalid() {
        assert!(matches!(Target::parse("   "), Err(InspectError::InvalidTarget(_))));
    }

    #[test]
    fn file_resolution() {
        let tmp = TempDir::new().unwrap();
        let ws = tmp.path();
        std::fs::create_dir(ws.join("pkg")).unwrap();
        std::fs::write(ws.join("pkg/a.go"), "package pkg\n").unwrap();

        assert_eq!(resolve_file_path("pkg/a.go", ws).unwrap(), ws.join("pkg/a.go"));
        assert_eq!(resolve_file_path("./pkg/a.go", ws).unwrap(), ws.join("pkg/a.go"));
        assert_eq!(
            resolve_file_path("../pkg/a.go", &ws.join("pkg")).unwrap(),
            ws.join("pkg/a.go")
        );
        let abs = ws.join("pkg/a.go");
        assert_eq!(resolve_file_path(abs.to_str().unwrap(), ws).unwrap(), abs);

        let err = resolve_file_path("missing.go", ws).unwrap_err();
        assert!(err.to_string().contains("searched relative to"));
        assert!(matches!(
            resolve_file_path(ws.join("nope.go").to_str().unwrap(), ws),
            Err(InspectError::FileNotFound { .. })
        ));
    }
}
