use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

use crate::error::{InspectError, Result};

const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

fn package_overrides(dir: &Path) -> std::result::Result<Override, ignore::Error> {
    let mut ob = OverrideBuilder::new(dir);
    // Whitelist Go sources; tests never belong to the package proper.
    ob.add("*.go")?;
    ob.add("!*_test.go")?;
    ob.build()
}

#[derive(Debug, Clone)]
pub struct FileEntry {
    pub abs_path: PathBuf,
    /// File name relative to the scanned directory.
    pub rel_path: PathBuf,
}

/// Target platform in Go's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn host() -> Self {
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "x86" => "386",
            "aarch64" => "arm64",
            "powerpc64" => "ppc64",
            "loongarch64" => "loong64",
            "wasm32" => "wasm",
            other => other,
        };
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }
}

/// Whether a file name's `_GOOS`, `_GOARCH` or `_GOOS_GOARCH` suffix admits `platform`.
pub fn matches_platform(file_name: &str, platform: &Platform) -> bool {
    let stem = file_name.strip_suffix(".go").unwrap_or(file_name);
    let Some(idx) = stem.find('_') else {
        return true;
    };
    let mut parts: Vec<&str> = stem[idx..].split('_').collect();
    if parts.last() == Some(&"test") {
        parts.pop();
    }

    let n = parts.len();
    if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
        return parts[n - 2] == platform.os && parts[n - 1] == platform.arch;
    }
    if let Some(last) = parts.last() {
        if KNOWN_OS.contains(last) {
            return *last == platform.os;
        }
        if KNOWN_ARCH.contains(last) {
            return *last == platform.arch;
        }
    }
    true
}

/// `//go:build ignore` (or the legacy `// +build ignore`) in the file header.
pub fn is_build_ignored(source: &str) -> bool {
    for line in source.lines() {
        let t = line.trim();
        if t.is_empty() {
            continue;
        }
        if !t.starts_with("//") {
            // Constraints must precede the package clause.
            return false;
        }
        if let Some(expr) = t.strip_prefix("//go:build") {
            return expr.trim() == "ignore";
        }
        if let Some(expr) = t.strip_prefix("// +build") {
            if expr.split_whitespace().any(|term| term == "ignore") {
                return true;
            }
        }
    }
    false
}

/// List the Go source files that belong to the package in `dir` on `platform`, sorted by
/// file name. Hidden and `_`-prefixed files are skipped like the Go tool does.
pub fn scan_package_dir(dir: &Path, platform: &Platform) -> Result<Vec<FileEntry>> {
    let meta = std::fs::metadata(dir).map_err(|e| InspectError::from_io(dir, e))?;
    if !meta.is_dir() {
        return Err(InspectError::invalid(format!("not a directory: {}", dir.display())));
    }

    let overrides = package_overrides(dir)
        .map_err(|e| InspectError::invalid(format!("bad scan pattern: {e}")))?;
    let walker = WalkBuilder::new(dir)
        .standard_filters(false)
        .max_depth(Some(1))
        .overrides(overrides)
        .build();

    let mut entries = Vec::new();
    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(_) => continue,
        };

        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let name = dent.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name.starts_with('_') || !matches_platform(&name, platform) {
            continue;
        }

        let abs_path = dent.into_path();
        let Ok(source) = std::fs::read_to_string(&abs_path) else {
            continue;
        };
        if is_build_ignored(&source) {
            crate::debug_log!("[gosight] skipping build-ignored {}", abs_path.display());
            continue;
        }

        entries.push(FileEntry {
            abs_path,
            rel_path: PathBuf::from(name),
        });
    }

    entries.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(entries)
}
