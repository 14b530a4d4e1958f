//! Bridge to the external code-intelligence tool (gopls).
//!
//! The engine never computes references, implementations or call graphs itself; it hands a
//! resolved `path:line:column` to a [`CodeIntel`] and post-processes the raw text it gets back.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::Config;
use crate::error::{InspectError, Result};
use crate::position::Position;

pub trait CodeIntel: Send + Sync {
    /// Newline-delimited `path:line:startCol-endCol` locations.
    fn references(&self, position: &Position) -> Result<String>;

    /// Same format as [`CodeIntel::references`]; only meaningful for interface types.
    fn implementers(&self, position: &Position) -> Result<String>;

    /// Opaque text, passed through verbatim.
    fn call_hierarchy(&self, position: &Position) -> Result<String>;

    /// Apply the rename on disk. Empty output means success with nothing to report.
    fn rename(&self, position: &Position, new_name: &str) -> Result<String>;
}

/// Runs the `gopls` command line, one process per request.
#[derive(Debug, Clone)]
pub struct GoplsCli {
    binary: String,
}

impl Default for GoplsCli {
    fn default() -> Self {
        Self::new("gopls")
    }
}

impl GoplsCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.gopls.binary.clone())
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn run(&self, command: &str, args: &[&str], position: &Position) -> Result<String> {
        let dir = position.path.parent().unwrap_or_else(|| Path::new("."));
        crate::debug_log!("[gosight] {} {} {}", self.binary, command, args.join(" "));

        let output = Command::new(&self.binary)
            .arg(command)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| InspectError::ExternalTool {
                tool: self.binary.clone(),
                command: command.to_string(),
                message: format!("could not start: {e}"),
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = combined.trim().to_string();

        if !output.status.success() {
            let message = if combined.is_empty() {
                output.status.to_string()
            } else {
                format!("{} ({combined})", output.status)
            };
            return Err(InspectError::ExternalTool {
                tool: self.binary.clone(),
                command: command.to_string(),
                message,
            });
        }

        Ok(combined)
    }
}

impl CodeIntel for GoplsCli {
    fn references(&self, position: &Position) -> Result<String> {
        self.run("references", &[&position.to_string()], position)
    }

    fn implementers(&self, position: &Position) -> Result<String> {
        self.run("implementation", &[&position.to_string()], position)
    }

    fn call_hierarchy(&self, position: &Position) -> Result<String> {
        self.run("call_hierarchy", &[&position.to_string()], position)
    }

    fn rename(&self, position: &Position, new_name: &str) -> Result<String> {
        self.run("rename", &["-w", &position.to_string(), new_name], position)
    }
}

/// A location reported by the collaborator. Columns are 1-based and inclusive of the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    pub line: usize,
    pub start_column: usize,
    pub end_column: usize,
}

fn location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // path:line:col, path:line:col-col, path:line:col-line:col
        Regex::new(r"^(.+?):(\d+):(\d+)(?:-(?:\d+:)?(\d+))?$").expect("valid location regex")
    })
}

/// Parse newline-delimited location output. Malformed lines are skipped.
pub fn parse_locations(raw: &str) -> Vec<Location> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| {
            let caps = location_re().captures(line)?;
            let line_no: usize = caps[2].parse().ok()?;
            let start_column: usize = caps[3].parse().ok()?;
            let end_column = match caps.get(4) {
                Some(m) => m.as_str().parse().ok()?,
                None => start_column,
            };
            Some(Location {
                path: PathBuf::from(&caps[1]),
                line: line_no,
                start_column,
                end_column,
            })
        })
        .collect()
}
