//! Word-boundary token lookup and `path:line:column` positions for gopls.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{InspectError, Result};

/// A resolved cursor position inside a file. Lines and columns are 1-based; the column
/// counts bytes, which is what gopls expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Return the 1-based column of the first occurrence of `token` in `line` that sits on a
/// word boundary, i.e. is neither preceded nor followed by an identifier character.
///
/// A plain substring hit is not enough: `Per` does not match inside `Person`.
pub fn find_token_column(line: &str, token: &str) -> Option<usize> {
    if token.is_empty() || token.len() > line.len() {
        return None;
    }

    for idx in 0..=line.len() - token.len() {
        if !line.is_char_boundary(idx) || !line[idx..].starts_with(token) {
            continue;
        }

        let before_ok = line[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !is_identifier_char(c));
        let after_ok = line[idx + token.len()..]
            .chars()
            .next()
            .map_or(true, |c| !is_identifier_char(c));

        if before_ok && after_ok {
            return Some(idx + 1);
        }
    }

    None
}

/// Resolve `symbol` on `line` of `path` to an absolute gopls position.
///
/// The file is read fresh from disk so renames always see current content.
pub fn resolve_position(path: &Path, line: usize, symbol: &str) -> Result<Position> {
    if line == 0 {
        return Err(InspectError::invalid(format!(
            "invalid line number: {line} (must be greater than 0)"
        )));
    }
    if symbol.is_empty() {
        return Err(InspectError::invalid("symbol name cannot be empty"));
    }

    let abs: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let content = std::fs::read_to_string(&abs).map_err(|e| InspectError::from_io(&abs, e))?;
    let lines: Vec<&str> = content.split('\n').collect();
    if line > lines.len() {
        return Err(InspectError::PositionNotFound {
            path: abs,
            line,
            symbol: symbol.to_string(),
            detail: format!("line number {line} exceeds file length ({} lines)", lines.len()),
        });
    }

    let text = lines[line - 1].trim_end_matches('\r');
    let Some(column) = find_token_column(text, symbol) else {
        return Err(InspectError::PositionNotFound {
            path: abs,
            line,
            symbol: symbol.to_string(),
            detail: "no word-boundary occurrence on the line".to_string(),
        });
    };

    Ok(Position { path: abs, line, column })
}
