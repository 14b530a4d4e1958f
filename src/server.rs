use anyhow::Result;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::ParseCache;
use crate::config::{load_config, Config};
use crate::inspector::Inspector;

pub const TOOL_NAMES: &[&str] = &["inspect", "rename"];

pub struct ServerState {
    cache: Arc<ParseCache>,
    disabled: HashSet<String>,
}

impl ServerState {
    pub fn new(cache: Arc<ParseCache>, disabled: impl IntoIterator<Item = String>) -> Self {
        Self {
            cache,
            disabled: disabled.into_iter().collect(),
        }
    }

    fn enabled(&self, name: &str) -> bool {
        !self.disabled.contains(name)
    }

    fn tool_list(&self, id: serde_json::Value) -> serde_json::Value {
        let tools = [
            json!({
                "name": "inspect",
                "description": "Inspect Go code: a whole file, one declaration (by line and/or name), or a package. Declarations come with their doc comment, lexical scope, references grouped by enclosing function, interface implementers and call hierarchy.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "Target: 'file.go', 'file.go:LINE', 'file.go:LINE:SYMBOL', 'file.go:SYMBOL', 'import/path' or 'import/path:SYMBOL'" },
                        "workspace_dir": { "type": "string", "description": "Absolute path of the workspace root; relative targets resolve against it" },
                        "only_exported": { "type": "boolean", "description": "Optional: list only exported declarations (default from .gosight.json, else false)" }
                    },
                    "required": ["path", "workspace_dir"]
                }
            }),
            json!({
                "name": "rename",
                "description": "Rename a Go symbol everywhere it is used. The symbol must appear on the given line of the file.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "file_path": { "type": "string", "description": "File containing the symbol" },
                        "line_number": { "type": "integer", "exclusiveMinimum": 0, "description": "1-based line on which the symbol appears" },
                        "old_name": { "type": "string" },
                        "new_name": { "type": "string" },
                        "workspace_dir": { "type": "string", "description": "Optional: root used to resolve a relative file_path" }
                    },
                    "required": ["file_path", "line_number", "old_name", "new_name"]
                }
            }),
        ];

        let tools: Vec<serde_json::Value> = tools
            .into_iter()
            .filter(|t| t.get("name").and_then(|n| n.as_str()).is_some_and(|n| self.enabled(n)))
            .collect();

        json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": { "tools": tools }
        })
    }

    fn inspector(&self, config: &Config) -> Inspector {
        Inspector::from_config(self.cache.clone(), config)
    }

    fn tool_call(&self, id: serde_json::Value, params: &serde_json::Value) -> serde_json::Value {
        let name = params.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let args = params.get("arguments").cloned().unwrap_or(json!({}));

        let ok = |text: String| {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{"type":"text","text": text }], "isError": false }
            })
        };

        let err = |msg: String| {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{"type":"text","text": msg }], "isError": true }
            })
        };

        if !self.enabled(name) {
            return err(format!("Tool not found: {name}"));
        }

        match name {
            "inspect" => {
                let Some(target) = args.get("path").and_then(|v| v.as_str()) else {
                    return err("Missing path".to_string());
                };
                let workspace = args.get("workspace_dir").and_then(|v| v.as_str()).unwrap_or("");
                let workspace = Path::new(workspace);

                let config = if workspace.is_absolute() {
                    load_config(workspace)
                } else {
                    Config::default()
                };
                let only_exported = args
                    .get("only_exported")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(config.only_exported);

                match self.inspector(&config).inspect(target, workspace, !only_exported) {
                    Ok(s) => ok(s),
                    Err(e) => err(format!("Error inspecting symbol: {e}")),
                }
            }
            "rename" => {
                let Some(file) = args.get("file_path").and_then(|v| v.as_str()) else {
                    return err("Missing file_path".to_string());
                };
                let Some(line) = args.get("line_number").and_then(|v| v.as_i64()) else {
                    return err("Missing line_number".to_string());
                };
                let Some(old_name) = args.get("old_name").and_then(|v| v.as_str()) else {
                    return err("Missing old_name".to_string());
                };
                let Some(new_name) = args.get("new_name").and_then(|v| v.as_str()) else {
                    return err("Missing new_name".to_string());
                };
                if line <= 0 {
                    return err(format!(
                        "Error renaming symbol: invalid target: line number must be positive, got {line}"
                    ));
                }

                let workspace = args.get("workspace_dir").and_then(|v| v.as_str()).map(PathBuf::from);
                let path = match &workspace {
                    Some(root) => resolve_path(root, file),
                    None => PathBuf::from(file),
                };
                let config = workspace.as_deref().map(load_config).unwrap_or_default();

                match self.inspector(&config).rename(&path, line as usize, old_name, new_name) {
                    Ok(s) => ok(s),
                    Err(e) => err(format!("Error renaming symbol: {e}")),
                }
            }
            _ => err(format!("Tool not found: {name}")),
        }
    }

    /// Answer one JSON-RPC line. `None` for notifications and unparsable input.
    pub fn handle_line(&self, line: &str) -> Option<serde_json::Value> {
        let msg: serde_json::Value = serde_json::from_str(line).ok()?;

        // JSON-RPC notifications have no "id" field; don't respond.
        let id = msg.get("id").cloned()?;
        let method = msg.get("method").and_then(|m| m.as_str()).unwrap_or("");

        let reply = match method {
            "initialize" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": msg.get("params").and_then(|p| p.get("protocolVersion")).cloned().unwrap_or(json!("2024-11-05")),
                    "capabilities": { "tools": { "listChanged": true } },
                    "serverInfo": { "name": "gosight", "version": env!("CARGO_PKG_VERSION") }
                }
            }),
            "ping" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {}
            }),
            "tools/list" => self.tool_list(id),
            "tools/call" => {
                let params = msg.get("params").cloned().unwrap_or(json!({}));
                self.tool_call(id, &params)
            }
            "resources/list" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "resources": [] }
            }),
            "prompts/list" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "prompts": [] }
            }),
            _ => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("Method not found: {method}") }
            }),
        };
        Some(reply)
    }
}

/// Resolve a path parameter: if absolute, use as-is; otherwise join to the root.
fn resolve_path(root: &Path, p: &str) -> PathBuf {
    let pb = PathBuf::from(p);
    if pb.is_absolute() { pb } else { root.join(p) }
}

fn is_tool_call(line: &str) -> bool {
    line.contains("\"tools/call\"")
}

fn write_reply(stdout: &Mutex<std::io::Stdout>, reply: &serde_json::Value) {
    let mut out = stdout.lock();
    if writeln!(out, "{reply}").and_then(|_| out.flush()).is_err() {
        eprintln!("[gosight] WARN: failed to write response");
    }
}

/// Serve MCP over stdin/stdout until stdin closes. Stdin is read on the calling thread and
/// tool calls run on rayon workers, so their replies may arrive out of order; everything else
/// is answered inline. In-flight calls finish before this returns.
pub fn run_stdio_server(disabled_tools: Vec<String>) -> Result<()> {
    let stdin = std::io::stdin();
    let stdout = Mutex::new(std::io::stdout());
    let state = ServerState::new(Arc::new(ParseCache::new()), disabled_tools);

    rayon::in_place_scope(|scope| {
        for line in stdin.lock().lines() {
            let Ok(line) = line else { continue };
            if line.trim().is_empty() {
                continue;
            }

            if is_tool_call(&line) {
                let state = &state;
                let stdout = &stdout;
                scope.spawn(move |_| {
                    if let Some(reply) = state.handle_line(&line) {
                        write_reply(stdout, &reply);
                    }
                });
            } else if let Some(reply) = state.handle_line(&line) {
                write_reply(&stdout, &reply);
            }
        }
    });

    crate::debug_log!("[gosight] stdin closed; {} files cached", state.cache.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state() -> ServerState {
        ServerState::new(Arc::new(ParseCache::new()), Vec::new())
    }

    fn call(state: &ServerState, name: &str, args: serde_json::Value) -> serde_json::Value {
        let line = json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": { "name": name, "arguments": args }
        });
        state.handle_line(&line.to_string()).unwrap()
    }

    fn text(reply: &serde_json::Value) -> &str {
        reply["result"]["content"][0]["text"].as_str().unwrap()
    }

    #[test]
    fn notifications_and_garbage_get_no_reply() {
        let s = state();
        assert!(s.handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).is_none());
        assert!(s.handle_line("not json").is_none());
    }

    #[test]
    fn unknown_method_is_32601() {
        let reply = state()
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"bogus"}"#)
            .unwrap();
        assert_eq!(reply["error"]["code"], -32601);
    }

    #[test]
    fn disabled_tools_are_hidden_and_rejected() {
        let s = ServerState::new(Arc::new(ParseCache::new()), vec!["rename".to_string()]);
        let list = s.handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).unwrap();
        let names: Vec<&str> = list["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["inspect"]);

        let reply = call(&s, "rename", json!({}));
        assert_eq!(reply["result"]["isError"], true);
    }

    #[test]
    fn inspect_requires_absolute_workspace() {
        let reply = call(&state(), "inspect", json!({ "path": "main.go", "workspace_dir": "rel" }));
        assert_eq!(reply["result"]["isError"], true);
        assert!(text(&reply).starts_with("Error inspecting symbol: invalid target: workspace_dir must be an absolute path"));
    }

    #[test]
    fn inspect_honours_config_default_for_exported_filter() {
        let tmp = TempDir::new().unwrap();
        let root = std::fs::canonicalize(tmp.path()).unwrap();
        std::fs::write(root.join("a.go"), "package a\n\nfunc Pub() {}\n\nfunc priv() {}\n").unwrap();
        std::fs::write(root.join(".gosight.json"), r#"{ "only_exported": true }"#).unwrap();
        let s = state();

        let reply = call(&s, "inspect", json!({ "path": "a.go", "workspace_dir": root }));
        assert_eq!(reply["result"]["isError"], false);
        assert!(text(&reply).contains("func Pub()"));
        assert!(!text(&reply).contains("func priv()"));

        let reply = call(
            &s,
            "inspect",
            json!({ "path": "a.go", "workspace_dir": root, "only_exported": false }),
        );
        assert!(text(&reply).contains("func priv()"));
    }

    #[test]
    fn same_name_rename_succeeds_without_gopls() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.go"), "package a\n\nfunc Pub() {}\n").unwrap();
        let reply = call(
            &state(),
            "rename",
            json!({ "file_path": "a.go", "line_number": 3, "old_name": "Pub", "new_name": "Pub", "workspace_dir": tmp.path() }),
        );
        assert_eq!(reply["result"]["isError"], false);
        assert_eq!(text(&reply), "Symbol 'Pub' already has the desired name");
    }

    #[test]
    fn rename_rejects_non_positive_line() {
        let reply = call(
            &state(),
            "rename",
            json!({ "file_path": "/x/a.go", "line_number": 0, "old_name": "A", "new_name": "B" }),
        );
        assert_eq!(reply["result"]["isError"], true);
        assert!(text(&reply).starts_with("Error renaming symbol:"));
    }
}
