use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-workspace config file.
pub const CONFIG_FILE_NAME: &str = ".gosight.json";

/// How to reach the external code-intelligence tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoplsConfig {
    /// Executable name or absolute path of `gopls`.
    pub binary: String,
}

impl Default for GoplsConfig {
    fn default() -> Self {
        Self {
            binary: "gopls".to_string(),
        }
    }
}

/// Go toolchain settings used when resolving import paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoToolchainConfig {
    /// Executable used for `go env GOROOT` when no GOROOT is known.
    pub binary: String,

    /// Explicit GOROOT. Wins over the `GOROOT` environment variable and `go env`.
    pub goroot: Option<PathBuf>,
}

impl Default for GoToolchainConfig {
    fn default() -> Self {
        Self {
            binary: "go".to_string(),
            goroot: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gopls: GoplsConfig,
    pub go: GoToolchainConfig,
    /// Default for the `only_exported` tool argument when the caller omits it.
    pub only_exported: bool,
}

pub fn load_config(workspace: &Path) -> Config {
    let primary = workspace.join(CONFIG_FILE_NAME);

    let text = std::fs::read_to_string(&primary);
    let Ok(text) = text else { return Config::default() };

    match serde_json::from_str::<Config>(&text) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("[gosight] WARN: could not parse {}: {e}", primary.display());
            Config::default()
        }
    }
}
