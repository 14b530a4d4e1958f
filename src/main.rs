use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gosight::config::load_config;
use gosight::server::{run_stdio_server, TOOL_NAMES};
use gosight::{Inspector, ParseCache};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "gosight")]
#[command(version)]
#[command(about = "Go source inspector: declarations, docs, scopes and usages (Pure Rust MCP server)")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inspect a file, a declaration, or a package and print the text report
    Inspect {
        /// `file.go[:LINE[:SYMBOL]]`, `file.go:SYMBOL`, or `import/path[:SYMBOL]`
        #[arg(value_name = "TARGET")]
        target: String,

        /// Workspace root (defaults to the current directory)
        #[arg(long, short = 'w', value_name = "DIR")]
        workspace: Option<PathBuf>,

        /// List only exported declarations (overrides the config default when set)
        #[arg(long)]
        only_exported: bool,
    },

    /// Rename the symbol OLD found on LINE of FILE to NEW via gopls
    Rename {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(value_name = "LINE")]
        line: usize,
        #[arg(value_name = "OLD")]
        old_name: String,
        #[arg(value_name = "NEW")]
        new_name: String,
    },

    /// Start MCP stdio server
    #[command(alias = "server")]
    Mcp {
        /// Hide a tool from tools/list and reject calls to it (repeatable)
        #[arg(long = "disable-tool", value_name = "TOOL", value_parser = clap::builder::PossibleValuesParser::new(TOOL_NAMES))]
        disable_tool: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("Failed to get current dir")?;

    match cli.cmd {
        Command::Mcp { disable_tool } => run_stdio_server(disable_tool),
        Command::Inspect {
            target,
            workspace,
            only_exported,
        } => {
            let workspace = match workspace {
                Some(w) if w.is_absolute() => w,
                Some(w) => cwd.join(w),
                None => cwd,
            };
            let cfg = load_config(&workspace);
            let include_private = !(only_exported || cfg.only_exported);

            let inspector = Inspector::from_config(Arc::new(ParseCache::new()), &cfg);
            let out = inspector
                .inspect(&target, &workspace, include_private)
                .with_context(|| format!("Error inspecting symbol {target}"))?;
            println!("{out}");
            Ok(())
        }
        Command::Rename {
            file,
            line,
            old_name,
            new_name,
        } => {
            let file = if file.is_absolute() { file } else { cwd.join(file) };
            let cfg = load_config(&cwd);

            let inspector = Inspector::from_config(Arc::new(ParseCache::new()), &cfg);
            let out = inspector
                .rename(&file, line, &old_name, &new_name)
                .with_context(|| format!("Error renaming symbol {old_name}"))?;
            println!("{out}");
            Ok(())
        }
    }
}
