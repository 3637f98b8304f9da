//! Command-line front-end: argument parsing and per-command dispatch.
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "lsp", version, about = "On-demand LSP capabilities from the terminal")]
pub struct Cli {
    /// Print full error-chain context and enable debug logging.
    #[arg(short, long, global = true)]
    pub debug: bool,
    /// Render tabular output as Markdown instead of plain text.
    #[arg(short, long, global = true)]
    pub markdown: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage the broker and its sessions.
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },
    /// Resolve a locate-string to a concrete file position.
    Locate {
        locate: String,
        /// Only validate the locate-string and print the resolved position; don't call into the language server.
        #[arg(long)]
        check: bool,
    },
    /// Jump to a symbol's definition.
    #[command(alias = "def")]
    Definition {
        locate: String,
        #[arg(long)]
        decl: bool,
        #[arg(long = "type")]
        type_: bool,
    },
    /// Show hover information (type signature, docs) for a symbol.
    Hover { locate: String },
    /// Find references to a symbol.
    #[command(alias = "ref")]
    Reference {
        locate: String,
        #[arg(long = "impl")]
        impl_: bool,
        #[arg(long = "ref")]
        ref_: bool,
        #[arg(long, default_value_t = 0)]
        context_lines: u32,
        #[arg(long)]
        max_items: Option<usize>,
        #[arg(long, default_value_t = 0)]
        start_index: usize,
        #[arg(long)]
        pagination_id: Option<String>,
    },
    /// Show the symbol outline of a file.
    Outline {
        file: PathBuf,
        #[arg(long)]
        all: bool,
    },
    /// Show the symbol enclosing a location.
    #[command(alias = "sym")]
    Symbol { locate: String },
    /// Search workspace symbols by name.
    Search {
        query: String,
        #[arg(long)]
        workspace: Option<PathBuf>,
        #[arg(long = "kind")]
        kinds: Vec<String>,
        #[arg(long)]
        max_items: Option<usize>,
        #[arg(long, default_value_t = 0)]
        start_index: usize,
        #[arg(long)]
        pagination_id: Option<String>,
    },
    /// Rename a symbol, previewing or applying the edit.
    Rename {
        new_name: String,
        locate: String,
        #[arg(long)]
        execute: bool,
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ServerAction {
    /// List all active sessions.
    List,
    /// Start (or reuse) a session for the workspace containing `path`.
    Start { path: PathBuf },
    /// Stop the session for the workspace containing `path`.
    Stop { path: PathBuf },
    /// Stop the broker and every session it manages.
    StopBroker,
    /// Run the broker in the foreground (used internally by auto-spawn).
    #[command(hide = true)]
    RunBroker,
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    commands::dispatch(cli).await
}
