//! CLI argument definitions for the NewsRAG binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// NewsRAG - answer questions about recent news from a local index.
#[derive(Parser, Debug)]
#[command(name = "newsrag", version, about)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for the index snapshot and chat history.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Build the index snapshot (or load it if one is already persisted).
    Build {
        /// Index a local JSON corpus instead of fetching from NewsAPI.
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Rebuild even if a snapshot is persisted. The old snapshot is
        /// replaced only once the new one has been built.
        #[arg(long)]
        force: bool,
    },
    /// Print the top articles for a query.
    Query {
        text: String,
        #[arg(short = 'k', long = "top-k")]
        top_k: Option<usize>,
        #[arg(short = 'b', long)]
        breadth: Option<usize>,
    },
    /// Interactive chat on the terminal. Type `exit` or `quit` to leave.
    Chat {
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
    /// Serve the chat API over HTTP.
    Serve {
        #[arg(long)]
        corpus: Option<PathBuf>,
        #[arg(short = 'p', long)]
        port: Option<u16>,
    },
}

impl Cli {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > NEWSRAG_CONFIG env var > ~/.newsrag/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("NEWSRAG_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Returns `None` if not overridden (use the config value).
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".newsrag").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".newsrag").join("config.toml");
    }
    PathBuf::from("config.toml")
}
