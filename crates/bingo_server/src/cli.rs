//! Command-line interface for bingo_server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bingo Server - shared multiplayer bingo sessions over MCP
#[derive(Parser, Debug)]
#[command(name = "bingo_server")]
#[command(about = "Multiplayer bingo session server with an MCP interface", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the settings file
    #[arg(short, long, global = true, default_value = "bingo.toml")]
    pub config: PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the MCP bingo server (stdio mode)
    Server {
        /// Board configuration to load at startup
        #[arg(long)]
        board: Option<PathBuf>,
    },

    /// Run the HTTP bingo server
    Http {
        /// Port to bind to (overrides the settings file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides the settings file)
        #[arg(long)]
        host: Option<String>,

        /// Board configuration to load at startup
        #[arg(long)]
        board: Option<PathBuf>,
    },

    /// Check a board configuration file and print a summary
    Validate {
        /// Path to the board JSON
        path: PathBuf,
    },
}
