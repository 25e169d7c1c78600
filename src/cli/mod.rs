//! Command line interface for the wiki copilot.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Ask questions about your wiki, answered from retrieved pages.
#[derive(Debug, Parser)]
#[command(name = "wikiai")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        short = 'c',
        global = true,
        env = "WIKIAI_CONFIG",
        help = "Config file to use instead of the global and project files"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ask a question
    Ask(commands::AskArgs),

    /// List the available retrieval strategies
    Strategies,

    /// Rebuild every configured index from the wiki
    Init,

    /// Run the HTTP API
    Serve(commands::ServeArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
