//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tradebus")]
#[command(author, version, about = "Store-coordinated trading signal pipeline")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline stages
    Run(RunArgs),
    /// Show signal counts and recent activity
    Status(StatusArgs),
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Use the in-memory paper gateway instead of Alpaca
    #[arg(long)]
    pub paper: bool,

    /// Starting equity for the paper gateway
    #[arg(long, default_value = "100000")]
    pub capital: f64,
}

#[derive(clap::Args)]
pub struct StatusArgs {
    /// Number of recent signals to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: i64,
}
