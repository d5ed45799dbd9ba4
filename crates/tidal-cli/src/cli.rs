use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tidal",
    about = "Tidal: build, inspect and replay repository archives",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with sync limits and defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a demo repository and write a base archive and an update archive
    Demo(DemoArgs),
    /// Show the root and block counts of an archive
    Inspect(InspectArgs),
    /// Apply archives to a fresh replica and print the replayed events
    Replay(ReplayArgs),
}

#[derive(Args)]
pub struct DemoArgs {
    /// Posts written before the base archive
    #[arg(long, default_value = "150")]
    pub entries: usize,
    /// Posts written after the base archive
    #[arg(long, default_value = "3")]
    pub extra: usize,
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

#[derive(Args)]
pub struct InspectArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ReplayArgs {
    /// Archive holding the full history up to some commit
    pub base: PathBuf,
    /// Archives to apply on top, in order
    pub updates: Vec<PathBuf>,
}
