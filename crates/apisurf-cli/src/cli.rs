use std::path::PathBuf;

use apisurf_filter::Surface;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "apisurf",
    about = "apisurf: extract, compare, and check API signature files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (default: apisurf.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum SurfaceArg {
    Public,
    Removed,
    All,
}

impl From<SurfaceArg> for Surface {
    fn from(arg: SurfaceArg) -> Self {
        match arg {
            SurfaceArg::Public => Surface::Public,
            SurfaceArg::Removed => Surface::Removed,
            SurfaceArg::All => Surface::All,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse signature files, filter, and rewrite them
    Convert(ConvertArgs),
    /// Show API changes between two signature files
    Diff(DiffArgs),
    /// Check that a new API surface is compatible with an old one
    CheckCompat(CheckCompatArgs),
    /// Compose a delta file over its base files and write the result
    Merge(MergeArgs),
    /// List the known signature format versions
    Formats,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Files forming the current layer
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Wider files the current layer is a delta over
    #[arg(long)]
    pub base: Vec<PathBuf>,
    /// Output format version, e.g. v4 or 5.0
    #[arg(long)]
    pub signature_format: Option<String>,
    #[arg(long)]
    pub surface: Option<SurfaceArg>,
    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    pub old: PathBuf,
    pub new: PathBuf,
    #[arg(long)]
    pub old_base: Vec<PathBuf>,
    #[arg(long)]
    pub new_base: Vec<PathBuf>,
    /// Show a line-level diff of the rewritten files
    #[arg(long)]
    pub text: bool,
    /// List the contents of added and removed classes
    #[arg(short, long)]
    pub recursive: bool,
    #[arg(long)]
    pub surface: Option<SurfaceArg>,
}

#[derive(Args, Debug)]
pub struct CheckCompatArgs {
    pub old: PathBuf,
    pub new: PathBuf,
    #[arg(long)]
    pub old_base: Vec<PathBuf>,
    #[arg(long)]
    pub new_base: Vec<PathBuf>,
    #[arg(long)]
    pub surface: Option<SurfaceArg>,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    #[arg(long, required = true)]
    pub base: Vec<PathBuf>,
    pub current: PathBuf,
    #[arg(short, long)]
    pub output: PathBuf,
    /// Output format version (default: that of the current file)
    #[arg(long)]
    pub signature_format: Option<String>,
}
