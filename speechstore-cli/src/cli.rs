//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use speechstore::parser::DataParser;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "sst")]
#[command(about = "Speech dataset feature store tools")]
#[command(version)]
pub struct Cli {
    /// Dataset root directory
    #[arg(short, long, global = true, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create the dataset directory layout
    Init(crate::init::Args),

    /// List queries from data_info.json
    Queries(crate::list::QueriesArgs),

    /// List speakers from speakers.json
    Speakers,

    /// List registered SSL units
    Units,

    /// Register an SSL unit and create its directory
    CreateUnit(crate::unit::Args),

    /// Describe the artifacts stored for a query
    Inspect(crate::inspect::Args),

    /// Print whether a query has a stored artifact
    Exists(crate::inspect::Args),
}

/// Execute CLI command, printing to stdout.
pub fn run_cli(cli: Cli) -> Result<()> {
    run(cli, &mut std::io::stdout().lock())
}

/// Execute CLI command - separated for testing.
pub fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    tracing::debug!(?cli, "parsed arguments");

    let root = cli.root;

    match cli.command {
        Commands::Init(args) => crate::init::execute(&root, args.try_into()?, out),
        Commands::Queries(args) => crate::list::queries(&root, args.try_into()?, out),
        Commands::Speakers => crate::list::speakers(&root, out),
        Commands::Units => crate::list::units(&root, out),
        Commands::CreateUnit(args) => crate::unit::execute(&root, args.try_into()?, out),
        Commands::Inspect(args) => crate::inspect::inspect(&root, args.try_into()?, out),
        Commands::Exists(args) => crate::inspect::exists(&root, args.try_into()?, out),
    }
}

/// Open the dataset at `root`, creating its minimal layout.
pub(crate) fn open_dataset(root: &Path) -> Result<DataParser> {
    DataParser::new(root).wrap_err_with(|| format!("failed to open dataset: {:?}", root.display()))
}
