//! Create-unit subcommand - register one SSL unit namespace.

use crate::cli::open_dataset;
use eyre::{Context, Result};
use speechstore::parser::DatasetParser;
use std::io::Write;
use std::path::Path;

/// CLI arguments for SSL unit creation.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Unit name, used as the directory under ssl_units/
    pub name: String,
}

/// Resolved configuration for SSL unit creation.
#[derive(Debug)]
pub struct Config {
    pub name: String,
}

impl TryFrom<Args> for Config {
    type Error = eyre::Error;

    fn try_from(args: Args) -> Result<Self> {
        let name = args.name.trim().to_string();
        eyre::ensure!(!name.is_empty(), "unit name must not be empty");
        Ok(Self { name })
    }
}

/// Register the unit and print its directory.
pub fn execute(root: &Path, config: Config, out: &mut impl Write) -> Result<()> {
    let mut parser = open_dataset(root)?;

    let created = parser
        .create_ssl_unit_feature(&config.name)
        .wrap_err_with(|| format!("failed to create ssl unit: {}", config.name))?;

    if !created {
        tracing::info!(unit = %config.name, "ssl unit already exists");
    }

    let unit = parser.ssl_unit(&config.name)?;
    writeln!(out, "{}", unit.root().display())?;

    Ok(())
}
