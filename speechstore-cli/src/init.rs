//! Init subcommand - create the dataset layout and register SSL units.

use crate::cli::open_dataset;
use eyre::{Context, Result};
use std::io::Write;
use std::path::Path;

/// CLI arguments for dataset initialization.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// SSL unit to register (repeatable)
    #[arg(short, long = "unit")]
    pub units: Vec<String>,
}

/// Resolved configuration for dataset initialization.
#[derive(Debug)]
pub struct Config {
    pub units: Vec<String>,
}

impl TryFrom<Args> for Config {
    type Error = eyre::Error;

    fn try_from(args: Args) -> Result<Self> {
        let mut units = args.units;
        units.sort();
        units.dedup();
        Ok(Self { units })
    }
}

pub fn execute(root: &Path, config: Config, out: &mut impl Write) -> Result<()> {
    let mut parser = open_dataset(root)?;

    for unit in &config.units {
        parser
            .create_ssl_unit_feature(unit)
            .wrap_err_with(|| format!("failed to create ssl unit: {unit}"))?;
    }

    tracing::info!(
        root = ?root.display(),
        features = parser.features().len(),
        units = parser.ssl_unit_names().count(),
        "dataset initialized"
    );

    writeln!(out, "{}", root.display())?;

    Ok(())
}
