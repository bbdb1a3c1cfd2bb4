//! Listing subcommands - queries, speakers and SSL units.

use crate::cli::open_dataset;
use eyre::{Context, Result};
use std::io::Write;
use std::path::Path;

/// CLI arguments for query listing.
#[derive(clap::Args, Debug)]
pub struct QueriesArgs {
    /// Only list queries of this speaker
    #[arg(short, long)]
    pub speaker: Option<String>,
}

/// Resolved configuration for query listing.
#[derive(Debug)]
pub struct QueriesConfig {
    pub speaker: Option<String>,
}

impl TryFrom<QueriesArgs> for QueriesConfig {
    type Error = eyre::Error;

    fn try_from(args: QueriesArgs) -> Result<Self> {
        if let Some(speaker) = &args.speaker {
            eyre::ensure!(!speaker.is_empty(), "speaker must not be empty");
        }
        Ok(Self {
            speaker: args.speaker,
        })
    }
}

/// Print `<speaker>/<basename>` for every manifest entry.
pub fn queries(root: &Path, config: QueriesConfig, out: &mut impl Write) -> Result<()> {
    let parser = open_dataset(root)?;
    let records = parser.get_all_queries().wrap_err("failed to load queries")?;

    let mut count = 0;
    for record in records
        .iter()
        .filter(|r| config.speaker.as_ref().is_none_or(|s| &r.spk == s))
    {
        writeln!(out, "{}", record.key())?;
        count += 1;
    }

    tracing::debug!(count, total = records.len(), "listed queries");

    Ok(())
}

pub fn speakers(root: &Path, out: &mut impl Write) -> Result<()> {
    let parser = open_dataset(root)?;
    let speakers = parser.get_all_speakers().wrap_err("failed to load speakers")?;

    for speaker in speakers {
        writeln!(out, "{speaker}")?;
    }

    Ok(())
}

pub fn units(root: &Path, out: &mut impl Write) -> Result<()> {
    let parser = open_dataset(root)?;

    for name in parser.ssl_unit_names() {
        writeln!(out, "{name}")?;
    }

    Ok(())
}
