//! Inspect and exists subcommands - look up stored artifacts for a query.

use crate::cli::open_dataset;
use eyre::{Context, Result};
use speechstore::artifact::{Artifact, Segment};
use speechstore::parser::DatasetParser;
use speechstore::query::QueryKey;
use std::io::Write;
use std::path::Path;

/// CLI arguments naming one feature and one query.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Feature name, e.g. `mel` or `ssl_units/<unit>/dp_duration`
    pub feature: String,

    /// Query `<speaker>/<basename>[/<index>]`
    pub query: String,
}

/// Resolved feature lookup.
#[derive(Debug)]
pub struct Config {
    pub feature: String,
    pub key: QueryKey,
}

impl TryFrom<Args> for Config {
    type Error = eyre::Error;

    fn try_from(args: Args) -> Result<Self> {
        let key = args
            .query
            .parse::<QueryKey>()
            .wrap_err_with(|| format!("invalid query: {:?}", args.query))?;

        Ok(Self {
            feature: args.feature,
            key,
        })
    }
}

/// Print one line per stored artifact: path, then a short description.
pub fn inspect(root: &Path, config: Config, out: &mut impl Write) -> Result<()> {
    let parser = open_dataset(root)?;
    let feature = parser
        .get_feature(&config.feature)
        .wrap_err_with(|| format!("failed to look up feature: {}", config.feature))?;

    let paths = feature.resolve(&config.key)?;
    eyre::ensure!(
        !paths.is_empty(),
        "no {} artifact for {}",
        config.feature,
        config.key
    );

    let artifacts = feature
        .read_all(&config.key)
        .wrap_err_with(|| format!("failed to read {} for {}", config.feature, config.key))?;

    for (path, artifact) in paths.iter().zip(&artifacts) {
        writeln!(out, "{}\t{}", path.display(), describe(artifact))?;
    }

    Ok(())
}

/// Print `true` or `false`.
pub fn exists(root: &Path, config: Config, out: &mut impl Write) -> Result<()> {
    let parser = open_dataset(root)?;
    let feature = parser
        .get_feature(&config.feature)
        .wrap_err_with(|| format!("failed to look up feature: {}", config.feature))?;

    let found = feature.exists(&config.key)?;
    tracing::debug!(feature = %config.feature, key = %config.key, found, "checked artifact");

    writeln!(out, "{found}")?;
    Ok(())
}

fn describe(artifact: &Artifact) -> String {
    match artifact {
        Artifact::Array(array) => format!("array {} {:?}", array.dtype(), array.shape()),
        Artifact::Segments(segments) => {
            let total: f64 = segments.iter().map(Segment::duration).sum();
            format!("segments {} ({total:.3}s)", segments.len())
        }
        Artifact::Text(text) => format!("text {text:?}"),
        Artifact::Audio(samples) => format!("audio {} samples", samples.len()),
        Artifact::TextGrid(textgrid) => format!(
            "textgrid {} tiers ({:.3}s)",
            textgrid.tiers.len(),
            textgrid.xmax - textgrid.xmin
        ),
    }
}
