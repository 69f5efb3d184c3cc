//! Binary entry point for the subtitle resolver.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use subfall_core::catalog::LanguageCatalog;
use subfall_core::config::Config;
use subfall_core::resolve::{FallbackResolver, Provenance, SearchCriteria};
use subfall_core::source::{DirectorySource, MediaId, MediaQuery};
use subfall_core::srt;
use subfall_core::translate::google::GoogleTranslator;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command line options for the binary.
#[derive(Parser)]
struct Cli {
    /// Language wanted, as a name or any code from the language catalog.
    #[arg(long, default_value = "en")]
    lang: String,

    /// Title id, `tt1234567` for a movie or `tt1234567:SEASON:EPISODE`.
    #[arg(long, conflicts_with = "name")]
    id: Option<MediaId>,

    /// Movie name, used when no id is known.
    #[arg(long)]
    name: Option<String>,

    /// Season number, with `--name`.
    #[arg(long, requires = "episode")]
    season: Option<u32>,

    /// Episode number, with `--name`.
    #[arg(long, requires = "season")]
    episode: Option<u32>,

    /// Root of the local subtitle index.
    #[arg(long)]
    subtitles_dir: PathBuf,

    /// TOML settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the subtitle; stdout when absent.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Enable verbose debug and trace logs.
    #[arg(long)]
    debug: bool,
}

impl Cli {
    /// Build the media query from `--id` or `--name`.
    fn query(&self) -> Result<MediaQuery> {
        let mut query = match (&self.id, &self.name) {
            (Some(id), _) => id.0.clone(),
            (None, Some(name)) => MediaQuery::named(name.clone()),
            (None, None) => bail!("either --id or --name is required"),
        };
        if let (Some(season), Some(episode)) = (self.season, self.episode) {
            query = query.with_episode(season, episode);
        }
        Ok(query)
    }
}

/// Set up logging, resolve the requested subtitle and write it out.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.debug {
        EnvFilter::default()
            .add_directive("subfall=trace".parse()?)
            .add_directive("subfall_core=trace".parse()?)
            .add_directive("info".parse()?)
    } else {
        EnvFilter::default()
            .add_directive("subfall=info".parse()?)
            .add_directive("subfall_core=info".parse()?)
            .add_directive("warn".parse()?)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(path) = &config.catalog.path {
        LanguageCatalog::install(LanguageCatalog::from_csv_path(path)?)?;
    }

    let criteria = SearchCriteria {
        preferred_language: cli.lang.clone(),
        query: cli.query()?,
    };
    let backend = Arc::new(GoogleTranslator::new(
        &config.backend.endpoint,
        Duration::from_secs(config.backend.timeout_secs),
    )?);
    let source = DirectorySource::new(&cli.subtitles_dir);
    let resolver = FallbackResolver::from_config(&config, source, backend);

    let resolution = resolver.resolve(&criteria).await?;
    match &resolution.provenance {
        Provenance::Direct { tier } => info!("using {tier} subtitle as found"),
        Provenance::Translated { tier, from, partial } => {
            info!("machine translated {tier} subtitle from {from}");
            if let Some(partial) = partial {
                warn!("{partial}");
            }
        }
    }

    let out = srt::format(&resolution.subtitle);
    match &cli.output {
        Some(path) => {
            std::fs::write(path, out).with_context(|| format!("writing {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => print!("{out}"),
    }
    Ok(())
}
