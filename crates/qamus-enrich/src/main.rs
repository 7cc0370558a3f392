//! `qamus-enrich` binary.
//!
//! Reads `qamus.toml` (or the file given with `--config`) and `QAMUS_*`
//! environment variables, applies command-line overrides, and runs one
//! enrichment pass over the store. Exits non-zero only if the store cannot be
//! opened or the search index cannot be restored; the summary is printed
//! either way.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use qamus_core::{
  analysis::{Analyzer, UnavailableAnalyzer},
  candidate::CandidateSource,
};
use qamus_enrich::{EnrichmentStats, Orchestrator, Settings, TableAnalyzer};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Derive missing roots for Qamus lexicon entries")]
struct Cli {
  /// Path to the SQLite store.
  #[arg(long)]
  db: Option<PathBuf>,

  /// Entries per page (one transaction each).
  #[arg(long)]
  batch_size: Option<usize>,

  /// Stop after visiting this many entries.
  #[arg(long)]
  max_entries: Option<usize>,

  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "qamus.toml")]
  config: PathBuf,

  /// JSON table of analyzer output keyed by word.
  #[arg(long)]
  analyses: Option<PathBuf>,

  /// Candidate strategies in order of trust, e.g. `external,pattern`.
  #[arg(long, value_delimiter = ',')]
  strategies: Option<Vec<CandidateSource>>,

  /// Visits without an accepted root before an entry is skipped.
  #[arg(long)]
  max_attempts: Option<u32>,

  /// Rebuild the search index after the run.
  #[arg(long)]
  rebuild_index: bool,

  /// Return skipped entries to pending before the run.
  #[arg(long)]
  reset_skipped: bool,

  /// Print the summary as JSON.
  #[arg(long)]
  json: bool,

  /// Also write the JSON summary to this file.
  #[arg(long)]
  summary_out: Option<PathBuf>,
}

impl Cli {
  fn apply(&self, settings: &mut Settings) {
    let enrich = &mut settings.enrich;
    if let Some(db) = &self.db {
      settings.db = Some(db.clone());
    }
    if let Some(analyses) = &self.analyses {
      settings.analyses = Some(analyses.clone());
    }
    if let Some(n) = self.batch_size {
      enrich.batch_size = n;
    }
    if self.max_entries.is_some() {
      enrich.max_entries = self.max_entries;
    }
    if let Some(strategies) = &self.strategies {
      enrich.strategies = strategies.clone();
    }
    if let Some(n) = self.max_attempts {
      enrich.max_attempts = n;
    }
    enrich.rebuild_index |= self.rebuild_index;
    enrich.reset_skipped |= self.reset_skipped;
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let mut settings = Settings::load(&cli.config).context("failed to read configuration")?;
  cli.apply(&mut settings);
  settings.enrich.validate().context("invalid configuration")?;

  let db = settings
    .db
    .clone()
    .context("no store given; pass --db or set QAMUS_DB")?;

  let store = qamus_enrich::open_store(&db, &settings.enrich)
    .await
    .with_context(|| format!("failed to open store at {db:?}"))?;

  let analyzer: Box<dyn Analyzer> = match &settings.analyses {
    Some(path) => Box::new(
      TableAnalyzer::from_path(path)
        .with_context(|| format!("failed to load analysis table {path:?}"))?,
    ),
    None => {
      tracing::info!("no analysis table configured; external analyzer unavailable");
      Box::new(UnavailableAnalyzer)
    }
  };

  let orchestrator = Orchestrator::new(store, analyzer, settings.enrich);

  // Ctrl-C finishes the current page, then stops.
  let stop = orchestrator.stop_handle();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::warn!("interrupt received; stopping after the current page");
      stop.request();
    }
  });

  match orchestrator.run().await {
    Ok(stats) => report(&cli, &stats)?,
    Err(err) => {
      // Pages committed before a fatal error are still reported.
      if let Some(stats) = err.partial_stats() {
        report(&cli, stats)?;
      }
      return Err(anyhow::Error::new(err).context("enrichment aborted"));
    }
  }

  Ok(())
}

fn report(cli: &Cli, stats: &EnrichmentStats) -> anyhow::Result<()> {
  if cli.json {
    println!("{}", serde_json::to_string_pretty(stats)?);
  } else {
    print!("{stats}");
  }

  if let Some(path) = &cli.summary_out {
    std::fs::write(path, serde_json::to_vec_pretty(stats)?)
      .with_context(|| format!("failed to write summary to {path:?}"))?;
  }
  Ok(())
}
