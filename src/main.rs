use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use foodmap::api::{NominatimClient, OverpassClient};
use foodmap::config::FileConfig;
use foodmap::domain::is_known_state;
use foodmap::enricher::{Enricher, YearOutcome};
use foodmap::fetcher::{FetchPlan, Fetcher};

/// Collect fast-food and grocery locations per US state from OpenStreetMap
///
/// Examples:
///   # Fetch every state for the default years into ./locations_<year>.csv
///   foodmap fetch
///
///   # Only two states, one year
///   foodmap fetch --year 2020 --state Wyoming --state "New Mexico"
///
///   # Fill in the County column of existing files
///   foodmap enrich --data-dir Aryan_Data/location_data
#[derive(Parser, Debug)]
#[command(name = "foodmap")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (optional, auto-searches foodmap.toml if not provided)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query Overpass for every (year, state, category) and write one file per year
    Fetch {
        /// Year to fetch (repeatable, defaults to the configured years)
        #[arg(long = "year")]
        years: Vec<i32>,

        /// State to fetch (repeatable, defaults to all 50 states plus DC)
        #[arg(long = "state")]
        states: Vec<String>,

        /// Directory to write locations_<year>.csv into
        #[arg(short = 'o', long)]
        output_dir: Option<PathBuf>,
    },
    /// Reverse geocode rows that have no County yet, one request per second
    Enrich {
        /// Year to enrich (repeatable, defaults to the configured years)
        #[arg(long = "year")]
        years: Vec<i32>,

        /// Directory holding locations_<year>.csv
        #[arg(short = 'd', long)]
        data_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let total_start = Instant::now();

    let config = match args.config {
        Some(ref path) => FileConfig::load_from(path)?,
        None => FileConfig::load().unwrap_or_default(),
    };

    // RUST_LOG wins over --verbose
    let verbose = args.verbose || config.verbose;
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Fetch {
            years,
            states,
            output_dir,
        } => {
            let years = if years.is_empty() {
                config.years.clone()
            } else {
                years
            };
            let states = if states.is_empty() {
                config.states.clone()
            } else {
                states
            };
            if let Some(unknown) = states.iter().find(|s| !is_known_state(s)) {
                bail!("Unknown state: {:?}", unknown);
            }
            let output_dir = output_dir.unwrap_or_else(|| config.output_dir.clone());

            let plan = FetchPlan::new(years, states);
            info!(
                "Fetching {} years x {} queries with {} workers",
                plan.years.len(),
                plan.triples_per_year(),
                config.overpass.workers
            );

            let client = OverpassClient::new(&config.overpass, &config.user_agent)?;
            let fetcher = Fetcher::new(
                client,
                config.overpass.workers,
                config.overpass.timeout_secs,
            );

            let progress = create_progress_bar();
            let summaries = fetcher
                .run(&plan, &output_dir, &progress)
                .context("Fetch failed")?;
            progress.finish_and_clear();

            let total: usize = summaries.iter().map(|s| s.records).sum();
            info!(
                "Done! {} entries across {} files [{:.1}s]",
                total,
                summaries.len(),
                total_start.elapsed().as_secs_f32()
            );
        }
        Command::Enrich { years, data_dir } => {
            let years = if years.is_empty() {
                config.years.clone()
            } else {
                years
            };
            let data_dir = data_dir.unwrap_or_else(|| config.data_dir.clone());

            let client = NominatimClient::new(&config.nominatim, &config.user_agent)?;
            let enricher = Enricher::new(client, Duration::from_millis(config.nominatim.delay_ms));

            let progress = create_progress_bar();
            let outcomes = enricher.run(&data_dir, &years, &progress);
            progress.finish_and_clear();

            let updated = outcomes
                .iter()
                .filter(|(_, o)| matches!(o, YearOutcome::Updated(_)))
                .count();
            info!(
                "Done! {} of {} files updated [{:.1}s]",
                updated,
                outcomes.len(),
                total_start.elapsed().as_secs_f32()
            );
        }
    }

    Ok(())
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} [{bar:30}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
