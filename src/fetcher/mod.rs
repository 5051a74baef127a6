//! Fan-out/fan-in collection of points of interest from Overpass.
//!
//! One bounded pool per year; years run one after another.

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::api::{OverpassResponse, PoiSource};
use crate::domain::{Category, PoiRecord, UNKNOWN_NAME};
use crate::table::{locations_file_name, write_records};

/// Cross-product of years, states and categories to collect
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub years: Vec<i32>,
    pub states: Vec<String>,
    pub categories: Vec<Category>,
}

impl FetchPlan {
    pub fn new(years: Vec<i32>, states: Vec<String>) -> Self {
        Self {
            years,
            states,
            categories: Category::ALL.to_vec(),
        }
    }

    /// Every (state, category) pair queried for one year
    pub fn triples(&self) -> impl Iterator<Item = (&str, Category)> + '_ {
        self.states.iter().flat_map(move |state| {
            self.categories
                .iter()
                .map(move |&category| (state.as_str(), category))
        })
    }

    pub fn triples_per_year(&self) -> usize {
        self.states.len() * self.categories.len()
    }
}

/// What one year's fetch produced
#[derive(Debug, Clone)]
pub struct YearSummary {
    pub year: i32,
    pub path: PathBuf,
    pub records: usize,
}

pub struct Fetcher<S> {
    source: S,
    workers: usize,
    query_timeout_secs: u64,
}

impl<S: PoiSource> Fetcher<S> {
    pub fn new(source: S, workers: usize, query_timeout_secs: u64) -> Self {
        Self {
            source,
            workers: workers.max(1),
            query_timeout_secs,
        }
    }

    /// Run one query. Failures are logged and yield no records.
    pub fn fetch_triple(&self, year: i32, state: &str, category: Category) -> Vec<PoiRecord> {
        let query = category.query(year, state, self.query_timeout_secs);

        match self.source.query(&query) {
            Ok(response) => {
                let records = to_records(response, year, state, category);
                debug!("{} in {} {}: {} nodes", category, state, year, records.len());
                records
            }
            Err(e) => {
                warn!("Error for {} in {} {}: {}", category, state, year, e);
                Vec::new()
            }
        }
    }

    /// Fetch every triple of one year on a fresh pool of `workers` threads.
    ///
    /// Records are appended as tasks finish, so their order varies between
    /// runs. Returns once every task has completed.
    pub fn fetch_year(
        &self,
        plan: &FetchPlan,
        year: i32,
        progress: &ProgressBar,
    ) -> Result<Vec<PoiRecord>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(move |i| format!("fetch-{}-{}", year, i))
            .build()
            .context("Failed to build worker pool")?;

        let collected = Mutex::new(Vec::new());

        progress.set_length(plan.triples_per_year() as u64);
        progress.set_position(0);
        progress.set_message(format!("Year {}", year));

        pool.scope(|scope| {
            for (state, category) in plan.triples() {
                let collected = &collected;
                scope.spawn(move |_| {
                    let records = self.fetch_triple(year, state, category);
                    collected
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend(records);
                    progress.inc(1);
                });
            }
        });

        Ok(collected.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    /// Fetch each year in turn and write `out_dir/locations_<year>.csv`.
    pub fn run(
        &self,
        plan: &FetchPlan,
        out_dir: &Path,
        progress: &ProgressBar,
    ) -> Result<Vec<YearSummary>> {
        let mut summaries = Vec::with_capacity(plan.years.len());

        for &year in &plan.years {
            let records = self.fetch_year(plan, year, progress)?;

            let path = out_dir.join(locations_file_name(year));
            write_records(&path, &records)?;
            info!("Saved {} with {} entries", path.display(), records.len());

            summaries.push(YearSummary {
                year,
                path,
                records: records.len(),
            });
        }

        Ok(summaries)
    }
}

/// Map returned nodes to records. Elements without coordinates are dropped.
fn to_records(
    response: OverpassResponse,
    year: i32,
    state: &str,
    category: Category,
) -> Vec<PoiRecord> {
    response
        .elements
        .into_iter()
        .filter_map(|element| {
            let lat = element.lat?;
            let lon = element.lon?;
            let name = element.tag("name").unwrap_or(UNKNOWN_NAME).to_string();
            Some(PoiRecord {
                name,
                lat,
                lon,
                category,
                year,
                state: state.to_string(),
            })
        })
        .collect()
}
