//! Sequential county enrichment of the per-year locations files.
//!
//! Strictly one request in flight. Rows that already have a county, or lack
//! a coordinate, cost neither a request nor a pause, which makes re-running
//! an interrupted enrichment cheap.

use anyhow::Result;
use indicatif::ProgressBar;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::RegionLookup;
use crate::table::{LocationRow, LocationTable, locations_file_name};

/// Counters for one traversal of a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    /// Requests issued (one pause each)
    pub looked_up: usize,
    /// Requests that came back with a county
    pub resolved: usize,
    /// Requests that errored
    pub failed: usize,
    /// Rows left untouched by the skip rule
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearOutcome {
    /// No locations file for that year
    Missing,
    /// The file could not be read or written back; it is left as it was
    Failed,
    Updated(EnrichStats),
}

/// Waits between two requests
pub trait Pacer {
    fn pause(&self, delay: Duration);
}

/// Blocks the current thread for the delay
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Pacer for ThreadSleep {
    fn pause(&self, delay: Duration) {
        thread::sleep(delay);
    }
}

/// A row is looked up only when both coordinates are known and the county
/// is still unset.
pub fn needs_lookup(row: &LocationRow<'_>) -> bool {
    row.lat.is_some() && row.lon.is_some() && row.county.is_none()
}

pub struct Enricher<G, P = ThreadSleep> {
    lookup: G,
    pacer: P,
    delay: Duration,
}

impl<G: RegionLookup> Enricher<G> {
    /// `delay` is slept after every issued request, successful or not.
    pub fn new(lookup: G, delay: Duration) -> Self {
        Self::with_pacer(lookup, ThreadSleep, delay)
    }
}

impl<G: RegionLookup, P: Pacer> Enricher<G, P> {
    pub fn with_pacer(lookup: G, pacer: P, delay: Duration) -> Self {
        Self {
            lookup,
            pacer,
            delay,
        }
    }

    /// Fill in missing counties in file order. Only the county cell is ever
    /// written.
    pub fn enrich_rows(&self, table: &mut LocationTable, progress: &ProgressBar) -> EnrichStats {
        let mut stats = EnrichStats::default();

        for i in 0..table.len() {
            progress.inc(1);

            let row = table.row(i);
            let (lat, lon) = match row.coordinates() {
                Some(coords) if needs_lookup(&row) => coords,
                _ => {
                    stats.skipped += 1;
                    continue;
                }
            };

            stats.looked_up += 1;
            let county = match self.lookup.county(lat, lon) {
                Ok(county) => {
                    if county.is_some() {
                        stats.resolved += 1;
                    }
                    debug!("({}, {}) -> {:?}", lat, lon, county);
                    county
                }
                Err(e) => {
                    warn!("Error for ({}, {}): {}", lat, lon, e);
                    stats.failed += 1;
                    None
                }
            };
            table.set_county(i, county.as_deref());

            // Nominatim usage policy: max 1 request per second
            self.pacer.pause(self.delay);
        }

        stats
    }

    /// Enrich `data_dir/locations_<year>.csv` in place.
    ///
    /// The file is rewritten once, after the whole traversal.
    pub fn enrich_year(
        &self,
        data_dir: &Path,
        year: i32,
        progress: &ProgressBar,
    ) -> Result<YearOutcome> {
        let path = data_dir.join(locations_file_name(year));
        if !path.exists() {
            warn!("File not found: {}", path.display());
            return Ok(YearOutcome::Missing);
        }

        let mut table = LocationTable::read(&path)?;

        progress.set_length(table.len() as u64);
        progress.set_position(0);
        progress.set_message(format!("Updating {}", year));

        let stats = self.enrich_rows(&mut table, progress);

        table.write(&path)?;
        info!(
            "Overwritten: {} ({} looked up, {} resolved, {} failed, {} skipped)",
            path.display(),
            stats.looked_up,
            stats.resolved,
            stats.failed,
            stats.skipped
        );

        Ok(YearOutcome::Updated(stats))
    }

    /// Enrich every year in order. A missing or broken file is logged and
    /// never stops the years after it.
    pub fn run(
        &self,
        data_dir: &Path,
        years: &[i32],
        progress: &ProgressBar,
    ) -> Vec<(i32, YearOutcome)> {
        years
            .iter()
            .map(|&year| {
                let outcome = self
                    .enrich_year(data_dir, year, progress)
                    .unwrap_or_else(|e| {
                        warn!("Skipping {}: {:#}", year, e);
                        YearOutcome::Failed
                    });
                (year, outcome)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::domain::{Category, PoiRecord};
    use crate::table::write_records;
    use reqwest::StatusCode;
    use std::cell::RefCell;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    /// Knows one county at (41.8, -87.6), fails at (0, 0), and has no
    /// county anywhere else. Records every request.
    #[derive(Default)]
    struct FakeLookup {
        requests: RefCell<Vec<(f64, f64)>>,
    }

    impl RegionLookup for FakeLookup {
        fn county(&self, lat: f64, lon: f64) -> Result<Option<String>, ApiError> {
            self.requests.borrow_mut().push((lat, lon));
            if (lat, lon) == (41.8, -87.6) {
                Ok(Some("Cook".to_string()))
            } else if (lat, lon) == (0.0, 0.0) {
                Err(ApiError::Status(StatusCode::TOO_MANY_REQUESTS))
            } else {
                Ok(None)
            }
        }
    }

    /// Remembers every pause instead of sleeping
    #[derive(Default)]
    struct RecordingPacer {
        pauses: RefCell<Vec<Duration>>,
    }

    impl Pacer for RecordingPacer {
        fn pause(&self, delay: Duration) {
            self.pauses.borrow_mut().push(delay);
        }
    }

    const DELAY: Duration = Duration::from_secs(1);

    fn enricher() -> Enricher<FakeLookup, RecordingPacer> {
        Enricher::with_pacer(FakeLookup::default(), RecordingPacer::default(), DELAY)
    }

    /// Write `body` as the locations file for `year` and return its path
    fn write_year(dir: &TempDir, year: i32, body: &str) -> PathBuf {
        let path = dir.path().join(locations_file_name(year));
        fs::write(&path, body).unwrap();
        path
    }

    fn load(dir: &TempDir, body: &str) -> LocationTable {
        LocationTable::read(&write_year(dir, 2020, body)).unwrap()
    }

    #[test]
    fn test_needs_lookup() {
        let row = |lat, lon, county| LocationRow { lat, lon, county };
        assert!(needs_lookup(&row(Some(1.0), Some(2.0), None)));
        assert!(!needs_lookup(&row(Some(1.0), Some(2.0), Some("Cook"))));
        assert!(!needs_lookup(&row(None, Some(2.0), None)));
        assert!(!needs_lookup(&row(Some(1.0), None, None)));
    }

    #[test]
    fn test_resolves_county_and_leaves_other_fields() {
        let dir = tempdir().unwrap();
        let enricher = enricher();
        let mut table = load(&dir, "name,lat,lon,Tag,Year,State\nA,41.8,-87.6,Grocery,2020,Illinois\n");

        let stats = enricher.enrich_rows(&mut table, &ProgressBar::hidden());

        assert_eq!(table.row(0).county, Some("Cook"));
        assert_eq!(table.row(0).coordinates(), Some((41.8, -87.6)));
        for (column, value) in [("name", "A"), ("Tag", "Grocery"), ("Year", "2020"), ("State", "Illinois")] {
            assert_eq!(table.field(0, column), Some(value));
        }
        assert_eq!(stats.looked_up, 1);
        assert_eq!(stats.resolved, 1);
    }

    #[test]
    fn test_filled_and_incomplete_rows_cost_nothing() {
        let dir = tempdir().unwrap();
        let enricher = enricher();
        let mut table = load(
            &dir,
            "name,lat,lon,County\n\
             A,41.8,-87.6,Already Set\n\
             B,,-87.6,\n\
             C,41.8,,\n\
             D,39.0,-76.6,\n",
        );

        let stats = enricher.enrich_rows(&mut table, &ProgressBar::hidden());

        assert_eq!(*enricher.lookup.requests.borrow(), vec![(39.0, -76.6)]);
        assert_eq!(*enricher.pacer.pauses.borrow(), vec![DELAY]);
        assert_eq!(table.row(0).county, Some("Already Set"));
        assert_eq!(table.row(1).county, None);
        assert_eq!(table.row(2).county, None);
        assert_eq!(table.row(3).county, None);
        assert_eq!(
            stats,
            EnrichStats {
                looked_up: 1,
                resolved: 0,
                failed: 0,
                skipped: 3,
            }
        );
    }

    #[test]
    fn test_failed_lookup_leaves_county_unset_and_still_pauses() {
        let dir = tempdir().unwrap();
        let enricher = enricher();
        let mut table = load(&dir, "name,lat,lon\nA,0,0\nB,41.8,-87.6\n");

        let stats = enricher.enrich_rows(&mut table, &ProgressBar::hidden());

        assert_eq!(table.row(0).county, None);
        assert_eq!(table.row(1).county, Some("Cook"));
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.looked_up, 2);
        assert_eq!(enricher.pacer.pauses.borrow().len(), 2);
    }

    #[test]
    fn test_missing_file_is_skipped_without_output() {
        let dir = tempdir().unwrap();
        let enricher = enricher();

        let outcome = enricher
            .enrich_year(dir.path(), 2010, &ProgressBar::hidden())
            .unwrap();

        assert_eq!(outcome, YearOutcome::Missing);
        assert!(!dir.path().join("locations_2010.csv").exists());
        assert!(enricher.lookup.requests.borrow().is_empty());
        assert!(enricher.pacer.pauses.borrow().is_empty());
    }

    #[test]
    fn test_enrich_fetcher_output_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locations_2020.csv");
        write_records(
            &path,
            &[
                PoiRecord {
                    name: "Unknown".to_string(),
                    lat: 41.8,
                    lon: -87.6,
                    category: Category::FastFood,
                    year: 2020,
                    state: "Illinois".to_string(),
                },
                PoiRecord {
                    name: "Farm Stand".to_string(),
                    lat: 44.5,
                    lon: -89.5,
                    category: Category::Grocery,
                    year: 2020,
                    state: "Wisconsin".to_string(),
                },
            ],
        )
        .unwrap();

        let enricher = enricher();
        let outcome = enricher
            .enrich_year(dir.path(), 2020, &ProgressBar::hidden())
            .unwrap();

        assert_eq!(
            outcome,
            YearOutcome::Updated(EnrichStats {
                looked_up: 2,
                resolved: 1,
                failed: 0,
                skipped: 0,
            })
        );
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "name,lat,lon,Tag,Year,State,County\n\
             Unknown,41.8,-87.6,Fast Food,2020,Illinois,Cook\n\
             Farm Stand,44.5,-89.5,Grocery,2020,Wisconsin,\n"
        );
    }

    #[test]
    fn test_extra_columns_survive_rewrite() {
        let dir = tempdir().unwrap();
        let path = write_year(
            &dir,
            2020,
            "name,lat,lon,Tag,Year,State,brand\nA,41.8,-87.6,Grocery,2020,Illinois,Aldi\n",
        );

        let outcome = enricher()
            .enrich_year(dir.path(), 2020, &ProgressBar::hidden())
            .unwrap();

        assert!(matches!(outcome, YearOutcome::Updated(_)));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "name,lat,lon,Tag,Year,State,brand,County\nA,41.8,-87.6,Grocery,2020,Illinois,Aldi,Cook\n"
        );
    }

    #[test]
    fn test_broken_year_does_not_stop_later_years() {
        let dir = tempdir().unwrap();
        // Ragged row: more fields than the header
        let broken = "name,lat,lon\nA,41.8,-87.6,extra\n";
        let broken_path = write_year(&dir, 2010, broken);
        let good_path = write_year(
            &dir,
            2015,
            "name,lat,lon,Tag,Year,State\nB,41.8,-87.6,Cafe,,Illinois\n",
        );

        let outcomes = enricher().run(dir.path(), &[2010, 2015], &ProgressBar::hidden());

        assert_eq!(outcomes[0], (2010, YearOutcome::Failed));
        assert!(matches!(outcomes[1], (2015, YearOutcome::Updated(_))));
        assert_eq!(fs::read_to_string(&broken_path).unwrap(), broken);
        assert_eq!(
            fs::read_to_string(&good_path).unwrap(),
            "name,lat,lon,Tag,Year,State,County\nB,41.8,-87.6,Cafe,,Illinois,Cook\n"
        );
    }

    #[test]
    fn test_second_run_only_retries_unresolved_rows() {
        let dir = tempdir().unwrap();
        let path = write_year(
            &dir,
            2025,
            "name,lat,lon,County\nA,41.8,-87.6,Cook\nB,44.5,-89.5,\n",
        );

        let enricher = enricher();
        let outcomes = enricher.run(dir.path(), &[2015, 2025], &ProgressBar::hidden());

        assert_eq!(outcomes[0], (2015, YearOutcome::Missing));
        assert!(matches!(outcomes[1], (2025, YearOutcome::Updated(_))));
        assert_eq!(*enricher.lookup.requests.borrow(), vec![(44.5, -89.5)]);
        assert_eq!(LocationTable::read(&path).unwrap().row(0).county, Some("Cook"));
    }
}
