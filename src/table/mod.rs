use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::File;
use std::path::Path;

use crate::domain::PoiRecord;

pub const COUNTY_COLUMN: &str = "County";

/// File name shared by the fetcher (writer) and the enricher (reader)
pub fn locations_file_name(year: i32) -> String {
    format!("locations_{}.csv", year)
}

/// Write fetched records to `path`, replacing any existing file.
///
/// The header row is always written, so a year with no results still
/// produces a readable file.
pub fn write_records(path: &Path, records: &[PoiRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create locations file: {}", path.display()))?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    writer.write_record(PoiRecord::HEADERS)?;
    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    writer.flush()?;

    Ok(())
}

/// The fields the enricher cares about in one row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationRow<'a> {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub county: Option<&'a str>,
}

impl LocationRow<'_> {
    /// Both coordinates, if present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lon?))
    }
}

/// A locations file held as raw records.
///
/// Only `lat`, `lon` and `County` are interpreted; every other column is
/// carried through untouched, so a rewrite changes nothing but counties.
#[derive(Debug, Clone)]
pub struct LocationTable {
    headers: StringRecord,
    rows: Vec<StringRecord>,
    lat_idx: usize,
    lon_idx: usize,
    county_idx: usize,
}

impl LocationTable {
    /// Read a locations file. A missing `County` column is appended with
    /// every cell blank.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open locations file: {}", path.display()))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut headers = reader.headers()?.clone();
        if headers.is_empty() {
            bail!("Locations file has no header: {}", path.display());
        }

        let lat_idx = column_index(&headers, "lat", path)?;
        let lon_idx = column_index(&headers, "lon", path)?;
        let county_idx = match headers.iter().position(|h| h == COUNTY_COLUMN) {
            Some(idx) => idx,
            None => {
                headers.push_field(COUNTY_COLUMN);
                headers.len() - 1
            }
        };

        let mut rows = Vec::new();
        for (i, result) in reader.records().enumerate() {
            // Line numbers are 1-based and the header takes the first line
            let mut record =
                result.with_context(|| format!("Bad row at {}:{}", path.display(), i + 2))?;
            if record.len() < headers.len() {
                record.push_field("");
            }
            rows.push(record);
        }

        Ok(Self {
            headers,
            rows,
            lat_idx,
            lon_idx,
            county_idx,
        })
    }

    /// Rewrite the whole file, every original column included.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create locations file: {}", path.display()))?;
        let mut writer = WriterBuilder::new().from_writer(file);

        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer
                .write_record(row)
                .with_context(|| format!("Failed to write row to {}", path.display()))?;
        }
        writer.flush()?;

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    /// Parsed view of row `i`.
    ///
    /// Blank, unparsable or non-finite coordinates read as missing; a blank
    /// county reads as unset.
    pub fn row(&self, i: usize) -> LocationRow<'_> {
        let record = &self.rows[i];
        LocationRow {
            lat: parse_coordinate(record.get(self.lat_idx)),
            lon: parse_coordinate(record.get(self.lon_idx)),
            county: record.get(self.county_idx).filter(|c| !c.is_empty()),
        }
    }

    /// Raw cell of row `i` under `column`
    pub fn field(&self, i: usize, column: &str) -> Option<&str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        self.rows.get(i)?.get(idx)
    }

    /// Overwrite the county of row `i`; `None` leaves the cell blank.
    pub fn set_county(&mut self, i: usize, county: Option<&str>) {
        let county = county.unwrap_or("");
        let county_idx = self.county_idx;
        let updated: StringRecord = self.rows[i]
            .iter()
            .enumerate()
            .map(|(j, field)| if j == county_idx { county } else { field })
            .collect();
        self.rows[i] = updated;
    }
}

fn column_index(headers: &StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .with_context(|| format!("Column '{}' not found in {}", name, path.display()))
}

fn parse_coordinate(field: Option<&str>) -> Option<f64> {
    field?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
