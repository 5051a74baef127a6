use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use super::ApiError;
use crate::config::NominatimConfig;

#[derive(Debug, Deserialize)]
struct ReverseResult {
    address: Address,
}

#[derive(Debug, Deserialize)]
struct Address {
    #[serde(default)]
    county: Option<String>,
}

/// Resolves coordinates to the county that contains them.
pub trait RegionLookup {
    fn county(&self, lat: f64, lon: f64) -> Result<Option<String>, ApiError>;
}

/// Blocking Nominatim reverse-geocoding client.
///
/// Pacing is the caller's job: Nominatim's usage policy allows at most one
/// request per second and requires an identifying User-Agent.
pub struct NominatimClient {
    client: reqwest::blocking::Client,
    url: String,
    zoom: u8,
}

impl NominatimClient {
    pub fn new(config: &NominatimConfig, user_agent: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: config.url.clone(),
            zoom: config.zoom,
        })
    }

    /// Reverse geocode one point and return its `address.county`.
    ///
    /// # Returns
    /// * `Ok(Some(county))` - Nominatim knows the county
    /// * `Ok(None)` - the address has no county (e.g. independent cities)
    /// * `Err` - transport error, any status other than 200, or a body
    ///   without an `address` object
    pub fn reverse_county(&self, lat: f64, lon: f64) -> Result<Option<String>, ApiError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("format", "json".to_string()),
                ("zoom", self.zoom.to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .send()?;

        check_status(response.status())?;

        let body = response.text()?;
        parse_county(&body)
    }
}

impl RegionLookup for NominatimClient {
    fn county(&self, lat: f64, lon: f64) -> Result<Option<String>, ApiError> {
        self.reverse_county(lat, lon)
    }
}

/// Only a plain 200 carries a usable address; any other status, including
/// other 2xx codes, counts as a failed lookup.
fn check_status(status: StatusCode) -> Result<(), ApiError> {
    if status == StatusCode::OK {
        Ok(())
    } else {
        Err(ApiError::Status(status))
    }
}

fn parse_county(body: &str) -> Result<Option<String>, ApiError> {
    let result: ReverseResult =
        serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    Ok(result.address.county)
}
