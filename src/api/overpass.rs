use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::ApiError;
use crate::config::OverpassConfig;

/// Raw Overpass API response
#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    pub elements: Vec<Element>,
    /// Set by the server when the query was cut short (timeout, out of memory)
    #[serde(default)]
    pub remark: Option<String>,
}

/// A single element from Overpass
#[derive(Debug, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: u64,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl Element {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.as_ref()?.get(key).map(String::as_str)
    }
}

/// Anything that can answer an Overpass QL query.
///
/// The fetcher shares one source across its worker threads.
pub trait PoiSource: Send + Sync {
    fn query(&self, query: &str) -> Result<OverpassResponse, ApiError>;
}

/// Blocking Overpass API client
pub struct OverpassClient {
    client: reqwest::blocking::Client,
    url: String,
}

impl OverpassClient {
    pub fn new(config: &OverpassConfig, user_agent: &str) -> Result<Self> {
        // Client timeout slightly higher than the server-side timeout in the query
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs + 60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

impl PoiSource for OverpassClient {
    fn query(&self, query: &str) -> Result<OverpassResponse, ApiError> {
        // Overpass expects form-encoded POST data: data=<query>
        let response = self.client.post(&self.url).form(&[("data", query)]).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        let body = response.text()?;
        parse_response(&body)
    }
}

/// Decode a response body, turning server-side runtime errors into failures.
///
/// Overpass answers 200 even when the query timed out on the server; the
/// only trace is a `remark` starting with "runtime error".
fn parse_response(body: &str) -> Result<OverpassResponse, ApiError> {
    let response: OverpassResponse =
        serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;

    if let Some(remark) = &response.remark
        && remark.contains("runtime error")
    {
        return Err(ApiError::Remark(remark.clone()));
    }

    Ok(response)
}
