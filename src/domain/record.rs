use serde::Serialize;

use super::Category;

/// Name written when the OSM node carries no `name` tag
pub const UNKNOWN_NAME: &str = "Unknown";

/// A point of interest as produced by the fetcher
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoiRecord {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "Tag")]
    pub category: Category,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "State")]
    pub state: String,
}

impl PoiRecord {
    pub const HEADERS: [&'static str; 6] = ["name", "lat", "lon", "Tag", "Year", "State"];
}
