use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::US_STATES;

fn default_years() -> Vec<i32> {
    vec![2010, 2015, 2020, 2025]
}
fn default_states() -> Vec<String> {
    US_STATES.iter().map(|s| s.to_string()).collect()
}
fn default_user_agent() -> String {
    "foodmap/0.1.0 (contact@example.com)".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("Aryan_Data/location_data")
}
fn default_verbose() -> bool {
    false
}

#[derive(Debug, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_years")]
    pub years: Vec<i32>,
    #[serde(default = "default_states")]
    pub states: Vec<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Where `fetch` writes its per-year files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Where `enrich` looks for per-year files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_verbose")]
    pub verbose: bool,
    #[serde(default)]
    pub overpass: OverpassConfig,
    #[serde(default)]
    pub nominatim: NominatimConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            years: default_years(),
            states: default_states(),
            user_agent: default_user_agent(),
            output_dir: default_output_dir(),
            data_dir: default_data_dir(),
            verbose: default_verbose(),
            overpass: OverpassConfig::default(),
            nominatim: NominatimConfig::default(),
        }
    }
}

fn default_overpass_url() -> String {
    "https://overpass-api.de/api/interpreter".to_string()
}

fn default_query_timeout_secs() -> u64 {
    1800
}

fn default_workers() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverpassConfig {
    #[serde(default = "default_overpass_url")]
    pub url: String,
    /// Server-side timeout embedded in every query
    #[serde(default = "default_query_timeout_secs")]
    pub timeout_secs: u64,
    /// Concurrent in-flight queries per year
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            url: default_overpass_url(),
            timeout_secs: default_query_timeout_secs(),
            workers: default_workers(),
        }
    }
}

fn default_nominatim_url() -> String {
    "https://nominatim.openstreetmap.org/reverse".to_string()
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_zoom() -> u8 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct NominatimConfig {
    #[serde(default = "default_nominatim_url")]
    pub url: String,
    /// Pause after every issued request (Nominatim allows 1 req/s)
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Zoom 10 resolves to county-level addresses
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            url: default_nominatim_url(),
            delay_ms: default_delay_ms(),
            zoom: default_zoom(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl FileConfig {
    /// Search the usual locations and return the first config that parses.
    ///
    /// Order: `./foodmap.toml`, `./.foodmap.toml`,
    /// `<config dir>/foodmap/config.toml`, `<config dir>/foodmap.toml`,
    /// `~/.foodmap.toml`, `~/.config/foodmap/config.toml`. A file that exists
    /// but fails to parse is reported and the search moves on.
    pub fn load() -> Option<Self> {
        let config_paths = get_config_paths();

        for path in config_paths {
            if path.exists()
                && let Ok(contents) = std::fs::read_to_string(&path)
            {
                match toml::from_str(&contents) {
                    Ok(config) => return Some(config),
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config file {:?}: {}", path, e);
                    }
                }
            }
        }
        None
    }

    /// Load an explicitly requested config file. Unlike [`FileConfig::load`],
    /// a missing or broken file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Config file not found: {:?}", path);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&contents).context("Failed to parse config file")
    }
}

/// Candidate config files, working directory first, then per-user locations
fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("foodmap.toml"));
    paths.push(PathBuf::from(".foodmap.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("foodmap").join("config.toml"));
        paths.push(config_dir.join("foodmap.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".foodmap.toml"));
        paths.push(home.join(".config").join("foodmap").join("config.toml"));
    }

    paths
}
