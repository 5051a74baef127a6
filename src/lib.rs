//! foodmap - Collect fast-food and grocery locations from OpenStreetMap and
//! tag them with their county

pub mod api;
pub mod config;
pub mod domain;
pub mod enricher;
pub mod fetcher;
pub mod table;
