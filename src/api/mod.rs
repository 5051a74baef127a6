pub mod error;
pub mod nominatim;
pub mod overpass;

pub use error::ApiError;
pub use nominatim::{NominatimClient, RegionLookup};
pub use overpass::{Element, OverpassClient, OverpassResponse, PoiSource};
