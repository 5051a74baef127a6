pub mod category;
pub mod record;
pub mod states;

pub use category::Category;
pub use record::{PoiRecord, UNKNOWN_NAME};
pub use states::{US_STATES, is_known_state};
