pub mod distance;
pub mod extract;
pub mod gazetteer;
pub mod models;
pub mod prompt;

pub use distance::{haversine_km, round_km, EARTH_RADIUS_KM};
pub use extract::first_numeral;
pub use gazetteer::{Gazetteer, GazetteerError};
pub use models::*;
pub use prompt::build_estimation_prompt;
