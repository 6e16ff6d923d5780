pub mod location;
pub mod ride;
pub mod user;

pub use location::DriverLocation;
pub use ride::{CabType, Place, Ride, RideStatus, RideType};
pub use user::{DriverProfile, Role, User};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}
