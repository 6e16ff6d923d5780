use tracing::debug;
use uuid::Uuid;

use crate::geo::haversine_km;
use crate::models::GeoPoint;
use crate::store::{LocationStore, RideStore, UserDirectory};

/// Scans the whole driver directory and picks the closest eligible driver to
/// the pickup point. Linear over the fleet; fine for bounded fleet sizes, a
/// spatial index is deliberately out of scope.
///
/// Eligibility: availability flag set, a known location, and no ride already
/// in ACCEPTED or IN_PROGRESS (the ride-store scan is authoritative; the flag
/// alone can be stale). Ties on distance break to the lowest driver id so the
/// outcome is deterministic regardless of directory iteration order.
pub fn find_nearest_available_driver(
    directory: &UserDirectory,
    locations: &LocationStore,
    rides: &RideStore,
    pickup: GeoPoint,
    max_radius_km: f64,
) -> Option<Uuid> {
    let candidate = directory
        .drivers()
        .into_iter()
        .filter(|driver| {
            driver
                .driver_profile
                .as_ref()
                .is_some_and(|profile| profile.available)
        })
        .filter_map(|driver| {
            let location = locations.get(driver.id)?;
            Some((driver.id, haversine_km(&pickup, &location.position)))
        })
        .filter(|(driver_id, _)| !rides.driver_is_busy(*driver_id))
        .filter(|(_, distance_km)| *distance_km <= max_radius_km)
        .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    match candidate {
        Some((driver_id, distance_km)) => {
            debug!(driver_id = %driver_id, distance_km, "matched nearest driver");
            Some(driver_id)
        }
        None => None,
    }
}
