use std::collections::HashMap;

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{DriverLocation, GeoPoint};

/// In-memory last-known-position map for drivers. Entries survive only for
/// the process lifetime; a restart loses all of them.
#[derive(Default)]
pub struct LocationStore {
    locations: DashMap<Uuid, DriverLocation>,
}

impl LocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts the driver's position, stamping the current time. Each write
    /// replaces the previous entry whole; no ordering is guaranteed across
    /// different drivers.
    pub fn update(&self, driver_id: Uuid, lat: f64, lon: f64) -> Result<DriverLocation, AppError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::Validation(format!(
                "latitude must be between -90 and 90, got {lat}"
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(AppError::Validation(format!(
                "longitude must be between -180 and 180, got {lon}"
            )));
        }

        let location = DriverLocation {
            driver_id,
            position: GeoPoint { lat, lon },
            updated_at: Utc::now(),
        };
        self.locations.insert(driver_id, location.clone());

        tracing::debug!(driver_id = %driver_id, lat, lon, "driver location updated");
        Ok(location)
    }

    pub fn get(&self, driver_id: Uuid) -> Option<DriverLocation> {
        self.locations.get(&driver_id).map(|entry| entry.clone())
    }

    /// Point-in-time snapshot of every known driver position.
    pub fn snapshot(&self) -> HashMap<Uuid, DriverLocation> {
        self.locations
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Explicit eviction, e.g. when a driver goes offline.
    pub fn remove(&self, driver_id: Uuid) -> Option<DriverLocation> {
        self.locations.remove(&driver_id).map(|(_, loc)| loc)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
