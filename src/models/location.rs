use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::GeoPoint;

/// Last known position of one driver. One entry per driver, last write wins,
/// no history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverLocation {
    pub driver_id: Uuid,
    pub position: GeoPoint,
    pub updated_at: DateTime<Utc>,
}
