use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CabType {
    Mini,
    Sedan,
    Suv,
}

impl CabType {
    /// Lenient parse: unknown or blank names fall back to Mini.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "SEDAN" => CabType::Sedan,
            "SUV" => CabType::Suv,
            _ => CabType::Mini,
        }
    }

    pub fn base_rate(&self) -> f64 {
        match self {
            CabType::Mini => 10.0,
            CabType::Sedan => 15.0,
            CabType::Suv => 20.0,
        }
    }
}

impl Default for CabType {
    fn default() -> Self {
        CabType::Mini
    }
}

impl<'de> Deserialize<'de> for CabType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(CabType::from_name(&name))
    }
}

/// An absent or blank ride type on the wire means Local; the default lives on
/// the enum itself rather than at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideType {
    #[default]
    Local,
    Intercity,
    Advance,
    Rental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Requested,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
}

impl RideStatus {
    /// Terminal rides accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RideStatus::Completed | RideStatus::Cancelled | RideStatus::Rejected
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RideStatus::Accepted | RideStatus::InProgress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub text: String,
    pub position: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub pickup: Place,
    pub destination: Place,
    pub distance_km: f64,
    pub duration_minutes: u32,
    pub fare: i64,
    pub cab_type: CabType,
    pub ride_type: RideType,
    pub status: RideStatus,
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub rental_hours: Option<u32>,
    pub requested_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
