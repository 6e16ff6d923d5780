use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Ride, RideStatus};

/// Fire-and-forget notification emitted after ride creation and after every
/// transition. Consumers subscribe via the broadcast channel; the core never
/// waits on delivery.
#[derive(Debug, Clone, Serialize)]
pub struct RideEvent {
    pub ride_id: Uuid,
    pub status: RideStatus,
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

impl RideEvent {
    pub fn from_ride(ride: &Ride) -> Self {
        Self {
            ride_id: ride.id,
            status: ride.status,
            customer_id: ride.customer_id,
            driver_id: ride.driver_id,
            at: Utc::now(),
        }
    }
}
