use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ride::CabType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Customer,
    Driver,
}

/// Driver-only extension of the user record. The `available` flag is
/// self-reported readiness; whether the driver actually holds an active ride
/// is decided by the ride store, not by this flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverProfile {
    pub available: bool,
    pub cab_type: CabType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub driver_profile: Option<DriverProfile>,
}

impl User {
    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }
}
