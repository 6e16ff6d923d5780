use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Ride, RideStatus, RideType};

/// A held exclusive lease on one ride id. Dropping it releases the lease.
#[derive(Debug)]
pub struct RideLease {
    _guard: OwnedMutexGuard<()>,
    pub ride_id: Uuid,
}

/// In-memory ride records plus the exclusive-lease-by-id primitive the
/// lifecycle depends on. Rides are never deleted; terminal rides stay for
/// history queries.
pub struct RideStore {
    rides: DashMap<Uuid, Ride>,
    leases: DashMap<Uuid, Arc<Mutex<()>>>,
    lease_wait: Duration,
}

impl RideStore {
    pub fn new(lease_wait: Duration) -> Self {
        Self {
            rides: DashMap::new(),
            leases: DashMap::new(),
            lease_wait,
        }
    }

    /// Acquires the exclusive lease for `ride_id`, waiting at most the
    /// configured bound. Leases for distinct ride ids never contend. Lease
    /// entries are created on demand and kept for the process lifetime,
    /// matching the rides themselves.
    pub async fn lease(&self, ride_id: Uuid) -> Result<RideLease, AppError> {
        let mutex = self
            .leases
            .entry(ride_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let guard = timeout(self.lease_wait, mutex.lock_owned())
            .await
            .map_err(|_| AppError::Concurrency(ride_id))?;

        Ok(RideLease {
            _guard: guard,
            ride_id,
        })
    }

    pub fn insert(&self, ride: Ride) {
        self.rides.insert(ride.id, ride);
    }

    /// Writes back a mutated ride. The caller must hold the lease for it.
    pub fn update(&self, lease: &RideLease, ride: Ride) {
        debug_assert_eq!(lease.ride_id, ride.id);
        self.rides.insert(ride.id, ride);
    }

    pub fn find(&self, ride_id: Uuid) -> Option<Ride> {
        self.rides.get(&ride_id).map(|entry| entry.clone())
    }

    pub fn get(&self, ride_id: Uuid) -> Result<Ride, AppError> {
        self.find(ride_id)
            .ok_or_else(|| AppError::NotFound(format!("ride {ride_id} not found")))
    }

    pub fn find_by_customer(&self, customer_id: Uuid) -> Vec<Ride> {
        self.filter(|ride| ride.customer_id == customer_id)
    }

    pub fn find_by_driver(&self, driver_id: Uuid) -> Vec<Ride> {
        self.filter(|ride| ride.driver_id == Some(driver_id))
    }

    pub fn find_by_status(&self, status: RideStatus) -> Vec<Ride> {
        self.filter(|ride| ride.status == status)
    }

    /// Authoritative busy check: does this driver hold a ride in ACCEPTED or
    /// IN_PROGRESS? Independent of the directory's availability flag, which
    /// can be stale.
    pub fn driver_is_busy(&self, driver_id: Uuid) -> bool {
        self.rides
            .iter()
            .any(|entry| entry.driver_id == Some(driver_id) && entry.status.is_active())
    }

    pub fn customer_has_active_ride(&self, customer_id: Uuid) -> bool {
        self.rides
            .iter()
            .any(|entry| entry.customer_id == customer_id && entry.status.is_active())
    }

    /// The single ride a driver has accepted but not yet started, if any.
    pub fn accepted_ride_for_driver(&self, driver_id: Uuid) -> Option<Ride> {
        self.rides
            .iter()
            .find(|entry| {
                entry.driver_id == Some(driver_id) && entry.status == RideStatus::Accepted
            })
            .map(|entry| entry.clone())
    }

    /// REQUESTED rides of the given type whose scheduled time is still ahead.
    /// Used by the driver browse view; no auto-matching happens here.
    pub fn pending_scheduled(&self, ride_type: RideType, now: DateTime<Utc>) -> Vec<Ride> {
        self.filter(|ride| {
            ride.ride_type == ride_type
                && ride.status == RideStatus::Requested
                && ride.scheduled_at.is_some_and(|at| at > now)
        })
    }

    pub fn len(&self) -> usize {
        self.rides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rides.is_empty()
    }

    fn filter(&self, predicate: impl Fn(&Ride) -> bool) -> Vec<Ride> {
        self.rides
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.clone())
            .collect()
    }
}
