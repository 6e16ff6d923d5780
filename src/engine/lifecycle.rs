use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::fare::{self, FareRule};
use crate::engine::matcher::find_nearest_available_driver;
use crate::error::AppError;
use crate::events::RideEvent;
use crate::models::{CabType, Place, Ride, RideStatus, RideType};
use crate::observability::Metrics;
use crate::store::{LocationStore, RideStore, UserDirectory};

/// Inputs for ride creation, as supplied by the adapter. Absent ride type
/// means Local, absent cab type means Mini; a positive `fare` overrides the
/// computed one (documented integrity gap).
#[derive(Debug, Clone, Deserialize)]
pub struct RideRequestInput {
    pub pickup: Place,
    pub destination: Place,
    pub distance_km: f64,
    pub duration_minutes: u32,
    #[serde(default)]
    pub cab_type: CabType,
    #[serde(default)]
    pub ride_type: RideType,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rental_hours: Option<u32>,
    #[serde(default)]
    pub fare: Option<i64>,
}

/// The ride state machine. Every transition acquires the per-ride lease for
/// the whole read-modify-write, so transitions on one ride are serialized
/// while distinct rides proceed independently.
pub struct RideLifecycle {
    directory: Arc<UserDirectory>,
    locations: Arc<LocationStore>,
    rides: Arc<RideStore>,
    events_tx: broadcast::Sender<RideEvent>,
    metrics: Metrics,
    match_radius_km: f64,
    /// Serializes the check-match-persist section of `create` so two
    /// simultaneous requests cannot both claim the last driver, and one
    /// customer cannot slip two active rides past the duplicate check.
    create_lock: Mutex<()>,
}

impl RideLifecycle {
    pub fn new(
        directory: Arc<UserDirectory>,
        locations: Arc<LocationStore>,
        rides: Arc<RideStore>,
        events_tx: broadcast::Sender<RideEvent>,
        metrics: Metrics,
        match_radius_km: f64,
    ) -> Self {
        Self {
            directory,
            locations,
            rides,
            events_tx,
            metrics,
            match_radius_km,
            create_lock: Mutex::new(()),
        }
    }

    /// Creates a ride for the customer. Advance bookings persist as REQUESTED
    /// with no driver; every other type is matched immediately and persists
    /// as ACCEPTED, or fails without persisting anything.
    pub async fn create(
        &self,
        customer_id: Uuid,
        input: RideRequestInput,
    ) -> Result<Ride, AppError> {
        let customer = self.directory.get(customer_id)?;

        // Creation runs one at a time: the active-ride check and the
        // scan-then-claim of a driver must not interleave across requests.
        let _create_guard = self.create_lock.lock().await;

        if !input.distance_km.is_finite() || input.distance_km <= 0.0 {
            self.metrics.rides_total.with_label_values(&["rejected"]).inc();
            return Err(AppError::Validation(format!(
                "distance must be positive, got {}",
                input.distance_km
            )));
        }

        if self.rides.customer_has_active_ride(customer.id) {
            self.metrics.rides_total.with_label_values(&["rejected"]).inc();
            return Err(AppError::Validation("active ride exists".to_string()));
        }

        let rule = FareRule::for_request(
            input.ride_type,
            input.distance_km,
            input.rental_hours,
            input.scheduled_at,
        );
        let computed = fare::estimate(input.cab_type, rule).inspect_err(|_| {
            self.metrics.rides_total.with_label_values(&["rejected"]).inc();
        })?;
        let fare = fare::resolve_fare(computed, input.fare);

        let mut ride = Ride {
            id: Uuid::new_v4(),
            pickup: input.pickup,
            destination: input.destination,
            distance_km: input.distance_km,
            duration_minutes: input.duration_minutes,
            fare,
            cab_type: input.cab_type,
            ride_type: input.ride_type,
            status: RideStatus::Requested,
            customer_id: customer.id,
            driver_id: None,
            scheduled_at: input.scheduled_at,
            rental_hours: input.rental_hours,
            requested_at: Utc::now(),
            accepted_at: None,
            started_at: None,
            completed_at: None,
        };

        if ride.ride_type == RideType::Advance {
            // Scheduled rides wait for a driver; no matching at creation.
            self.rides.insert(ride.clone());
            self.metrics.rides_total.with_label_values(&["requested"]).inc();
            info!(ride_id = %ride.id, customer_id = %customer.id, "advance ride requested");
            self.publish(&ride);
            return Ok(ride);
        }

        let started = Instant::now();
        let matched = find_nearest_available_driver(
            &self.directory,
            &self.locations,
            &self.rides,
            ride.pickup.position,
            self.match_radius_km,
        );
        let elapsed = started.elapsed().as_secs_f64();

        let Some(driver_id) = matched else {
            self.metrics
                .match_latency_seconds
                .with_label_values(&["no_driver"])
                .observe(elapsed);
            self.metrics.rides_total.with_label_values(&["no_driver"]).inc();
            return Err(AppError::NoDriverAvailable);
        };

        self.metrics
            .match_latency_seconds
            .with_label_values(&["matched"])
            .observe(elapsed);

        ride.driver_id = Some(driver_id);
        ride.status = RideStatus::Accepted;
        ride.accepted_at = Some(Utc::now());
        self.rides.insert(ride.clone());

        self.metrics.rides_total.with_label_values(&["accepted"]).inc();
        info!(
            ride_id = %ride.id,
            customer_id = %customer.id,
            driver_id = %driver_id,
            fare = ride.fare,
            "ride created and driver assigned"
        );
        self.publish(&ride);

        Ok(ride)
    }

    /// ACCEPTED -> IN_PROGRESS, by the assigned driver only.
    pub async fn start(&self, driver_id: Uuid, ride_id: Uuid) -> Result<Ride, AppError> {
        let result = self.start_inner(driver_id, ride_id).await;
        self.record_transition("start", &result);
        result
    }

    async fn start_inner(&self, driver_id: Uuid, ride_id: Uuid) -> Result<Ride, AppError> {
        let driver = self.directory.get(driver_id)?;
        let lease = self.rides.lease(ride_id).await?;
        let mut ride = self.rides.get(ride_id)?;

        if ride.driver_id != Some(driver.id) {
            return Err(AppError::Forbidden("not your ride".to_string()));
        }
        if ride.status != RideStatus::Accepted {
            return Err(AppError::InvalidTransition(
                "ride must be ACCEPTED to start".to_string(),
            ));
        }

        ride.status = RideStatus::InProgress;
        ride.started_at = Some(Utc::now());
        self.rides.update(&lease, ride.clone());

        info!(ride_id = %ride.id, driver_id = %driver.id, "ride started");
        self.publish(&ride);
        Ok(ride)
    }

    /// IN_PROGRESS -> COMPLETED, by the assigned driver only. Releases the
    /// driver's availability flag.
    pub async fn complete(&self, driver_id: Uuid, ride_id: Uuid) -> Result<Ride, AppError> {
        let result = self.complete_inner(driver_id, ride_id).await;
        self.record_transition("complete", &result);
        result
    }

    async fn complete_inner(&self, driver_id: Uuid, ride_id: Uuid) -> Result<Ride, AppError> {
        let driver = self.directory.get(driver_id)?;
        let lease = self.rides.lease(ride_id).await?;
        let mut ride = self.rides.get(ride_id)?;

        if ride.driver_id != Some(driver.id) {
            return Err(AppError::Forbidden("not your ride".to_string()));
        }
        if ride.status != RideStatus::InProgress {
            return Err(AppError::InvalidTransition(
                "ride must be IN_PROGRESS to complete".to_string(),
            ));
        }

        ride.status = RideStatus::Completed;
        ride.completed_at = Some(Utc::now());
        self.rides.update(&lease, ride.clone());

        self.release_driver(driver.id);
        info!(ride_id = %ride.id, driver_id = %driver.id, "ride completed");
        self.publish(&ride);
        Ok(ride)
    }

    /// Cancellation by either party. A driver cancelling their own ride moves
    /// it to REJECTED; the customer cancelling moves it to CANCELLED. A
    /// completed (or otherwise terminal) ride cannot be cancelled.
    pub async fn cancel(
        &self,
        actor_id: Uuid,
        ride_id: Uuid,
        is_driver: bool,
    ) -> Result<Ride, AppError> {
        let result = self.cancel_inner(actor_id, ride_id, is_driver).await;
        self.record_transition("cancel", &result);
        result
    }

    async fn cancel_inner(
        &self,
        actor_id: Uuid,
        ride_id: Uuid,
        is_driver: bool,
    ) -> Result<Ride, AppError> {
        let actor = self.directory.get(actor_id)?;
        let lease = self.rides.lease(ride_id).await?;
        let mut ride = self.rides.get(ride_id)?;

        if ride.status == RideStatus::Completed {
            return Err(AppError::InvalidTransition(
                "cannot cancel a completed ride".to_string(),
            ));
        }
        if ride.status.is_terminal() {
            return Err(AppError::InvalidTransition(
                "ride is already cancelled".to_string(),
            ));
        }

        if is_driver {
            if ride.driver_id != Some(actor.id) {
                return Err(AppError::Forbidden("not your ride".to_string()));
            }
            ride.status = RideStatus::Rejected;
        } else {
            if ride.customer_id != actor.id {
                return Err(AppError::Forbidden("not your ride".to_string()));
            }
            ride.status = RideStatus::Cancelled;
        }

        self.rides.update(&lease, ride.clone());

        if let Some(driver_id) = ride.driver_id {
            self.release_driver(driver_id);
        }

        info!(
            ride_id = %ride.id,
            actor_id = %actor.id,
            is_driver,
            status = ?ride.status,
            "ride cancelled"
        );
        self.publish(&ride);
        Ok(ride)
    }

    /// Best-effort: a failure to flip the flag is logged, never surfaced to
    /// the caller of the primary transition.
    fn release_driver(&self, driver_id: Uuid) {
        match self.directory.set_availability(driver_id, true) {
            Ok(_) => {
                self.metrics
                    .drivers_available
                    .set(self.directory.available_driver_count() as i64);
            }
            Err(err) => {
                warn!(driver_id = %driver_id, error = %err, "failed to release driver availability");
            }
        }
    }

    fn record_transition(&self, transition: &str, result: &Result<Ride, AppError>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(_) => "error",
        };
        self.metrics
            .ride_transitions_total
            .with_label_values(&[transition, outcome])
            .inc();
    }

    fn publish(&self, ride: &Ride) {
        // Fire-and-forget; nobody listening is fine.
        let _ = self.events_tx.send(RideEvent::from_ride(ride));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::broadcast;
    use uuid::Uuid;

    use super::{RideLifecycle, RideRequestInput};
    use crate::error::AppError;
    use crate::models::{CabType, GeoPoint, Place, RideStatus, RideType};
    use crate::observability::Metrics;
    use crate::store::{LocationStore, RideStore, UserDirectory};

    struct Fixture {
        lifecycle: RideLifecycle,
        directory: Arc<UserDirectory>,
        locations: Arc<LocationStore>,
        rides: Arc<RideStore>,
    }

    fn fixture() -> Fixture {
        let directory = Arc::new(UserDirectory::new());
        let locations = Arc::new(LocationStore::new());
        let rides = Arc::new(RideStore::new(Duration::from_secs(1)));
        let (events_tx, _) = broadcast::channel(16);

        let lifecycle = RideLifecycle::new(
            directory.clone(),
            locations.clone(),
            rides.clone(),
            events_tx,
            Metrics::new(),
            5.0,
        );

        Fixture {
            lifecycle,
            directory,
            locations,
            rides,
        }
    }

    impl Fixture {
        fn customer(&self, email: &str) -> Uuid {
            self.directory
                .register_customer("customer".to_string(), email.to_string())
                .unwrap()
                .id
        }

        fn driver_at(&self, email: &str, lat: f64, lon: f64) -> Uuid {
            let driver = self
                .directory
                .register_driver("driver".to_string(), email.to_string(), CabType::Sedan)
                .unwrap();
            self.locations.update(driver.id, lat, lon).unwrap();
            driver.id
        }

        fn driver_available(&self, driver_id: Uuid) -> bool {
            self.directory
                .get(driver_id)
                .unwrap()
                .driver_profile
                .unwrap()
                .available
        }
    }

    fn local_request() -> RideRequestInput {
        RideRequestInput {
            pickup: Place {
                text: "MG Road".to_string(),
                position: GeoPoint {
                    lat: 12.970,
                    lon: 77.590,
                },
            },
            destination: Place {
                text: "Whitefield".to_string(),
                position: GeoPoint {
                    lat: 12.969,
                    lon: 77.750,
                },
            },
            distance_km: 10.0,
            duration_minutes: 35,
            cab_type: CabType::Sedan,
            ride_type: RideType::Local,
            scheduled_at: None,
            rental_hours: None,
            fare: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_nearest_driver_and_accepts() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        let near = fx.driver_at("near@example.com", 12.975, 77.594);
        let _far = fx.driver_at("far@example.com", 12.999, 77.640);

        let ride = fx.lifecycle.create(customer, local_request()).await.unwrap();

        assert_eq!(ride.status, RideStatus::Accepted);
        assert_eq!(ride.driver_id, Some(near));
        assert_eq!(ride.fare, 150);
        assert!(ride.accepted_at.is_some());
    }

    #[tokio::test]
    async fn create_fails_when_no_driver_and_persists_nothing() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");

        let err = fx.lifecycle.create(customer, local_request()).await.unwrap_err();
        assert!(matches!(err, AppError::NoDriverAvailable));
        assert!(fx.rides.is_empty());
    }

    #[tokio::test]
    async fn create_rejects_customer_with_active_ride() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        fx.driver_at("d@example.com", 12.975, 77.594);

        fx.lifecycle.create(customer, local_request()).await.unwrap();
        let err = fx.lifecycle.create(customer, local_request()).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(msg) if msg.contains("active ride")));
    }

    #[tokio::test]
    async fn create_unknown_customer_is_not_found() {
        let fx = fixture();
        let err = fx
            .lifecycle
            .create(Uuid::new_v4(), local_request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn advance_ride_is_requested_without_driver() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        fx.driver_at("d@example.com", 12.975, 77.594);

        let mut request = local_request();
        request.ride_type = RideType::Advance;
        request.scheduled_at = Some(chrono::Utc::now() + chrono::Duration::hours(3));

        let ride = fx.lifecycle.create(customer, request).await.unwrap();
        assert_eq!(ride.status, RideStatus::Requested);
        assert!(ride.driver_id.is_none());
        assert!(ride.accepted_at.is_none());
        // 15 * 10 * 1.1 = 165
        assert_eq!(ride.fare, 165);
    }

    #[tokio::test]
    async fn caller_supplied_fare_overrides_computed() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        fx.driver_at("d@example.com", 12.975, 77.594);

        let mut request = local_request();
        request.fare = Some(999);

        let ride = fx.lifecycle.create(customer, request).await.unwrap();
        assert_eq!(ride.fare, 999);
    }

    #[tokio::test]
    async fn concurrent_creates_assign_the_single_driver_exactly_once() {
        let fx = fixture();
        let first = fx.customer("a@example.com");
        let second = fx.customer("b@example.com");
        fx.driver_at("d@example.com", 12.975, 77.594);

        let (left, right) = tokio::join!(
            fx.lifecycle.create(first, local_request()),
            fx.lifecycle.create(second, local_request()),
        );

        let outcomes = [left, right];
        let accepted = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::NoDriverAvailable))));
        assert_eq!(fx.rides.len(), 1);
    }

    #[tokio::test]
    async fn start_requires_the_assigned_driver() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        let driver = fx.driver_at("d@example.com", 12.975, 77.594);
        let other = fx.driver_at("e@example.com", 12.976, 77.595);

        let ride = fx.lifecycle.create(customer, local_request()).await.unwrap();
        assert_eq!(ride.driver_id, Some(driver));

        let err = fx.lifecycle.start(other, ride.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let started = fx.lifecycle.start(driver, ride.id).await.unwrap();
        assert_eq!(started.status, RideStatus::InProgress);
        assert!(started.started_at.is_some());
    }

    #[tokio::test]
    async fn start_twice_fails_with_invalid_transition() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        let driver = fx.driver_at("d@example.com", 12.975, 77.594);

        let ride = fx.lifecycle.create(customer, local_request()).await.unwrap();
        fx.lifecycle.start(driver, ride.id).await.unwrap();

        let err = fx.lifecycle.start(driver, ride.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn concurrent_starts_yield_exactly_one_in_progress() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        let driver = fx.driver_at("d@example.com", 12.975, 77.594);

        let ride = fx.lifecycle.create(customer, local_request()).await.unwrap();

        let (left, right) = tokio::join!(
            fx.lifecycle.start(driver, ride.id),
            fx.lifecycle.start(driver, ride.id),
        );

        let outcomes = [left, right];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::InvalidTransition(_)))));
        assert_eq!(fx.rides.get(ride.id).unwrap().status, RideStatus::InProgress);
    }

    #[tokio::test]
    async fn complete_releases_the_driver() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        let driver = fx.driver_at("d@example.com", 12.975, 77.594);

        let ride = fx.lifecycle.create(customer, local_request()).await.unwrap();
        fx.lifecycle.start(driver, ride.id).await.unwrap();

        fx.directory.set_availability(driver, false).unwrap();
        let completed = fx.lifecycle.complete(driver, ride.id).await.unwrap();

        assert_eq!(completed.status, RideStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert!(fx.driver_available(driver));
    }

    #[tokio::test]
    async fn complete_requires_in_progress() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        let driver = fx.driver_at("d@example.com", 12.975, 77.594);

        let ride = fx.lifecycle.create(customer, local_request()).await.unwrap();
        let err = fx.lifecycle.complete(driver, ride.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn customer_cancel_yields_cancelled_and_releases_driver() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        let driver = fx.driver_at("d@example.com", 12.975, 77.594);

        let ride = fx.lifecycle.create(customer, local_request()).await.unwrap();
        fx.directory.set_availability(driver, false).unwrap();

        let cancelled = fx.lifecycle.cancel(customer, ride.id, false).await.unwrap();
        assert_eq!(cancelled.status, RideStatus::Cancelled);
        assert!(fx.driver_available(driver));
    }

    #[tokio::test]
    async fn driver_cancel_yields_rejected() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        let driver = fx.driver_at("d@example.com", 12.975, 77.594);

        let ride = fx.lifecycle.create(customer, local_request()).await.unwrap();
        let rejected = fx.lifecycle.cancel(driver, ride.id, true).await.unwrap();
        assert_eq!(rejected.status, RideStatus::Rejected);
    }

    #[tokio::test]
    async fn cancel_by_the_wrong_party_is_forbidden() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        let stranger = fx.customer("s@example.com");
        fx.driver_at("d@example.com", 12.975, 77.594);

        let ride = fx.lifecycle.create(customer, local_request()).await.unwrap();

        let err = fx.lifecycle.cancel(stranger, ride.id, false).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = fx.lifecycle.cancel(stranger, ride.id, true).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn cancel_on_completed_ride_fails_for_any_actor() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        let driver = fx.driver_at("d@example.com", 12.975, 77.594);

        let ride = fx.lifecycle.create(customer, local_request()).await.unwrap();
        fx.lifecycle.start(driver, ride.id).await.unwrap();
        fx.lifecycle.complete(driver, ride.id).await.unwrap();

        for (actor, is_driver) in [(customer, false), (driver, true)] {
            let err = fx.lifecycle.cancel(actor, ride.id, is_driver).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition(_)));
        }
    }

    #[tokio::test]
    async fn cancel_on_cancelled_ride_fails() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        fx.driver_at("d@example.com", 12.975, 77.594);

        let ride = fx.lifecycle.create(customer, local_request()).await.unwrap();
        fx.lifecycle.cancel(customer, ride.id, false).await.unwrap();

        let err = fx.lifecycle.cancel(customer, ride.id, false).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn driver_id_never_changes_once_set() {
        let fx = fixture();
        let customer = fx.customer("c@example.com");
        let driver = fx.driver_at("d@example.com", 12.975, 77.594);

        let ride = fx.lifecycle.create(customer, local_request()).await.unwrap();
        fx.lifecycle.start(driver, ride.id).await.unwrap();
        fx.lifecycle.complete(driver, ride.id).await.unwrap();

        assert_eq!(fx.rides.get(ride.id).unwrap().driver_id, Some(driver));
    }
}
