use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::engine::lifecycle::RideLifecycle;
use crate::events::RideEvent;
use crate::observability::Metrics;
use crate::store::{LocationStore, RideStore, UserDirectory};

/// Process-lifetime application state: the injectable stores, the lifecycle
/// built over them, and the event/metrics plumbing. No hidden globals; tests
/// build a fresh instance each.
pub struct AppState {
    pub directory: Arc<UserDirectory>,
    pub locations: Arc<LocationStore>,
    pub rides: Arc<RideStore>,
    pub lifecycle: RideLifecycle,
    pub events_tx: broadcast::Sender<RideEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let directory = Arc::new(UserDirectory::new());
        let locations = Arc::new(LocationStore::new());
        let rides = Arc::new(RideStore::new(Duration::from_millis(config.lease_wait_ms)));
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);
        let metrics = Metrics::new();

        let lifecycle = RideLifecycle::new(
            directory.clone(),
            locations.clone(),
            rides.clone(),
            events_tx.clone(),
            metrics.clone(),
            config.match_radius_km,
        );

        Self {
            directory,
            locations,
            rides,
            lifecycle,
            events_tx,
            metrics,
        }
    }
}
