use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{DriverLocation, Ride, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/drivers/:id/location",
            put(update_location).get(get_location).delete(remove_location),
        )
        .route("/drivers/:id/availability", patch(set_availability))
        .route("/drivers/:id/current-ride", get(current_ride))
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Deserialize)]
pub struct SetAvailabilityRequest {
    pub available: bool,
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<DriverLocation>, AppError> {
    let driver = state.directory.get(id)?;
    if !driver.is_driver() {
        return Err(AppError::Validation(format!("user {id} is not a driver")));
    }

    let location = state.locations.update(driver.id, payload.lat, payload.lon)?;
    Ok(Json(location))
}

async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverLocation>, AppError> {
    state
        .locations
        .get(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no location for driver {id}")))
}

async fn remove_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    state.locations.remove(id);
    StatusCode::NO_CONTENT
}

async fn set_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetAvailabilityRequest>,
) -> Result<Json<User>, AppError> {
    let user = state.directory.set_availability(id, payload.available)?;

    state
        .metrics
        .drivers_available
        .set(state.directory.available_driver_count() as i64);

    Ok(Json(user))
}

/// The ride this driver has accepted but not yet started, if any.
async fn current_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    state
        .rides
        .accepted_ride_for_driver(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no accepted ride for driver {id}")))
}
