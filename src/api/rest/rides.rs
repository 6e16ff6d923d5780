use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::lifecycle::RideRequestInput;
use crate::error::AppError;
use crate::models::{Ride, RideStatus, RideType};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rides", post(create_ride))
        .route("/rides/pending", get(pending_rides))
        .route("/rides/:id", get(get_ride))
        .route("/rides/:id/start", post(start_ride))
        .route("/rides/:id/complete", post(complete_ride))
        .route("/rides/:id/cancel", post(cancel_ride))
}

#[derive(Deserialize)]
pub struct CreateRideRequest {
    pub customer_id: Uuid,
    #[serde(flatten)]
    pub input: RideRequestInput,
}

#[derive(Serialize)]
pub struct CreateRideResponse {
    pub ride_id: Uuid,
    pub distance_km: f64,
    pub duration_minutes: u32,
    pub fare: i64,
    pub status: RideStatus,
}

#[derive(Deserialize)]
pub struct DriverActionRequest {
    pub driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub actor_id: Uuid,
    #[serde(default)]
    pub is_driver: bool,
}

#[derive(Serialize)]
pub struct TransitionResponse {
    pub status: RideStatus,
}

#[derive(Deserialize)]
pub struct PendingQuery {
    #[serde(rename = "type")]
    pub ride_type: RideType,
}

async fn create_ride(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRideRequest>,
) -> Result<Json<CreateRideResponse>, AppError> {
    let ride = state
        .lifecycle
        .create(payload.customer_id, payload.input)
        .await?;

    Ok(Json(CreateRideResponse {
        ride_id: ride.id,
        distance_km: ride.distance_km,
        duration_minutes: ride.duration_minutes,
        fare: ride.fare,
        status: ride.status,
    }))
}

async fn get_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.rides.get(id)?))
}

async fn start_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverActionRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let ride = state.lifecycle.start(payload.driver_id, id).await?;
    Ok(Json(TransitionResponse { status: ride.status }))
}

async fn complete_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DriverActionRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let ride = state.lifecycle.complete(payload.driver_id, id).await?;
    Ok(Json(TransitionResponse { status: ride.status }))
}

async fn cancel_ride(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    let ride = state
        .lifecycle
        .cancel(payload.actor_id, id, payload.is_driver)
        .await?;
    Ok(Json(TransitionResponse { status: ride.status }))
}

/// Scheduled rides still waiting for a driver, filtered by ride type. Browse
/// view only; no assignment happens here.
async fn pending_rides(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Vec<Ride>>, AppError> {
    if query.ride_type == RideType::Local {
        return Err(AppError::Validation(
            "local rides are matched immediately and never pending".to_string(),
        ));
    }

    Ok(Json(state.rides.pending_scheduled(query.ride_type, Utc::now())))
}
