use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CabType, Ride, User};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/customers", post(register_customer))
        .route("/drivers", post(register_driver))
        .route("/users/:id", get(get_user))
        .route("/users/:id/rides", get(ride_history))
}

#[derive(Deserialize)]
pub struct RegisterCustomerRequest {
    pub name: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct RegisterDriverRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub cab_type: CabType,
}

async fn register_customer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterCustomerRequest>,
) -> Result<Json<User>, AppError> {
    let user = state
        .directory
        .register_customer(payload.name, payload.email)?;
    Ok(Json(user))
}

async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterDriverRequest>,
) -> Result<Json<User>, AppError> {
    let user = state
        .directory
        .register_driver(payload.name, payload.email, payload.cab_type)?;

    state
        .metrics
        .drivers_available
        .set(state.directory.available_driver_count() as i64);

    Ok(Json(user))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.directory.get(id)?))
}

/// Rides this user was a party to, as customer or as driver. Terminal rides
/// are never deleted, so this is the full history.
async fn ride_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Ride>>, AppError> {
    let user = state.directory.get(id)?;

    let rides = if user.is_driver() {
        state.rides.find_by_driver(user.id)
    } else {
        state.rides.find_by_customer(user.id)
    };

    Ok(Json(rides))
}
