use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::AppError;
use crate::models::{CabType, RideType};

/// One pricing case per ride type, each with its own validation step. The
/// variant carries exactly the inputs its rule reads.
#[derive(Debug, Clone, Copy)]
pub enum FareRule {
    Local {
        distance_km: f64,
    },
    Intercity {
        distance_km: f64,
    },
    Advance {
        distance_km: f64,
        scheduled_at: Option<DateTime<Utc>>,
    },
    Rental {
        hours: Option<u32>,
    },
}

impl FareRule {
    pub fn for_request(
        ride_type: RideType,
        distance_km: f64,
        rental_hours: Option<u32>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Self {
        match ride_type {
            RideType::Local => FareRule::Local { distance_km },
            RideType::Intercity => FareRule::Intercity { distance_km },
            RideType::Advance => FareRule::Advance {
                distance_km,
                scheduled_at,
            },
            RideType::Rental => FareRule::Rental {
                hours: rental_hours,
            },
        }
    }
}

const LOCAL_MAX_KM: f64 = 25.0;
const INTERCITY_SURCHARGE: f64 = 100.0;
const ADVANCE_MULTIPLIER: f64 = 1.10;
const RENTAL_HOURLY_FACTOR: f64 = 15.0;

/// Computes the fare for one ride. Pure; the result is truncated to an
/// integer.
pub fn estimate(cab_type: CabType, rule: FareRule) -> Result<i64, AppError> {
    let base = cab_type.base_rate();

    let fare = match rule {
        FareRule::Local { distance_km } => {
            if distance_km > LOCAL_MAX_KM {
                return Err(AppError::Validation(format!(
                    "local rides cannot exceed {LOCAL_MAX_KM} km"
                )));
            }
            base * distance_km
        }
        FareRule::Intercity { distance_km } => {
            if distance_km <= LOCAL_MAX_KM {
                return Err(AppError::Validation(format!(
                    "intercity rides must exceed {LOCAL_MAX_KM} km"
                )));
            }
            base * distance_km + INTERCITY_SURCHARGE
        }
        FareRule::Advance {
            distance_km,
            scheduled_at,
        } => {
            if scheduled_at.is_none() {
                return Err(AppError::Validation(
                    "scheduled time required for advance booking".to_string(),
                ));
            }
            base * distance_km * ADVANCE_MULTIPLIER
        }
        FareRule::Rental { hours } => {
            let hours = hours.filter(|h| *h > 0).ok_or_else(|| {
                AppError::Validation("rental hours must be greater than zero".to_string())
            })?;
            base * f64::from(hours) * RENTAL_HOURLY_FACTOR
        }
    };

    Ok(fare as i64)
}

/// A strictly positive caller-supplied fare replaces the computed one. Known
/// integrity gap: the caller is trusted to set its own price. Kept as
/// documented behavior pending a policy decision; the override is logged so
/// it stays auditable.
pub fn resolve_fare(computed: i64, caller_supplied: Option<i64>) -> i64 {
    match caller_supplied {
        Some(supplied) if supplied > 0 => {
            if supplied != computed {
                warn!(computed, supplied, "caller-supplied fare overrides computed fare");
            }
            supplied
        }
        _ => computed,
    }
}
