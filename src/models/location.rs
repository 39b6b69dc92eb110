use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only location history row. One row is written per active
/// (out_for_delivery) order each time the rider reports a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderLocationSample {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub order_id: Uuid,
    pub lat: f64,
    pub lng: f64,
    pub accuracy_m: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub heading: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}
