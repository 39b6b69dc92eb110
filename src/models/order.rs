use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::rider::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPhase {
    PendingAssignment,
    Assigned,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl fmt::Display for DeliveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryPhase::PendingAssignment => "pending_assignment",
            DeliveryPhase::Assigned => "assigned",
            DeliveryPhase::OutForDelivery => "out_for_delivery",
            DeliveryPhase::Delivered => "delivered",
            DeliveryPhase::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vendor_id: Uuid,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub status: DeliveryPhase,
    pub rider_id: Option<Uuid>,
    /// Riders who rejected this order, in rejection order. Barred from
    /// auto-reassignment for this order.
    pub rejected_riders: Vec<Uuid>,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn has_rejected(&self, rider_id: Uuid) -> bool {
        self.rejected_riders.contains(&rider_id)
    }
}
