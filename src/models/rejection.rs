use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit record of a rider turning down an assigned delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRejection {
    pub id: Uuid,
    pub order_id: Uuid,
    pub rider_id: Uuid,
    pub reason: String,
    pub suggested_rider_id: Option<Uuid>,
    pub rejected_at: DateTime<Utc>,
}
