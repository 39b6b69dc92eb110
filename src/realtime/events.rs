use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::RiderLocationSample;
use crate::models::order::{DeliveryPhase, Order};

/// A named broadcast group. Connections join and leave rooms; events are
/// fanned out to every subscriber of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    Order(Uuid),
    Rider(Uuid),
    Customer(Uuid),
    Vendor(Uuid),
}

impl Room {
    /// Parses the wire form `kind:<uuid>`, e.g. `order:6f9c...`.
    pub fn parse(raw: &str) -> Option<Room> {
        let (kind, id) = raw.split_once(':')?;
        let id: Uuid = id.parse().ok()?;
        match kind {
            "order" => Some(Room::Order(id)),
            "rider" => Some(Room::Rider(id)),
            "customer" => Some(Room::Customer(id)),
            "vendor" => Some(Room::Vendor(id)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Room::Order(id) => write!(f, "order:{id}"),
            Room::Rider(id) => write!(f, "rider:{id}"),
            Room::Customer(id) => write!(f, "customer:{id}"),
            Room::Vendor(id) => write!(f, "vendor:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    OrderUpdate(OrderUpdate),
    RiderLocationUpdate(RiderLocationUpdate),
    LocationConfirmed(LocationConfirmed),
    Notification(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub order_id: Uuid,
    pub status: DeliveryPhase,
    pub customer_id: Uuid,
    pub vendor_id: Uuid,
    pub rider_id: Option<Uuid>,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderUpdate {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            status: order.status,
            customer_id: order.customer_id,
            vendor_id: order.vendor_id,
            rider_id: order.rider_id,
            estimated_delivery_date: order.estimated_delivery_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderLocationUpdate {
    pub rider_id: Uuid,
    pub order_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl From<&RiderLocationSample> for RiderLocationUpdate {
    fn from(sample: &RiderLocationSample) -> Self {
        Self {
            rider_id: sample.rider_id,
            order_id: sample.order_id,
            latitude: sample.lat,
            longitude: sample.lng,
            heading: sample.heading,
            speed: sample.speed_kmh,
            timestamp: sample.recorded_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfirmed {
    pub order_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::Room;

    #[test]
    fn room_wire_form_round_trips() {
        let id = Uuid::new_v4();
        for room in [
            Room::Order(id),
            Room::Rider(id),
            Room::Customer(id),
            Room::Vendor(id),
        ] {
            assert_eq!(Room::parse(&room.to_string()), Some(room));
        }
    }

    #[test]
    fn malformed_rooms_do_not_parse() {
        assert_eq!(Room::parse("order"), None);
        assert_eq!(Room::parse("order:not-a-uuid"), None);
        assert_eq!(
            Room::parse(&format!("warehouse:{}", Uuid::new_v4())),
            None
        );
    }
}
