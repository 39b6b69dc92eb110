use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::models::location::RiderLocationSample;
use crate::models::order::Order;

pub mod events;

pub use events::{Event, LocationConfirmed, OrderUpdate, RiderLocationUpdate, Room};

/// Room-scoped publish/subscribe over per-room broadcast channels. Delivery is
/// at-most-once: a room with no subscribers drops the event, and a receiver
/// that falls behind loses the overwritten messages.
pub struct Hub {
    rooms: DashMap<Room, broadcast::Sender<Event>>,
    capacity: usize,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity,
        }
    }

    pub fn subscribe(&self, room: Room) -> broadcast::Receiver<Event> {
        self.rooms
            .entry(room)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn publish(&self, room: Room, event: Event) {
        if let Some(tx) = self.rooms.get(&room) {
            let _ = tx.send(event);
        }
    }

    /// Drops the room's channel once the last receiver is gone. Callers invoke
    /// this after releasing a subscription; the check runs under the entry
    /// lock, so a concurrent subscribe cannot be swept away.
    pub fn prune(&self, room: Room) {
        self.rooms.remove_if(&room, |_, tx| tx.receiver_count() == 0);
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Fans the order snapshot out to the order's room and to each party
    /// referenced by it.
    pub fn emit_order_update(&self, order: &Order) {
        let event = Event::OrderUpdate(OrderUpdate::from(order));
        self.publish(Room::Order(order.id), event.clone());
        self.publish(Room::Customer(order.customer_id), event.clone());
        self.publish(Room::Vendor(order.vendor_id), event.clone());
        if let Some(rider_id) = order.rider_id {
            self.publish(Room::Rider(rider_id), event);
        }
    }

    /// Trackers of the order get the sample; the rider gets a slim
    /// confirmation on their own room.
    pub fn emit_rider_location(&self, sample: &RiderLocationSample) {
        self.publish(
            Room::Order(sample.order_id),
            Event::RiderLocationUpdate(RiderLocationUpdate::from(sample)),
        );
        self.publish(
            Room::Rider(sample.rider_id),
            Event::LocationConfirmed(LocationConfirmed {
                order_id: sample.order_id,
                timestamp: sample.recorded_at,
            }),
        );
    }

    pub fn emit_notification(&self, room: Room, payload: serde_json::Value) {
        self.publish(room, Event::Notification(payload));
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    use super::{Event, Hub, Room};
    use crate::models::order::{DeliveryPhase, Order};
    use crate::models::rider::GeoPoint;

    fn order_row(rider_id: Option<Uuid>) -> Order {
        Order {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            vendor_id: Uuid::new_v4(),
            pickup: GeoPoint { lat: 6.5, lng: 3.4 },
            dropoff: GeoPoint {
                lat: 6.45,
                lng: 3.39,
            },
            status: DeliveryPhase::Assigned,
            rider_id,
            rejected_riders: Vec::new(),
            estimated_delivery_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            delivered_at: None,
        }
    }

    #[tokio::test]
    async fn published_events_reach_subscribers() {
        let hub = Hub::new(8);
        let room = Room::Rider(Uuid::new_v4());
        let mut rx = hub.subscribe(room);

        hub.emit_notification(room, json!({ "message": "ping" }));

        match rx.recv().await.unwrap() {
            Event::Notification(payload) => assert_eq!(payload["message"], "ping"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let hub = Hub::new(8);
        let target = Room::Order(Uuid::new_v4());
        let bystander = Room::Order(Uuid::new_v4());
        let mut rx = hub.subscribe(bystander);

        hub.emit_notification(target, json!({}));

        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn order_update_reaches_every_party() {
        let hub = Hub::new(8);
        let order = order_row(Some(Uuid::new_v4()));

        let mut order_rx = hub.subscribe(Room::Order(order.id));
        let mut customer_rx = hub.subscribe(Room::Customer(order.customer_id));
        let mut vendor_rx = hub.subscribe(Room::Vendor(order.vendor_id));
        let mut rider_rx = hub.subscribe(Room::Rider(order.rider_id.unwrap()));

        hub.emit_order_update(&order);

        for rx in [&mut order_rx, &mut customer_rx, &mut vendor_rx, &mut rider_rx] {
            match rx.recv().await.unwrap() {
                Event::OrderUpdate(update) => assert_eq!(update.order_id, order.id),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let hub = Hub::new(8);
        hub.emit_order_update(&order_row(None));
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn prune_drops_abandoned_rooms_only() {
        let hub = Hub::new(8);
        let held = Room::Order(Uuid::new_v4());
        let abandoned = Room::Order(Uuid::new_v4());

        let _rx = hub.subscribe(held);
        drop(hub.subscribe(abandoned));
        assert_eq!(hub.room_count(), 2);

        hub.prune(held);
        hub.prune(abandoned);
        assert_eq!(hub.room_count(), 1);
    }
}
