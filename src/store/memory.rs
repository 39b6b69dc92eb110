use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::location::RiderLocationSample;
use crate::models::order::{DeliveryPhase, Order};
use crate::models::rejection::DeliveryRejection;
use crate::models::rider::{DocumentStatus, GeoPoint, Rider};
use crate::store::{
    CasOutcome, LocationStore, OrderStore, RejectionStore, RiderStore, StoreResult,
};

/// In-memory backend. Conditional updates run under the entry's exclusive
/// guard, so check-and-patch on a single row is atomic under parallel calls.
#[derive(Default)]
pub struct MemoryStore {
    orders: DashMap<Uuid, Order>,
    riders: DashMap<Uuid, Rider>,
    rejections: DashMap<Uuid, DeliveryRejection>,
    samples: DashMap<Uuid, RiderLocationSample>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.orders.len())
    }

    async fn insert(&self, order: Order) -> StoreResult<Option<Order>> {
        if self.orders.contains_key(&order.id) {
            return Ok(None);
        }
        self.orders.insert(order.id, order.clone());
        Ok(Some(order))
    }

    async fn list_unassigned(&self) -> StoreResult<Vec<Order>> {
        let mut open: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| {
                let order = entry.value();
                order.rider_id.is_none() && order.status == DeliveryPhase::PendingAssignment
            })
            .map(|entry| entry.value().clone())
            .collect();
        open.sort_by_key(|order| order.created_at);
        Ok(open)
    }

    async fn list_by_rider(&self, rider_id: Uuid) -> StoreResult<Vec<Order>> {
        let mut mine: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.value().rider_id == Some(rider_id))
            .map(|entry| entry.value().clone())
            .collect();
        mine.sort_by_key(|order| std::cmp::Reverse(order.updated_at));
        Ok(mine)
    }

    async fn list_active_by_rider(&self, rider_id: Uuid) -> StoreResult<Vec<Order>> {
        let mut active: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| {
                let order = entry.value();
                order.rider_id == Some(rider_id) && order.status == DeliveryPhase::OutForDelivery
            })
            .map(|entry| entry.value().clone())
            .collect();
        active.sort_by_key(|order| order.created_at);
        Ok(active)
    }

    async fn assign_rider(&self, id: Uuid, rider_id: Uuid) -> StoreResult<CasOutcome<Order>> {
        let Some(mut entry) = self.orders.get_mut(&id) else {
            return Ok(CasOutcome::Missing);
        };
        let order = entry.value_mut();
        if order.rider_id.is_none() && order.status == DeliveryPhase::PendingAssignment {
            order.rider_id = Some(rider_id);
            order.status = DeliveryPhase::Assigned;
            order.updated_at = Utc::now();
            Ok(CasOutcome::Updated(order.clone()))
        } else {
            Ok(CasOutcome::Conflict(order.clone()))
        }
    }

    async fn release_rider(&self, id: Uuid, rider_id: Uuid) -> StoreResult<CasOutcome<Order>> {
        let Some(mut entry) = self.orders.get_mut(&id) else {
            return Ok(CasOutcome::Missing);
        };
        let order = entry.value_mut();
        let held = order.rider_id == Some(rider_id)
            && matches!(
                order.status,
                DeliveryPhase::Assigned | DeliveryPhase::OutForDelivery
            );
        if held {
            order.rider_id = None;
            order.status = DeliveryPhase::PendingAssignment;
            if !order.rejected_riders.contains(&rider_id) {
                order.rejected_riders.push(rider_id);
            }
            order.updated_at = Utc::now();
            Ok(CasOutcome::Updated(order.clone()))
        } else {
            Ok(CasOutcome::Conflict(order.clone()))
        }
    }

    async fn transition_phase(
        &self,
        id: Uuid,
        rider_id: Uuid,
        from: DeliveryPhase,
        to: DeliveryPhase,
    ) -> StoreResult<CasOutcome<Order>> {
        let Some(mut entry) = self.orders.get_mut(&id) else {
            return Ok(CasOutcome::Missing);
        };
        let order = entry.value_mut();
        if order.status == from && order.rider_id == Some(rider_id) {
            order.status = to;
            order.updated_at = Utc::now();
            if to == DeliveryPhase::Delivered {
                order.delivered_at = Some(order.updated_at);
            }
            Ok(CasOutcome::Updated(order.clone()))
        } else {
            Ok(CasOutcome::Conflict(order.clone()))
        }
    }
}

#[async_trait]
impl RiderStore for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Rider>> {
        Ok(self.riders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.riders.len())
    }

    async fn insert(&self, rider: Rider) -> StoreResult<Option<Rider>> {
        if self.riders.contains_key(&rider.id) {
            return Ok(None);
        }
        self.riders.insert(rider.id, rider.clone());
        Ok(Some(rider))
    }

    async fn list(&self) -> StoreResult<Vec<Rider>> {
        let mut all: Vec<Rider> = self
            .riders
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|rider| rider.id);
        Ok(all)
    }

    async fn set_availability(&self, id: Uuid, available: bool) -> StoreResult<Option<Rider>> {
        Ok(self.riders.get_mut(&id).map(|mut entry| {
            let rider = entry.value_mut();
            rider.available = available;
            rider.updated_at = Utc::now();
            rider.clone()
        }))
    }

    async fn set_position(&self, id: Uuid, position: GeoPoint) -> StoreResult<Option<Rider>> {
        Ok(self.riders.get_mut(&id).map(|mut entry| {
            let rider = entry.value_mut();
            rider.location = Some(position);
            rider.updated_at = Utc::now();
            rider.clone()
        }))
    }

    async fn update_verification(
        &self,
        id: Uuid,
        document_status: Option<DocumentStatus>,
        approved: Option<bool>,
    ) -> StoreResult<Option<Rider>> {
        Ok(self.riders.get_mut(&id).map(|mut entry| {
            let rider = entry.value_mut();
            if let Some(status) = document_status {
                rider.document_status = status;
            }
            if let Some(flag) = approved {
                rider.approved = flag;
            }
            rider.updated_at = Utc::now();
            rider.clone()
        }))
    }
}

#[async_trait]
impl RejectionStore for MemoryStore {
    async fn append(&self, rejection: DeliveryRejection) -> StoreResult<DeliveryRejection> {
        self.rejections.insert(rejection.id, rejection.clone());
        Ok(rejection)
    }

    async fn list_by_rider(
        &self,
        rider_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<DeliveryRejection>> {
        let mut history: Vec<DeliveryRejection> = self
            .rejections
            .iter()
            .filter(|entry| entry.value().rider_id == rider_id)
            .map(|entry| entry.value().clone())
            .collect();
        history.sort_by_key(|rejection| std::cmp::Reverse(rejection.rejected_at));
        history.truncate(limit);
        Ok(history)
    }
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn append(&self, sample: RiderLocationSample) -> StoreResult<RiderLocationSample> {
        self.samples.insert(sample.id, sample.clone());
        Ok(sample)
    }

    async fn list_by_order(
        &self,
        order_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<RiderLocationSample>> {
        let mut history: Vec<RiderLocationSample> = self
            .samples
            .iter()
            .filter(|entry| entry.value().order_id == order_id)
            .map(|entry| entry.value().clone())
            .collect();
        history.sort_by_key(|sample| std::cmp::Reverse(sample.recorded_at));
        history.truncate(limit);
        Ok(history)
    }
}
