pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::location::RiderLocationSample;
use crate::models::order::{DeliveryPhase, Order};
use crate::models::rejection::DeliveryRejection;
use crate::models::rider::{DocumentStatus, GeoPoint, Rider};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of a single-row conditional update. `Conflict` carries the row as
/// currently stored so the caller can report why the condition failed.
#[derive(Debug)]
pub enum CasOutcome<T> {
    Updated(T),
    Conflict(T),
    Missing,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Order>>;

    async fn count(&self) -> StoreResult<usize>;

    /// Returns `None` when a row with the same id already exists.
    async fn insert(&self, order: Order) -> StoreResult<Option<Order>>;

    /// Orders in `pending_assignment` with no rider reference.
    async fn list_unassigned(&self) -> StoreResult<Vec<Order>>;

    async fn list_by_rider(&self, rider_id: Uuid) -> StoreResult<Vec<Order>>;

    /// The rider's `out_for_delivery` orders.
    async fn list_active_by_rider(&self, rider_id: Uuid) -> StoreResult<Vec<Order>>;

    /// Set the rider iff none is set and the phase is `pending_assignment`.
    /// First writer wins; the loser observes `Conflict`.
    async fn assign_rider(&self, id: Uuid, rider_id: Uuid) -> StoreResult<CasOutcome<Order>>;

    /// Clear the rider iff `rider_id` currently holds the order and the phase
    /// is `assigned` or `out_for_delivery`. Reverts the phase to
    /// `pending_assignment` and adds the rider to the excluded set.
    async fn release_rider(&self, id: Uuid, rider_id: Uuid) -> StoreResult<CasOutcome<Order>>;

    /// Move `from -> to` iff the stored phase is exactly `from` and
    /// `rider_id` holds the order. Stamps `delivered_at` when `to` is
    /// `delivered`.
    async fn transition_phase(
        &self,
        id: Uuid,
        rider_id: Uuid,
        from: DeliveryPhase,
        to: DeliveryPhase,
    ) -> StoreResult<CasOutcome<Order>>;
}

#[async_trait]
pub trait RiderStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Rider>>;

    async fn count(&self) -> StoreResult<usize>;

    /// Returns `None` when a row with the same id already exists.
    async fn insert(&self, rider: Rider) -> StoreResult<Option<Rider>>;

    async fn list(&self) -> StoreResult<Vec<Rider>>;

    async fn set_availability(&self, id: Uuid, available: bool) -> StoreResult<Option<Rider>>;

    async fn set_position(&self, id: Uuid, position: GeoPoint) -> StoreResult<Option<Rider>>;

    /// Patch semantics: `None` fields are left untouched.
    async fn update_verification(
        &self,
        id: Uuid,
        document_status: Option<DocumentStatus>,
        approved: Option<bool>,
    ) -> StoreResult<Option<Rider>>;
}

#[async_trait]
pub trait RejectionStore: Send + Sync {
    async fn append(&self, rejection: DeliveryRejection) -> StoreResult<DeliveryRejection>;

    /// Most recent first.
    async fn list_by_rider(
        &self,
        rider_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<DeliveryRejection>>;
}

#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn append(&self, sample: RiderLocationSample) -> StoreResult<RiderLocationSample>;

    /// Most recent first.
    async fn list_by_order(
        &self,
        order_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<RiderLocationSample>>;
}
