use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::directory::RiderDirectory;
use crate::engine::status;
use crate::engine::validate_coordinates;
use crate::error::AppError;
use crate::geo::within_radius_km;
use crate::models::order::{DeliveryPhase, Order};
use crate::models::rejection::DeliveryRejection;
use crate::models::rider::{DocumentStatus, GeoPoint, Rider};
use crate::observability::Metrics;
use crate::realtime::{Hub, Room};
use crate::store::{CasOutcome, OrderStore, RejectionStore};

/// Binds orders to riders: pool listing, self-service acceptance, rejection
/// with recovery, and the rider-driven status transitions.
pub struct AssignmentEngine {
    orders: Arc<dyn OrderStore>,
    rejections: Arc<dyn RejectionStore>,
    directory: Arc<RiderDirectory>,
    hub: Arc<Hub>,
    metrics: Metrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectOutcome {
    pub order: Order,
    pub rejection: DeliveryRejection,
    pub reassigned_to: Option<Uuid>,
}

impl AssignmentEngine {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        rejections: Arc<dyn RejectionStore>,
        directory: Arc<RiderDirectory>,
        hub: Arc<Hub>,
        metrics: Metrics,
    ) -> Self {
        Self {
            orders,
            rejections,
            directory,
            hub,
            metrics,
        }
    }

    pub async fn place_order(
        &self,
        customer_id: Uuid,
        vendor_id: Uuid,
        pickup: GeoPoint,
        dropoff: GeoPoint,
        estimated_delivery_date: Option<DateTime<Utc>>,
    ) -> Result<Order, AppError> {
        validate_coordinates(pickup.lat, pickup.lng)?;
        validate_coordinates(dropoff.lat, dropoff.lng)?;

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            customer_id,
            vendor_id,
            pickup,
            dropoff,
            status: DeliveryPhase::PendingAssignment,
            rider_id: None,
            rejected_riders: Vec::new(),
            estimated_delivery_date,
            created_at: now,
            updated_at: now,
            delivered_at: None,
        };

        let order = self
            .orders
            .insert(order)
            .await?
            .ok_or_else(|| AppError::Conflict("order already exists".to_string()))?;

        self.hub.emit_order_update(&order);
        info!(order_id = %order.id, customer_id = %customer_id, "order placed");
        Ok(order)
    }

    pub async fn order(&self, id: Uuid) -> Result<Order, AppError> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
    }

    pub async fn order_count(&self) -> Result<usize, AppError> {
        Ok(self.orders.count().await?)
    }

    /// Open pool as seen by one rider: unassigned orders the rider has not
    /// already rejected, optionally narrowed to pickups within `radius_km` of
    /// the rider's last known position.
    pub async fn available_for(
        &self,
        rider_id: Uuid,
        radius_km: Option<f64>,
    ) -> Result<Vec<Order>, AppError> {
        let rider = self.directory.ensure_eligible(rider_id).await?;

        let center = match radius_km {
            Some(radius) => {
                if !(radius > 0.0) {
                    return Err(AppError::InvalidInput(
                        "radius_km must be a positive number".to_string(),
                    ));
                }
                let position = rider.location.ok_or_else(|| {
                    AppError::InvalidInput(
                        "rider has no recorded position to filter by radius".to_string(),
                    )
                })?;
                Some((position, radius))
            }
            None => None,
        };

        let pool = self
            .orders
            .list_unassigned()
            .await?
            .into_iter()
            .filter(|order| !order.has_rejected(rider_id))
            .filter(|order| match center {
                Some((position, radius)) => within_radius_km(&position, &order.pickup, radius),
                None => true,
            })
            .collect();

        Ok(pool)
    }

    pub async fn deliveries_for(&self, rider_id: Uuid) -> Result<Vec<Order>, AppError> {
        self.directory.rider(rider_id).await?;
        Ok(self.orders.list_by_rider(rider_id).await?)
    }

    /// Self-service acceptance. The rider reference is set iff it is currently
    /// null; under a race exactly one caller wins and the rest get `Conflict`.
    pub async fn accept(&self, rider_id: Uuid, order_id: Uuid) -> Result<Order, AppError> {
        let rider = self.directory.ensure_eligible(rider_id).await?;

        match self.orders.assign_rider(order_id, rider.id).await? {
            CasOutcome::Updated(order) => {
                self.metrics
                    .assignments_total
                    .with_label_values(&["accepted"])
                    .inc();
                self.hub.emit_order_update(&order);
                info!(order_id = %order.id, rider_id = %rider.id, "delivery accepted");
                Ok(order)
            }
            CasOutcome::Conflict(_) => {
                self.metrics
                    .assignments_total
                    .with_label_values(&["conflict"])
                    .inc();
                Err(AppError::Conflict(
                    "delivery is not open for acceptance".to_string(),
                ))
            }
            CasOutcome::Missing => Err(AppError::NotFound(format!("order {order_id} not found"))),
        }
    }

    /// Post-assignment rejection. Records the audit row, returns the order to
    /// the pool with the rejecting rider excluded, and honors an eligible
    /// suggested rider by assigning them on the spot.
    pub async fn reject(
        &self,
        rider_id: Uuid,
        order_id: Uuid,
        reason: &str,
        suggested_rider_id: Option<Uuid>,
    ) -> Result<RejectOutcome, AppError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::InvalidInput(
                "rejection reason is required".to_string(),
            ));
        }

        let released = match self.orders.release_rider(order_id, rider_id).await? {
            CasOutcome::Updated(order) => order,
            CasOutcome::Conflict(current) => {
                return Err(if current.has_rejected(rider_id) {
                    AppError::Conflict("delivery was already rejected".to_string())
                } else {
                    AppError::Forbidden(
                        "only the assigned rider may reject a delivery".to_string(),
                    )
                });
            }
            CasOutcome::Missing => {
                return Err(AppError::NotFound(format!("order {order_id} not found")));
            }
        };

        let rejection = self
            .rejections
            .append(DeliveryRejection {
                id: Uuid::new_v4(),
                order_id,
                rider_id,
                reason: reason.to_string(),
                suggested_rider_id,
                rejected_at: Utc::now(),
            })
            .await?;

        let mut order = released;
        let mut reassigned_to = None;

        if let Some(candidate_id) = suggested_rider_id {
            if self.reassignable(&order, candidate_id).await {
                if let CasOutcome::Updated(assigned) =
                    self.orders.assign_rider(order_id, candidate_id).await?
                {
                    self.hub.emit_notification(
                        Room::Rider(candidate_id),
                        json!({
                            "order_id": order_id,
                            "message": "a delivery has been reassigned to you",
                        }),
                    );
                    order = assigned;
                    reassigned_to = Some(candidate_id);
                }
            } else {
                warn!(
                    order_id = %order_id,
                    suggested_rider_id = %candidate_id,
                    "suggested rider not usable; delivery returned to pool"
                );
            }
        }

        let outcome_label = if reassigned_to.is_some() {
            "reassigned"
        } else {
            "pool"
        };
        self.metrics
            .rejections_total
            .with_label_values(&[outcome_label])
            .inc();
        self.hub.emit_order_update(&order);
        info!(
            order_id = %order_id,
            rider_id = %rider_id,
            outcome = outcome_label,
            "delivery rejected"
        );

        Ok(RejectOutcome {
            order,
            rejection,
            reassigned_to,
        })
    }

    async fn reassignable(&self, order: &Order, candidate_id: Uuid) -> bool {
        !order.has_rejected(candidate_id)
            && self.directory.ensure_eligible(candidate_id).await.is_ok()
    }

    pub async fn rejection_history(
        &self,
        rider_id: Uuid,
        limit: usize,
    ) -> Result<Vec<DeliveryRejection>, AppError> {
        Ok(self.rejections.list_by_rider(rider_id, limit).await?)
    }

    pub async fn eligible_for_reassignment(&self, order_id: Uuid) -> Result<Vec<Rider>, AppError> {
        let order = self.order(order_id).await?;
        self.directory
            .eligible_excluding(&order.rejected_riders)
            .await
    }

    /// Rider-driven phase change, checked-and-set against the stored phase so
    /// a stale read can never apply a backward or repeated transition.
    pub async fn update_status(
        &self,
        rider_id: Uuid,
        order_id: Uuid,
        target: DeliveryPhase,
    ) -> Result<Order, AppError> {
        let order = self.order(order_id).await?;

        if order.rider_id != Some(rider_id) {
            return Err(AppError::Forbidden(
                "only the assigned rider may update delivery status".to_string(),
            ));
        }

        let Some(required_from) = status::required_source(target) else {
            return Err(AppError::InvalidTransition {
                from: order.status,
                requested: target,
            });
        };

        if target == DeliveryPhase::OutForDelivery {
            let rider = self.directory.rider(rider_id).await?;
            if rider.document_status != DocumentStatus::Approved {
                return Err(AppError::UnverifiedDocuments {
                    status: rider.document_status,
                });
            }
        }

        match self
            .orders
            .transition_phase(order_id, rider_id, required_from, target)
            .await?
        {
            CasOutcome::Updated(order) => {
                self.metrics
                    .status_transitions_total
                    .with_label_values(&[&target.to_string()])
                    .inc();
                self.hub.emit_order_update(&order);
                info!(order_id = %order.id, rider_id = %rider_id, status = %order.status, "delivery status updated");
                Ok(order)
            }
            CasOutcome::Conflict(current) => Err(AppError::InvalidTransition {
                from: current.status,
                requested: target,
            }),
            CasOutcome::Missing => Err(AppError::NotFound(format!("order {order_id} not found"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::AssignmentEngine;
    use crate::engine::directory::RiderDirectory;
    use crate::error::AppError;
    use crate::models::order::DeliveryPhase;
    use crate::models::rider::{DocumentStatus, GeoPoint};
    use crate::observability::Metrics;
    use crate::realtime::{Event, Hub, Room};
    use crate::store::memory::MemoryStore;
    use crate::store::OrderStore;

    struct Fixture {
        engine: AssignmentEngine,
        directory: Arc<RiderDirectory>,
        hub: Arc<Hub>,
        store: Arc<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let directory = Arc::new(RiderDirectory::new(store.clone()));
        let hub = Arc::new(Hub::new(16));
        let engine = AssignmentEngine::new(
            store.clone(),
            store.clone(),
            directory.clone(),
            hub.clone(),
            Metrics::new(),
        );
        Fixture {
            engine,
            directory,
            hub,
            store,
        }
    }

    async fn eligible_rider(fx: &Fixture) -> Uuid {
        let id = Uuid::new_v4();
        fx.directory.register(id, "rider".to_string()).await.unwrap();
        fx.directory
            .review(id, Some(DocumentStatus::Approved), Some(true))
            .await
            .unwrap();
        fx.directory.set_availability(id, true).await.unwrap();
        id
    }

    async fn open_order(fx: &Fixture) -> Uuid {
        let order = fx
            .engine
            .place_order(
                Uuid::new_v4(),
                Uuid::new_v4(),
                GeoPoint { lat: 6.5, lng: 3.4 },
                GeoPoint {
                    lat: 6.45,
                    lng: 3.39,
                },
                None,
            )
            .await
            .unwrap();
        order.id
    }

    #[tokio::test]
    async fn accept_assigns_and_notifies_order_and_rider_rooms() {
        let fx = fixture();
        let rider = eligible_rider(&fx).await;
        let order_id = open_order(&fx).await;

        let mut order_rx = fx.hub.subscribe(Room::Order(order_id));
        let mut rider_rx = fx.hub.subscribe(Room::Rider(rider));

        let order = fx.engine.accept(rider, order_id).await.unwrap();
        assert_eq!(order.rider_id, Some(rider));
        assert_eq!(order.status, DeliveryPhase::Assigned);

        for rx in [&mut order_rx, &mut rider_rx] {
            match rx.recv().await.unwrap() {
                Event::OrderUpdate(update) => {
                    assert_eq!(update.order_id, order_id);
                    assert_eq!(update.status, DeliveryPhase::Assigned);
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn second_accept_conflicts() {
        let fx = fixture();
        let first = eligible_rider(&fx).await;
        let second = eligible_rider(&fx).await;
        let order_id = open_order(&fx).await;

        fx.engine.accept(first, order_id).await.unwrap();
        assert!(matches!(
            fx.engine.accept(second, order_id).await,
            Err(AppError::Conflict(_))
        ));

        let order = fx.engine.order(order_id).await.unwrap();
        assert_eq!(order.rider_id, Some(first));
    }

    #[tokio::test]
    async fn unverified_rider_cannot_accept_and_order_is_untouched() {
        let fx = fixture();
        let rider = Uuid::new_v4();
        fx.directory
            .register(rider, "new".to_string())
            .await
            .unwrap();
        let order_id = open_order(&fx).await;

        match fx.engine.accept(rider, order_id).await {
            Err(AppError::UnverifiedDocuments { status }) => {
                assert_eq!(status, DocumentStatus::NotSubmitted);
            }
            other => panic!("expected document gate failure, got {other:?}"),
        }

        let order = fx.engine.order(order_id).await.unwrap();
        assert_eq!(order.rider_id, None);
        assert_eq!(order.status, DeliveryPhase::PendingAssignment);
    }

    #[tokio::test]
    async fn reject_requires_a_reason_and_mutates_nothing_without_one() {
        let fx = fixture();
        let rider = eligible_rider(&fx).await;
        let order_id = open_order(&fx).await;
        fx.engine.accept(rider, order_id).await.unwrap();

        assert!(matches!(
            fx.engine.reject(rider, order_id, "   ", None).await,
            Err(AppError::InvalidInput(_))
        ));

        let order = fx.engine.order(order_id).await.unwrap();
        assert_eq!(order.rider_id, Some(rider));
        assert!(fx
            .engine
            .rejection_history(rider, 50)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn reject_returns_order_to_pool_and_excludes_the_rider() {
        let fx = fixture();
        let rider = eligible_rider(&fx).await;
        let order_id = open_order(&fx).await;
        fx.engine.accept(rider, order_id).await.unwrap();

        let outcome = fx
            .engine
            .reject(rider, order_id, "vehicle breakdown", None)
            .await
            .unwrap();
        assert_eq!(outcome.order.status, DeliveryPhase::PendingAssignment);
        assert_eq!(outcome.order.rider_id, None);
        assert_eq!(outcome.reassigned_to, None);

        let history = fx.engine.rejection_history(rider, 50).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, "vehicle breakdown");

        // the pool no longer shows this order to the rejecting rider
        let pool = fx.engine.available_for(rider, None).await.unwrap();
        assert!(pool.iter().all(|order| order.id != order_id));

        // and reassignment candidates exclude them as well
        let candidates = fx
            .engine
            .eligible_for_reassignment(order_id)
            .await
            .unwrap();
        assert!(candidates.iter().all(|candidate| candidate.id != rider));
    }

    #[tokio::test]
    async fn stranger_rejection_is_forbidden_and_double_rejection_conflicts() {
        let fx = fixture();
        let rider = eligible_rider(&fx).await;
        let stranger = eligible_rider(&fx).await;
        let order_id = open_order(&fx).await;
        fx.engine.accept(rider, order_id).await.unwrap();

        assert!(matches!(
            fx.engine.reject(stranger, order_id, "not mine", None).await,
            Err(AppError::Forbidden(_))
        ));

        fx.engine
            .reject(rider, order_id, "vehicle breakdown", None)
            .await
            .unwrap();
        assert!(matches!(
            fx.engine.reject(rider, order_id, "again", None).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn eligible_suggested_rider_is_assigned_immediately() {
        let fx = fixture();
        let rider = eligible_rider(&fx).await;
        let suggested = eligible_rider(&fx).await;
        let order_id = open_order(&fx).await;
        fx.engine.accept(rider, order_id).await.unwrap();

        let mut suggested_rx = fx.hub.subscribe(Room::Rider(suggested));

        let outcome = fx
            .engine
            .reject(rider, order_id, "vehicle breakdown", Some(suggested))
            .await
            .unwrap();
        assert_eq!(outcome.reassigned_to, Some(suggested));
        assert_eq!(outcome.order.rider_id, Some(suggested));
        assert_eq!(outcome.order.status, DeliveryPhase::Assigned);

        match suggested_rx.recv().await.unwrap() {
            Event::Notification(payload) => {
                assert_eq!(payload["order_id"], order_id.to_string());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn ineligible_suggested_rider_falls_back_to_the_pool() {
        let fx = fixture();
        let rider = eligible_rider(&fx).await;
        let suggested = Uuid::new_v4();
        fx.directory
            .register(suggested, "unverified".to_string())
            .await
            .unwrap();
        let order_id = open_order(&fx).await;
        fx.engine.accept(rider, order_id).await.unwrap();

        let outcome = fx
            .engine
            .reject(rider, order_id, "vehicle breakdown", Some(suggested))
            .await
            .unwrap();
        assert_eq!(outcome.reassigned_to, None);
        assert_eq!(outcome.order.rider_id, None);
        assert_eq!(outcome.order.status, DeliveryPhase::PendingAssignment);
    }

    #[tokio::test]
    async fn previously_rejecting_rider_is_not_a_valid_suggestion() {
        let fx = fixture();
        let first = eligible_rider(&fx).await;
        let second = eligible_rider(&fx).await;
        let order_id = open_order(&fx).await;

        fx.engine.accept(first, order_id).await.unwrap();
        fx.engine
            .reject(first, order_id, "vehicle breakdown", None)
            .await
            .unwrap();

        fx.engine.accept(second, order_id).await.unwrap();
        let outcome = fx
            .engine
            .reject(second, order_id, "too far", Some(first))
            .await
            .unwrap();
        assert_eq!(outcome.reassigned_to, None);
        assert_eq!(outcome.order.rider_id, None);
    }

    #[tokio::test]
    async fn radius_filter_needs_a_recorded_position() {
        let fx = fixture();
        let rider = eligible_rider(&fx).await;
        open_order(&fx).await;

        assert!(matches!(
            fx.engine.available_for(rider, Some(5.0)).await,
            Err(AppError::InvalidInput(_))
        ));

        fx.directory
            .record_position(rider, GeoPoint { lat: 6.5, lng: 3.4 })
            .await
            .unwrap();
        let pool = fx.engine.available_for(rider, Some(5.0)).await.unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn radius_filter_drops_far_pickups() {
        let fx = fixture();
        let rider = eligible_rider(&fx).await;
        fx.directory
            .record_position(rider, GeoPoint { lat: 6.5, lng: 3.4 })
            .await
            .unwrap();

        let near = open_order(&fx).await;
        fx.engine
            .place_order(
                Uuid::new_v4(),
                Uuid::new_v4(),
                GeoPoint { lat: 9.0, lng: 7.5 },
                GeoPoint { lat: 9.1, lng: 7.6 },
                None,
            )
            .await
            .unwrap();

        let pool = fx.engine.available_for(rider, Some(10.0)).await.unwrap();
        let ids: Vec<Uuid> = pool.iter().map(|order| order.id).collect();
        assert_eq!(ids, vec![near]);
    }

    #[tokio::test]
    async fn status_walks_forward_and_never_backward() {
        let fx = fixture();
        let rider = eligible_rider(&fx).await;
        let order_id = open_order(&fx).await;
        fx.engine.accept(rider, order_id).await.unwrap();

        let order = fx
            .engine
            .update_status(rider, order_id, DeliveryPhase::OutForDelivery)
            .await
            .unwrap();
        assert_eq!(order.status, DeliveryPhase::OutForDelivery);

        let order = fx
            .engine
            .update_status(rider, order_id, DeliveryPhase::Delivered)
            .await
            .unwrap();
        assert_eq!(order.status, DeliveryPhase::Delivered);
        assert!(order.delivered_at.is_some());

        match fx
            .engine
            .update_status(rider, order_id, DeliveryPhase::OutForDelivery)
            .await
        {
            Err(AppError::InvalidTransition { from, .. }) => {
                assert_eq!(from, DeliveryPhase::Delivered);
            }
            other => panic!("expected invalid transition, got {other:?}"),
        }

        // repeated delivered submission is rejected, not double-counted
        assert!(matches!(
            fx.engine
                .update_status(rider, order_id, DeliveryPhase::Delivered)
                .await,
            Err(AppError::InvalidTransition { .. })
        ));

        let order = fx.engine.order(order_id).await.unwrap();
        assert_eq!(order.status, DeliveryPhase::Delivered);
    }

    #[tokio::test]
    async fn only_the_assigned_rider_may_move_status() {
        let fx = fixture();
        let rider = eligible_rider(&fx).await;
        let stranger = eligible_rider(&fx).await;
        let order_id = open_order(&fx).await;
        fx.engine.accept(rider, order_id).await.unwrap();

        assert!(matches!(
            fx.engine
                .update_status(stranger, order_id, DeliveryPhase::OutForDelivery)
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn skipping_assigned_straight_to_delivered_is_invalid() {
        let fx = fixture();
        let rider = eligible_rider(&fx).await;
        let order_id = open_order(&fx).await;
        fx.engine.accept(rider, order_id).await.unwrap();

        match fx
            .engine
            .update_status(rider, order_id, DeliveryPhase::Delivered)
            .await
        {
            Err(AppError::InvalidTransition { from, requested }) => {
                assert_eq!(from, DeliveryPhase::Assigned);
                assert_eq!(requested, DeliveryPhase::Delivered);
            }
            other => panic!("expected invalid transition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn documents_revoked_after_accept_block_pickup() {
        let fx = fixture();
        let rider = eligible_rider(&fx).await;
        let order_id = open_order(&fx).await;
        fx.engine.accept(rider, order_id).await.unwrap();

        fx.directory
            .review(rider, Some(DocumentStatus::ChangesRequested), None)
            .await
            .unwrap();

        match fx
            .engine
            .update_status(rider, order_id, DeliveryPhase::OutForDelivery)
            .await
        {
            Err(AppError::UnverifiedDocuments { status }) => {
                assert_eq!(status, DocumentStatus::ChangesRequested);
            }
            other => panic!("expected document gate failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_rider_may_still_accept_explicitly() {
        let fx = fixture();
        let rider = eligible_rider(&fx).await;
        let order_id = open_order(&fx).await;

        fx.engine.accept(rider, order_id).await.unwrap();
        fx.engine
            .reject(rider, order_id, "changed my mind", None)
            .await
            .unwrap();

        // a fresh acceptance flow re-admits the rider for this order
        let order = fx.engine.accept(rider, order_id).await.unwrap();
        assert_eq!(order.rider_id, Some(rider));
        assert!(fx.store.get(order_id).await.unwrap().is_some());
    }
}
