use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::engine::directory::RiderDirectory;
use crate::engine::validate_coordinates;
use crate::error::AppError;
use crate::models::location::RiderLocationSample;
use crate::models::order::DeliveryPhase;
use crate::models::rider::GeoPoint;
use crate::observability::Metrics;
use crate::realtime::Hub;
use crate::store::{LocationStore, OrderStore};

/// Ingests courier-app location pings, keeps the rider's live position fresh,
/// and fans samples out to the trackers of every active delivery.
pub struct LocationPipeline {
    orders: Arc<dyn OrderStore>,
    samples: Arc<dyn LocationStore>,
    directory: Arc<RiderDirectory>,
    hub: Arc<Hub>,
    metrics: Metrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct PingOutcome {
    pub orders_updated: usize,
    pub location: GeoPoint,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderTracking {
    pub order_id: Uuid,
    pub rider_id: Uuid,
    pub rider_name: String,
    pub location: Option<GeoPoint>,
    pub is_active: bool,
}

impl LocationPipeline {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        samples: Arc<dyn LocationStore>,
        directory: Arc<RiderDirectory>,
        hub: Arc<Hub>,
        metrics: Metrics,
    ) -> Self {
        Self {
            orders,
            samples,
            directory,
            hub,
            metrics,
        }
    }

    /// Accepts a ping only while the rider has at least one delivery out the
    /// door; everything else would be unbounded idle tracking. On any failure
    /// nothing is written, not even the live position.
    pub async fn record_ping(
        &self,
        rider_id: Uuid,
        position: GeoPoint,
        accuracy_m: Option<f64>,
        speed_kmh: Option<f64>,
        heading: Option<f64>,
    ) -> Result<PingOutcome, AppError> {
        validate_coordinates(position.lat, position.lng)?;
        self.directory.rider(rider_id).await?;

        let active = self.orders.list_active_by_rider(rider_id).await?;
        if active.is_empty() {
            self.metrics
                .location_updates_total
                .with_label_values(&["no_active_delivery"])
                .inc();
            return Err(AppError::NoActiveDelivery);
        }

        self.directory.record_position(rider_id, position).await?;
        let recorded_at = Utc::now();

        for order in &active {
            let sample = self
                .samples
                .append(RiderLocationSample {
                    id: Uuid::new_v4(),
                    rider_id,
                    order_id: order.id,
                    lat: position.lat,
                    lng: position.lng,
                    accuracy_m,
                    speed_kmh,
                    heading,
                    recorded_at,
                })
                .await?;
            self.hub.emit_rider_location(&sample);
        }

        self.metrics
            .location_updates_total
            .with_label_values(&["recorded"])
            .inc();
        info!(
            rider_id = %rider_id,
            orders_updated = active.len(),
            "rider location recorded"
        );

        Ok(PingOutcome {
            orders_updated: active.len(),
            location: position,
            recorded_at,
        })
    }

    pub async fn live_position(&self, rider_id: Uuid) -> Result<Option<GeoPoint>, AppError> {
        let rider = self.directory.rider(rider_id).await?;
        Ok(rider.location)
    }

    /// Customer-facing tracking join across the order and its rider.
    pub async fn order_tracking(&self, order_id: Uuid) -> Result<OrderTracking, AppError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        let rider_id = order
            .rider_id
            .ok_or_else(|| AppError::NotFound("order has no assigned rider".to_string()))?;
        let rider = self.directory.rider(rider_id).await?;

        Ok(OrderTracking {
            order_id: order.id,
            rider_id,
            rider_name: rider.name,
            location: rider.location,
            is_active: order.status == DeliveryPhase::OutForDelivery,
        })
    }

    pub async fn samples_for_order(
        &self,
        order_id: Uuid,
        limit: usize,
    ) -> Result<Vec<RiderLocationSample>, AppError> {
        Ok(self.samples.list_by_order(order_id, limit).await?)
    }
}
