use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::auth::{Actor, Role};
use crate::engine::tracking::OrderTracking;
use crate::error::AppError;
use crate::models::location::RiderLocationSample;
use crate::models::order::Order;
use crate::models::rider::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/rider-location", get(order_rider_location))
        .route("/orders/:id/location-history", get(order_location_history))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub vendor_id: Option<Uuid>,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub estimated_delivery_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    actor.require_any(&[Role::Vendor, Role::Admin])?;

    let vendor_id = match actor.role {
        Role::Vendor => actor.id,
        _ => payload.vendor_id.ok_or_else(|| {
            AppError::InvalidInput("vendor_id is required when placing on a vendor's behalf".to_string())
        })?,
    };

    let order = state
        .assignments
        .place_order(
            payload.customer_id,
            vendor_id,
            payload.pickup,
            payload.dropoff,
            payload.estimated_delivery_date,
        )
        .await?;
    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state.assignments.order(id).await?;
    ensure_participant(&actor, &order)?;
    Ok(Json(order))
}

async fn order_rider_location(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderTracking>, AppError> {
    let order = state.assignments.order(id).await?;
    ensure_tracker(&actor, &order)?;
    let tracking = state.tracking.order_tracking(id).await?;
    Ok(Json(tracking))
}

async fn order_location_history(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<RiderLocationSample>>, AppError> {
    let order = state.assignments.order(id).await?;
    ensure_tracker(&actor, &order)?;
    let samples = state
        .tracking
        .samples_for_order(id, query.limit.unwrap_or(50))
        .await?;
    Ok(Json(samples))
}

/// Anyone with a stake in the order: its customer, vendor, assigned rider,
/// or an admin.
fn ensure_participant(actor: &Actor, order: &Order) -> Result<(), AppError> {
    let involved = actor.is_admin()
        || order.customer_id == actor.id
        || order.vendor_id == actor.id
        || order.rider_id == Some(actor.id);

    if involved {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "not a participant of this order".to_string(),
        ))
    }
}

/// Tracking is customer-facing: the order's customer and vendor, or an admin.
fn ensure_tracker(actor: &Actor, order: &Order) -> Result<(), AppError> {
    let allowed =
        actor.is_admin() || order.customer_id == actor.id || order.vendor_id == actor.id;

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "tracking is limited to the order's customer and vendor".to_string(),
        ))
    }
}
