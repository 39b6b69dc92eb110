use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::auth::{Actor, Role};
use crate::engine::assignment::RejectOutcome;
use crate::error::AppError;
use crate::models::order::{DeliveryPhase, Order};
use crate::models::rejection::DeliveryRejection;
use crate::models::rider::Rider;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries/available", get(list_available))
        .route("/deliveries/mine", get(list_mine))
        .route("/deliveries/accept", post(accept_delivery))
        .route("/deliveries/rejections", get(list_rejections))
        .route("/deliveries/:id/status", patch(update_status))
        .route("/deliveries/:id/reject", post(reject_delivery))
        .route("/deliveries/:id/eligible-riders", get(list_eligible_riders))
}

#[derive(Deserialize)]
pub struct AvailableQuery {
    pub radius_km: Option<f64>,
}

#[derive(Deserialize)]
pub struct RejectionsQuery {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct AcceptRequest {
    pub order_id: Uuid,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DeliveryPhase,
}

#[derive(Deserialize)]
pub struct RejectRequest {
    pub reason: String,
    pub suggested_rider_id: Option<Uuid>,
}

async fn list_available(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<AvailableQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    actor.require(Role::Rider)?;
    let pool = state
        .assignments
        .available_for(actor.id, query.radius_km)
        .await?;
    Ok(Json(pool))
}

async fn list_mine(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Order>>, AppError> {
    actor.require(Role::Rider)?;
    let deliveries = state.assignments.deliveries_for(actor.id).await?;
    Ok(Json(deliveries))
}

async fn accept_delivery(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<AcceptRequest>,
) -> Result<Json<Order>, AppError> {
    actor.require(Role::Rider)?;
    let order = state.assignments.accept(actor.id, payload.order_id).await?;
    Ok(Json(order))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    actor.require(Role::Rider)?;
    let order = state
        .assignments
        .update_status(actor.id, id, payload.status)
        .await?;
    Ok(Json(order))
}

async fn reject_delivery(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectRequest>,
) -> Result<Json<RejectOutcome>, AppError> {
    actor.require(Role::Rider)?;
    let outcome = state
        .assignments
        .reject(actor.id, id, &payload.reason, payload.suggested_rider_id)
        .await?;
    Ok(Json(outcome))
}

async fn list_rejections(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<RejectionsQuery>,
) -> Result<Json<Vec<DeliveryRejection>>, AppError> {
    actor.require(Role::Rider)?;
    let limit = query.limit.unwrap_or(state.rejection_history_limit);
    let history = state.assignments.rejection_history(actor.id, limit).await?;
    Ok(Json(history))
}

async fn list_eligible_riders(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Rider>>, AppError> {
    actor.require_any(&[Role::Rider, Role::Admin])?;
    let riders = state.assignments.eligible_for_reassignment(id).await?;
    Ok(Json(riders))
}
