use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post, put};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::auth::{Actor, Role};
use crate::engine::tracking::PingOutcome;
use crate::error::AppError;
use crate::models::rider::{DocumentStatus, GeoPoint, Rider};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/riders", post(register_rider).get(list_riders))
        .route("/riders/me/documents", post(submit_documents))
        .route("/riders/me/availability", put(set_availability))
        .route(
            "/riders/me/location",
            get(my_location).put(report_location),
        )
        .route("/riders/:id/verification", patch(review_verification))
}

#[derive(Deserialize)]
pub struct RegisterRiderRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}

#[derive(Deserialize)]
pub struct VerificationRequest {
    pub document_status: Option<DocumentStatus>,
    pub approved: Option<bool>,
}

#[derive(Deserialize)]
pub struct LocationPingRequest {
    pub lat: f64,
    pub lng: f64,
    pub accuracy_m: Option<f64>,
    pub speed_kmh: Option<f64>,
    pub heading: Option<f64>,
}

#[derive(Serialize)]
pub struct LiveLocationResponse {
    pub has_location: bool,
    pub location: Option<GeoPoint>,
}

async fn register_rider(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<RegisterRiderRequest>,
) -> Result<Json<Rider>, AppError> {
    actor.require(Role::Rider)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name cannot be empty".to_string()));
    }

    let rider = state
        .directory
        .register(actor.id, payload.name.trim().to_string())
        .await?;
    Ok(Json(rider))
}

async fn list_riders(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Rider>>, AppError> {
    actor.require(Role::Admin)?;
    Ok(Json(state.directory.list().await?))
}

async fn submit_documents(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Rider>, AppError> {
    actor.require(Role::Rider)?;
    let rider = state.directory.submit_documents(actor.id).await?;
    Ok(Json(rider))
}

async fn set_availability(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<AvailabilityRequest>,
) -> Result<Json<Rider>, AppError> {
    actor.require(Role::Rider)?;
    let rider = state
        .directory
        .set_availability(actor.id, payload.available)
        .await?;
    Ok(Json(rider))
}

async fn review_verification(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerificationRequest>,
) -> Result<Json<Rider>, AppError> {
    actor.require(Role::Admin)?;
    let rider = state
        .directory
        .review(id, payload.document_status, payload.approved)
        .await?;
    Ok(Json(rider))
}

async fn my_location(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<LiveLocationResponse>, AppError> {
    actor.require(Role::Rider)?;
    let location = state.tracking.live_position(actor.id).await?;
    Ok(Json(LiveLocationResponse {
        has_location: location.is_some(),
        location,
    }))
}

async fn report_location(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(payload): Json<LocationPingRequest>,
) -> Result<Json<PingOutcome>, AppError> {
    actor.require(Role::Rider)?;
    let outcome = state
        .tracking
        .record_ping(
            actor.id,
            GeoPoint {
                lat: payload.lat,
                lng: payload.lng,
            },
            payload.accuracy_m,
            payload.speed_kmh,
            payload.heading,
        )
        .await?;
    Ok(Json(outcome))
}
