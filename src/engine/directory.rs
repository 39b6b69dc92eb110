use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::within_radius_km;
use crate::models::rider::{DocumentStatus, GeoPoint, Rider};
use crate::store::RiderStore;

/// Single source of truth for "is this rider eligible and where are they".
/// Touches rider rows only; orders are none of its business.
pub struct RiderDirectory {
    riders: Arc<dyn RiderStore>,
}

impl RiderDirectory {
    pub fn new(riders: Arc<dyn RiderStore>) -> Self {
        Self { riders }
    }

    pub async fn register(&self, id: Uuid, name: String) -> Result<Rider, AppError> {
        let rider = self
            .riders
            .insert(Rider::new(id, name))
            .await?
            .ok_or_else(|| AppError::Conflict("rider is already registered".to_string()))?;

        info!(rider_id = %rider.id, "rider registered");
        Ok(rider)
    }

    pub async fn rider(&self, id: Uuid) -> Result<Rider, AppError> {
        self.riders
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("rider not found".to_string()))
    }

    pub async fn list(&self) -> Result<Vec<Rider>, AppError> {
        Ok(self.riders.list().await?)
    }

    pub async fn count(&self) -> Result<usize, AppError> {
        Ok(self.riders.count().await?)
    }

    /// Rejects with the most actionable failure first: a document problem
    /// carries its sub-reason so the client can route the rider.
    pub fn check_eligibility(&self, rider: &Rider) -> Result<(), AppError> {
        if rider.document_status != DocumentStatus::Approved {
            return Err(AppError::UnverifiedDocuments {
                status: rider.document_status,
            });
        }
        if !rider.approved {
            return Err(AppError::Forbidden(
                "rider account is awaiting approval".to_string(),
            ));
        }
        if !rider.available {
            return Err(AppError::Forbidden(
                "rider is currently unavailable".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn ensure_eligible(&self, id: Uuid) -> Result<Rider, AppError> {
        let rider = self.rider(id).await?;
        self.check_eligibility(&rider)?;
        Ok(rider)
    }

    /// Eligible riders within `radius_km` of `center`. Riders with no recorded
    /// position are left out rather than treated as infinitely far.
    pub async fn nearby_eligible(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> Result<Vec<Rider>, AppError> {
        Ok(self
            .riders
            .list()
            .await?
            .into_iter()
            .filter(|rider| rider.is_eligible())
            .filter(|rider| {
                rider
                    .location
                    .is_some_and(|position| within_radius_km(&center, &position, radius_km))
            })
            .collect())
    }

    pub async fn eligible_excluding(&self, excluded: &[Uuid]) -> Result<Vec<Rider>, AppError> {
        Ok(self
            .riders
            .list()
            .await?
            .into_iter()
            .filter(|rider| rider.is_eligible() && !excluded.contains(&rider.id))
            .collect())
    }

    pub async fn set_availability(&self, id: Uuid, available: bool) -> Result<Rider, AppError> {
        let rider = self
            .riders
            .set_availability(id, available)
            .await?
            .ok_or_else(|| AppError::NotFound("rider not found".to_string()))?;

        info!(rider_id = %rider.id, available, "rider availability changed");
        Ok(rider)
    }

    pub async fn record_position(&self, id: Uuid, position: GeoPoint) -> Result<Rider, AppError> {
        self.riders
            .set_position(id, position)
            .await?
            .ok_or_else(|| AppError::NotFound("rider not found".to_string()))
    }

    /// Marks the rider's paperwork as submitted and awaiting review. A
    /// resubmission after rejection lands back in the review queue.
    pub async fn submit_documents(&self, id: Uuid) -> Result<Rider, AppError> {
        let rider = self
            .riders
            .update_verification(id, Some(DocumentStatus::Pending), None)
            .await?
            .ok_or_else(|| AppError::NotFound("rider not found".to_string()))?;

        info!(rider_id = %rider.id, "rider documents submitted for review");
        Ok(rider)
    }

    pub async fn review(
        &self,
        id: Uuid,
        document_status: Option<DocumentStatus>,
        approved: Option<bool>,
    ) -> Result<Rider, AppError> {
        if document_status.is_none() && approved.is_none() {
            return Err(AppError::InvalidInput(
                "nothing to review: provide document_status or approved".to_string(),
            ));
        }

        let rider = self
            .riders
            .update_verification(id, document_status, approved)
            .await?
            .ok_or_else(|| AppError::NotFound("rider not found".to_string()))?;

        info!(
            rider_id = %rider.id,
            document_status = %rider.document_status,
            approved = rider.approved,
            "rider verification reviewed"
        );
        Ok(rider)
    }
}
