use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    NotSubmitted,
    Pending,
    Approved,
    Rejected,
    ChangesRequested,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentStatus::NotSubmitted => "not_submitted",
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::ChangesRequested => "changes_requested",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: Uuid,
    pub name: String,
    pub location: Option<GeoPoint>,
    pub available: bool,
    pub document_status: DocumentStatus,
    pub approved: bool,
    pub updated_at: DateTime<Utc>,
}

impl Rider {
    pub fn new(id: Uuid, name: String) -> Self {
        Self {
            id,
            name,
            location: None,
            available: false,
            document_status: DocumentStatus::NotSubmitted,
            approved: false,
            updated_at: Utc::now(),
        }
    }

    /// A rider may take new deliveries only when all three gates are open.
    pub fn is_eligible(&self) -> bool {
        self.available && self.approved && self.document_status == DocumentStatus::Approved
    }
}
