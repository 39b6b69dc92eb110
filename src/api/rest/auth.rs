use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

/// Marketplace role asserted by the upstream gateway. Authentication itself
/// is out of scope; these headers are trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Vendor,
    Rider,
    Admin,
}

impl Role {
    fn parse(raw: &str) -> Option<Role> {
        match raw {
            "customer" => Some(Role::Customer),
            "vendor" => Some(Role::Vendor),
            "rider" => Some(Role::Rider),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Customer => "customer",
            Role::Vendor => "vendor",
            Role::Rider => "rider",
            Role::Admin => "admin",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("requires the {role} role")))
        }
    }

    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            let allowed: Vec<String> = roles.iter().map(Role::to_string).collect();
            Err(AppError::Forbidden(format!(
                "requires one of the roles: {}",
                allowed.join(", ")
            )))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get("x-actor-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| raw.parse::<Uuid>().ok())
            .ok_or_else(|| {
                AppError::Forbidden("missing or malformed x-actor-id header".to_string())
            })?;

        let role = parts
            .headers
            .get("x-actor-role")
            .and_then(|value| value.to_str().ok())
            .and_then(Role::parse)
            .ok_or_else(|| {
                AppError::Forbidden("missing or unknown x-actor-role header".to_string())
            })?;

        Ok(Actor { id, role })
    }
}
