use crate::error::AppError;

pub mod assignment;
pub mod directory;
pub mod status;
pub mod tracking;

pub use assignment::AssignmentEngine;
pub use directory::RiderDirectory;
pub use tracking::LocationPipeline;

/// Latitude must sit in [-90, 90] and longitude in [-180, 180]; NaN fails
/// both checks.
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), AppError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(AppError::InvalidInput(format!(
            "latitude {lat} is out of range [-90, 90]"
        )));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(AppError::InvalidInput(format!(
            "longitude {lng} is out of range [-180, 180]"
        )));
    }
    Ok(())
}
