pub mod location;
pub mod order;
pub mod rejection;
pub mod rider;
