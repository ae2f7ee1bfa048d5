//! HTTP request handlers for API endpoints.

pub mod health;
pub mod predict;

pub use health::handle_health;
pub use predict::handle_predict;
