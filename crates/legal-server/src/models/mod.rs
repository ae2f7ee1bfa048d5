//! Request/response types for the HTTP API.

pub mod predict;

pub use predict::{PredictRequest, PredictResponse};
