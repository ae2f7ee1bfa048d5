//! # legal-server
//!
//! HTTP front for the legal assistant model.
//!
//! `POST /predict` wraps a user message in the assistant prompt, runs it
//! through a [`legal_engine::TextGenerator`] on a bounded blocking pool and
//! returns the text after the last `AI:` marker. `GET /health` reports the
//! loaded model and generation slot usage.

pub mod cli;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pool;
pub mod prompt;
pub mod server;
pub mod state;

pub use cli::Cli;
pub use error::ServerError;
pub use pool::GenerationPool;
pub use server::{create_router, run_server};
pub use state::{AppState, ServerConfig};
