//! Prediction handler.

use axum::{extract::State, Json};
use uuid::Uuid;

use crate::{
    error::ServerError,
    models::{PredictRequest, PredictResponse},
    prompt,
    state::AppState,
};

/// Handle `POST /predict`.
///
/// validate → (empty: guidance reply) → build prompt → generate → extract reply.
/// An empty message never reaches the generator.
#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn handle_predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ServerError> {
    let message = req.message_text();
    if message.is_empty() {
        tracing::debug!("empty message");
        return Ok(Json(PredictResponse::guidance()));
    }

    let prompt = prompt::build_prompt(&message);
    let generation = state
        .pool
        .generate(prompt.clone(), state.config.generation.clone())
        .await?;
    if generation.continuation(&prompt).is_none() {
        tracing::warn!("generated text does not start with the prompt");
    }

    let reply = prompt::extract_reply(&generation.text);
    tracing::info!(
        prompt_tokens = generation.prompt_tokens,
        generated_tokens = generation.generated_tokens,
        finish_reason = %generation.finish_reason,
        reply_chars = reply.len(),
        "prediction served"
    );

    Ok(Json(PredictResponse::new(reply)))
}
