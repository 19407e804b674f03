// src/handlers/questions.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    error::AppError,
    generation::{GenerationRequest, QuestionGenerator},
};

#[derive(Debug, Deserialize)]
pub struct GenerateParams {
    /// `?refresh=true` bypasses a fresh cache entry.
    pub refresh: Option<bool>,
}

/// Returns a full skill-check payload covering every subject.
pub async fn generate_questions(
    State(generator): State<Arc<QuestionGenerator>>,
    params: Result<Query<GenerateParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let request = GenerationRequest {
        force_refresh: params.refresh.unwrap_or(false),
    };

    let payload = generator.request_questions(request).await?;
    tracing::info!(
        "Serving {} questions across {} subjects",
        payload.question_count(),
        payload.subjects.len()
    );

    Ok(Json(payload))
}
