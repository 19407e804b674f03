// src/handlers/results.rs

use std::collections::{BTreeMap, HashSet};

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    error::AppError,
    models::result::{QuizResult, StatsResponse, SubjectStats, SubmitResultRequest},
    store::Store,
    utils::jwt::Claims,
};

/// The caller's current username. Tokens keep the name they were issued with.
async fn current_username(store: &Store, claims: &Claims) -> Result<String, AppError> {
    store
        .users
        .find_by_id(&claims.sub)
        .await?
        .map(|user| user.username)
        .ok_or_else(|| AppError::AuthError("User no longer exists".to_string()))
}

/// Records a finished quiz for the caller.
pub async fn submit_result(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitResultRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let username = current_username(&store, &claims).await?;

    let result = QuizResult {
        id: format!("result_{}", uuid::Uuid::new_v4().simple()),
        username,
        percentage: req.percentage(),
        subject: req.subject,
        score: req.score,
        total_questions: req.total_questions,
        date: chrono::Utc::now(),
        answers: req.answers,
    };

    store.results.append(result.clone()).await.map_err(|e| {
        tracing::error!("Failed to save result: {}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// Every result for admins, the caller's own results otherwise.
pub async fn list_results(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let results = if claims.is_admin() {
        store.results.list().await?
    } else {
        let username = current_username(&store, &claims).await?;
        store.results.list_for_user(&username).await?
    };

    Ok(Json(results))
}

/// Aggregates results for the admin dashboard.
fn compute_stats(results: &[QuizResult], total_users: usize) -> StatsResponse {
    let unique_users: HashSet<&str> = results.iter().map(|r| r.username.as_str()).collect();

    let avg = |sum: u64, count: usize| -> u32 {
        if count == 0 {
            0
        } else {
            (sum as f64 / count as f64).round() as u32
        }
    };

    let mut by_subject: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
    for r in results {
        let entry = by_subject.entry(r.subject.as_str()).or_default();
        entry.0 += 1;
        entry.1 += r.percentage as u64;
    }

    let total: u64 = results.iter().map(|r| r.percentage as u64).sum();

    StatsResponse {
        total_assessments: results.len(),
        unique_users: unique_users.len(),
        avg_score: avg(total, results.len()),
        total_users,
        subject_breakdown: by_subject
            .into_iter()
            .map(|(subject, (count, sum))| SubjectStats {
                subject: subject.to_string(),
                count,
                avg_score: avg(sum, count),
            })
            .collect(),
    }
}

/// Admin statistics over all stored results.
pub async fn get_stats(State(store): State<Store>) -> Result<impl IntoResponse, AppError> {
    let results = store.results.list().await?;
    let total_users = store.users.list().await?.len();

    Ok(Json(compute_stats(&results, total_users)))
}
