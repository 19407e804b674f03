// src/handlers/users.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{PublicUser, UpdateUserRequest, UserChanges},
    store::Store,
    utils::{hash::hash_password, jwt::Claims},
};

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(store): State<Store>) -> Result<impl IntoResponse, AppError> {
    let users: Vec<PublicUser> = store
        .users
        .list()
        .await?
        .into_iter()
        .map(PublicUser::from)
        .collect();

    Ok(Json(users))
}

/// Updates a user's profile.
///
/// Admins may update anyone and change roles; other users only themselves.
pub async fn update_user(
    State(store): State<Store>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let target = store
        .users
        .find_by_id(&id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if !claims.is_admin() && claims.sub != target.id {
        return Err(AppError::Forbidden(
            "You can only update your own profile".to_string(),
        ));
    }

    let password_hash = match &payload.password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let changes = UserChanges {
        username: payload.username.filter(|name| *name != target.username),
        password_hash,
        role: payload.role.filter(|_| claims.is_admin()),
    };

    let updated = store
        .users
        .update(&id, changes)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if updated.username != target.username {
        let moved = store
            .results
            .rename_user(&target.username, &updated.username)
            .await?;
        tracing::info!(
            "Moved {} result(s) from {} to {}",
            moved,
            target.username,
            updated.username
        );
    }

    tracing::info!("User {} updated by {}", updated.id, claims.username);
    Ok(Json(PublicUser::from(updated)))
}
