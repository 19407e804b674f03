// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{CreateUserRequest, LoginRequest, PublicUser, Role},
    store::Store,
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Usernames nobody can register: `admin` and the configured admin account.
fn is_reserved(username: &str, config: &Config) -> bool {
    let name = username.to_lowercase();
    name == "admin"
        || config
            .admin_username
            .as_deref()
            .is_some_and(|admin| admin.to_lowercase() == name)
}

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(store): State<Store>,
    State(config): State<Config>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if is_reserved(&payload.username, &config) {
        return Err(AppError::BadRequest(format!(
            "Username \"{}\" is reserved.",
            payload.username
        )));
    }

    let hashed_password = hash_password(&payload.password)?;

    let user = store
        .users
        .create(&payload.username, hashed_password, Role::User)
        .await
        .map_err(|e| {
            tracing::warn!("Failed to register user '{}': {}", payload.username, e);
            AppError::from(e)
        })?;

    tracing::info!("Registered user {}", user.username);
    Ok((StatusCode::CREATED, Json(PublicUser::from(user))))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(store): State<Store>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let invalid = || AppError::AuthError("Invalid username or password".to_string());

    let user = store
        .users
        .find_by_username(&payload.username)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(invalid());
    }

    let token = sign_jwt(&user, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user": PublicUser::from(user)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(admin: Option<&str>) -> Config {
        Config {
            data_dir: "data".into(),
            jwt_secret: "s".into(),
            jwt_expiration: 60,
            rust_log: "error".into(),
            admin_username: admin.map(str::to_string),
            admin_password: None,
            gemini_api_key: None,
            gemini_base_url: String::new(),
            primary_model: String::new(),
            fallback_model: String::new(),
            port: 0,
        }
    }

    #[test]
    fn admin_names_are_reserved() {
        assert!(is_reserved("Admin", &config(None)));
        assert!(is_reserved("root", &config(Some("ROOT"))));
        assert!(!is_reserved("alice", &config(Some("root"))));
    }
}
