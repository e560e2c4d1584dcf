//! Session-backed authentication: signup, login, logout, and the
//! `AuthUser` extractor the protected handlers rely on.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::request::Parts,
    response::Redirect,
    Json,
};
use sha2::{Digest, Sha256};
use shared::{CredentialsRequest, StatusResponse};
use tower_sessions::Session;
use tracing::info;

use crate::error::AppError;
use crate::rest::AppState;

const USER_ID_KEY: &str = "user_id";

/// The authenticated caller, resolved from the session cookie.
/// Extraction fails with 401 when no user is logged in.
#[derive(Debug)]
pub struct AuthUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, message)| AppError::Internal(anyhow::anyhow!(message)))?;

        let user_id = session
            .get::<i64>(USER_ID_KEY)
            .await
            .map_err(anyhow::Error::from)?;

        user_id.map(AuthUser).ok_or(AppError::AuthenticationRequired)
    }
}

pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(AppError::Validation {
            field: "username",
            message: "This field is required.".to_string(),
        });
    }
    if request.password.is_empty() {
        return Err(AppError::Validation {
            field: "password",
            message: "This field is required.".to_string(),
        });
    }

    if state
        .db
        .get_user_by_username(username)
        .await
        .map_err(AppError::Internal)?
        .is_some()
    {
        return Err(AppError::Validation {
            field: "username",
            message: "A user with that username already exists.".to_string(),
        });
    }

    let salt = uuid::Uuid::new_v4().simple().to_string();
    let password_hash = hash_password(&request.password, &salt);
    let user_id = state
        .db
        .create_user(username, &password_hash)
        .await
        .map_err(AppError::Internal)?;

    // Log the user in immediately after signup
    session
        .insert(USER_ID_KEY, user_id)
        .await
        .map_err(anyhow::Error::from)?;

    info!("User {} signed up as {}", user_id, username);
    Ok(Json(StatusResponse::ok()))
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let found = state
        .db
        .get_user_by_username(request.username.trim())
        .await
        .map_err(AppError::Internal)?;

    let invalid = || AppError::Validation {
        field: "non_field_errors",
        message: "Invalid credentials".to_string(),
    };

    let (user_id, stored_hash) = found.ok_or_else(invalid)?;
    if !verify_password(&stored_hash, &request.password) {
        return Err(invalid());
    }

    session
        .insert(USER_ID_KEY, user_id)
        .await
        .map_err(anyhow::Error::from)?;

    info!("User {} logged in", user_id);
    Ok(Json(StatusResponse::ok()))
}

pub async fn logout(session: Session) -> Result<Redirect, AppError> {
    session.flush().await.map_err(anyhow::Error::from)?;
    Ok(Redirect::to("/"))
}

/// Salted SHA-256 digest, stored as `<salt>$<hex digest>`.
fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{}${:x}", salt, hasher.finalize())
}

fn verify_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, _)) => hash_password(password, salt) == stored,
        None => false,
    }
}
