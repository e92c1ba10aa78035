use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use gather_db::{Database, DomainError};
use gather_db::models::NewUser;
use gather_types::api::{ApiResponse, LoginRequest, LoginResponse, SignupRequest};
use gather_types::models::Role;

use crate::error::{ApiError, run_blocking};
use crate::middleware::bearer_token;
use crate::sessions::{Session, SessionStore};
use crate::validate;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub sessions: SessionStore,
}

/// New account signup. Always creates a plain user; admin accounts come from
/// the startup bootstrap.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate::validate_signup(&req)?;

    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();
    let fullname = req.fullname.trim().to_string();

    let mut taken = Vec::new();
    if state.db.get_user_by_username(&username)?.is_some() {
        taken.push("username is already taken".to_string());
    }
    if state.db.get_user_by_email(&email)?.is_some() {
        taken.push("email is already taken".to_string());
    }
    if !taken.is_empty() {
        return Err(DomainError::Validation(taken).into());
    }

    let password_hash = hash_password(&req.password)?;

    let db = state.clone();
    let user = run_blocking(move || {
        db.db.create_user(&NewUser {
            username,
            password_hash,
            fullname,
            email,
            role: Role::User,
        })
    })
    .await?
    .into_user();

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(user, "Registration successful")),
    ))
}

/// Credential failures are deliberately indistinguishable: an unknown
/// username and a wrong password both report "username or password
/// incorrect".
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_user_by_username(req.username.trim())?
        .ok_or(DomainError::InvalidCredentials)?;

    verify_password(&req.password, &row.password)?;

    let user = row.into_user();
    let token = state.sessions.create_session(Session::for_user(&user)).await;

    Ok(Json(ApiResponse::ok(
        LoginResponse { token, user },
        "Login successful",
    )))
}

/// Idempotent: an absent or unknown token still reports success.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.remove(token).await;
    }
    Json(ApiResponse::<()>::ok_empty("Logout successful"))
}

pub async fn check(Extension(session): Extension<Session>) -> impl IntoResponse {
    Json(ApiResponse::ok(session.user(), "Authenticated"))
}

pub fn hash_password(password: &str) -> Result<String, DomainError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::Internal(format!("password hashing failed: {e}")))
}

fn verify_password(password: &str, stored_hash: &str) -> Result<(), DomainError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| DomainError::Internal(format!("stored hash unreadable: {e}")))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| DomainError::InvalidCredentials)
}
