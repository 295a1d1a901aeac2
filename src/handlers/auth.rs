//! `/api/auth`: accounts and sessions.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use super::{CreatedResult, JsonResult};
use crate::auth::{hash_password, new_verification_token, verify_password, AuthUser};
use crate::error::AppError;
use crate::extract::{AppPath, ValidatedJson};
use crate::models::{
    ApiResponse, AuthPayload, ChangePasswordRequest, LoginRequest, NewUser, RegisterRequest,
    Role, UpdateProfileRequest, UserPayload,
};
use crate::AppState;

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> CreatedResult<AuthPayload> {
    let email = body.email.trim().to_lowercase();
    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::bad_request("User already exists with this email"));
    }

    let user = state
        .store
        .create_user(NewUser {
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
            email,
            password_hash: hash_password(&body.password)?,
            phone: body.phone,
            role: Role::User,
            email_verification_token: Some(new_verification_token()),
        })
        .await?;

    // Verification mail delivery is out of scope; the token waits on the row.
    tracing::info!(user_id = %user.id, "User registered");

    let token = state.jwt.issue(&user)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "User registered successfully",
            AuthPayload { user, token },
        )),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> JsonResult<AuthPayload> {
    let user = state
        .store
        .find_user_by_email(&body.email)
        .await?
        .filter(|user| verify_password(&body.password, &user.password_hash))
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".into()))?;

    tracing::info!(user_id = %user.id, "User logged in");

    let token = state.jwt.issue(&user)?;
    Ok(Json(ApiResponse::with_message(
        "Login successful",
        AuthPayload { user, token },
    )))
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> JsonResult<UserPayload> {
    Ok(Json(ApiResponse::ok(UserPayload { user })))
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidatedJson(body): ValidatedJson<UpdateProfileRequest>,
) -> JsonResult<UserPayload> {
    let user = state
        .store
        .update_profile(user.id, &body)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(ApiResponse::with_message(
        "Profile updated successfully",
        UserPayload { user },
    )))
}

/// PUT /api/auth/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidatedJson(body): ValidatedJson<ChangePasswordRequest>,
) -> JsonResult<()> {
    if !verify_password(&body.current_password, &user.password_hash) {
        return Err(AppError::bad_request("Current password is incorrect"));
    }

    let hash = hash_password(&body.new_password)?;
    state.store.update_password(user.id, &hash).await?;
    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(ApiResponse::message("Password changed successfully")))
}

/// GET /api/auth/verify-email/:token
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    AppPath(token): AppPath<String>,
) -> JsonResult<UserPayload> {
    let user = state
        .store
        .verify_email(&token)
        .await?
        .ok_or_else(|| AppError::bad_request("Invalid or expired verification token"))?;

    Ok(Json(ApiResponse::with_message(
        "Email verified successfully",
        UserPayload { user },
    )))
}
