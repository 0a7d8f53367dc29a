//! Operator credential routes under `/auth`.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::boundary::ApiError;
use crate::extract::{Authenticated, ValidatedJson};
use crate::server::GatewayState;

/// `POST /auth/login` body.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Operator email.
    #[validate(email)]
    pub operator_account_id: String,
    /// Operator password.
    #[validate(length(min = 1))]
    pub account_password: String,
}

/// `POST /auth/login` response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// ID token for the `Authorization` header.
    pub access_token: String,
    /// Token for `/auth/refresh`.
    pub refresh_token: String,
}

/// `POST /auth/refresh` body.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Refresh token from a previous login.
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// `POST /auth/refresh` response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// Fresh ID token.
    pub access_token: String,
}

/// `POST /auth/change` body.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// Replacement password.
    #[validate(length(min = 1))]
    pub new_password: String,
}

/// `POST /auth/login`
///
/// # Errors
///
/// 401 `InvalidCredentials`, 503 `OuterService`.
pub async fn login(
    State(state): State<Arc<GatewayState>>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let tokens = state
        .usecase
        .login(&body.operator_account_id, &body.account_password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }),
    ))
}

/// `POST /auth/refresh`
///
/// # Errors
///
/// 401 `InvalidCredentials`, 503 `OuterService`.
pub async fn refresh(
    State(state): State<Arc<GatewayState>>,
    ValidatedJson(body): ValidatedJson<RefreshRequest>,
) -> Result<(StatusCode, Json<RefreshResponse>), ApiError> {
    let tokens = state.usecase.refresh(&body.refresh_token).await?;

    Ok((
        StatusCode::CREATED,
        Json(RefreshResponse {
            access_token: tokens.access_token,
        }),
    ))
}

/// `POST /auth/change`
///
/// # Errors
///
/// 500 `Unexpected` when the provider refuses the change.
pub async fn change_password(
    State(state): State<Arc<GatewayState>>,
    Authenticated(claims): Authenticated,
    ValidatedJson(body): ValidatedJson<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .usecase
        .change_password(&claims.uid, &body.new_password)
        .await?;
    Ok(StatusCode::CREATED)
}
