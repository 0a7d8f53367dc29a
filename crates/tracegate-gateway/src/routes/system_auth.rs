//! Machine-to-machine credential checks under `/systemAuth`.

use std::net::IpAddr;
use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use tracegate_core::error::messages;
use tracegate_core::{ApiKey, CustomError};

use crate::boundary::ApiError;
use crate::extract::ValidatedJson;
use crate::server::GatewayState;

/// `POST /systemAuth/token` body.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// Operator ID token to resolve.
    #[validate(length(min = 1))]
    pub id_token: String,
}

/// `POST /systemAuth/token` response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Operator the token belongs to, `null` when it does not verify.
    pub operator_id: Option<String>,
}

/// `POST /systemAuth/apiKey` body.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRequest {
    /// Caller address to check against the key's allowlist.
    #[validate(ip)]
    pub ip_address: String,
    /// Key to check.
    #[validate(length(min = 1))]
    pub api_key: String,
}

/// `POST /systemAuth/apiKey` response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResponse {
    /// Whether the key is registered.
    pub is_api_key_valid: bool,
    /// Whether the address is inside a block bound to the key.
    pub is_ip_address_valid: bool,
}

/// `POST /systemAuth/token`
///
/// Only an unreachable identity provider is an error; any other
/// verification failure answers 200 with a null operator.
///
/// # Errors
///
/// 503 `OuterService`.
pub async fn token(
    State(state): State<Arc<GatewayState>>,
    ValidatedJson(body): ValidatedJson<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let operator_id = match state.tokens.identify(&body.id_token).await {
        Ok(claims) => Some(claims.operator_id.0),
        Err(e) if e.is_unavailable() => {
            tracing::error!(error = %e, "Identity provider unreachable");
            return Err(CustomError::upstream_unavailable(messages::OUTER_SERVICE).into());
        }
        Err(e) => {
            tracing::info!(error = %e, "System token did not resolve to an operator");
            None
        }
    };

    Ok(Json(TokenResponse { operator_id }))
}

/// `POST /systemAuth/apiKey`
///
/// Never fails once the body validates; lookup failures read as `false`.
pub async fn api_key(
    State(state): State<Arc<GatewayState>>,
    ValidatedJson(body): ValidatedJson<ApiKeyRequest>,
) -> Json<ApiKeyResponse> {
    let key = ApiKey::new(body.api_key);
    let ip = body.ip_address.trim().parse::<IpAddr>().ok();

    let is_api_key_valid = state.api_keys.verify(&key).await.is_ok();
    let is_ip_address_valid = state.network.allows(&key, ip).await;

    Json(ApiKeyResponse {
        is_api_key_valid,
        is_ip_address_valid,
    })
}
