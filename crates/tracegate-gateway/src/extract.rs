//! Request extractors.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use tracegate_core::error::messages;
use tracegate_core::{Claims, CustomError};

use crate::boundary::ApiError;
use crate::gates::Identity;

/// Claims of the operator authenticated by the token gate.
///
/// Rejects with the missing-bearer sentinel when the route is not behind a
/// token gate or no identity was established.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Claims);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .and_then(|identity| identity.claims.clone())
            .map(Self)
            .ok_or(ApiError::MissingBearer)
    }
}

/// JSON body that has passed field validation.
///
/// Malformed JSON is 400 `InvalidRequestBody`; validation failures are
/// 400 `ValidationFailed` with the offending field names appended.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(error = %rejection.body_text(), "Undecodable request body");
                CustomError::validation(messages::INVALID_REQUEST_BODY)
            })?;

        value.validate().map_err(|errors| {
            let mut fields: Vec<String> = errors
                .field_errors()
                .keys()
                .map(|field| camel_case(field))
                .collect();
            fields.sort();
            CustomError::validation(messages::VALIDATION_FAILED).with_detail(fields.join(", "))
        })?;

        Ok(Self(value))
    }
}

/// Wire name of a struct field.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use axum::{Router, body::Body, http::Request as HttpRequest, http::StatusCode, routing::post};
    use http_body_util::BodyExt;
    use serde::Deserialize;
    use serde_json::json;
    use tower::ServiceExt;

    use tracegate_core::ErrorBody;

    use super::*;

    #[derive(Debug, Deserialize, Validate)]
    #[serde(rename_all = "camelCase")]
    struct Signup {
        #[validate(email)]
        operator_account_id: String,
        #[validate(length(min = 1))]
        account_password: String,
    }

    async fn signup(ValidatedJson(body): ValidatedJson<Signup>) -> String {
        body.operator_account_id
    }

    async fn whoami(Authenticated(claims): Authenticated) -> String {
        claims.operator_id().to_string()
    }

    async fn send(app: Router, request: HttpRequest<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    fn post_json(body: &str) -> HttpRequest<Body> {
        HttpRequest::post("/signup")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("operator_account_id"), "operatorAccountId");
        assert_eq!(camel_case("ipAddress"), "ipAddress");
        assert_eq!(camel_case("token"), "token");
    }

    #[tokio::test]
    async fn test_valid_body() {
        let app = Router::new().route("/signup", post(signup));
        let body = json!({ "operatorAccountId": "a@x.com", "accountPassword": "pw" });
        let (status, bytes) = send(app, post_json(&body.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"a@x.com");
    }

    #[tokio::test]
    async fn test_invalid_fields_are_listed() {
        let app = Router::new().route("/signup", post(signup));
        let body = json!({ "operatorAccountId": "not-an-email", "accountPassword": "" });
        let (status, bytes) = send(app, post_json(&body.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.code, "[auth] BadRequest");
        assert_eq!(
            body.message,
            "ValidationFailed, accountPassword, operatorAccountId"
        );
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let app = Router::new().route("/signup", post(signup));
        let (status, bytes) = send(app, post_json("{\"operatorAccountId\":")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.message, "InvalidRequestBody");
    }

    #[tokio::test]
    async fn test_authenticated_without_identity_is_missing_bearer() {
        let app = Router::new().route("/me", post(whoami));
        let request = HttpRequest::post("/me").body(Body::empty()).unwrap();
        let (status, bytes) = send(app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.message, "AuthenticationRequired");
    }

    #[tokio::test]
    async fn test_authenticated_with_identity() {
        let app = Router::new().route("/me", post(whoami));
        let claims = Claims::from_raw(
            json!({ "operator_id": "op-9" }).as_object().cloned().unwrap(),
        )
        .unwrap();
        let mut request = HttpRequest::post("/me").body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(Identity::authenticated(claims));

        let (status, bytes) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"op-9");
    }
}
