//! Process-wide error boundary.
//!
//! Handlers and gates return [`ApiError`]. Its `IntoResponse` renders a body
//! without request context and leaves the error in the response extensions;
//! [`error_boundary`] picks it up, re-renders it with the caller id, path
//! and method, and logs it once.

use axum::{
    Json,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use tracegate_core::error::messages;
use tracegate_core::{
    CustomError, ErrorBody, ErrorContext, ErrorSource, ProviderError, StoreError,
    StoreErrorKind, is_warn,
};

/// Everything that can reach the boundary.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Already classified at the failure site.
    #[error(transparent)]
    Custom(#[from] CustomError),

    /// A handler required an operator identity and none was established.
    #[error("No bearer identity on request")]
    MissingBearer,

    /// Unclassified identity-provider failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Unclassified storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No route matched.
    #[error("Route not found")]
    RouteNotFound,

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Classify into the wire taxonomy.
    ///
    /// Checked in order: classified errors keep their own code, then the
    /// missing-bearer sentinel, refused connections (provider or store),
    /// unmatched routes, storage shutdown, other storage errors and finally
    /// the 500 fallback.
    #[must_use]
    pub fn classify(&self) -> CustomError {
        match self {
            Self::Custom(err) => err.clone(),
            Self::MissingBearer => CustomError::authentication(messages::AUTHENTICATION_REQUIRED),
            Self::Provider(err) if err.is_unavailable() => {
                CustomError::upstream_unavailable(messages::OUTER_SERVICE)
            }
            Self::Store(err) if err.kind == StoreErrorKind::Connection => {
                CustomError::upstream_unavailable(messages::OUTER_SERVICE)
            }
            Self::RouteNotFound => {
                CustomError::not_found(ErrorSource::Dataspace, messages::ENDPOINT_NOT_FOUND)
            }
            Self::Store(err) if err.kind.is_shutdown() => {
                CustomError::upstream_unavailable(messages::OUTER_SERVICE)
            }
            Self::Store(_) | Self::Provider(_) | Self::Internal(_) => {
                CustomError::internal(messages::UNEXPECTED)
            }
        }
    }

    /// Status and body for this error in `ctx`.
    #[must_use]
    pub fn render(&self, ctx: &ErrorContext) -> (StatusCode, ErrorBody) {
        let (status, body) = self.classify().render(ctx);
        (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        )
    }
}

/// Marker left on error responses for [`error_boundary`].
#[derive(Debug, Clone)]
struct PendingError(ApiError);

/// Authenticated caller of a request, attached to its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.render(&ErrorContext::default());
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(PendingError(self));
        response
    }
}

/// Outermost middleware: renders pending errors with request context.
pub async fn error_boundary(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;
    let Some(PendingError(err)) = response.extensions_mut().remove::<PendingError>() else {
        return response;
    };

    let caller = response
        .extensions()
        .get::<CallerId>()
        .map(|caller| caller.0.clone())
        .unwrap_or_default();
    let ctx = ErrorContext::new(caller, path, method);
    let (status, body) = err.render(&ctx);

    if is_warn(status.as_u16()) {
        tracing::warn!(
            status = status.as_u16(),
            code = %body.code,
            message = %body.message,
            error = %err,
            path = %ctx.data_target,
            method = %ctx.method,
            "Request rejected"
        );
    } else {
        tracing::error!(
            status = status.as_u16(),
            code = %body.code,
            message = %body.message,
            error = %err,
            path = %ctx.data_target,
            method = %ctx.method,
            "Request failed"
        );
    }

    let mut rendered = (status, Json(body)).into_response();
    if let Some(caller) = response.extensions_mut().remove::<CallerId>() {
        rendered.extensions_mut().insert(caller);
    }
    rendered
}
