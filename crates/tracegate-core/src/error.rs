//! Classified failures.
//!
//! A [`CustomError`] is raised at the failure site for caller-attributable
//! outcomes and travels unchanged to the outer error boundary, which renders
//! it exactly once. Infrastructure errors are not wrapped in this type.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Messages attached to classified failures.
pub mod messages {
    /// No API key was presented.
    pub const ACCESS_DENIED: &str = "AccessDenied";
    /// The presented API key is not registered (or not in scope).
    pub const INVALID_KEY: &str = "InvalidKey";
    /// The caller IP is outside every CIDR block bound to the key.
    pub const IP_NOT_AUTHORIZED_FOR_KEY: &str = "IPNotAuthorizedForKey";
    /// No bearer token was presented.
    pub const AUTHENTICATION_REQUIRED: &str = "AuthenticationRequired";
    /// The bearer token failed verification.
    pub const INVALID_TOKEN: &str = "InvalidToken";
    /// Sign-in or refresh returned no usable token material.
    pub const INVALID_CREDENTIALS: &str = "InvalidCredentials";
    /// An upstream collaborator could not be reached.
    pub const OUTER_SERVICE: &str = "OuterService";
    /// No route matched the request.
    pub const ENDPOINT_NOT_FOUND: &str = "EndpointNotFound";
    /// Unclassified failure.
    pub const UNEXPECTED: &str = "Unexpected";
    /// The request body could not be decoded.
    pub const INVALID_REQUEST_BODY: &str = "InvalidRequestBody";
    /// The request body failed field validation.
    pub const VALIDATION_FAILED: &str = "ValidationFailed";
}

/// The closed set of wire status codes a classified failure may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    AccessDenied,
    /// 404
    NotFound,
    /// 500
    InternalServerError,
    /// 503
    ServiceUnavailable,
}

impl ErrorCode {
    /// All defined codes, in ascending status order.
    pub const ALL: [Self; 6] = [
        Self::BadRequest,
        Self::Unauthorized,
        Self::AccessDenied,
        Self::NotFound,
        Self::InternalServerError,
        Self::ServiceUnavailable,
    ];

    /// HTTP status for this code.
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::AccessDenied => 403,
            Self::NotFound => 404,
            Self::InternalServerError => 500,
            Self::ServiceUnavailable => 503,
        }
    }

    /// Map an arbitrary status to a defined code.
    ///
    /// Anything outside the six defined values becomes
    /// [`ErrorCode::InternalServerError`].
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::AccessDenied,
            404 => Self::NotFound,
            503 => Self::ServiceUnavailable,
            _ => Self::InternalServerError,
        }
    }

    /// Canonical name used in the `code` field of error bodies.
    #[must_use]
    pub const fn canonical_name(self) -> &'static str {
        match self {
            Self::BadRequest => "BadRequest",
            Self::Unauthorized => "Unauthorized",
            Self::AccessDenied => "AccessDenied",
            Self::NotFound => "NotFound",
            Self::InternalServerError => "InternalServerError",
            Self::ServiceUnavailable => "ServiceUnavailable",
        }
    }

    /// Whether the failure is client-caused.
    #[must_use]
    pub const fn is_warn(self) -> bool {
        is_warn(self.status())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status(), self.canonical_name())
    }
}

/// Client-caused failures (4xx) are logged as warnings, everything else as errors.
#[must_use]
pub const fn is_warn(status: u16) -> bool {
    status >= 400 && status < 500
}

/// Subsystem a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    /// Trust boundary and credential flows.
    Auth,
    /// Data-space endpoints and routing.
    Dataspace,
}

impl ErrorSource {
    /// Lowercase label used in error bodies.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Dataspace => "dataspace",
        }
    }
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified, caller-attributable failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{origin}] {code}: {message}")]
pub struct CustomError {
    /// Wire status classification.
    pub code: ErrorCode,
    /// Short machine-readable message (e.g. `InvalidKey`).
    pub message: String,
    /// Optional extra detail, appended to the message when rendered.
    pub detail: Option<String>,
    /// Subsystem the failure belongs to.
    pub origin: ErrorSource,
}

impl CustomError {
    /// Create a classified error.
    #[must_use]
    pub fn new(code: ErrorCode, origin: ErrorSource, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
            origin,
        }
    }

    /// Attach a detail fragment.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// ValidationError (400).
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, ErrorSource::Auth, message)
    }

    /// AuthenticationError (401).
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, ErrorSource::Auth, message)
    }

    /// AuthorizationError (403).
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AccessDenied, ErrorSource::Auth, message)
    }

    /// NotFoundError (404).
    #[must_use]
    pub fn not_found(origin: ErrorSource, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, origin, message)
    }

    /// InternalError (500).
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalServerError, ErrorSource::Auth, message)
    }

    /// UpstreamUnavailable (503).
    #[must_use]
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, ErrorSource::Auth, message)
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.code.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_table() {
        let table: Vec<(u16, &str)> = ErrorCode::ALL
            .iter()
            .map(|c| (c.status(), c.canonical_name()))
            .collect();
        assert_eq!(
            table,
            vec![
                (400, "BadRequest"),
                (401, "Unauthorized"),
                (403, "AccessDenied"),
                (404, "NotFound"),
                (500, "InternalServerError"),
                (503, "ServiceUnavailable"),
            ]
        );
    }

    #[test]
    fn test_from_status_round_trips_defined_codes() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_status(code.status()), code);
        }
    }

    #[test]
    fn test_from_status_defaults_to_internal() {
        for status in [0, 200, 302, 402, 409, 422, 429, 501, 502, 504, 999] {
            assert_eq!(
                ErrorCode::from_status(status),
                ErrorCode::InternalServerError
            );
        }
    }

    #[test]
    fn test_is_warn() {
        assert!(is_warn(400));
        assert!(is_warn(401));
        assert!(is_warn(403));
        assert!(is_warn(404));
        assert!(!is_warn(500));
        assert!(!is_warn(503));
        assert!(!is_warn(399));
        assert!(ErrorCode::Unauthorized.is_warn());
        assert!(!ErrorCode::ServiceUnavailable.is_warn());
    }

    #[test]
    fn test_constructors() {
        let err = CustomError::authorization(messages::INVALID_KEY);
        assert_eq!(err.status(), 403);
        assert_eq!(err.origin, ErrorSource::Auth);
        assert_eq!(err.message, "InvalidKey");

        let err = CustomError::not_found(ErrorSource::Dataspace, messages::ENDPOINT_NOT_FOUND);
        assert_eq!(err.status(), 404);
        assert_eq!(err.origin, ErrorSource::Dataspace);

        assert_eq!(CustomError::validation("x").status(), 400);
        assert_eq!(CustomError::authentication("x").status(), 401);
        assert_eq!(CustomError::internal("x").status(), 500);
        assert_eq!(CustomError::upstream_unavailable("x").status(), 503);
    }

    #[test]
    fn test_display() {
        let err = CustomError::authentication(messages::INVALID_TOKEN);
        assert_eq!(err.to_string(), "[auth] 401 Unauthorized: InvalidToken");
    }
}
