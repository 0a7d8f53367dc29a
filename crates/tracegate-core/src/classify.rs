//! Wire-level error classification.
//!
//! Turns an internal status, source and message into the `(status, body)`
//! pair every error response carries. The body never contains internal
//! error text, only the classified message and a structured detail string.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CustomError, ErrorCode, ErrorSource};

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// `"[<source>] <CanonicalName>"`.
    pub code: String,
    /// Classified message, with detail fragments comma-appended.
    pub message: String,
    /// `"id: .., timeStamp: .., dataTarget: .., method: .."`.
    pub detail: String,
}

/// Request context rendered into the `detail` field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Authenticated caller id, empty when unknown.
    pub caller_id: String,
    /// Resource the request targeted (the request path).
    pub data_target: String,
    /// HTTP method of the request.
    pub method: String,
}

impl ErrorContext {
    /// Create a context.
    #[must_use]
    pub fn new(
        caller_id: impl Into<String>,
        data_target: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            caller_id: caller_id.into(),
            data_target: data_target.into(),
            method: method.into(),
        }
    }
}

/// Build the status and body for a failure, stamped with the current time.
///
/// Statuses outside the six defined codes are rendered as 500.
#[must_use]
pub fn http_error_generate(
    status: u16,
    source: ErrorSource,
    message: &str,
    ctx: &ErrorContext,
    fragments: &[&str],
) -> (u16, ErrorBody) {
    http_error_generate_at(status, source, message, ctx, fragments, Utc::now())
}

/// Same as [`http_error_generate`] with an explicit timestamp.
#[must_use]
pub fn http_error_generate_at(
    status: u16,
    source: ErrorSource,
    message: &str,
    ctx: &ErrorContext,
    fragments: &[&str],
    at: DateTime<Utc>,
) -> (u16, ErrorBody) {
    let code = ErrorCode::from_status(status);

    let message = if fragments.is_empty() {
        message.to_string()
    } else {
        format!("{message}, {}", fragments.join(", "))
    };

    let body = ErrorBody {
        code: format!("[{source}] {}", code.canonical_name()),
        message,
        detail: format!(
            "id: {}, timeStamp: {}, dataTarget: {}, method: {}",
            ctx.caller_id,
            at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ctx.data_target,
            ctx.method,
        ),
    };

    (code.status(), body)
}

impl CustomError {
    /// Render this error with the given request context.
    #[must_use]
    pub fn render(&self, ctx: &ErrorContext) -> (u16, ErrorBody) {
        let fragments: Vec<&str> = self.detail.as_deref().into_iter().collect();
        http_error_generate(self.status(), self.origin, &self.message, ctx, &fragments)
    }
}
