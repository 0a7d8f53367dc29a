//! # Tracegate Gateway
//!
//! The trust boundary in front of the traceability API.
//!
//! Every request crosses an ordered [`Pipeline`] of gates
//! ([`ApiKeyGate`], then [`NetworkGate`] when IP restriction is enabled,
//! then [`TokenGate`] where an operator identity is required) before it
//! reaches a handler. Failures short-circuit and are rendered once by the
//! [`error_boundary`] middleware as `{code, message, detail}`.

pub mod boundary;
pub mod client_ip;
pub mod extract;
pub mod gates;
pub mod pipeline;
pub mod routes;
mod server;
pub mod usecase;

pub use boundary::{ApiError, CallerId, error_boundary};
pub use extract::{Authenticated, ValidatedJson};
pub use gates::{ApiKeyGate, Gate, GateRequest, Identity, NetworkGate, TokenError, TokenGate};
pub use pipeline::{Pipeline, enforce};
pub use server::{Gateway, GatewayBuilder, GatewayState};
pub use usecase::CredentialUsecase;

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
