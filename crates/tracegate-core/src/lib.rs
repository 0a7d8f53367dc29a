//! # Tracegate Core
//!
//! Shared building blocks for the Tracegate trust boundary.
//!
//! This crate provides:
//! - The six-value error taxonomy and the wire-level error classifier
//! - Verified identity claims and their extraction from raw token claims
//! - Read-only reference data (API keys, operator bindings, CIDR allowlists)
//! - Collaborator traits for the credential store, identity provider and audit sink
//! - Configuration loading and validation (JSON5 format)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod cidr;
pub mod claims;
pub mod classify;
pub mod config;
pub mod error;
pub mod provider;
pub mod secrets;
pub mod store;
pub mod types;

pub use audit::{AuditSink, IpCheckRecord, TracingAuditSink};
pub use cidr::{Cidr, CidrError};
pub use claims::{Claims, ClaimsError, OPERATOR_ID_CLAIM};
pub use classify::{ErrorBody, ErrorContext, http_error_generate, http_error_generate_at};
pub use config::{Config, ConfigError};
pub use error::{CustomError, ErrorCode, ErrorSource, is_warn};
pub use provider::{IdentityProvider, ProviderError, RawClaims};
pub use secrets::ApiKey;
pub use store::{
    CredentialStore, MemoryCredentialStore, ReferenceData, StoreError, StoreErrorKind,
};
pub use types::{
    ApiKeyOperator, ApiKeyRecord, CidrEntry, KeyAttribute, KeyScope, LoginResult, OperatorId,
    RefreshResult,
};
