//! # Tracegate Identity
//!
//! HTTP client for the external identity provider.
//!
//! - Password sign-in, token refresh and password change over REST
//! - ID-token verification against a JWKS endpoint (RS256) or a shared
//!   HS256 secret for local emulators

pub mod client;
pub mod verifier;

pub use client::HttpIdentityProvider;
pub use verifier::TokenVerifier;
