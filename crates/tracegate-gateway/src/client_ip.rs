//! Caller address resolution.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::ConnectInfo,
    http::{Extensions, HeaderMap},
};

/// Resolve the caller address of a request.
///
/// Forwarding headers are honoured only when the direct peer is a trusted
/// proxy: the rightmost `X-Forwarded-For` entry first, then `X-Real-IP`.
/// Otherwise the peer address is used. Without a peer address the caller
/// is unknown.
#[must_use]
pub fn resolve_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trusted_proxies: &[IpAddr],
) -> Option<IpAddr> {
    let Some(direct) = direct_ip else {
        tracing::warn!("No direct connection IP available for request");
        return None;
    };

    if trusted_proxies.contains(&direct) {
        let forwarded = header_ip(headers, "x-forwarded-for", |value| {
            value.split(',').next_back()
        });
        let real = || header_ip(headers, "x-real-ip", |value| Some(value));
        if let Some(ip) = forwarded.or_else(real) {
            return Some(ip);
        }
    }

    Some(direct)
}

/// Peer address recorded by the server, if any.
#[must_use]
pub fn direct_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
}

fn header_ip(
    headers: &HeaderMap,
    name: &str,
    pick: impl Fn(&str) -> Option<&str>,
) -> Option<IpAddr> {
    let value = headers.get(name)?.to_str().ok()?;
    pick(value)?.trim().parse().ok()
}
