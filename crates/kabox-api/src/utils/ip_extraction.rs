//! Client IP extraction
//!
//! Reads `X-Forwarded-For` while trusting only the configured number of proxies, so a
//! client cannot choose its own rate-limit key by sending a forged header.

use crate::state::AppState;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{request::Parts, Extensions, HeaderMap};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

const UNKNOWN: &str = "unknown";

/// Extract and validate client IP from request headers
///
/// Order: `X-Forwarded-For` (honouring `trusted_proxy_count`), `X-Real-IP`, then the
/// socket address. Returns `"unknown"` when nothing usable is present.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| extract_from_forwarded_for(value, trusted_proxy_count))
    {
        return ip;
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| is_valid_ip(value))
    {
        return real_ip.to_string();
    }

    socket_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Client IP from `X-Forwarded-For: client, proxy1, proxy2`.
///
/// With N trusted proxies the last N entries are theirs and the entry before them is the
/// client. With no trusted proxies, or a chain shorter than expected, only the entry closest
/// to us is used.
fn extract_from_forwarded_for(header_value: &str, trusted_proxy_count: usize) -> Option<String> {
    let ips: Vec<&str> = header_value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let candidate = if trusted_proxy_count == 0 || ips.len() <= trusted_proxy_count {
        ips.last()
    } else {
        ips.get(ips.len() - trusted_proxy_count - 1)
    }?;

    is_valid_ip(candidate).then(|| candidate.to_string())
}

fn is_valid_ip(ip_str: &str) -> bool {
    ip_str.parse::<IpAddr>().is_ok()
}

/// Client IP using whatever connection info the server attached to the request.
pub fn client_ip_from_parts(
    headers: &HeaderMap,
    extensions: &Extensions,
    trusted_proxy_count: usize,
) -> String {
    let socket_addr = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    extract_client_ip(headers, socket_addr.as_ref(), trusted_proxy_count)
}

/// Extractor for the caller's IP address.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip_from_parts(
            &parts.headers,
            &parts.extensions,
            state.config.trusted_proxy_count(),
        )))
    }
}
