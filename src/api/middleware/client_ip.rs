//! Client identity used as the rate limit key

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

const UNKNOWN_CLIENT: &str = "unknown";

/// How the client address is derived from a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientIpConfig {
    /// Honour `X-Forwarded-For` and `X-Real-IP`. Only safe behind a reverse
    /// proxy that sets or appends them.
    pub trust_proxy_headers: bool,
}

/// Identifier of the calling client
///
/// By default this is the socket peer address. With proxy headers trusted it
/// is the last `X-Forwarded-For` hop (the one the proxy appended), then
/// `X-Real-IP`, then the peer. Never rejects: unidentifiable clients share
/// the `"unknown"` bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for ClientIdentity
where
    ClientIpConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = ClientIpConfig::from_ref(state);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(Self(resolve_client_id(&parts.headers, peer, config)))
    }
}

fn resolve_client_id(headers: &HeaderMap, peer: Option<String>, config: ClientIpConfig) -> String {
    let forwarded = if config.trust_proxy_headers {
        last_forwarded_hop(headers).or_else(|| header_value(headers, "x-real-ip"))
    } else {
        None
    };

    forwarded
        .or(peer)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Entries left of the last hop are supplied by the client and can be forged
fn last_forwarded_hop(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for").and_then(|value| {
        value
            .rsplit(',')
            .map(str::trim)
            .find(|entry| !entry.is_empty())
            .map(str::to_string)
    })
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
