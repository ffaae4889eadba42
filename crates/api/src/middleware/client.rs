//! Best-effort client identity for rate limiting.
//!
//! The first `X-Forwarded-For` entry wins, then the transport peer address,
//! then the literal `unknown`. The header is client-controlled and spoofable,
//! so this key is only ever used to bucket rate limits.
//!
//! ```ignore
//! async fn my_handler(ClientKey(client): ClientKey, ...) -> ... {
//!     state.stores.rate_limiter.check(&client, Category::Chat);
//! }
//! ```

use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Rate-limit key for the requesting client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl<S> FromRequestParts<S> for ClientKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(ClientKey(resolve(&parts.headers, peer)))
    }
}

pub fn resolve(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());

    match (forwarded, peer) {
        (Some(first), _) => first.to_owned(),
        (None, Some(ip)) => ip.to_string(),
        (None, None) => UNKNOWN_CLIENT.to_owned(),
    }
}
