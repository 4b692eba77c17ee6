//! Client IP extraction.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::api::AppState;
use crate::error::AppError;

/// Extract client IP from request headers or connection info.
///
/// When `trust_proxy` is true, checks X-Forwarded-For and X-Real-IP headers.
/// Falls back to direct connection IP, or 127.0.0.1 if unavailable.
pub fn extract_client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> IpAddr {
    if trust_proxy {
        let forwarded = headers
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|ip| ip.trim().parse().ok());
        if let Some(ip) = forwarded {
            return ip;
        }

        let real_ip = headers
            .get("X-Real-IP")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok());
        if let Some(ip) = real_ip {
            return ip;
        }
    }
    connect_info
        .map(|c| c.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Client address of the current request, as stored on posts and matched
/// against bans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl ClientIp {
    /// Canonical text form used in storage and tagged keys.
    pub fn as_string(&self) -> String {
        self.0.to_string()
    }
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let connect_info = parts.extensions.get::<ConnectInfo<SocketAddr>>();
        Ok(Self(extract_client_ip(
            &parts.headers,
            connect_info,
            state.config.trust_proxy,
        )))
    }
}
