use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tower_governor::{key_extractor::KeyExtractor, GovernorError};

/// Client-IP key extractor that works both behind a proxy and bare.
///
/// Checks the common forwarding headers first, then the socket peer address,
/// and finally falls back to a shared unspecified key so requests are
/// throttled rather than rejected when no address can be determined.
#[derive(Debug, Clone, Copy)]
pub struct FallbackIpKeyExtractor;

impl KeyExtractor for FallbackIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let headers = req.headers();

        Ok(from_x_forwarded_for(headers)
            .or_else(|| from_x_real_ip(headers))
            .or_else(|| from_forwarded(headers))
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)))
    }
}

fn from_x_forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
}

fn from_x_real_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok())
}

fn from_forwarded(headers: &HeaderMap) -> Option<IpAddr> {
    let value = headers.get("forwarded")?.to_str().ok()?;
    for part in value.split(';').flat_map(|p| p.split(',')) {
        let part = part.trim();
        if let Some(ip) = part.strip_prefix("for=") {
            let ip = ip.trim_matches('"');
            // Strip a port if present ("for=1.2.3.4:5678")
            let host = ip.rsplit_once(':').map_or(ip, |(h, _)| {
                if h.parse::<Ipv4Addr>().is_ok() {
                    h
                } else {
                    ip
                }
            });
            if let Ok(parsed) = host.parse() {
                return Some(parsed);
            }
        }
    }
    None
}
