//! Client identifier extraction.

use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;

/// Headers consulted in order before the socket peer address.
const FORWARDING_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// Used when neither headers nor the connection reveal an address.
pub const DEFAULT_CLIENT_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Resolves the client address used as the rate-limit identifier.
///
/// Only the first hop of `x-forwarded-for` is used. Header values that do
/// not parse as an IP address are skipped.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    FORWARDING_HEADERS
        .iter()
        .find_map(|name| {
            let value = headers.get(*name)?.to_str().ok()?;
            value.split(',').next()?.trim().parse::<IpAddr>().ok()
        })
        .or_else(|| peer.map(|addr| addr.ip()))
        .unwrap_or(DEFAULT_CLIENT_IP)
}

/// Extractor yielding the client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        Ok(Self(client_ip(&parts.headers, peer)))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn forwarded_for_first_hop_wins() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.5, 10.0.0.1"),
            ("x-real-ip", "198.51.100.7"),
        ]);
        assert_eq!(client_ip(&h, None), "203.0.113.5".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn fallback_order() {
        let h = headers(&[("x-real-ip", "198.51.100.7"), ("cf-connecting-ip", "192.0.2.1")]);
        assert_eq!(client_ip(&h, None), "198.51.100.7".parse::<IpAddr>().unwrap());

        let h = headers(&[("cf-connecting-ip", "2001:db8::1")]);
        assert_eq!(client_ip(&h, None), "2001:db8::1".parse::<IpAddr>().unwrap());

        let peer: SocketAddr = "192.0.2.9:5000".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), peer.ip());
        assert_eq!(client_ip(&HeaderMap::new(), None), DEFAULT_CLIENT_IP);
    }

    #[test]
    fn unparseable_values_are_skipped() {
        let h = headers(&[("x-forwarded-for", "not-an-ip"), ("x-real-ip", "198.51.100.7")]);
        assert_eq!(client_ip(&h, None), "198.51.100.7".parse::<IpAddr>().unwrap());
    }
}
