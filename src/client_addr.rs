use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
};

use http::HeaderMap;
use serde_with::DeserializeFromStr;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Peers allowed to report the original client through `X-Forwarded-For`.
///
/// Parsed from `*` (any peer) or a comma separated list of IP addresses.
#[derive(Clone, Debug, PartialEq, Eq, DeserializeFromStr)]
pub enum TrustedProxies {
    Any,
    Only(Vec<IpAddr>),
}

#[derive(Debug, thiserror::Error)]
#[error("invalid trusted proxy address `{0}`")]
pub struct ParseTrustedProxiesError(String);

impl Default for TrustedProxies {
    fn default() -> Self {
        TrustedProxies::Only(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)])
    }
}

impl FromStr for TrustedProxies {
    type Err = ParseTrustedProxiesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entries = s.split(',').map(str::trim).filter(|e| !e.is_empty());
        let mut addresses = Vec::new();

        for entry in entries {
            if entry == "*" {
                return Ok(TrustedProxies::Any);
            }
            let address = entry
                .parse()
                .map_err(|_| ParseTrustedProxiesError(entry.to_string()))?;
            addresses.push(address);
        }

        Ok(TrustedProxies::Only(addresses))
    }
}

impl TrustedProxies {
    pub fn contains(&self, address: IpAddr) -> bool {
        match self {
            TrustedProxies::Any => true,
            TrustedProxies::Only(addresses) => addresses.contains(&address),
        }
    }
}

/// How the client address of a request is determined.
#[derive(Clone, Debug)]
pub struct ProxyPolicy {
    pub enabled: bool,
    pub trusted: TrustedProxies,
}

/// Address of the client that originated a request.
///
/// Addresses taken from `X-Forwarded-For` carry no port, so port `0` is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

impl fmt::Display for ClientAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl ClientAddr {
    pub fn resolve(peer: SocketAddr, headers: &HeaderMap, policy: &ProxyPolicy) -> Self {
        if !policy.enabled || !policy.trusted.contains(peer.ip()) {
            return ClientAddr(peer);
        }

        let hops: Vec<&str> = headers
            .get_all(X_FORWARDED_FOR)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .collect();

        // Walk back from the closest hop; the first one we do not trust is the client.
        let forwarded = hops
            .iter()
            .rev()
            .find(|hop| match hop.parse() {
                Ok(address) => !policy.trusted.contains(address),
                Err(_) => true,
            })
            .or_else(|| hops.first());

        let Some(forwarded) = forwarded else {
            return ClientAddr(peer);
        };

        match forwarded.parse::<IpAddr>() {
            Ok(address) => ClientAddr(SocketAddr::new(address, 0)),
            Err(_) => {
                tracing::warn!(%peer, hop = %forwarded, "failed to parse forwarded client address");
                ClientAddr(peer)
            }
        }
    }
}
