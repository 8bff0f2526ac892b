//! Startup self-address resolution.
//!
//! Resolves the externally reachable IP of this process, either from the
//! local routing table or by querying HTTP address-echo services. The
//! result only feeds the startup banner, so callers treat failure as
//! recoverable.

use std::fmt;
use std::net::IpAddr;

use reqwest::Client;
use tracing::debug;

/// Strategy for discovering this process's reachable address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    /// Ask the local routing table for the outbound interface address.
    Local,
    /// Query external address-echo services over HTTP.
    External,
}

impl AddrMode {
    pub fn from_value(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "local" => AddrMode::Local,
            _ => AddrMode::External,
        }
    }
}

impl fmt::Display for AddrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            AddrMode::Local => "local",
            AddrMode::External => "external",
        };
        f.write_str(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelfAddrError {
    #[error("local address lookup failed: {0}")]
    Local(#[from] local_ip_address::Error),
    #[error("no address-echo service returned a usable address")]
    NoCandidate,
}

/// Resolve this process's reachable IP using the selected strategy.
pub async fn resolve(
    mode: AddrMode,
    services: &[String],
    client: &Client,
) -> Result<IpAddr, SelfAddrError> {
    match mode {
        AddrMode::Local => Ok(local_ip_address::local_ip()?),
        AddrMode::External => resolve_via_services(services, client).await,
    }
}

async fn resolve_via_services(
    services: &[String],
    client: &Client,
) -> Result<IpAddr, SelfAddrError> {
    for endpoint in services {
        let trimmed = endpoint.trim();
        if trimmed.is_empty() {
            continue;
        }

        match client.get(trimmed).send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    continue;
                }
                if let Ok(body) = response.text().await {
                    if let Ok(ip) = body.trim().parse::<IpAddr>() {
                        debug!("Detected external IP via {}: {}", trimmed, ip);
                        return Ok(ip);
                    }
                }
            }
            Err(err) => {
                debug!("Failed to query {} for external IP: {}", trimmed, err);
            }
        }
    }

    Err(SelfAddrError::NoCandidate)
}
