//! Remote client adapter.
//!
//! Outbound HTTP calls toward remote wallets, verifiers and issuers:
//!
//! - [`http`] - [`IamHttpClient`], one method per remote endpoint
//! - [`openid4vp`] - [`OpenId4VpClient`], the typed façade implementing
//!   [`VerifierRole`](crate::provider::VerifierRole) and
//!   [`HolderRole`](crate::provider::HolderRole)
//! - [`dpop`] - proof-of-possession token descriptions
//!
//! The adapter makes no protocol decisions. Network failures, non-2xx
//! responses and malformed bodies surface as distinct [`ClientError`]
//! variants.
//!
//! # Security Considerations
//!
//! - In strict mode remote URLs must use https and must not point at
//!   loopback, private-use or unspecified hosts
//! - Requests time out after the configured request timeout
//! - Response bodies are limited to the configured maximum size

pub mod dpop;
pub mod http;
pub mod openid4vp;

use std::net::IpAddr;

use url::Url;

use crate::error::OAuth2Error;
use crate::provider::ProviderError;

pub use dpop::DpopToken;
pub use http::IamHttpClient;
pub use openid4vp::OpenId4VpClient;

/// Errors of outbound calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The request could not be sent or the connection failed.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote answered with a non-success status.
    #[error("HTTP error: status {status}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response body could not be parsed.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// A URL is malformed or not allowed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Metadata lacks a required endpoint.
    #[error("Missing endpoint: {0}")]
    MissingEndpoint(String),

    /// The response exceeded the maximum allowed size.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },

    /// The remote answered with an OAuth 2.0 error.
    #[error("Remote error: {0}")]
    OAuth(OAuth2Error),

    /// A local collaborator (wallet, key resolver, signer) failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Parses a URL that must be reachable on the public internet.
///
/// Always requires an http(s) URL with a host. In `strict_mode` the scheme
/// must be https and the host must not be `localhost`, a loopback,
/// private-use, link-local or unspecified address.
///
/// # Errors
///
/// Returns `ClientError::InvalidUrl` describing the violation.
pub fn parse_public_url(raw: &str, strict_mode: bool) -> Result<Url, ClientError> {
    let url = Url::parse(raw).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "https" => {}
        "http" if !strict_mode => {}
        other => {
            return Err(ClientError::InvalidUrl(format!(
                "{raw}: scheme must be https{}, got '{other}'",
                if strict_mode { "" } else { " or http" }
            )));
        }
    }

    let Some(host) = url.host_str() else {
        return Err(ClientError::InvalidUrl(format!("{raw}: missing host")));
    };
    if strict_mode && is_reserved_host(host) {
        return Err(ClientError::InvalidUrl(format!("{raw}: host '{host}' is reserved")));
    }
    Ok(url)
}

fn is_reserved_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") || host.ends_with(".localhost") {
        return true;
    }
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
        }
        Ok(IpAddr::V6(ip)) => ip.is_loopback() || ip.is_unspecified(),
        Err(_) => false,
    }
}
