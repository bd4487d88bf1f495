//! Decentralized identifiers.
//!
//! Only the parts this node needs: parsing `did:<method>:<id>`, mapping
//! `did:web` identifiers to and from their https location, and a bounded
//! controller walk over a [`DidResolver`].

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::provider::{DidDocument, DidResolver};

/// Maximum depth followed when walking controller references.
pub const MAX_CONTROLLER_DEPTH: usize = 5;

static DID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^did:([a-z0-9]+):((?:[A-Za-z0-9._\-]|%[0-9A-Fa-f]{2})+(?::(?:[A-Za-z0-9._\-]|%[0-9A-Fa-f]{2})*)*)$")
        .expect("Invalid DID regex")
});

/// Errors from DID parsing and resolution helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DidError {
    /// The string is not a syntactically valid DID.
    #[error("invalid DID: {0}")]
    Invalid(String),

    /// The DID uses a method other than the one required.
    #[error("unsupported DID method '{actual}', expected '{expected}'")]
    UnsupportedMethod {
        /// Required method.
        expected: String,
        /// Method found.
        actual: String,
    },

    /// The URL cannot be expressed as a `did:web` identifier.
    #[error("URL cannot be converted to did:web: {0}")]
    InvalidUrl(String),

    /// Controller references nest deeper than allowed.
    #[error("DID controller references exceed maximum depth of {0}")]
    MaxDepthExceeded(usize),

    /// The resolver failed.
    #[error("failed to resolve {did}: {message}")]
    Resolution {
        /// DID being resolved.
        did: String,
        /// Resolver error.
        message: String,
    },
}

/// A decentralized identifier, without path, query or fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Did {
    method: String,
    id: String,
}

impl Did {
    /// Parses a DID string.
    ///
    /// # Errors
    ///
    /// Returns `DidError::Invalid` when the input is not `did:<method>:<id>`.
    pub fn parse(input: &str) -> Result<Self, DidError> {
        let caps = DID_PATTERN
            .captures(input)
            .ok_or_else(|| DidError::Invalid(input.to_string()))?;
        Ok(Self {
            method: caps[1].to_string(),
            id: caps[2].to_string(),
        })
    }

    /// Parses a DID and requires the `web` method.
    ///
    /// # Errors
    ///
    /// Returns `DidError::Invalid` or `DidError::UnsupportedMethod`.
    pub fn parse_web(input: &str) -> Result<Self, DidError> {
        let did = Self::parse(input)?;
        if did.method != "web" {
            return Err(DidError::UnsupportedMethod {
                expected: "web".to_string(),
                actual: did.method,
            });
        }
        Ok(did)
    }

    /// The DID method (`web`, `key`, ...).
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The method specific identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns `true` for `did:web` identifiers.
    #[must_use]
    pub fn is_web(&self) -> bool {
        self.method == "web"
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "did:{}:{}", self.method, self.id)
    }
}

impl FromStr for Did {
    type Err = DidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Did {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Strips a DID URL (`did:web:x#key-1`, `did:web:x/path`) down to its DID.
///
/// # Errors
///
/// Returns `DidError::Invalid` if what remains is not a DID.
pub fn did_from_did_url(did_url: &str) -> Result<Did, DidError> {
    let end = did_url.find(['#', '?', '/']).unwrap_or(did_url.len());
    Did::parse(&did_url[..end])
}

/// `did:web` location mapping.
pub mod web {
    use super::{Did, DidError, Url};

    /// Converts a `did:web` identifier into the https base URL it names.
    ///
    /// `did:web:example.com%3A8443:iam:123` becomes
    /// `https://example.com:8443/iam/123`.
    ///
    /// # Errors
    ///
    /// Returns an error for non-web DIDs or when the host does not form a
    /// valid URL.
    pub fn did_to_url(did: &Did) -> Result<Url, DidError> {
        if !did.is_web() {
            return Err(DidError::UnsupportedMethod {
                expected: "web".to_string(),
                actual: did.method().to_string(),
            });
        }
        let mut segments = did.id().split(':');
        let host = segments
            .next()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| DidError::Invalid(did.to_string()))?;
        let host = host.replace("%3A", ":").replace("%3a", ":");
        if host.contains('/') || host.contains('%') {
            return Err(DidError::Invalid(did.to_string()));
        }

        let mut url = Url::parse(&format!("https://{host}"))
            .map_err(|_| DidError::Invalid(did.to_string()))?;
        let path: Vec<&str> = segments.collect();
        if path.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
            return Err(DidError::Invalid(did.to_string()));
        }
        if !path.is_empty() {
            url.set_path(&path.join("/"));
        }
        Ok(url)
    }

    /// Location of the DID document for a `did:web` identifier.
    ///
    /// # Errors
    ///
    /// See [`did_to_url`].
    pub fn did_document_url(did: &Did) -> Result<Url, DidError> {
        let base = did_to_url(did)?;
        let path = base.path().trim_end_matches('/');
        let mut url = base.clone();
        if path.is_empty() {
            url.set_path("/.well-known/did.json");
        } else {
            url.set_path(&format!("{path}/did.json"));
        }
        Ok(url)
    }

    /// Converts an http(s) URL into the `did:web` identifier that names it.
    ///
    /// # Errors
    ///
    /// Returns `DidError::InvalidUrl` for URLs without host, with query or
    /// fragment, or with empty path segments.
    pub fn url_to_did(url: &Url) -> Result<Did, DidError> {
        let host = url
            .host_str()
            .ok_or_else(|| DidError::InvalidUrl(url.to_string()))?;
        if url.query().is_some() || url.fragment().is_some() {
            return Err(DidError::InvalidUrl(url.to_string()));
        }

        let mut id = match url.port() {
            Some(port) => format!("{host}%3A{port}"),
            None => host.to_string(),
        };
        let path = url.path().trim_matches('/');
        if !path.is_empty() {
            for segment in path.split('/') {
                if segment.is_empty() {
                    return Err(DidError::InvalidUrl(url.to_string()));
                }
                id.push(':');
                id.push_str(segment);
            }
        }
        Did::parse(&format!("did:web:{id}")).map_err(|_| DidError::InvalidUrl(url.to_string()))
    }
}

/// Resolves the documents that control `root`, following controller
/// references breadth first.
///
/// A document without controllers controls itself. Every DID is resolved
/// at most once, and references nested deeper than `max_depth` fail the
/// walk, so cyclic or deliberately deep controller graphs terminate.
///
/// # Errors
///
/// Returns `DidError::MaxDepthExceeded` or `DidError::Resolution`.
pub async fn resolve_controllers(
    resolver: &dyn DidResolver,
    root: &DidDocument,
    max_depth: usize,
) -> Result<Vec<DidDocument>, DidError> {
    let mut controllers = Vec::new();
    let mut visited: HashSet<Did> = HashSet::from([root.id.clone()]);
    let mut frontier: Vec<DidDocument> = vec![root.clone()];
    let mut depth = 0;

    while !frontier.is_empty() {
        if depth >= max_depth {
            return Err(DidError::MaxDepthExceeded(max_depth));
        }
        let mut next = Vec::new();
        for doc in frontier {
            if doc.controller.is_empty() || doc.controller.contains(&doc.id) {
                controllers.push(doc.clone());
            }
            for controller in &doc.controller {
                if !visited.insert(controller.clone()) {
                    continue;
                }
                let resolved =
                    resolver
                        .resolve(controller)
                        .await
                        .map_err(|e| DidError::Resolution {
                            did: controller.to_string(),
                            message: e.to_string(),
                        })?;
                next.push(resolved);
            }
        }
        frontier = next;
        depth += 1;
    }

    Ok(controllers)
}
