//! DPoP proof descriptions (RFC 9449).

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

/// Claims of a DPoP proof JWT, before signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpopToken {
    /// HTTP method of the request.
    pub htm: String,

    /// Target URI without query and fragment.
    pub htu: String,

    /// Creation time, seconds since the epoch.
    pub iat: i64,

    /// Unique token identifier.
    pub jti: String,
}

impl DpopToken {
    /// Describes a request of `method` to `url`.
    #[must_use]
    pub fn new(method: &str, url: &Url) -> Self {
        let mut htu = url.clone();
        htu.set_query(None);
        htu.set_fragment(None);
        Self {
            htm: method.to_uppercase(),
            htu: htu.to_string(),
            iat: OffsetDateTime::now_utc().unix_timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_strips_query_and_fragment() {
        let url = Url::parse("https://verifier.example/token?x=1#frag").unwrap();
        let token = DpopToken::new("post", &url);

        assert_eq!(token.htm, "POST");
        assert_eq!(token.htu, "https://verifier.example/token");
        assert!(token.iat > 0);
        assert_ne!(token.jti, DpopToken::new("post", &url).jti);
    }
}
