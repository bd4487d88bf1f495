//! The `vp_token` envelope.
//!
//! A `vp_token` carries a single presentation (a JSON-LD object or a compact
//! JWT) or a JSON array of them. Descriptor map paths are evaluated against
//! the envelope [`value`](Envelope::value): `$` for a single presentation,
//! `$[n]` for array entries.

use serde_json::Value;

use super::PeError;
use crate::vc::VerifiablePresentation;

/// Parsed `vp_token`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// JSON form the descriptor paths refer to.
    pub value: Value,

    /// Presentations in envelope order.
    pub presentations: Vec<VerifiablePresentation>,
}

impl Envelope {
    /// Parses a `vp_token` form value.
    ///
    /// # Errors
    ///
    /// Returns `PeError::Parse` if the token is empty, or if any entry is
    /// not a presentation.
    pub fn parse(vp_token: &str) -> Result<Self, PeError> {
        let trimmed = vp_token.trim();
        if trimmed.is_empty() {
            return Err(PeError::Parse("vp_token is empty".to_string()));
        }

        // A bare compact JWT is not JSON.
        let value = match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => value,
            Err(_) => Value::String(trimmed.to_string()),
        };

        let presentations = match &value {
            Value::Array(items) => items
                .iter()
                .map(VerifiablePresentation::from_value)
                .collect::<Result<Vec<_>, _>>(),
            single => VerifiablePresentation::from_value(single).map(|vp| vec![vp]),
        }
        .map_err(|e| PeError::Parse(e.to_string()))?;

        Ok(Self {
            value,
            presentations,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::vc::testing::{jwt, ldp_vp};

    #[test]
    fn test_single_jsonld() {
        let vp = ldp_vp("did:web:h.example", "did:web:v.example", "c");
        let envelope = Envelope::parse(&vp.to_string()).unwrap();
        assert_eq!(envelope.presentations.len(), 1);
        assert_eq!(envelope.value, vp);
    }

    #[test]
    fn test_bare_and_quoted_jwt() {
        let token = jwt(&json!({"iss": "did:web:h.example", "nonce": "n"}));

        let bare = Envelope::parse(&token).unwrap();
        assert_eq!(bare.presentations.len(), 1);
        assert_eq!(bare.value, Value::String(token.clone()));

        let quoted = Envelope::parse(&Value::String(token).to_string()).unwrap();
        assert_eq!(quoted, bare);
    }

    #[test]
    fn test_array() {
        let token = jwt(&json!({"iss": "did:web:h.example", "nonce": "n"}));
        let raw = json!([token, ldp_vp("did:web:h.example", "did:web:v.example", "n")]);
        let envelope = Envelope::parse(&raw.to_string()).unwrap();
        assert_eq!(envelope.presentations.len(), 2);
    }

    #[test]
    fn test_invalid() {
        assert!(Envelope::parse("").is_err());
        assert!(Envelope::parse("not a token").is_err());
        assert!(Envelope::parse("42").is_err());
        assert!(Envelope::parse(r#"[{"a":1}, 3]"#).is_err());
    }
}
