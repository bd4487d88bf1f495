//! Verifiable presentation and credential model.
//!
//! Presentations and credentials arrive either as compact JWTs or as
//! JSON-LD documents with an embedded proof. This module only reads them:
//! it decodes JWT payloads *without* verifying signatures (that is the job
//! of the [`CredentialVerifier`](crate::provider::CredentialVerifier)) and
//! extracts the claims the orchestrator sequences on.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::did::{Did, did_from_did_url};

/// Descriptor format of a JWT presentation.
pub const JWT_VP_FORMAT: &str = "jwt_vp";
/// Descriptor format of a JSON-LD presentation.
pub const LDP_VP_FORMAT: &str = "ldp_vp";
/// Descriptor format of a JWT credential.
pub const JWT_VC_FORMAT: &str = "jwt_vc";
/// Descriptor format of a JSON-LD credential.
pub const LDP_VC_FORMAT: &str = "ldp_vc";

/// Errors reading presentations or credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VcError {
    /// Not a compact JWS (`header.payload.signature`).
    #[error("malformed JWT: {0}")]
    MalformedJwt(String),

    /// The document is neither a JWT string nor a JSON object.
    #[error("unsupported document: {0}")]
    Unsupported(String),
}

/// Securing mechanism of a presentation or credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofFormat {
    /// Compact JWT.
    Jwt,
    /// JSON-LD with embedded proof.
    JsonLd,
}

/// Decodes the payload of a compact JWT without verifying it.
///
/// # Errors
///
/// Returns `VcError::MalformedJwt` if the token does not have three parts or
/// the payload is not base64url encoded JSON.
pub fn decode_jwt_payload(token: &str) -> Result<Value, VcError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(VcError::MalformedJwt("expected 3 parts".to_string()));
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| VcError::MalformedJwt(format!("payload is not base64url: {e}")))?;
    let payload: Value = serde_json::from_slice(&bytes)
        .map_err(|e| VcError::MalformedJwt(format!("payload is not JSON: {e}")))?;
    if !payload.is_object() {
        return Err(VcError::MalformedJwt("payload is not an object".to_string()));
    }
    Ok(payload)
}

/// Values that may be a single item or an array.
fn one_or_many(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

fn first_proof(document: &Value) -> Option<&Value> {
    one_or_many(document.get("proof")).into_iter().next()
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[derive(Clone, PartialEq)]
enum Repr {
    Jwt { raw: String, payload: Value },
    JsonLd(Value),
}

impl Repr {
    fn parse(value: &Value) -> Result<Self, VcError> {
        match value {
            Value::String(raw) => Ok(Self::Jwt {
                raw: raw.clone(),
                payload: decode_jwt_payload(raw)?,
            }),
            Value::Object(_) => Ok(Self::JsonLd(value.clone())),
            other => Err(VcError::Unsupported(format!("unexpected JSON type: {other}"))),
        }
    }

    fn format(&self) -> ProofFormat {
        match self {
            Self::Jwt { .. } => ProofFormat::Jwt,
            Self::JsonLd(_) => ProofFormat::JsonLd,
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Jwt { raw, .. } => Value::String(raw.clone()),
            Self::JsonLd(doc) => doc.clone(),
        }
    }

    fn raw(&self) -> String {
        match self {
            Self::Jwt { raw, .. } => raw.clone(),
            Self::JsonLd(doc) => doc.to_string(),
        }
    }
}

impl fmt::Debug for Repr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jwt { payload, .. } => f.debug_tuple("Jwt").field(payload).finish(),
            Self::JsonLd(doc) => f.debug_tuple("JsonLd").field(doc).finish(),
        }
    }
}

/// A verifiable presentation in either proof format.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiablePresentation(Repr);

impl VerifiablePresentation {
    /// Reads a presentation from its JSON form: a JWT string or a JSON-LD
    /// object.
    ///
    /// # Errors
    ///
    /// Returns `VcError` for other JSON types or malformed JWTs.
    pub fn from_value(value: &Value) -> Result<Self, VcError> {
        Repr::parse(value).map(Self)
    }

    /// Proof format.
    #[must_use]
    pub fn format(&self) -> ProofFormat {
        self.0.format()
    }

    /// Descriptor format string (`jwt_vp` or `ldp_vp`).
    #[must_use]
    pub fn descriptor_format(&self) -> &'static str {
        match self.format() {
            ProofFormat::Jwt => JWT_VP_FORMAT,
            ProofFormat::JsonLd => LDP_VP_FORMAT,
        }
    }

    /// The presentation as sent on the wire: the compact JWT or the
    /// serialized JSON-LD document.
    #[must_use]
    pub fn raw(&self) -> String {
        self.0.raw()
    }

    /// JSON form (JWT string or JSON-LD object).
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.0.to_value()
    }

    /// Document that nested descriptor paths are evaluated against: the JWT
    /// payload or the JSON-LD document.
    #[must_use]
    pub fn document(&self) -> &Value {
        match &self.0 {
            Repr::Jwt { payload, .. } => payload,
            Repr::JsonLd(doc) => doc,
        }
    }

    /// Challenge binding the presentation to an authorization attempt: the
    /// JWT `nonce` claim or the linked-data proof `challenge`.
    #[must_use]
    pub fn challenge(&self) -> Option<String> {
        match &self.0 {
            Repr::Jwt { payload, .. } => non_empty_str(payload.get("nonce")),
            Repr::JsonLd(doc) => first_proof(doc).and_then(|p| non_empty_str(p.get("challenge"))),
        }
    }

    /// Alternate `nonce` field, used when no challenge is present.
    #[must_use]
    pub fn nonce(&self) -> Option<String> {
        match &self.0 {
            Repr::Jwt { payload, .. } => non_empty_str(payload.get("nonce")),
            Repr::JsonLd(doc) => first_proof(doc)
                .and_then(|p| non_empty_str(p.get("nonce")))
                .or_else(|| non_empty_str(doc.get("nonce"))),
        }
    }

    /// Intended audiences: the JWT `aud` claim or the proof `domain`.
    #[must_use]
    pub fn audience(&self) -> Vec<String> {
        let values = match &self.0 {
            Repr::Jwt { payload, .. } => one_or_many(payload.get("aud")),
            Repr::JsonLd(doc) => first_proof(doc)
                .map(|p| one_or_many(p.get("domain")))
                .unwrap_or_default(),
        };
        values
            .into_iter()
            .filter_map(Value::as_str)
            .map(ToString::to_string)
            .collect()
    }

    /// DID of the party that signed the presentation: the JWT `iss` claim
    /// or the controller of the proof verification method.
    #[must_use]
    pub fn signer(&self) -> Option<Did> {
        let raw = match &self.0 {
            Repr::Jwt { payload, .. } => non_empty_str(payload.get("iss")),
            Repr::JsonLd(doc) => first_proof(doc)
                .and_then(|p| non_empty_str(p.get("verificationMethod")))
                .or_else(|| non_empty_str(doc.get("holder"))),
        }?;
        did_from_did_url(&raw).ok()
    }

    /// Credentials embedded in the presentation. Entries that cannot be read
    /// are skipped.
    #[must_use]
    pub fn credentials(&self) -> Vec<VerifiableCredential> {
        let container = match &self.0 {
            Repr::Jwt { payload, .. } => payload.get("vp").and_then(|vp| vp.get("verifiableCredential")),
            Repr::JsonLd(doc) => doc.get("verifiableCredential"),
        };
        one_or_many(container)
            .into_iter()
            .filter_map(|v| VerifiableCredential::from_value(v).ok())
            .collect()
    }
}

impl Serialize for VerifiablePresentation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifiablePresentation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// A verifiable credential in either proof format.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiableCredential(Repr);

impl VerifiableCredential {
    /// Reads a credential from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns `VcError` for other JSON types or malformed JWTs.
    pub fn from_value(value: &Value) -> Result<Self, VcError> {
        Repr::parse(value).map(Self)
    }

    /// Proof format.
    #[must_use]
    pub fn format(&self) -> ProofFormat {
        self.0.format()
    }

    /// Descriptor format string (`jwt_vc` or `ldp_vc`).
    #[must_use]
    pub fn descriptor_format(&self) -> &'static str {
        match self.format() {
            ProofFormat::Jwt => JWT_VC_FORMAT,
            ProofFormat::JsonLd => LDP_VC_FORMAT,
        }
    }

    /// JSON form (JWT string or JSON-LD object).
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.0.to_value()
    }

    /// Credential in the W3C data model shape, used for constraint matching.
    ///
    /// For JWT credentials this is the `vc` claim completed with the
    /// registered claims it was lifted from (`iss`, `jti`, `sub`).
    #[must_use]
    pub fn document(&self) -> Value {
        match &self.0 {
            Repr::JsonLd(doc) => doc.clone(),
            Repr::Jwt { payload, .. } => {
                let mut doc = payload.get("vc").cloned().unwrap_or_else(|| Value::Object(Default::default()));
                if let Value::Object(map) = &mut doc {
                    if let Some(iss) = payload.get("iss") {
                        map.entry("issuer").or_insert_with(|| iss.clone());
                    }
                    if let Some(jti) = payload.get("jti") {
                        map.entry("id").or_insert_with(|| jti.clone());
                    }
                    if let (Some(sub), Some(Value::Object(subject))) =
                        (payload.get("sub"), map.get_mut("credentialSubject"))
                    {
                        subject.entry("id").or_insert_with(|| sub.clone());
                    }
                }
                doc
            }
        }
    }

    /// Identifier of the credential, if any.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        non_empty_str(self.document().get("id"))
    }

    /// Identifiers of all credential subjects.
    #[must_use]
    pub fn subject_ids(&self) -> Vec<String> {
        let doc = self.document();
        let mut ids: Vec<String> = one_or_many(doc.get("credentialSubject"))
            .into_iter()
            .filter_map(|s| non_empty_str(s.get("id")))
            .collect();
        if ids.is_empty()
            && let Repr::Jwt { payload, .. } = &self.0
            && let Some(sub) = non_empty_str(payload.get("sub"))
        {
            ids.push(sub);
        }
        ids
    }
}

impl Serialize for VerifiableCredential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifiableCredential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::testing::*;
    use super::*;

    #[test]
    fn test_decode_jwt_payload() {
        let token = jwt(&json!({"iss": "did:web:a.example", "nonce": "n1"}));
        let payload = decode_jwt_payload(&token).unwrap();
        assert_eq!(payload["nonce"], "n1");

        assert!(decode_jwt_payload("not-a-jwt").is_err());
        assert!(decode_jwt_payload("a.!!!.c").is_err());
    }

    #[test]
    fn test_jwt_presentation_claims() {
        let vc = jwt(&json!({
            "iss": "did:web:issuer.example",
            "sub": "did:web:holder.example",
            "jti": "urn:uuid:1",
            "vc": { "type": ["VerifiableCredential"], "credentialSubject": { "name": "x" } }
        }));
        let vp = jwt(&json!({
            "iss": "did:web:holder.example",
            "aud": "did:web:verifier.example:iam:1",
            "nonce": "abc",
            "vp": { "verifiableCredential": [vc] }
        }));

        let presentation = VerifiablePresentation::from_value(&Value::String(vp.clone())).unwrap();
        assert_eq!(presentation.format(), ProofFormat::Jwt);
        assert_eq!(presentation.descriptor_format(), "jwt_vp");
        assert_eq!(presentation.challenge().as_deref(), Some("abc"));
        assert_eq!(presentation.audience(), vec!["did:web:verifier.example:iam:1"]);
        assert_eq!(
            presentation.signer().unwrap().to_string(),
            "did:web:holder.example"
        );
        assert_eq!(presentation.raw(), vp);

        let credentials = presentation.credentials();
        assert_eq!(credentials.len(), 1);
        assert_eq!(credentials[0].subject_ids(), vec!["did:web:holder.example"]);
        assert_eq!(credentials[0].id().as_deref(), Some("urn:uuid:1"));
        assert_eq!(credentials[0].document()["issuer"], "did:web:issuer.example");
    }

    #[test]
    fn test_ldp_presentation_claims() {
        let vp = ldp_vp("did:web:holder.example", "did:web:verifier.example", "c-1");
        let presentation = VerifiablePresentation::from_value(&vp).unwrap();

        assert_eq!(presentation.format(), ProofFormat::JsonLd);
        assert_eq!(presentation.challenge().as_deref(), Some("c-1"));
        assert_eq!(presentation.audience(), vec!["did:web:verifier.example"]);
        assert_eq!(
            presentation.signer().unwrap().to_string(),
            "did:web:holder.example"
        );
        assert_eq!(presentation.credentials().len(), 1);
    }

    #[test]
    fn test_nonce_fallback() {
        let mut vp = ldp_vp("did:web:holder.example", "did:web:verifier.example", "");
        vp["proof"]["nonce"] = json!("fallback");
        let presentation = VerifiablePresentation::from_value(&vp).unwrap();

        assert_eq!(presentation.challenge(), None);
        assert_eq!(presentation.nonce().as_deref(), Some("fallback"));
    }

    #[test]
    fn test_serde_preserves_wire_form() {
        let vp = ldp_vp("did:web:holder.example", "did:web:verifier.example", "c-1");
        let presentation: VerifiablePresentation = serde_json::from_value(vp.clone()).unwrap();
        assert_eq!(serde_json::to_value(&presentation).unwrap(), vp);

        assert!(serde_json::from_value::<VerifiablePresentation>(json!(42)).is_err());
    }
}
