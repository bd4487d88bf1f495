//! Per-presentation checks of the validation pipeline.

use crate::did::Did;
use crate::error::OAuth2Error;
use crate::oauth::OAuthSession;
use crate::storage::SessionStore;
use crate::vc::VerifiablePresentation;

/// Checks that every credential in `presentation` is about its signer and
/// that the subject equals `expected` when one is already established.
///
/// Returns the subject of the presentation.
pub(super) fn validate_presentation_signer(
    presentation: &VerifiablePresentation,
    expected: Option<&Did>,
) -> Result<Did, OAuth2Error> {
    let signer = presentation
        .signer()
        .ok_or_else(|| OAuth2Error::invalid_request("unable to determine presentation signer"))?;

    let signer_id = signer.to_string();
    let foreign_subject = presentation
        .credentials()
        .iter()
        .flat_map(|credential| credential.subject_ids())
        .any(|subject| subject != signer_id);
    if foreign_subject {
        return Err(OAuth2Error::invalid_request(
            "not all credentials have the presentation signer as subject",
        ));
    }

    if let Some(expected) = expected
        && *expected != signer
    {
        return Err(OAuth2Error::invalid_request(
            "not all presentations have the same credential subject ID",
        ));
    }
    Ok(signer)
}

/// Checks that `presentation` is intended for `verifier`.
pub(super) fn validate_presentation_audience(
    presentation: &VerifiablePresentation,
    verifier: &Did,
) -> Result<(), OAuth2Error> {
    let verifier = verifier.to_string();
    if presentation.audience().iter().any(|aud| *aud == verifier) {
        Ok(())
    } else {
        Err(OAuth2Error::invalid_request(
            "presentation audience/domain is missing or does not match",
        ))
    }
}

/// Checks that all presentations carry the same nonce.
///
/// Every value found is deleted from `nonces` before anything is checked,
/// so no value of a rejected bundle can be replayed. A delete failure is a
/// `server_error`: a nonce that may still be live is never accepted.
pub(super) async fn validate_presentation_nonce(
    nonces: &SessionStore<OAuthSession>,
    presentations: &[VerifiablePresentation],
) -> Result<(), OAuth2Error> {
    let mut extracted = Vec::with_capacity(presentations.len());
    let mut burn_failure = None;
    for presentation in presentations {
        let challenge = presentation.challenge();
        let fallback = presentation.nonce();
        for value in [&challenge, &fallback].into_iter().flatten() {
            if let Err(e) = nonces.delete(value).await {
                tracing::error!(namespace = %nonces.namespace(), error = %e, "Failed to burn nonce");
                burn_failure.get_or_insert(e);
            }
        }
        extracted.push(challenge.or(fallback));
    }
    if let Some(e) = burn_failure {
        return Err(OAuth2Error::server_error("failed to burn nonce").with_internal_error(e));
    }

    let mut agreed: Option<&String> = None;
    for value in &extracted {
        let Some(value) = value else {
            return Err(OAuth2Error::invalid_request("presentation has invalid/missing nonce"));
        };
        match agreed {
            Some(previous) if previous != value => {
                return Err(OAuth2Error::invalid_request(
                    "not all presentations have the same nonce",
                ));
            }
            _ => agreed = Some(value),
        }
    }
    if agreed.is_none() {
        return Err(OAuth2Error::invalid_request("presentation has invalid/missing nonce"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::super::testing::ScriptedDatabase;
    use super::*;
    use crate::storage::{InMemorySessionDatabase, Namespace, StoreError};
    use crate::vc::testing::{jwt, ldp_vc, ldp_vp};

    const HOLDER: &str = "did:web:holder.example";
    const VERIFIER: &str = "did:web:verifier.example:iam:1";

    fn vp(value: serde_json::Value) -> VerifiablePresentation {
        VerifiablePresentation::from_value(&value).unwrap()
    }

    fn session() -> OAuthSession {
        OAuthSession {
            client_id: VERIFIER.into(),
            scope: String::new(),
            own_did: Did::parse(VERIFIER).unwrap(),
            client_state: "state".into(),
            redirect_uri: "https://client.example/cb".into(),
            response_type: "vp_token".into(),
            presentation_definition: None,
            server_state: None,
        }
    }

    fn store() -> SessionStore<OAuthSession> {
        let owner = Did::parse(VERIFIER).unwrap();
        SessionStore::new(
            Arc::new(InMemorySessionDatabase::new()),
            Namespace::nonce(&owner),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_signer_consistency() {
        let first = vp(ldp_vp(HOLDER, VERIFIER, "n"));
        let subject = validate_presentation_signer(&first, None).unwrap();
        assert_eq!(subject.to_string(), HOLDER);
        assert!(validate_presentation_signer(&first, Some(&subject)).is_ok());

        let other = vp(ldp_vp("did:web:other.example", VERIFIER, "n"));
        let err = validate_presentation_signer(&other, Some(&subject)).unwrap_err();
        assert_eq!(err.description, "not all presentations have the same credential subject ID");
    }

    #[test]
    fn test_signer_must_be_subject() {
        let mut doc = ldp_vp(HOLDER, VERIFIER, "n");
        doc["verifiableCredential"] = json!([ldp_vc("did:web:someone-else.example", "ExampleCredential")]);
        let err = validate_presentation_signer(&vp(doc), None).unwrap_err();
        assert_eq!(err.description, "not all credentials have the presentation signer as subject");
    }

    #[test]
    fn test_audience() {
        let verifier = Did::parse(VERIFIER).unwrap();
        assert!(validate_presentation_audience(&vp(ldp_vp(HOLDER, VERIFIER, "n")), &verifier).is_ok());

        let err = validate_presentation_audience(
            &vp(ldp_vp(HOLDER, "did:web:elsewhere.example", "n")),
            &verifier,
        )
        .unwrap_err();
        assert_eq!(err.description, "presentation audience/domain is missing or does not match");

        let jwt_vp = vp(json!(jwt(&json!({"iss": HOLDER, "aud": [VERIFIER], "nonce": "n"}))));
        assert!(validate_presentation_audience(&jwt_vp, &verifier).is_ok());
    }

    #[tokio::test]
    async fn test_nonce_mismatch_burns_every_value() {
        let nonces = store();
        nonces.put("a", &session()).await.unwrap();
        nonces.put("b", &session()).await.unwrap();

        let bundle = [vp(ldp_vp(HOLDER, VERIFIER, "a")), vp(ldp_vp(HOLDER, VERIFIER, "b"))];
        let err = validate_presentation_nonce(&nonces, &bundle).await.unwrap_err();
        assert_eq!(err.description, "not all presentations have the same nonce");
        assert_eq!(nonces.get("a").await, Err(StoreError::NotFound));
        assert_eq!(nonces.get("b").await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_nonce_fallback_and_missing() {
        let nonces = store();
        let mut doc = ldp_vp(HOLDER, VERIFIER, "");
        doc["proof"]["nonce"] = json!("fallback");
        let bundle = [vp(doc), vp(ldp_vp(HOLDER, VERIFIER, "fallback"))];
        assert!(validate_presentation_nonce(&nonces, &bundle).await.is_ok());

        let bundle = [vp(ldp_vp(HOLDER, VERIFIER, ""))];
        let err = validate_presentation_nonce(&nonces, &bundle).await.unwrap_err();
        assert_eq!(err.description, "presentation has invalid/missing nonce");

        assert!(validate_presentation_nonce(&nonces, &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_nonce_burn_failure_is_fatal() {
        let owner = Did::parse(VERIFIER).unwrap();
        let db = ScriptedDatabase {
            fail_deletes: true,
            ..ScriptedDatabase::new(Arc::new(InMemorySessionDatabase::new()))
        };
        let nonces: SessionStore<OAuthSession> =
            SessionStore::new(Arc::new(db), Namespace::nonce(&owner), Duration::from_secs(60));
        nonces.put("a", &session()).await.unwrap();

        let bundle = [vp(ldp_vp(HOLDER, VERIFIER, "a"))];
        let err = validate_presentation_nonce(&nonces, &bundle).await.unwrap_err();
        assert!(err.is_server_error());
        assert_eq!(err.description, "failed to burn nonce");
        assert!(nonces.get("a").await.is_ok());
    }
}
