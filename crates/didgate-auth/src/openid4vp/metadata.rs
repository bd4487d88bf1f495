//! Discovery documents of owned identifiers.

use std::collections::BTreeMap;

use super::authorize::{PRESENTATION_DEFINITION_PATH, join_path};
use super::{FlowResult, OpenId4VpService};
use crate::did::web;
use crate::error::{ErrorCode, OAuth2Error};
use crate::oauth::params::{
    AUTHORIZATION_CODE_GRANT_TYPE, DID_CLIENT_ID_SCHEME, RESPONSE_MODE_DIRECT_POST,
    RESPONSE_TYPE_CODE, RESPONSE_TYPE_VP_TOKEN, VP_TOKEN_BEARER_GRANT_TYPE,
};
use crate::oauth::{AuthorizationServerMetadata, OAuthClientMetadata};
use crate::pe::{PresentationDefinition, VpFormats};
use crate::provider::ProviderError;

/// Path of the authorization endpoint below an owned identifier.
pub const AUTHORIZE_PATH: &str = "authorize";

/// Path of the token endpoint below an owned identifier.
pub const TOKEN_PATH: &str = "token";

/// Formats and proof algorithms accepted from and offered to peers.
#[must_use]
pub fn default_vp_formats() -> VpFormats {
    let algs = |values: &[&str]| values.iter().map(ToString::to_string).collect::<Vec<_>>();
    let proof_types = algs(&["JsonWebSignature2020"]);
    let jwt_algs = algs(&["ES256", "ES384", "PS256", "EdDSA"]);

    BTreeMap::from([
        ("jwt_vc".to_string(), BTreeMap::from([("alg_values_supported".to_string(), jwt_algs.clone())])),
        ("jwt_vp".to_string(), BTreeMap::from([("alg_values_supported".to_string(), jwt_algs)])),
        ("ldp_vc".to_string(), BTreeMap::from([("proof_type_values_supported".to_string(), proof_types.clone())])),
        ("ldp_vp".to_string(), BTreeMap::from([("proof_type_values_supported".to_string(), proof_types)])),
    ])
}

impl OpenId4VpService {
    /// Authorization server metadata of the identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for identifiers this node does not own.
    pub async fn authorization_server_metadata(&self, id: &str) -> FlowResult<AuthorizationServerMetadata> {
        let did = self.owned_did(id, "unknown identifier").await?;
        let base = web::did_to_url(&did)
            .map_err(|e| OAuth2Error::server_error("invalid identifier URL").with_internal_error(e))?;

        Ok(AuthorizationServerMetadata {
            issuer: base.to_string(),
            authorization_endpoint: join_path(&base, AUTHORIZE_PATH).to_string(),
            token_endpoint: join_path(&base, TOKEN_PATH).to_string(),
            presentation_definition_endpoint: join_path(&base, PRESENTATION_DEFINITION_PATH).to_string(),
            response_types_supported: vec![RESPONSE_TYPE_CODE.into(), RESPONSE_TYPE_VP_TOKEN.into()],
            response_modes_supported: vec!["query".into(), RESPONSE_MODE_DIRECT_POST.into()],
            grant_types_supported: vec![
                AUTHORIZATION_CODE_GRANT_TYPE.into(),
                VP_TOKEN_BEARER_GRANT_TYPE.into(),
            ],
            client_id_schemes_supported: vec![DID_CLIENT_ID_SCHEME.into()],
            vp_formats_supported: default_vp_formats(),
            require_signed_request_object: false,
            dpop_signing_alg_values_supported: Vec::new(),
        })
    }

    /// Client metadata of the identifier `id` acting as verifier.
    pub async fn client_metadata(&self, id: &str) -> FlowResult<OAuthClientMetadata> {
        self.owned_did(id, "unknown identifier").await?;
        Ok(OAuthClientMetadata {
            grant_types: vec![AUTHORIZATION_CODE_GRANT_TYPE.into(), VP_TOKEN_BEARER_GRANT_TYPE.into()],
            response_types: vec![RESPONSE_TYPE_CODE.into(), RESPONSE_TYPE_VP_TOKEN.into()],
            token_endpoint_auth_method: "none".into(),
            vp_formats: default_vp_formats(),
            ..OAuthClientMetadata::default()
        })
    }

    /// The presentation definition the identifier `id` requires for `scope`.
    ///
    /// # Errors
    ///
    /// Returns `invalid_scope` for scopes without a definition.
    pub async fn presentation_definition(&self, id: &str, scope: &str) -> FlowResult<PresentationDefinition> {
        let did = self.owned_did(id, "unknown identifier").await?;
        match self.collaborators.policy.presentation_definition(&did, scope).await {
            Ok(definition) => Ok(definition),
            Err(ProviderError::NotFound(_)) => {
                Err(OAuth2Error::new(ErrorCode::InvalidScope, format!("unsupported scope: {scope}")))
            }
            Err(e) => {
                tracing::error!(scope, error = %e, "Failed to fetch presentation definition");
                Err(OAuth2Error::server_error("failed to fetch presentation definition").with_internal_error(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_authorization_server_metadata() {
        let h = harness();
        let metadata = h.service.authorization_server_metadata("1").await.unwrap();
        assert_eq!(metadata.issuer, "https://node.example/iam/1");
        assert_eq!(metadata.authorization_endpoint, "https://node.example/iam/1/authorize");
        assert_eq!(metadata.token_endpoint, "https://node.example/iam/1/token");
        assert_eq!(
            metadata.presentation_definition_endpoint,
            "https://node.example/iam/1/presentation_definition"
        );
        assert!(metadata.supports_client_id_scheme("did"));
        assert!(metadata.vp_formats_supported.contains_key("ldp_vp"));
    }

    #[tokio::test]
    async fn test_unknown_identifier() {
        let h = harness();
        let err = h.service.authorization_server_metadata("").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert!(h.service.client_metadata("").await.is_err());
    }

    #[tokio::test]
    async fn test_presentation_definition_by_scope() {
        let h = harness();
        let definition = h.service.presentation_definition("1", SCOPE).await.unwrap();
        assert_eq!(definition, super::super::testing::definition());

        let err = h.service.presentation_definition("1", "other").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidScope);
        assert_eq!(err.description, "unsupported scope: other");
    }

    #[tokio::test]
    async fn test_client_metadata_formats() {
        let h = harness();
        let metadata = h.service.client_metadata("1").await.unwrap();
        assert!(metadata.vp_formats.contains_key("jwt_vp"));
        assert_eq!(metadata.token_endpoint_auth_method, "none");
    }
}
