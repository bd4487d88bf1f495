//! Typed OpenID4VP client.
//!
//! [`OpenId4VpClient`] wraps [`IamHttpClient`] with the local wallet, key
//! resolver and DPoP signer. It resolves endpoints from `did:web`
//! identifiers, checks remote URLs against the strict mode and implements
//! the outbound halves of both protocol roles.

use std::sync::Arc;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use url::Url;

use super::{ClientError, DpopToken, IamHttpClient, parse_public_url};
use crate::config::ClientConfig;
use crate::did::{Did, web};
use crate::error::OAuth2Error;
use crate::oauth::params::{
    ASSERTION_PARAM, AUTHORIZATION_CODE_GRANT_TYPE, CLIENT_ID_PARAM, CODE_PARAM,
    CODE_VERIFIER_PARAM, GRANT_TYPE_PARAM, PRESENTATION_SUBMISSION_PARAM, REDIRECT_URI_PARAM,
    SCOPE_PARAM, STATE_PARAM, VP_TOKEN_BEARER_GRANT_TYPE, WALLET_METADATA_PARAM,
};
use crate::oauth::{
    AuthorizationServerMetadata, CredentialResponse, OAuthClientMetadata,
    OpenIdConfigurationMetadata, OpenIdCredentialIssuerMetadata, TokenResponse, add_query_params,
};
use crate::pe::{PresentationDefinition, PresentationSubmission, VpFormats};
use crate::provider::{
    BuildParams, DpopSigner, HolderRole, KeyRelation, KeyResolver, ProviderError, VerifierRole,
    Wallet,
};
use crate::vc::VerifiablePresentation;

/// Path below an owned identifier's base URL serving its client metadata.
pub const CLIENT_METADATA_PATH: &str = "oauth-client";

/// Validity of presentations built for a verifier-initiated request.
const PRESENTATION_VALIDITY: Duration = Duration::minutes(15);

/// Validity of presentations used as service-to-service grants.
const S2S_PRESENTATION_VALIDITY: Duration = Duration::seconds(5);

/// Remote client used by the orchestrator and by wallet processes.
#[derive(Clone)]
pub struct OpenId4VpClient {
    http: IamHttpClient,
    wallet: Arc<dyn Wallet>,
    key_resolver: Arc<dyn KeyResolver>,
    signer: Arc<dyn DpopSigner>,
}

impl std::fmt::Debug for OpenId4VpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenId4VpClient")
            .field("http", &self.http)
            .finish_non_exhaustive()
    }
}

impl OpenId4VpClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Network` if the HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        wallet: Arc<dyn Wallet>,
        key_resolver: Arc<dyn KeyResolver>,
        signer: Arc<dyn DpopSigner>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http: IamHttpClient::new(config)?,
            wallet,
            key_resolver,
            signer,
        })
    }

    /// The underlying HTTP client.
    #[must_use]
    pub fn http(&self) -> &IamHttpClient {
        &self.http
    }

    fn public_url(&self, raw: &str) -> Result<Url, ClientError> {
        parse_public_url(raw, self.http.strict_mode())
    }

    /// Exchanges an authorization code at the token endpoint of `verifier`.
    ///
    /// With `use_dpop` the request carries a DPoP proof signed with an
    /// assertion key of `client_id`.
    #[tracing::instrument(skip(self, code, code_verifier), fields(verifier = %verifier))]
    pub async fn access_token(
        &self,
        code: &str,
        verifier: &Did,
        callback_uri: &str,
        client_id: &Did,
        code_verifier: &str,
        use_dpop: bool,
    ) -> Result<TokenResponse, ClientError> {
        let metadata = self.http.oauth_authorization_server_metadata(verifier).await?;
        self.access_token_with_metadata(&metadata, code, callback_uri, client_id, code_verifier, use_dpop)
            .await
    }

    /// Exchanges an authorization code at the token endpoint named by
    /// `metadata`.
    pub async fn access_token_with_metadata(
        &self,
        metadata: &AuthorizationServerMetadata,
        code: &str,
        callback_uri: &str,
        client_id: &Did,
        code_verifier: &str,
        use_dpop: bool,
    ) -> Result<TokenResponse, ClientError> {
        let token_endpoint = self.token_endpoint(metadata)?;
        let mut form = vec![
            (CLIENT_ID_PARAM, client_id.to_string()),
            (GRANT_TYPE_PARAM, AUTHORIZATION_CODE_GRANT_TYPE.to_string()),
            (CODE_PARAM, code.to_string()),
            (REDIRECT_URI_PARAM, callback_uri.to_string()),
        ];
        if !code_verifier.is_empty() {
            form.push((CODE_VERIFIER_PARAM, code_verifier.to_string()));
        }

        let dpop = if use_dpop {
            Some(self.dpop(client_id, &token_endpoint).await?)
        } else {
            None
        };
        self.http
            .access_token(&token_endpoint, &form, dpop.as_deref())
            .await
    }

    /// Requests an access token from `verifier` using a presentation of
    /// `requester`'s credentials as grant.
    #[tracing::instrument(skip(self), fields(requester = %requester, verifier = %verifier))]
    pub async fn request_s2s_access_token(
        &self,
        requester: &Did,
        verifier: &Did,
        scopes: &str,
        use_dpop: bool,
    ) -> Result<TokenResponse, ClientError> {
        let metadata = self.http.oauth_authorization_server_metadata(verifier).await?;
        self.request_s2s_access_token_with_metadata(&metadata, requester, verifier, scopes, use_dpop)
            .await
    }

    /// Service-to-service token request against the endpoints named by
    /// `metadata`.
    pub async fn request_s2s_access_token_with_metadata(
        &self,
        metadata: &AuthorizationServerMetadata,
        requester: &Did,
        verifier: &Did,
        scopes: &str,
        use_dpop: bool,
    ) -> Result<TokenResponse, ClientError> {
        if metadata.presentation_definition_endpoint.is_empty() {
            return Err(ClientError::MissingEndpoint(
                "presentation_definition_endpoint".to_string(),
            ));
        }
        let endpoint = self.public_url(&metadata.presentation_definition_endpoint)?;
        let endpoint = add_query_params(endpoint, &[(SCOPE_PARAM, scopes)]);
        let definition = self.http.presentation_definition(&endpoint).await?;

        let params = BuildParams {
            audience: verifier.to_string(),
            expires: OffsetDateTime::now_utc() + S2S_PRESENTATION_VALIDITY,
            nonce: crate::oauth::generate_nonce(),
        };
        let (presentation, submission) = self
            .wallet
            .build_submission(requester, &definition, &metadata.vp_formats_supported, params)
            .await?;

        let submission = serde_json::to_string(&submission)
            .map_err(|e| ClientError::Parse(format!("presentation_submission: {e}")))?;
        let token_endpoint = self.token_endpoint(metadata)?;
        let form = vec![
            (GRANT_TYPE_PARAM, VP_TOKEN_BEARER_GRANT_TYPE.to_string()),
            (ASSERTION_PARAM, presentation.raw()),
            (PRESENTATION_SUBMISSION_PARAM, submission),
            (SCOPE_PARAM, scopes.to_string()),
        ];

        let dpop = if use_dpop {
            Some(self.dpop(requester, &token_endpoint).await?)
        } else {
            None
        };
        let mut token = self
            .http
            .access_token(&token_endpoint, &form, dpop.as_deref())
            .await?;
        token.scope = Some(scopes.to_string());
        Ok(token)
    }

    /// OpenID configuration of the server at `server_url`.
    pub async fn openid_configuration(
        &self,
        server_url: &str,
    ) -> Result<OpenIdConfigurationMetadata, ClientError> {
        let url = self.public_url(server_url)?;
        self.http.openid_configuration(&url).await
    }

    /// Credential issuer metadata of the `did:web` issuer `issuer`.
    pub async fn openid_credential_issuer_metadata(
        &self,
        issuer: &Did,
    ) -> Result<OpenIdCredentialIssuerMetadata, ClientError> {
        let url = web::did_to_url(issuer).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        self.http.openid_credential_issuer_metadata(&url).await
    }

    /// Retrieves a request object by GET.
    pub async fn request_object_by_get(&self, request_uri: &str) -> Result<String, ClientError> {
        let url = self.public_url(request_uri)?;
        self.http.request_object_by_get(&url).await
    }

    /// Retrieves a request object by POST, sending this wallet's metadata.
    pub async fn request_object_by_post(
        &self,
        request_uri: &str,
        wallet_metadata: &AuthorizationServerMetadata,
    ) -> Result<String, ClientError> {
        let url = self.public_url(request_uri)?;
        let metadata = serde_json::to_string(wallet_metadata)
            .map_err(|e| ClientError::Parse(format!("wallet_metadata: {e}")))?;
        self.http
            .request_object_by_post(&url, &[(WALLET_METADATA_PARAM, metadata)])
            .await
    }

    /// Requests credentials from `credential_endpoint` after token receipt.
    pub async fn verifiable_credentials(
        &self,
        credential_endpoint: &str,
        access_token: &str,
        proof_jwt: &str,
    ) -> Result<CredentialResponse, ClientError> {
        let url = self.public_url(credential_endpoint)?;
        self.http
            .verifiable_credentials(&url, access_token, proof_jwt)
            .await
    }

    fn token_endpoint(&self, metadata: &AuthorizationServerMetadata) -> Result<Url, ClientError> {
        if metadata.token_endpoint.is_empty() {
            return Err(ClientError::MissingEndpoint("token_endpoint".to_string()));
        }
        self.public_url(&metadata.token_endpoint)
    }

    async fn dpop(&self, requester: &Did, url: &Url) -> Result<String, ClientError> {
        let key_id = self
            .key_resolver
            .resolve_key(requester, KeyRelation::AssertionMethod)
            .await?;
        let token = DpopToken::new("POST", url);
        Ok(self.signer.sign_dpop(&token, &key_id).await?)
    }
}

#[async_trait]
impl VerifierRole for OpenId4VpClient {
    async fn authorization_server_metadata(
        &self,
        wallet: &Did,
    ) -> Result<AuthorizationServerMetadata, ClientError> {
        self.http.oauth_authorization_server_metadata(wallet).await
    }

    fn client_metadata_url(&self, verifier: &Did) -> Result<Url, ClientError> {
        let base = web::did_to_url(verifier).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        let path = base.path().trim_end_matches('/');
        let mut url = base.clone();
        url.set_path(&format!("{path}/{CLIENT_METADATA_PATH}"));
        Ok(url)
    }
}

#[async_trait]
impl HolderRole for OpenId4VpClient {
    async fn client_metadata(&self, endpoint: &str) -> Result<OAuthClientMetadata, ClientError> {
        let url = self.public_url(endpoint)?;
        self.http.client_metadata(&url).await
    }

    async fn presentation_definition(
        &self,
        endpoint: &str,
    ) -> Result<PresentationDefinition, ClientError> {
        let url = self.public_url(endpoint)?;
        self.http.presentation_definition(&url).await
    }

    async fn build_presentation(
        &self,
        wallet: &Did,
        definition: &PresentationDefinition,
        accepted_formats: &VpFormats,
        nonce: &str,
        audience: &str,
    ) -> Result<(VerifiablePresentation, PresentationSubmission), ProviderError> {
        let params = BuildParams {
            audience: audience.to_string(),
            expires: OffsetDateTime::now_utc() + PRESENTATION_VALIDITY,
            nonce: nonce.to_string(),
        };
        self.wallet
            .build_submission(wallet, definition, accepted_formats, params)
            .await
    }

    async fn post_authorization_response(
        &self,
        presentation: &VerifiablePresentation,
        submission: &PresentationSubmission,
        response_uri: &str,
        state: &str,
    ) -> Result<String, ClientError> {
        let url = self.public_url(response_uri)?;
        self.http
            .post_authorization_response(presentation, submission, &url, state)
            .await
    }

    async fn post_error(
        &self,
        error: &OAuth2Error,
        response_uri: &str,
        state: &str,
    ) -> Result<String, ClientError> {
        let url = self.public_url(response_uri)?;
        let url = add_query_params(url, &[(STATE_PARAM, state)]);
        self.http.post_error(error, &url).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::vc::{VerifiableCredential, testing};

    #[derive(Default)]
    struct MockWallet {
        params: Mutex<Vec<BuildParams>>,
    }

    #[async_trait]
    impl Wallet for MockWallet {
        async fn build_submission(
            &self,
            holder: &Did,
            _definition: &PresentationDefinition,
            _formats: &VpFormats,
            params: BuildParams,
        ) -> Result<(VerifiablePresentation, PresentationSubmission), ProviderError> {
            let vp = testing::ldp_vp(&holder.to_string(), &params.audience, &params.nonce);
            self.params.lock().unwrap().push(params);
            let vp = VerifiablePresentation::from_value(&vp)
                .map_err(|e| ProviderError::Internal(e.to_string()))?;
            Ok((
                vp,
                PresentationSubmission {
                    id: "s".into(),
                    definition_id: "d".into(),
                    descriptor_map: vec![],
                },
            ))
        }

        async fn build_presentation(
            &self,
            _credentials: &[VerifiableCredential],
            _holder: &Did,
            _params: BuildParams,
        ) -> Result<VerifiablePresentation, ProviderError> {
            Err(ProviderError::Internal("unused".into()))
        }

        async fn list(&self, _holder: &Did) -> Result<Vec<VerifiableCredential>, ProviderError> {
            Ok(vec![])
        }
    }

    struct StaticKeys;

    #[async_trait]
    impl KeyResolver for StaticKeys {
        async fn resolve_key(&self, did: &Did, relation: KeyRelation) -> Result<String, ProviderError> {
            assert_eq!(relation, KeyRelation::AssertionMethod);
            Ok(format!("{did}#key-1"))
        }
    }

    struct EchoSigner;

    #[async_trait]
    impl DpopSigner for EchoSigner {
        async fn sign_dpop(&self, token: &DpopToken, key_id: &str) -> Result<String, ProviderError> {
            Ok(format!("{}|{}|{key_id}", token.htm, token.htu))
        }
    }

    fn client_with(wallet: Arc<MockWallet>) -> OpenId4VpClient {
        let config = ClientConfig {
            strict_mode: false,
            ..ClientConfig::default()
        };
        OpenId4VpClient::new(&config, wallet, Arc::new(StaticKeys), Arc::new(EchoSigner)).unwrap()
    }

    fn client() -> OpenId4VpClient {
        client_with(Arc::new(MockWallet::default()))
    }

    fn did(raw: &str) -> Did {
        Did::parse(raw).unwrap()
    }

    #[test]
    fn test_client_metadata_url() {
        let url = client()
            .client_metadata_url(&did("did:web:verifier.example:iam:1"))
            .unwrap();
        assert_eq!(url.as_str(), "https://verifier.example/iam/1/oauth-client");

        assert!(client().client_metadata_url(&did("did:key:z6Mk")).is_err());
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_plain_http() {
        let strict = OpenId4VpClient::new(
            &ClientConfig::default(),
            Arc::new(MockWallet::default()),
            Arc::new(StaticKeys),
            Arc::new(EchoSigner),
        )
        .unwrap();
        let result = strict.presentation_definition("http://verifier.example/pd").await;
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_post_error_appends_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/iam/1/response"))
            .and(query_param("state", "abc"))
            .and(body_string_contains("error=server_error"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"redirect_uri": "https://wallet.example/next"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let redirect = client()
            .post_error(
                &OAuth2Error::server_error("failed"),
                &format!("{}/iam/1/response", server.uri()),
                "abc",
            )
            .await
            .unwrap();
        assert_eq!(redirect, "https://wallet.example/next");
    }

    #[tokio::test]
    async fn test_build_presentation_passes_nonce_and_audience() {
        let wallet = Arc::new(MockWallet::default());
        let client = client_with(wallet.clone());
        let definition = PresentationDefinition::default();

        let (vp, _) = client
            .build_presentation(
                &did("did:web:holder.example:iam:1"),
                &definition,
                &VpFormats::new(),
                "nonce-1",
                "did:web:verifier.example:iam:2",
            )
            .await
            .unwrap();

        assert_eq!(vp.challenge().as_deref(), Some("nonce-1"));
        let params = wallet.params.lock().unwrap();
        assert_eq!(params[0].audience, "did:web:verifier.example:iam:2");
        assert!(params[0].expires > OffsetDateTime::now_utc());
    }

    #[tokio::test]
    async fn test_access_token_with_dpop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/iam/2/token"))
            .and(header("DPoP", format!("POST|{}/iam/2/token|did:web:holder.example:iam:1#key-1", server.uri()).as_str()))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("code_verifier=verifier"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token", "token_type": "DPoP", "expires_in": 900
            })))
            .expect(1)
            .mount(&server)
            .await;

        let metadata = AuthorizationServerMetadata {
            token_endpoint: format!("{}/iam/2/token", server.uri()),
            ..AuthorizationServerMetadata::default()
        };
        let token = client()
            .access_token_with_metadata(
                &metadata,
                "the-code",
                "https://holder.example/cb",
                &did("did:web:holder.example:iam:1"),
                "verifier",
                true,
            )
            .await
            .unwrap();
        assert_eq!(token.access_token, "token");
    }

    #[tokio::test]
    async fn test_access_token_missing_endpoint() {
        let result = client()
            .access_token_with_metadata(
                &AuthorizationServerMetadata::default(),
                "code",
                "https://holder.example/cb",
                &did("did:web:holder.example"),
                "",
                false,
            )
            .await;
        assert!(matches!(result, Err(ClientError::MissingEndpoint(_))));
    }

    #[tokio::test]
    async fn test_s2s_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/iam/2/presentation_definition"))
            .and(query_param("scope", "example-scope"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pd", "input_descriptors": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/iam/2/token"))
            .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Avp_token-bearer"))
            .and(body_string_contains("assertion="))
            .and(body_string_contains("presentation_submission="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "s2s", "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let wallet = Arc::new(MockWallet::default());
        let metadata = AuthorizationServerMetadata {
            token_endpoint: format!("{}/iam/2/token", server.uri()),
            presentation_definition_endpoint: format!("{}/iam/2/presentation_definition", server.uri()),
            ..AuthorizationServerMetadata::default()
        };
        let token = client_with(wallet.clone())
            .request_s2s_access_token_with_metadata(
                &metadata,
                &did("did:web:holder.example:iam:1"),
                &did("did:web:verifier.example:iam:2"),
                "example-scope",
                false,
            )
            .await
            .unwrap();

        assert_eq!(token.access_token, "s2s");
        assert_eq!(token.scope.as_deref(), Some("example-scope"));
        let params = wallet.params.lock().unwrap();
        assert_eq!(params[0].audience, "did:web:verifier.example:iam:2");
        assert!(params[0].expires <= OffsetDateTime::now_utc() + Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_request_object_by_post_sends_wallet_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/request.jwt"))
            .and(body_string_contains("wallet_metadata="))
            .respond_with(ResponseTemplate::new(200).set_body_string("eyJhbGciOiJub25lIn0.e30."))
            .mount(&server)
            .await;

        let jar = client()
            .request_object_by_post(
                &format!("{}/request.jwt", server.uri()),
                &AuthorizationServerMetadata::default(),
            )
            .await
            .unwrap();
        assert_eq!(jar, "eyJhbGciOiJub25lIn0.e30.");
    }
}
