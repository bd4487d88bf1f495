//! HTTP calls to remote OAuth 2.0 / OpenID4VP endpoints.

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use super::ClientError;
use crate::config::ClientConfig;
use crate::did::{Did, web};
use crate::error::{ERROR_DESCRIPTION_PARAM, ERROR_PARAM, ErrorBody, OAuth2Error};
use crate::oauth::params::{
    DPOP_HEADER, PRESENTATION_SUBMISSION_PARAM, STATE_PARAM, VP_TOKEN_PARAM,
};
use crate::oauth::{
    AuthorizationServerMetadata, CredentialResponse, OAuthClientMetadata,
    OpenIdConfigurationMetadata, OpenIdCredentialIssuerMetadata, RedirectResponse, TokenResponse,
};
use crate::pe::{PresentationDefinition, PresentationSubmission};
use crate::vc::VerifiablePresentation;

const AUTHORIZATION_SERVER_WELL_KNOWN: &str = "/.well-known/oauth-authorization-server";
const OPENID_CONFIGURATION_WELL_KNOWN: &str = "/.well-known/openid-configuration";
const CREDENTIAL_ISSUER_WELL_KNOWN: &str = "/.well-known/openid-credential-issuer";

/// Maximum number of body bytes copied into `ClientError::Http`.
const ERROR_BODY_LIMIT: usize = 1024;

/// Low level client with one method per remote endpoint.
#[derive(Debug, Clone)]
pub struct IamHttpClient {
    http_client: reqwest::Client,
    strict_mode: bool,
    max_response_size: usize,
}

/// Location of RFC 8414 metadata for an issuer URL: the well-known suffix is
/// inserted between host and path.
#[must_use]
pub fn authorization_server_metadata_url(issuer: &Url) -> Url {
    let mut url = issuer.clone();
    let path = issuer.path().trim_end_matches('/');
    url.set_path(&format!("{AUTHORIZATION_SERVER_WELL_KNOWN}{path}"));
    url.set_query(None);
    url
}

fn append_path(base: &Url, suffix: &str) -> Url {
    let mut url = base.clone();
    let path = base.path().trim_end_matches('/');
    url.set_path(&format!("{path}{suffix}"));
    url
}

impl IamHttpClient {
    /// Creates a client honouring timeout, strict mode and size limit of
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Network` if the TLS backend cannot be
    /// initialised.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            strict_mode: config.strict_mode,
            max_response_size: config.max_response_size,
        })
    }

    /// Whether URLs are checked in strict mode.
    #[must_use]
    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    /// Fetches authorization server metadata of a `did:web` identifier.
    pub async fn oauth_authorization_server_metadata(
        &self,
        did: &Did,
    ) -> Result<AuthorizationServerMetadata, ClientError> {
        let issuer = web::did_to_url(did).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        self.oauth_authorization_server_metadata_at(&issuer).await
    }

    /// Fetches authorization server metadata of the issuer at `issuer`.
    pub async fn oauth_authorization_server_metadata_at(
        &self,
        issuer: &Url,
    ) -> Result<AuthorizationServerMetadata, ClientError> {
        let url = authorization_server_metadata_url(issuer);
        self.get_json(&url).await
    }

    /// Fetches OAuth client metadata.
    pub async fn client_metadata(&self, endpoint: &Url) -> Result<OAuthClientMetadata, ClientError> {
        self.get_json(endpoint).await
    }

    /// Fetches a presentation definition.
    pub async fn presentation_definition(
        &self,
        endpoint: &Url,
    ) -> Result<PresentationDefinition, ClientError> {
        self.get_json(endpoint).await
    }

    /// Fetches the OpenID configuration of the server at `server_url`.
    pub async fn openid_configuration(
        &self,
        server_url: &Url,
    ) -> Result<OpenIdConfigurationMetadata, ClientError> {
        let url = append_path(server_url, OPENID_CONFIGURATION_WELL_KNOWN);
        self.get_json(&url).await
    }

    /// Fetches credential issuer metadata of the issuer at `issuer`.
    pub async fn openid_credential_issuer_metadata(
        &self,
        issuer: &Url,
    ) -> Result<OpenIdCredentialIssuerMetadata, ClientError> {
        let url = append_path(issuer, CREDENTIAL_ISSUER_WELL_KNOWN);
        self.get_json(&url).await
    }

    /// Posts a presentation to a `direct_post` response endpoint and
    /// returns the redirect location from the response body.
    pub async fn post_authorization_response(
        &self,
        presentation: &VerifiablePresentation,
        submission: &PresentationSubmission,
        response_url: &Url,
        state: &str,
    ) -> Result<String, ClientError> {
        let submission = serde_json::to_string(submission)
            .map_err(|e| ClientError::Parse(format!("presentation_submission: {e}")))?;
        let mut form = vec![
            (VP_TOKEN_PARAM, presentation.raw()),
            (PRESENTATION_SUBMISSION_PARAM, submission),
        ];
        if !state.is_empty() {
            form.push((STATE_PARAM, state.to_string()));
        }

        let request = self.http_client.post(response_url.as_str()).form(&form);
        let response: RedirectResponse = self.send_json(request, response_url).await?;
        Ok(response.redirect_uri)
    }

    /// Posts an error to a `direct_post` response endpoint and returns the
    /// redirect location from the response body.
    pub async fn post_error(
        &self,
        error: &OAuth2Error,
        response_url: &Url,
    ) -> Result<String, ClientError> {
        let mut form = vec![(ERROR_PARAM, error.code.as_str().to_string())];
        if !error.description.is_empty() {
            form.push((ERROR_DESCRIPTION_PARAM, error.description.clone()));
        }

        let request = self.http_client.post(response_url.as_str()).form(&form);
        let response: RedirectResponse = self.send_json(request, response_url).await?;
        Ok(response.redirect_uri)
    }

    /// Calls a token endpoint with a form-encoded request, optionally with a
    /// DPoP proof.
    ///
    /// OAuth 2.0 error responses surface as `ClientError::OAuth`.
    pub async fn access_token(
        &self,
        token_endpoint: &Url,
        form: &[(&str, String)],
        dpop_header: Option<&str>,
    ) -> Result<TokenResponse, ClientError> {
        let mut request = self.http_client.post(token_endpoint.as_str()).form(form);
        if let Some(dpop) = dpop_header {
            request = request.header(DPOP_HEADER, dpop);
        }
        self.send_json(request, token_endpoint).await
    }

    /// Retrieves a JAR request object by GET.
    pub async fn request_object_by_get(&self, request_uri: &Url) -> Result<String, ClientError> {
        let request = self
            .http_client
            .get(request_uri.as_str())
            .header(ACCEPT, "application/oauth-authz-req+jwt");
        self.send_text(request, request_uri).await
    }

    /// Retrieves a JAR request object by POST.
    pub async fn request_object_by_post(
        &self,
        request_uri: &Url,
        form: &[(&str, String)],
    ) -> Result<String, ClientError> {
        let request = self
            .http_client
            .post(request_uri.as_str())
            .header(ACCEPT, "application/oauth-authz-req+jwt")
            .form(form);
        self.send_text(request, request_uri).await
    }

    /// Requests credentials from a credential endpoint with a bearer token
    /// and a proof of possession.
    pub async fn verifiable_credentials(
        &self,
        credential_endpoint: &Url,
        access_token: &str,
        proof_jwt: &str,
    ) -> Result<CredentialResponse, ClientError> {
        let body = serde_json::json!({
            "format": "ldp_vc",
            "proof": { "proof_type": "jwt", "jwt": proof_jwt }
        });
        let request = self
            .http_client
            .post(credential_endpoint.as_str())
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        self.send_json(request, credential_endpoint).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ClientError> {
        let request = self
            .http_client
            .get(url.as_str())
            .header(ACCEPT, "application/json");
        self.send_json(request, url).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<T, ClientError> {
        let body = self.send(request, url).await?;
        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Failed to parse remote response");
            ClientError::Parse(format!("{url}: {e}"))
        })
    }

    async fn send_text(&self, request: RequestBuilder, url: &Url) -> Result<String, ClientError> {
        let body = self.send(request, url).await?;
        String::from_utf8(body).map_err(|e| ClientError::Parse(format!("{url}: {e}")))
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<Vec<u8>, ClientError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Remote request failed");
            ClientError::Network(format!("{url}: {e}"))
        })?;

        let status = response.status();
        let body = self.read_body(response).await?;
        if status.is_success() {
            return Ok(body);
        }

        tracing::debug!(url = %url, status = status.as_u16(), "Remote returned error status");
        if let Ok(error) = serde_json::from_slice::<ErrorBody>(&body) {
            return Err(ClientError::OAuth(OAuth2Error::new(
                error.error,
                error.error_description.unwrap_or_default(),
            )));
        }
        let mut text = String::from_utf8_lossy(&body).into_owned();
        if text.len() > ERROR_BODY_LIMIT {
            let mut end = ERROR_BODY_LIMIT;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        Err(ClientError::Http {
            status: status.as_u16(),
            body: text,
        })
    }

    async fn read_body(&self, response: Response) -> Result<Vec<u8>, ClientError> {
        if let Some(len) = response.content_length()
            && len as usize > self.max_response_size
        {
            return Err(ClientError::ResponseTooLarge {
                max_size: self.max_response_size,
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        if bytes.len() > self.max_response_size {
            return Err(ClientError::ResponseTooLarge {
                max_size: self.max_response_size,
            });
        }
        Ok(bytes.to_vec())
    }
}
