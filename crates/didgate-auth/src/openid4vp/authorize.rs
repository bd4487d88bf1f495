//! Authorization endpoint flows.
//!
//! ```text
//! GET /iam/{id}/authorize
//!     ├─► response_type=code                       → holder flow
//!     ├─► response_type=vp_token + response_uri or
//!     │   response_mode                            → verifier flow
//!     ├─► response_type=vp_token                   → holder flow
//!     └─► anything else                            → unsupported_response_type
//! ```
//!
//! In the holder flow this node is the verifier: it redirects the user agent
//! to the wallet named by `client_id`, asking for a presentation that is
//! posted back to its own response endpoint.
//!
//! In the verifier flow this node is the wallet: it builds a presentation
//! for the requesting verifier and posts it to the verifier's
//! `response_uri`.

use url::Url;

use super::{FlowResult, OpenId4VpService, Params};
use crate::did::{Did, web};
use crate::error::{ErrorCode, OAuth2Error};
use crate::oauth::params::{
    CLIENT_ID_PARAM, CLIENT_ID_SCHEME_PARAM, CLIENT_METADATA_URI_PARAM, DID_CLIENT_ID_SCHEME,
    NONCE_PARAM, PRESENTATION_DEFINITION_URI_PARAM, REDIRECT_URI_PARAM, RESPONSE_MODE_DIRECT_POST,
    RESPONSE_MODE_PARAM, RESPONSE_TYPE_CODE, RESPONSE_TYPE_PARAM, RESPONSE_TYPE_VP_TOKEN,
    RESPONSE_URI_PARAM, SCOPE_PARAM, STATE_PARAM,
};
use crate::oauth::{OAuthSession, add_query_params, generate_nonce};
use crate::provider::ProviderError;

/// Path of the presentation definition endpoint below an owned identifier.
pub const PRESENTATION_DEFINITION_PATH: &str = "presentation_definition";

/// Path of the response endpoint below an owned identifier.
pub const RESPONSE_PATH: &str = "response";

fn param<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params.get(name).map(String::as_str)
}

pub(super) fn join_path(base: &Url, segment: &str) -> Url {
    let mut url = base.clone();
    let path = base.path().trim_end_matches('/');
    url.set_path(&format!("{path}/{segment}"));
    url
}

impl OpenId4VpService {
    /// Handles `GET /iam/{id}/authorize` and returns where to redirect the
    /// user agent.
    ///
    /// # Errors
    ///
    /// Errors with a redirect target are delivered there, others are
    /// rendered.
    #[tracing::instrument(skip(self, params), fields(response_type = tracing::field::Empty))]
    pub async fn handle_authorize_request(&self, id: &str, params: &Params) -> FlowResult<Url> {
        let own_did = self.owned_did(id, "unknown identifier").await?;
        let response_type = param(params, RESPONSE_TYPE_PARAM).unwrap_or_default();
        tracing::Span::current().record("response_type", response_type);

        match response_type {
            RESPONSE_TYPE_CODE => self.authorize_from_holder(&own_did, params).await,
            RESPONSE_TYPE_VP_TOKEN
                if params.contains_key(RESPONSE_URI_PARAM)
                    || params.contains_key(RESPONSE_MODE_PARAM) =>
            {
                self.authorize_from_verifier(&own_did, params).await
            }
            RESPONSE_TYPE_VP_TOKEN => self.authorize_from_holder(&own_did, params).await,
            other => Err(OAuth2Error::unsupported_response_type(other)),
        }
    }

    /// Holder-initiated request: `verifier` is the owned identifier asking
    /// the wallet in `client_id` for a presentation.
    pub async fn authorize_from_holder(&self, verifier: &Did, params: &Params) -> FlowResult<Url> {
        // Until redirect_uri is known, errors are rendered and never redirected.
        let redirect_uri = param(params, REDIRECT_URI_PARAM)
            .ok_or_else(|| OAuth2Error::invalid_request("missing redirect_uri parameter"))?;
        let redirect_url = Url::parse(redirect_uri)
            .map_err(|_| OAuth2Error::invalid_request("invalid redirect_uri parameter"))?;
        let fail = |err: OAuth2Error| err.with_redirect_uri(Some(&redirect_url));

        let wallet = param(params, CLIENT_ID_PARAM)
            .and_then(|raw| Did::parse_web(raw).ok())
            .ok_or_else(|| {
                fail(OAuth2Error::invalid_request(
                    "invalid client_id parameter (only did:web is supported)",
                ))
            })?;

        let metadata = self
            .collaborators
            .verifier
            .authorization_server_metadata(&wallet)
            .await
            .map_err(|e| {
                tracing::warn!(wallet = %wallet, error = %e, "Failed to fetch wallet metadata");
                fail(OAuth2Error::server_error("failed to get metadata from wallet").with_internal_error(e))
            })?;

        let own_url = web::did_to_url(verifier)
            .map_err(|e| fail(OAuth2Error::server_error("invalid verifier DID").with_internal_error(e)))?;
        let scope = param(params, SCOPE_PARAM).unwrap_or_default();
        let definition_uri = add_query_params(
            join_path(&own_url, PRESENTATION_DEFINITION_PATH),
            &[(SCOPE_PARAM, scope)],
        );

        if metadata.authorization_endpoint.is_empty() {
            return Err(fail(OAuth2Error::invalid_request("invalid wallet endpoint")));
        }
        let wallet_url = Url::parse(&metadata.authorization_endpoint)
            .map_err(|_| fail(OAuth2Error::invalid_request("invalid wallet endpoint")))?;

        let callback_url = join_path(&own_url, RESPONSE_PATH);
        let metadata_url = self
            .collaborators
            .verifier
            .client_metadata_url(verifier)
            .map_err(|e| {
                fail(OAuth2Error::server_error("failed to construct metadata URL").with_internal_error(e))
            })?;

        if !metadata.supports_client_id_scheme(DID_CLIENT_ID_SCHEME) {
            tracing::debug!(wallet = %wallet, "Wallet does not support the did client_id_scheme");
            return Err(fail(OAuth2Error::invalid_request(
                "wallet metadata does not contain did in client_id_schemes_supported",
            )));
        }

        let nonce = generate_nonce();
        let state = generate_nonce();
        let session = OAuthSession {
            client_id: verifier.to_string(),
            scope: scope.to_string(),
            own_did: verifier.clone(),
            client_state: state.clone(),
            redirect_uri: redirect_uri.to_string(),
            response_type: RESPONSE_TYPE_VP_TOKEN.to_string(),
            presentation_definition: None,
            server_state: None,
        };
        let stores = [
            (self.nonce_store(verifier), &nonce),
            (self.client_state_store(verifier), &state),
        ];
        for (store, key) in stores {
            if let Err(e) = store.put(key, &session).await {
                tracing::error!(namespace = %store.namespace(), error = %e, "Failed to store server state");
                return Err(OAuth2Error::server_error("failed to store server state").with_internal_error(e));
            }
        }

        let verifier_id = verifier.to_string();
        let location = add_query_params(
            wallet_url,
            &[
                (RESPONSE_TYPE_PARAM, RESPONSE_TYPE_VP_TOKEN),
                (CLIENT_ID_SCHEME_PARAM, DID_CLIENT_ID_SCHEME),
                (CLIENT_ID_PARAM, &verifier_id),
                (RESPONSE_URI_PARAM, callback_url.as_str()),
                (PRESENTATION_DEFINITION_URI_PARAM, definition_uri.as_str()),
                (CLIENT_METADATA_URI_PARAM, metadata_url.as_str()),
                (RESPONSE_MODE_PARAM, RESPONSE_MODE_DIRECT_POST),
                (NONCE_PARAM, &nonce),
                (STATE_PARAM, &state),
            ],
        );
        tracing::info!(verifier = %verifier, wallet = %wallet, "Redirecting to wallet for presentation");
        Ok(location)
    }

    /// Verifier-initiated request: `wallet` is the owned identifier asked
    /// by the verifier in `client_id` for a presentation.
    pub async fn authorize_from_verifier(&self, wallet: &Did, params: &Params) -> FlowResult<Url> {
        // The verifier response endpoint is the error channel, so it is read
        // before anything else is checked.
        let response_uri = param(params, RESPONSE_URI_PARAM)
            .ok_or_else(|| OAuth2Error::invalid_request("missing response_uri parameter"))?;
        let state = param(params, STATE_PARAM).unwrap_or_default();

        match self.build_for_verifier(wallet, params).await {
            Ok((presentation, submission)) => {
                self.send_direct_post(&presentation, &submission, response_uri, state)
                    .await
            }
            Err(err) => {
                tracing::debug!(wallet = %wallet, error = %err, "Rejecting verifier request");
                self.send_direct_post_error(err, wallet, response_uri, state)
                    .await
            }
        }
    }

    async fn build_for_verifier(
        &self,
        wallet: &Did,
        params: &Params,
    ) -> FlowResult<(crate::vc::VerifiablePresentation, crate::pe::PresentationSubmission)> {
        if param(params, RESPONSE_MODE_PARAM) != Some(RESPONSE_MODE_DIRECT_POST) {
            return Err(OAuth2Error::invalid_request("invalid response_mode parameter"));
        }
        if param(params, CLIENT_ID_SCHEME_PARAM) != Some(DID_CLIENT_ID_SCHEME) {
            return Err(OAuth2Error::invalid_request("invalid client_id_scheme parameter"));
        }
        let verifier = param(params, CLIENT_ID_PARAM)
            .and_then(|raw| Did::parse_web(raw).ok())
            .ok_or_else(|| {
                OAuth2Error::invalid_request("invalid client_id parameter (only did:web is supported)")
            })?;
        let nonce = param(params, NONCE_PARAM)
            .ok_or_else(|| OAuth2Error::invalid_request("missing nonce parameter"))?;

        let holder = &self.collaborators.holder;
        let metadata_uri = param(params, CLIENT_METADATA_URI_PARAM).unwrap_or_default();
        let metadata = holder.client_metadata(metadata_uri).await.map_err(|e| {
            OAuth2Error::server_error("failed to get client metadata (verifier)").with_internal_error(e)
        })?;

        let definition_uri = param(params, PRESENTATION_DEFINITION_URI_PARAM).unwrap_or_default();
        let definition = holder
            .presentation_definition(definition_uri)
            .await
            .map_err(|e| {
                OAuth2Error::new(
                    ErrorCode::InvalidPresentationDefinitionUri,
                    format!("failed to retrieve presentation definition on {definition_uri}"),
                )
                .with_internal_error(e)
            })?;

        holder
            .build_presentation(wallet, &definition, &metadata.vp_formats, nonce, &verifier.to_string())
            .await
            .map_err(|e| match e {
                ProviderError::NoCredentials => OAuth2Error::invalid_request("no credentials available"),
                other => {
                    tracing::error!(wallet = %wallet, error = %other, "Failed to build presentation");
                    OAuth2Error::server_error("failed to build presentation").with_internal_error(other)
                }
            })
    }
}
