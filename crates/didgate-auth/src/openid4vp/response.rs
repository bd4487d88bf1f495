//! Response endpoint.
//!
//! Wallets post either an error or a `vp_token` with its
//! `presentation_submission` to `POST /iam/{id}/response`. Errors are
//! relayed to the client that started the flow; submissions run through the
//! presentation validation pipeline:
//!
//! 1. Parse the `vp_token` envelope
//! 2. Extract the challenge of the first presentation
//! 3. Claim the session by that challenge from the nonce store; from here
//!    on every error is delivered to the session's redirect URI
//! 4. Parse the presentation submission
//! 5. Check signer consistency and audience of every presentation
//! 6. Match the submission against the definition of the session scope
//! 7. Burn all nonces and require them to agree
//! 8. Verify every presentation and its credentials
//! 9. Store the session under a fresh authorization code
//!
//! # Security
//!
//! - The session nonce is taken atomically at stage 3, so of concurrent
//!   submissions of one bundle at most one proceeds and a rejected bundle
//!   cannot be repaired and replayed
//! - Every other nonce found in the bundle is burned at stage 7; a failed
//!   burn fails the submission
//! - Descriptions are fixed strings; internal causes are logged only

use serde::{Deserialize, Serialize};
use url::Url;

use super::validation::{
    validate_presentation_audience, validate_presentation_nonce, validate_presentation_signer,
};
use super::{FlowResult, OpenId4VpService, lookup_error};
use crate::did::Did;
use crate::error::{ErrorCode, OAuth2Error};
use crate::oauth::params::{CODE_PARAM, STATE_PARAM};
use crate::oauth::{RedirectResponse, ServerState, add_query_params, generate_nonce};
use crate::pe::{Envelope, PresentationSubmission, validate_submission};
use crate::provider::ProviderError;

/// Form posted to the response endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthorizationResponse {
    /// Presentation envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vp_token: Option<String>,

    /// Submission describing the envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_submission: Option<String>,

    /// Client state of the verifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Error code, set when the wallet reports a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Error description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OpenId4VpService {
    /// Handles `POST /iam/{id}/response`.
    ///
    /// # Errors
    ///
    /// Errors carrying a redirect target are delivered there by the caller.
    #[tracing::instrument(skip(self, response), fields(error = response.error.as_deref()))]
    pub async fn handle_authorize_response(
        &self,
        id: &str,
        response: &AuthorizationResponse,
    ) -> FlowResult<RedirectResponse> {
        if let Some(code) = &response.error {
            return self.handle_authorize_response_error(id, code, response).await;
        }
        self.handle_authorize_response_submission(id, response).await
    }

    async fn handle_authorize_response_error(
        &self,
        id: &str,
        code: &str,
        response: &AuthorizationResponse,
    ) -> FlowResult<RedirectResponse> {
        let description = response.error_description.clone().unwrap_or_default();

        if let (Some(state), Ok(owner)) = (&response.state, self.did_for_id(id))
            && let Ok(session) = self.client_state_store(&owner).take(state).await
            && let Some(redirect_url) = session.redirect_url()
        {
            tracing::debug!(error = code, "Relaying wallet error to client");
            let location = OAuth2Error::new(ErrorCode::from(code), description)
                .with_redirect_uri(Some(&redirect_url))
                .to_redirect_url()
                .unwrap_or(redirect_url);
            return Ok(RedirectResponse::new(&location));
        }

        Err(OAuth2Error::new(ErrorCode::from(code), description))
    }

    async fn handle_authorize_response_submission(
        &self,
        id: &str,
        response: &AuthorizationResponse,
    ) -> FlowResult<RedirectResponse> {
        let verifier = self.owned_did(id, "unknown verifier id").await?;

        let vp_token = response
            .vp_token
            .as_deref()
            .ok_or_else(|| OAuth2Error::invalid_request("missing vp_token"))?;
        let envelope = Envelope::parse(vp_token)
            .ok()
            .filter(|envelope| !envelope.presentations.is_empty())
            .ok_or_else(|| OAuth2Error::invalid_request("invalid vp_token"))?;

        let nonce = envelope.presentations[0]
            .challenge()
            .ok_or_else(|| OAuth2Error::invalid_request("failed to extract nonce from vp_token"))?;
        let nonces = self.nonce_store(&verifier);
        let mut session = nonces
            .take(&nonce)
            .await
            .map_err(|e| lookup_error(e, "invalid or expired nonce"))?;

        let callback = session.redirect_url().ok_or_else(|| {
            tracing::error!(verifier = %verifier, "Session holds an unparsable redirect_uri");
            OAuth2Error::server_error("invalid redirect_uri in session")
        })?;
        let fail = |err: OAuth2Error| err.with_redirect_uri(Some(&callback));

        let raw_submission = response
            .presentation_submission
            .as_deref()
            .ok_or_else(|| fail(OAuth2Error::invalid_request("missing presentation_submission")))?;
        let submission = PresentationSubmission::parse(raw_submission.as_bytes()).map_err(|e| {
            tracing::debug!(error = %e, "Rejecting presentation_submission");
            fail(OAuth2Error::invalid_request("invalid presentation_submission").with_internal_error(e))
        })?;

        let mut subject: Option<Did> = None;
        for presentation in &envelope.presentations {
            subject = Some(validate_presentation_signer(presentation, subject.as_ref()).map_err(fail)?);
            validate_presentation_audience(presentation, &verifier).map_err(fail)?;
        }

        let definition = self
            .collaborators
            .policy
            .presentation_definition(&verifier, &session.scope)
            .await
            .map_err(|e| match e {
                ProviderError::NotFound(_) => {
                    fail(OAuth2Error::new(ErrorCode::InvalidScope, "unsupported scope").with_internal_error(e))
                }
                other => {
                    tracing::error!(scope = %session.scope, error = %other, "Failed to fetch presentation definition");
                    fail(OAuth2Error::server_error("failed to fetch presentation definition")
                        .with_internal_error(other))
                }
            })?;
        let credential_map = validate_submission(&definition, &submission, &envelope).map_err(|e| {
            tracing::debug!(definition = %definition.id, error = %e, "Submission does not match definition");
            fail(
                OAuth2Error::invalid_request(
                    "presentation submission does not conform to presentation definition",
                )
                .with_internal_error(e),
            )
        })?;

        validate_presentation_nonce(&nonces, &envelope.presentations)
            .await
            .map_err(fail)?;

        for presentation in &envelope.presentations {
            if let Err(e) = self
                .collaborators
                .credential_verifier
                .verify_vp(presentation, true, None)
                .await
            {
                tracing::info!(verifier = %verifier, error = %e, "Presentation verification failed");
                return Err(fail(
                    OAuth2Error::invalid_request(
                        "presentation(s) or contained credential(s) are invalid",
                    )
                    .with_internal_error(e),
                ));
            }
        }

        session.presentation_definition = Some(definition);
        session.server_state = Some(ServerState {
            credential_map,
            presentations: envelope.presentations,
            submission,
        });

        let code = generate_nonce();
        if let Err(e) = self.code_store(&verifier).put(&code, &session).await {
            tracing::error!(verifier = %verifier, error = %e, "Failed to store authorization code");
            return Err(fail(
                OAuth2Error::server_error("failed to store authorization code").with_internal_error(e),
            ));
        }
        tracing::info!(verifier = %verifier, scope = %session.scope, "Issued authorization code");

        let location = add_query_params(
            callback.clone(),
            &[(CODE_PARAM, &code), (STATE_PARAM, &session.client_state)],
        );
        Ok(RedirectResponse::new(&location))
    }
}

/// Parsed form of a [`RedirectResponse`] location, for callers that
/// redirect the user agent.
///
/// # Errors
///
/// Returns `server_error` when the location is not a URL.
pub fn redirect_location(response: &RedirectResponse) -> FlowResult<Url> {
    Url::parse(&response.redirect_uri)
        .map_err(|e| OAuth2Error::server_error("invalid redirect location").with_internal_error(e))
}
