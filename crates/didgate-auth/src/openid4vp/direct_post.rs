//! Direct-post responder.
//!
//! Delivers a presentation or an error to a verifier's `response_uri`. The
//! verifier answers with the location the user agent continues at. A
//! location returned for an error is only followed when its origin is the
//! origin registered for the wallet identifier, so a verifier cannot turn
//! the error channel into an open redirect.

use url::Url;

use super::{FlowResult, OpenId4VpService};
use crate::did::{Did, web};
use crate::error::{ERROR_DESCRIPTION_PARAM, ERROR_PARAM, ErrorCode, OAuth2Error};
use crate::oauth::add_query_params;
use crate::pe::PresentationSubmission;
use crate::vc::VerifiablePresentation;

/// Parses `location` and checks that it lies at the origin of `wallet`.
fn registered_redirect(wallet: &Did, location: &str) -> Result<Url, String> {
    let registered = web::did_to_url(wallet).map_err(|e| e.to_string())?;
    let url = Url::parse(location).map_err(|e| format!("unparsable location: {e}"))?;
    if url.origin() != registered.origin() {
        return Err(format!("origin does not match {}", registered.origin().ascii_serialization()));
    }
    Ok(url)
}

impl OpenId4VpService {
    /// Posts `presentation` to the verifier and returns the location it
    /// answers with.
    ///
    /// # Errors
    ///
    /// Any delivery failure is a `server_error`.
    pub async fn send_direct_post(
        &self,
        presentation: &VerifiablePresentation,
        submission: &PresentationSubmission,
        response_uri: &str,
        state: &str,
    ) -> FlowResult<Url> {
        let location = self
            .collaborators
            .holder
            .post_authorization_response(presentation, submission, response_uri, state)
            .await
            .map_err(|e| {
                tracing::error!(response_uri, error = %e, "Failed to post authorization response to verifier");
                OAuth2Error::server_error("failed to post authorization response to verifier")
                    .with_internal_error(e)
            })?;

        Url::parse(&location).map_err(|e| {
            tracing::error!(response_uri, location = %location, "Verifier returned an unparsable redirect_uri");
            OAuth2Error::server_error("verifier returned an invalid redirect_uri").with_internal_error(e)
        })
    }

    /// Posts `error` to the verifier on behalf of `wallet` and returns where
    /// to send the user agent.
    ///
    /// Falls back to the error's own redirect target when the post fails or
    /// the verifier answers with a location outside the wallet's origin.
    ///
    /// # Errors
    ///
    /// Returns `server_error` when the post fails and no fallback target is
    /// known.
    pub async fn send_direct_post_error(
        &self,
        error: OAuth2Error,
        wallet: &Did,
        response_uri: &str,
        state: &str,
    ) -> FlowResult<Url> {
        match self
            .collaborators
            .holder
            .post_error(&error, response_uri, state)
            .await
        {
            Ok(location) => match registered_redirect(wallet, &location) {
                Ok(url) => return Ok(url),
                Err(reason) => {
                    tracing::error!(
                        wallet = %wallet,
                        location = %location,
                        reason = %reason,
                        "Verifier responded with incorrect callback URI"
                    );
                }
            },
            Err(e) => {
                tracing::error!(response_uri, error = %e, "Failed to post error to verifier");
            }
        }

        let Some(redirect_uri) = error.redirect_uri else {
            tracing::error!(response_uri, "No client redirect_uri to fall back to");
            return Err(OAuth2Error::server_error("something went wrong"));
        };
        Ok(add_query_params(
            redirect_uri,
            &[
                (ERROR_PARAM, ErrorCode::ServerError.as_str()),
                (ERROR_DESCRIPTION_PARAM, "failed to post error to verifier"),
            ],
        ))
    }
}
