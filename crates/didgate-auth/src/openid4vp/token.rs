//! Token endpoint.
//!
//! Exchanges an authorization code minted by the response endpoint for an
//! opaque access token. Codes are single use: a redemption takes the code
//! out of the store before anything is compared, so a code presented with
//! a mismatching `redirect_uri` or `client_id` is burned as well.

use time::OffsetDateTime;
use url::Url;

use super::{FlowResult, OpenId4VpService, lookup_error};
use crate::did::Did;
use crate::error::OAuth2Error;
use crate::oauth::params::AUTHORIZATION_CODE_GRANT_TYPE;
use crate::oauth::{AccessToken, BEARER_TOKEN_TYPE, OAuthSession, TokenRequest, TokenResponse, generate_nonce};
use crate::pe::constraint_field_values;

impl OpenId4VpService {
    /// Handles `POST /iam/{id}/token`.
    ///
    /// # Errors
    ///
    /// Client input errors are `invalid_request`, failures after the code
    /// checks are `server_error`.
    #[tracing::instrument(skip(self, request), fields(grant_type = %request.grant_type))]
    pub async fn handle_token_request(&self, id: &str, request: &TokenRequest) -> FlowResult<TokenResponse> {
        let verifier = self.owned_did(id, "unknown verifier id").await?;
        match request.grant_type.as_str() {
            AUTHORIZATION_CODE_GRANT_TYPE => {
                self.exchange_authorization_code(
                    &verifier,
                    request.code.as_deref(),
                    request.redirect_uri.as_deref(),
                    request.client_id.as_deref(),
                )
                .await
            }
            other => Err(OAuth2Error::unsupported_grant_type(other)),
        }
    }

    /// Redeems `code` issued by `verifier`.
    pub async fn exchange_authorization_code(
        &self,
        verifier: &Did,
        code: Option<&str>,
        redirect_uri: Option<&str>,
        client_id: Option<&str>,
    ) -> FlowResult<TokenResponse> {
        let redirect_uri = redirect_uri
            .ok_or_else(|| OAuth2Error::invalid_request("missing redirect_uri parameter"))?;
        Url::parse(redirect_uri)
            .map_err(|_| OAuth2Error::invalid_request("invalid redirect_uri parameter"))?;

        let code = code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| OAuth2Error::invalid_request("invalid authorization code"))?;
        let session = self
            .code_store(verifier)
            .take(code)
            .await
            .map_err(|e| lookup_error(e, "invalid authorization code"))?;

        if session.redirect_uri != redirect_uri {
            tracing::debug!(verifier = %verifier, "Token request redirect_uri does not match");
            return Err(OAuth2Error::invalid_request("redirect_uri does not match"));
        }
        if client_id != Some(session.client_id.as_str()) {
            tracing::debug!(verifier = %verifier, "Token request client_id does not match");
            return Err(OAuth2Error::invalid_request("client_id does not match"));
        }

        let definition = self
            .collaborators
            .policy
            .presentation_definition(verifier, &session.scope)
            .await
            .map_err(|e| {
                tracing::error!(scope = %session.scope, error = %e, "Failed to fetch presentation definition");
                OAuth2Error::server_error("failed to fetch presentation definition").with_internal_error(e)
            })?;

        let token = self
            .create_access_token(verifier, OffsetDateTime::now_utc(), session, definition)
            .await?;
        Ok(token)
    }

    async fn create_access_token(
        &self,
        issuer: &Did,
        issued_at: OffsetDateTime,
        session: OAuthSession,
        definition: crate::pe::PresentationDefinition,
    ) -> FlowResult<TokenResponse> {
        let Some(server_state) = session.server_state else {
            tracing::error!(issuer = %issuer, "Authorization code without validated presentations");
            return Err(OAuth2Error::server_error("failed to create access token"));
        };

        let constraint_ids = constraint_field_values(&definition, &server_state.credential_map)
            .map_err(|e| {
                tracing::error!(definition = %definition.id, error = %e, "Failed to extract constraint field values");
                OAuth2Error::server_error("failed to create access token").with_internal_error(e)
            })?;

        let lifetime = self.config.oauth.access_token_lifetime;
        let expires_at = issued_at
            + time::Duration::try_from(lifetime).map_err(|e| {
                OAuth2Error::server_error("failed to create access token").with_internal_error(e)
            })?;
        let record = AccessToken {
            token: generate_nonce(),
            issuer: issuer.to_string(),
            client_id: session.client_id,
            scope: session.scope,
            issued_at,
            expires_at,
            presentations: server_state.presentations,
            submission: server_state.submission,
            presentation_definition: definition,
            credential_map: server_state.credential_map,
            input_descriptor_constraint_id_map: constraint_ids,
        };

        if let Err(e) = self.access_token_store(issuer).put(&record.token, &record).await {
            tracing::error!(issuer = %issuer, error = %e, "Failed to store access token");
            return Err(OAuth2Error::server_error("failed to create access token").with_internal_error(e));
        }
        tracing::info!(issuer = %issuer, client_id = %record.client_id, scope = %record.scope, "Issued access token");

        Ok(TokenResponse {
            access_token: record.token.clone(),
            token_type: BEARER_TOKEN_TYPE.to_string(),
            expires_in: Some(record.expires_in(issued_at)),
            scope: (!record.scope.is_empty()).then(|| record.scope.clone()),
        })
    }

    /// Returns the record of `token` issued by `issuer` while it is active.
    pub async fn introspect(&self, issuer: &Did, token: &str) -> FlowResult<Option<AccessToken>> {
        match self.access_token_store(issuer).get(token).await {
            Ok(record) if record.is_active(OffsetDateTime::now_utc()) => Ok(Some(record)),
            Ok(_) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(lookup_error(e, "invalid access token")),
        }
    }
}
