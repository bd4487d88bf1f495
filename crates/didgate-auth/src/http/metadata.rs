//! Discovery handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::{IamState, json_error};

/// `GET /.well-known/oauth-authorization-server/iam/{id}`.
pub async fn authorization_server_metadata_handler(
    State(state): State<IamState>,
    Path(id): Path<String>,
) -> Response {
    match state.service.authorization_server_metadata(&id).await {
        Ok(metadata) => Json(metadata).into_response(),
        Err(e) => json_error(&e),
    }
}

/// `GET /iam/{id}/oauth-client`.
pub async fn client_metadata_handler(State(state): State<IamState>, Path(id): Path<String>) -> Response {
    match state.service.client_metadata(&id).await {
        Ok(metadata) => Json(metadata).into_response(),
        Err(e) => json_error(&e),
    }
}

/// Query of the presentation definition endpoint.
#[derive(Debug, Deserialize)]
pub struct DefinitionQuery {
    /// Requested scope.
    #[serde(default)]
    pub scope: String,
}

/// `GET /iam/{id}/presentation_definition?scope=..`.
pub async fn presentation_definition_handler(
    State(state): State<IamState>,
    Path(id): Path<String>,
    Query(query): Query<DefinitionQuery>,
) -> Response {
    match state.service.presentation_definition(&id, &query.scope).await {
        Ok(definition) => Json(definition).into_response(),
        Err(e) => {
            tracing::debug!(id = %id, scope = %query.scope, error = %e, "Presentation definition request failed");
            json_error(&e)
        }
    }
}
