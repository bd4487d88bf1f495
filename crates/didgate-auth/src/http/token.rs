//! Token endpoint handler.
//!
//! ```text
//! POST /iam/{id}/token
//! Content-Type: application/x-www-form-urlencoded
//!
//! grant_type=authorization_code
//! &code=SplxlOBeZQQYbYS6WxSbIA
//! &redirect_uri=https://client.example/cb
//! &client_id=did:web:node.example:iam:1
//! ```

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};

use super::{IamState, json_error};
use crate::oauth::TokenRequest;

/// `POST /iam/{id}/token`.
///
/// Errors are always answered with a JSON body, never redirected.
pub async fn token_handler(
    State(state): State<IamState>,
    Path(id): Path<String>,
    Form(request): Form<TokenRequest>,
) -> Response {
    match state.service.handle_token_request(&id, &request).await {
        Ok(response) => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "no-store"), (header::PRAGMA, "no-cache")],
            Json(response),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(id = %id, grant_type = %request.grant_type, error = %e, "Token request failed");
            json_error(&e)
        }
    }
}
