//! Authorization and response endpoint handlers.
//!
//! ```text
//! GET /iam/{id}/authorize
//!     ├─► Ok(location)              → 302 location
//!     ├─► Err with redirect target  → 302 target?error=..
//!     └─► Err without target        → rendered error page
//!
//! POST /iam/{id}/response
//!     ├─► Ok                        → 200 {"redirect_uri": callback?code=..&state=..}
//!     ├─► Err with redirect target  → 200 {"redirect_uri": target?error=..}
//!     └─► Err without target        → 400/500 {"error", "error_description"}
//! ```

use std::collections::HashMap;

use axum::Form;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};

use super::{IamState, found, json_error, redirect_or_render};
use crate::oauth::RedirectResponse;
use crate::openid4vp::AuthorizationResponse;

/// `GET /iam/{id}/authorize`.
pub async fn authorize_handler(
    State(state): State<IamState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match state.service.handle_authorize_request(&id, &params).await {
        Ok(location) => found(&location),
        Err(e) => {
            tracing::debug!(id = %id, error = %e, "Authorization request failed");
            redirect_or_render(&e)
        }
    }
}

/// `POST /iam/{id}/response`, the `direct_post` target of wallets.
pub async fn response_handler(
    State(state): State<IamState>,
    Path(id): Path<String>,
    Form(response): Form<AuthorizationResponse>,
) -> Response {
    match state.service.handle_authorize_response(&id, &response).await {
        Ok(redirect) => Json(redirect).into_response(),
        Err(e) => match e.to_redirect_url() {
            Some(location) => Json(RedirectResponse::new(&location)).into_response(),
            None => {
                tracing::debug!(id = %id, error = %e, "Authorization response rejected");
                json_error(&e)
            }
        },
    }
}
