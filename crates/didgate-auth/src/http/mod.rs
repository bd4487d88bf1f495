//! HTTP handlers for the endpoints of owned identifiers.
//!
//! # Endpoints
//!
//! | Method | Path                                               | Handler |
//! |--------|----------------------------------------------------|---------|
//! | GET    | `/iam/{id}/authorize`                              | [`authorize::authorize_handler`] |
//! | POST   | `/iam/{id}/response`                               | [`authorize::response_handler`] |
//! | POST   | `/iam/{id}/token`                                  | [`token::token_handler`] |
//! | GET    | `/.well-known/oauth-authorization-server/iam/{id}` | [`metadata::authorization_server_metadata_handler`] |
//! | GET    | `/iam/{id}/oauth-client`                           | [`metadata::client_metadata_handler`] |
//! | GET    | `/iam/{id}/presentation_definition`                | [`metadata::presentation_definition_handler`] |

pub mod authorize;
pub mod metadata;
pub mod templates;
pub mod token;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use url::Url;

use crate::error::OAuth2Error;
use crate::openid4vp::OpenId4VpService;

pub use templates::render_error_page;

/// State shared by the handlers.
#[derive(Clone)]
pub struct IamState {
    /// The orchestrator.
    pub service: Arc<OpenId4VpService>,
}

impl IamState {
    /// Creates handler state around `service`.
    pub fn new(service: Arc<OpenId4VpService>) -> Self {
        Self { service }
    }
}

/// Builds the router serving all endpoints.
pub fn router(state: IamState) -> Router {
    Router::new()
        .route("/iam/{id}/authorize", get(authorize::authorize_handler))
        .route("/iam/{id}/response", post(authorize::response_handler))
        .route("/iam/{id}/token", post(token::token_handler))
        .route(
            "/.well-known/oauth-authorization-server/iam/{id}",
            get(metadata::authorization_server_metadata_handler),
        )
        .route("/iam/{id}/oauth-client", get(metadata::client_metadata_handler))
        .route(
            "/iam/{id}/presentation_definition",
            get(metadata::presentation_definition_handler),
        )
        .with_state(state)
}

fn error_status(error: &OAuth2Error) -> StatusCode {
    if error.is_server_error() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::BAD_REQUEST
    }
}

/// `302 Found` to `location`.
pub(crate) fn found(location: &Url) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.as_str())]).into_response()
}

/// Redirects to the error's target if it has one, otherwise renders the
/// error page.
pub(crate) fn redirect_or_render(error: &OAuth2Error) -> Response {
    if let Some(location) = error.to_redirect_url() {
        return found(&location);
    }
    (
        error_status(error),
        Html(render_error_page(error.code.as_str(), &error.description)),
    )
        .into_response()
}

/// `{error, error_description}` with a 400 or 500 status.
pub(crate) fn json_error(error: &OAuth2Error) -> Response {
    (
        error_status(error),
        [(header::CACHE_CONTROL, "no-store")],
        Json(error.to_body()),
    )
        .into_response()
}
