//! Wire-level parameter names and fixed values.

pub const RESPONSE_TYPE_PARAM: &str = "response_type";
pub const CLIENT_ID_PARAM: &str = "client_id";
pub const CLIENT_ID_SCHEME_PARAM: &str = "client_id_scheme";
pub const REDIRECT_URI_PARAM: &str = "redirect_uri";
pub const RESPONSE_URI_PARAM: &str = "response_uri";
pub const RESPONSE_MODE_PARAM: &str = "response_mode";
pub const SCOPE_PARAM: &str = "scope";
pub const STATE_PARAM: &str = "state";
pub const NONCE_PARAM: &str = "nonce";
pub const PRESENTATION_DEFINITION_PARAM: &str = "presentation_definition";
pub const PRESENTATION_DEFINITION_URI_PARAM: &str = "presentation_definition_uri";
pub const CLIENT_METADATA_URI_PARAM: &str = "client_metadata_uri";
pub const CODE_PARAM: &str = "code";
pub const VP_TOKEN_PARAM: &str = "vp_token";
pub const PRESENTATION_SUBMISSION_PARAM: &str = "presentation_submission";
pub const GRANT_TYPE_PARAM: &str = "grant_type";
pub const CODE_VERIFIER_PARAM: &str = "code_verifier";
pub const ASSERTION_PARAM: &str = "assertion";
pub const WALLET_METADATA_PARAM: &str = "wallet_metadata";

/// `response_type` of holder-initiated requests.
pub const RESPONSE_TYPE_CODE: &str = "code";
/// `response_type` of verifier-initiated requests.
pub const RESPONSE_TYPE_VP_TOKEN: &str = "vp_token";
/// The only supported `response_mode`.
pub const RESPONSE_MODE_DIRECT_POST: &str = "direct_post";
/// The only supported `client_id_scheme`.
pub const DID_CLIENT_ID_SCHEME: &str = "did";

pub const AUTHORIZATION_CODE_GRANT_TYPE: &str = "authorization_code";
pub const VP_TOKEN_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:vp_token-bearer";

/// Proof-of-possession request header.
pub const DPOP_HEADER: &str = "DPoP";
