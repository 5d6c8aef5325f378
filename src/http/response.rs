//! Responses produced by the gatekeeper itself.
//!
//! Everything that is not admitted gets the same 404 regardless of method,
//! headers, or which check failed. Upstream responses are relayed by the
//! forwarder and never pass through here.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// Body returned for every denied request.
pub const NOT_FOUND_BODY: &str =
    r#"{"error": "not found", "message": "The requested resource is not available"}"#;

/// The uniform 404 for anything that is not admitted.
pub fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        NOT_FOUND_BODY,
    )
        .into_response()
}
