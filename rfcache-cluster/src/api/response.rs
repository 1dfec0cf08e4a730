//! JSON response builders for the API.
//!
//! Every body uses the same envelope:
//!
//! ```json
//! {"code": 0, "error_message": "", "data": ...}
//! ```
//!
//! `code` is 0 on success and 1 on failure; failures carry `data: {}`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};

/// `code` of a successful response.
pub const CODE_OK: i32 = 0;
/// `code` of a failed response.
pub const CODE_ERR: i32 = 1;

/// Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    /// 0 on success, 1 on failure.
    pub code: i32,
    /// Empty on success.
    pub error_message: String,
    /// Payload.
    pub data: T,
}

/// Empty `data` object, serialized as `{}`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Empty {}

/// Build a JSON response with status code.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|e| {
        serde_json::json!({
            "code": CODE_ERR,
            "error_message": format!("Serialization error: {}", e),
            "data": {}
        })
        .to_string()
    });

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .expect("response builder should not fail")
}

/// Build a 200 OK response carrying `data`.
pub fn ok<T: Serialize>(data: &T) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &Envelope {
            code: CODE_OK,
            error_message: String::new(),
            data,
        },
    )
}

/// Build a 200 OK response with no payload.
pub fn ok_empty() -> Response<Full<Bytes>> {
    ok(&Empty {})
}

/// Build a failure response.
pub fn error(status: StatusCode, message: impl Into<String>) -> Response<Full<Bytes>> {
    json_response(
        status,
        &Envelope {
            code: CODE_ERR,
            error_message: message.into(),
            data: Empty {},
        },
    )
}

/// Build a 404 Not Found response.
pub fn not_found() -> Response<Full<Bytes>> {
    error(StatusCode::NOT_FOUND, "not found")
}

/// Build a 405 Method Not Allowed response.
pub fn method_not_allowed(allowed: &[&str]) -> Response<Full<Bytes>> {
    let mut response = error(
        StatusCode::METHOD_NOT_ALLOWED,
        format!("method not allowed, allowed: {}", allowed.join(", ")),
    );
    if let Ok(value) = allowed.join(", ").parse() {
        response.headers_mut().insert(hyper::header::ALLOW, value);
    }
    response
}
