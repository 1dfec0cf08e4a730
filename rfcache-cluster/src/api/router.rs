//! Request routing for the API.

use super::gateway::RequestGateway;
use super::{handlers, response};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;

/// Largest accepted API request body.
pub const MAX_API_BODY: usize = 1024 * 1024;

/// Route an incoming request to the appropriate handler.
pub async fn route(req: Request<Incoming>, gateway: Arc<RequestGateway>) -> Response<Full<Bytes>> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    tracing::debug!(method = %method, path = %path, "Routing request");

    match (method, path.as_str()) {
        (Method::GET, "/get") => {
            let query = req.uri().query().unwrap_or("");
            handlers::get(&gateway, query)
        }
        (Method::POST, "/set") => match read_body(req, MAX_API_BODY).await {
            Ok(body) => handlers::set(&gateway, body).await,
            Err(r) => r,
        },
        (Method::POST, "/join") => match read_body(req, MAX_API_BODY).await {
            Ok(body) => handlers::join(&gateway, body).await,
            Err(r) => r,
        },
        (Method::GET, "/status") => handlers::status(&gateway),

        (_, "/get") | (_, "/status") => response::method_not_allowed(&["GET"]),
        (_, "/set") | (_, "/join") => response::method_not_allowed(&["POST"]),

        _ => response::not_found(),
    }
}

/// Collect the request body, refusing anything over `limit` bytes with 413.
#[allow(clippy::result_large_err)]
pub async fn read_body<B>(req: Request<B>, limit: usize) -> Result<Bytes, Response<Full<Bytes>>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(response::error(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("request body exceeds {} bytes", limit),
        )),
        Err(e) => Err(response::error(
            StatusCode::BAD_REQUEST,
            format!("failed to read body: {}", e),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(body: &'static [u8]) -> Request<Full<Bytes>> {
        Request::post("/set")
            .body(Full::new(Bytes::from_static(body)))
            .expect("build request")
    }

    #[tokio::test]
    async fn body_within_limit_is_read() {
        let body = read_body(post(br#"{"key":"a"}"#), 64)
            .await
            .expect("body within limit");
        assert_eq!(&body[..], br#"{"key":"a"}"#);
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let response = read_body(post(&[b'x'; 128]), 64)
            .await
            .expect_err("body over limit");
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
