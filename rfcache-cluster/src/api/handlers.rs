//! Endpoint handlers.
//!
//! Handlers take the already-read query string or body so they can be driven
//! without a socket.

use super::error::ApiError;
use super::gateway::RequestGateway;
use super::response;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Body of `POST /set`.
#[derive(Debug, Deserialize)]
pub struct SetRequest {
    /// Key to write.
    #[serde(default)]
    pub key: String,
    /// Value to write.
    #[serde(default)]
    pub value: String,
}

/// Body of `POST /join`.
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    /// Raft address of the node to add.
    #[serde(default)]
    pub peer_address: String,
}

/// GET /get?key=<k>
///
/// Returns the locally applied value, empty if the key was never set.
pub fn get(gateway: &RequestGateway, query: &str) -> Response<Full<Bytes>> {
    let key = query_param(query, "key").unwrap_or_default();

    match gateway.handle_get(&key) {
        Ok(value) => response::ok(&value),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// POST /set
///
/// Body: `{"key": "...", "value": "..."}`. Responds once the write is applied.
pub async fn set(gateway: &RequestGateway, body: Bytes) -> Response<Full<Bytes>> {
    let req: SetRequest = match parse_json(&body) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    match gateway.handle_set(&req.key, &req.value).await {
        Ok(()) => response::ok_empty(),
        Err(e) if e.is_client_error() => ApiError::from(e).into_response(),
        Err(e) => {
            tracing::warn!(key = %req.key, error = %e, "set failed");
            ApiError::from(e).context("raft apply err: ").into_response()
        }
    }
}

/// POST /join
///
/// Body: `{"peer_address": "host:port"}`. Responds once the new voter is
/// committed to the configuration.
pub async fn join(gateway: &RequestGateway, body: Bytes) -> Response<Full<Bytes>> {
    let req: JoinRequest = match parse_json(&body) {
        Ok(r) => r,
        Err(e) => return e.into_response(),
    };

    match gateway.handle_join(&req.peer_address).await {
        Ok(()) => response::ok_empty(),
        Err(e) if e.is_client_error() => ApiError::from(e).into_response(),
        Err(e) => {
            tracing::warn!(peer = %req.peer_address, error = %e, "join failed");
            ApiError::from(e)
                .context("fail joining peer to raft: ")
                .into_response()
        }
    }
}

/// GET /status
pub fn status(gateway: &RequestGateway) -> Response<Full<Bytes>> {
    response::ok(&gateway.status())
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("json parse err: {}", e)))
}

/// Decoded value of `name` in a query string.
fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (k == name).then(|| urlencoding::decode(v).map(|s| s.into_owned()).unwrap_or_default())
    })
}
