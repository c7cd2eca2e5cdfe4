//! HTTP handlers for the locking API.
//!
//! Lock paths are URL paths; operations are methods on them. Request
//! parameters are accepted from the urlencoded body or the query string
//! interchangeably, with body values taking precedence.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tracing::debug;

use lockerd_core::{LockManager, LockPath, LockState};

use crate::duration::{format_duration, parse_duration};
use crate::response::{bad_request, error_response, json_ok, not_found};

/// Builds the API router around a lock manager.
///
/// Unsupported methods fall back to the same structured `not_found`
/// body as unknown locks; the API never answers with a bare 405.
pub fn router(manager: LockManager) -> Router {
    Router::new()
        .route("/", get(inspect_all).fallback(fallback))
        .route(
            "/{*path}",
            post(acquire)
                .delete(release)
                .patch(extend)
                .get(inspect)
                .fallback(fallback),
        )
        .with_state(manager)
}

/// `POST /<path>`: acquire a lock.
///
/// Blocks on the ticket outcome. When the client goes away before the
/// outcome arrives, the pending acquisition is withdrawn so the queue
/// does not keep a dead waiter.
async fn acquire(
    State(manager): State<LockManager>,
    Path(path): Path<String>,
    params: FormParams,
) -> Response {
    let Ok(path) = LockPath::parse(&path) else {
        return not_found();
    };

    let Some(lock_timeout) = params.get("lock_timeout") else {
        return bad_request("missing_lock_timeout", "Missing form parameter lock_timeout");
    };
    let Some(lease_timeout) = params.get("lease_timeout") else {
        return bad_request(
            "missing_lease_timeout",
            "Missing form parameter lease_timeout",
        );
    };

    let Ok(lock_timeout) = parse_duration(lock_timeout) else {
        return bad_request("invalid_lock_timeout", "Invalid lock timeout");
    };
    let Ok(lease_timeout) = parse_duration(lease_timeout) else {
        return bad_request("invalid_lease_timeout", "Invalid lease timeout");
    };

    let mut ticket = match manager.acquire(path.as_str(), lock_timeout, lease_timeout) {
        Ok(ticket) => ticket,
        Err(_) => return not_found(),
    };

    let mut guard = ReleaseOnDisconnect {
        manager: manager.clone(),
        path,
        id: ticket.id(),
        armed: true,
    };
    let acquired = ticket.acquired().await;
    guard.armed = false;

    if acquired {
        json_ok(json!({ "id": ticket.id().to_string() }))
    } else {
        error_response(
            StatusCode::REQUEST_TIMEOUT,
            "timeout",
            "Timed out waiting to acquire lock",
        )
    }
}

/// `DELETE /<path>?id=<decimal>`: release a lock or withdraw a pending
/// acquisition.
async fn release(
    State(manager): State<LockManager>,
    Path(path): Path<String>,
    params: FormParams,
) -> Response {
    let Ok(path) = LockPath::parse(&path) else {
        return not_found();
    };

    let Some(id) = params.get("id") else {
        return bad_request("missing_id", "Missing form parameter id");
    };
    let Ok(id) = id.parse::<u64>() else {
        return bad_request("invalid_id", "Invalid ID");
    };

    match manager.release(path.as_str(), id) {
        Ok(true) => json_ok(json!({})),
        Ok(false) | Err(_) => not_found(),
    }
}

/// `PATCH /<path>`: extend the holder's lease.
async fn extend(
    State(manager): State<LockManager>,
    Path(path): Path<String>,
    params: FormParams,
) -> Response {
    let Ok(path) = LockPath::parse(&path) else {
        return not_found();
    };

    let Some(id) = params.get("id") else {
        return bad_request("missing_id", "Missing form parameter id");
    };
    let Some(lease_timeout) = params.get("lease_timeout") else {
        return bad_request(
            "missing_lease_timeout",
            "Missing form parameter lease_timeout",
        );
    };

    let Ok(id) = id.parse::<u64>() else {
        return bad_request("invalid_id", "Invalid ID");
    };
    let Ok(lease_timeout) = parse_duration(lease_timeout) else {
        return bad_request("invalid_lease_timeout", "Invalid lease timeout");
    };

    match manager.extend(path.as_str(), id, lease_timeout) {
        Ok(true) => json_ok(json!({})),
        Ok(false) | Err(_) => not_found(),
    }
}

/// `GET /<path>`: inspect a single lock.
async fn inspect(State(manager): State<LockManager>, Path(path): Path<String>) -> Response {
    let Ok(path) = LockPath::parse(&path) else {
        return not_found();
    };

    match manager.inspect(path.as_str()) {
        Ok(state) if state.locking_id != 0 => json_ok(lock_state_body(&state)),
        Ok(_) | Err(_) => not_found(),
    }
}

/// `GET /`: inspect every held lock.
async fn inspect_all(State(manager): State<LockManager>) -> Response {
    let states = manager.inspect_all();
    let body: serde_json::Map<String, serde_json::Value> = states
        .iter()
        .map(|(path, state)| (path.clone(), lock_state_body(state)))
        .collect();

    json_ok(body)
}

async fn fallback() -> Response {
    not_found()
}

/// Renders a lock state snapshot.
///
/// Ids travel as decimal strings; they may exceed safe integer precision
/// in some client languages.
fn lock_state_body(state: &LockState) -> serde_json::Value {
    json!({
        "locking_id": state.locking_id.to_string(),
        "lock_timeout": format_duration(state.lock_timeout),
        "acquirers": state
            .acquirers
            .iter()
            .map(|acquirer| {
                json!({
                    "id": acquirer.id.to_string(),
                    "timeout": format_duration(acquirer.timeout),
                })
            })
            .collect::<Vec<_>>(),
    })
}

/// Withdraws a pending acquisition when the request future is dropped
/// before the outcome was observed.
struct ReleaseOnDisconnect {
    manager: LockManager,
    path: LockPath,
    id: u64,
    armed: bool,
}

impl Drop for ReleaseOnDisconnect {
    fn drop(&mut self) {
        if self.armed {
            debug!(path = %self.path, id = self.id, "client went away, withdrawing acquisition");
            let _ = self.manager.release(self.path.as_str(), self.id);
        }
    }
}

/// Merged view of query-string and form-body parameters.
///
/// Empty values count as missing, mirroring HTML form semantics.
struct FormParams(HashMap<String, String>);

impl FormParams {
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

impl<S: Send + Sync> FromRequest<S> for FormParams {
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let query = req.uri().query().map(str::to_owned);
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

        let mut params = HashMap::new();

        if is_form {
            let bytes = Bytes::from_request(req, state).await.map_err(|_| {
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_server_error",
                    "Internal server error",
                )
            })?;

            if let Ok(pairs) = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes) {
                for (key, value) in pairs {
                    params.entry(key).or_insert(value);
                }
            }
        }

        if let Some(query) = query {
            if let Ok(pairs) = serde_urlencoded::from_str::<Vec<(String, String)>>(&query) {
                for (key, value) in pairs {
                    params.entry(key).or_insert(value);
                }
            }
        }

        Ok(Self(params))
    }
}
