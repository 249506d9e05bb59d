//! HMAC-SHA256 body digests. Verification runs over the raw (decompressed)
//! request body; the response carries a digest over its raw body, stamped
//! before the gzip layer compresses it.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use metrod_core::sign;

use crate::app::AppState;

use super::MAX_BODY_BYTES;

// `HashSHA256` on the wire; header names normalize to lowercase.
const HASH_HEADER: HeaderName = HeaderName::from_static("hashsha256");

pub(crate) async fn layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(key) = state.key.clone() else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, MAX_BODY_BYTES).await else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    // Bodied requests must carry a matching digest; bodiless queries have
    // nothing to sign.
    if !bytes.is_empty() {
        let valid = parts
            .headers
            .get(&HASH_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|received| sign::verify(&key, &bytes, received));
        if !valid {
            return StatusCode::BAD_REQUEST.into_response();
        }
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, MAX_BODY_BYTES).await else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    if let Ok(value) = HeaderValue::from_str(&sign::digest(&key, &bytes)) {
        parts.headers.insert(HASH_HEADER, value);
    }
    Response::from_parts(parts, Body::from(bytes))
}
