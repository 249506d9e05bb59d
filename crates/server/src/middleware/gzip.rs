//! Transparent gzip: decompress `Content-Encoding: gzip` requests, compress
//! JSON/HTML responses for clients that sent `Accept-Encoding: gzip`.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use metrod_core::compress;

use super::MAX_BODY_BYTES;

fn header_mentions_gzip(headers: &axum::http::HeaderMap, name: header::HeaderName) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"))
}

fn compressible(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json") || ct.starts_with("text/html"))
}

pub(crate) async fn layer(request: Request, next: Next) -> Response {
    let accepts_gzip = header_mentions_gzip(request.headers(), header::ACCEPT_ENCODING);

    let request = if header_mentions_gzip(request.headers(), header::CONTENT_ENCODING) {
        let (mut parts, body) = request.into_parts();
        let Ok(packed) = axum::body::to_bytes(body, MAX_BODY_BYTES).await else {
            return StatusCode::BAD_REQUEST.into_response();
        };
        let raw = match compress::gunzip(&packed) {
            Ok(raw) => raw,
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        };
        parts.headers.remove(header::CONTENT_ENCODING);
        parts.headers.remove(header::CONTENT_LENGTH);
        Request::from_parts(parts, Body::from(raw))
    } else {
        request
    };

    let response = next.run(request).await;
    if !accepts_gzip || !compressible(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let Ok(raw) = axum::body::to_bytes(body, MAX_BODY_BYTES).await else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    match compress::gzip(&raw) {
        Ok(packed) => {
            parts
                .headers
                .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(packed))
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
