//! Trusted-subnet gate: when a CIDR is configured, requests must carry an
//! `X-Real-IP` inside it.

use std::net::IpAddr;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::app::AppState;

pub(crate) async fn layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(subnet) = state.trusted_subnet else {
        return next.run(request).await;
    };

    let allowed = request
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
        .is_some_and(|ip| subnet.contains(&ip));

    if allowed {
        next.run(request).await
    } else {
        StatusCode::FORBIDDEN.into_response()
    }
}
