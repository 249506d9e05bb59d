//! Endpoint handlers. Bodies arrive already decompressed and
//! integrity-checked by the middleware stack; handlers map service outcomes
//! onto status codes and never leak internal error text.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Response};

use metrod_core::{MetricId, MetricKind, MetricSample};

use crate::app::AppState;
use crate::service::ServiceError;

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::EmptyName => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Storage(err) => {
                tracing::error!(error = %err, "storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        status.into_response()
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// `POST /update/{type}/{name}/{value}`
pub(crate) async fn update_path(
    State(state): State<AppState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Response {
    let Ok(kind) = kind.parse::<MetricKind>() else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let sample = match kind {
        MetricKind::Counter => match value.parse::<i64>() {
            Ok(delta) => MetricSample::counter(name, delta),
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        },
        MetricKind::Gauge => match value.parse::<f64>() {
            Ok(value) => MetricSample::gauge(name, value),
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        },
    };

    match state.service.update_one(sample).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(err) => err.into_response(),
    }
}

/// `POST /update/`: single JSON sample in, merged sample out.
pub(crate) async fn update_json(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_json(&headers) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let Ok(sample) = serde_json::from_slice::<MetricSample>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match state.service.update_one(sample).await {
        Ok(merged) => Json(merged).into_response(),
        Err(err) => err.into_response(),
    }
}

/// `POST /updates/`: JSON array of samples, applied in order.
pub(crate) async fn update_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> Response {
    let Ok(samples) = serde_json::from_slice::<Vec<MetricSample>>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match state.service.update_batch(samples).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => err.into_response(),
    }
}

/// `GET /value/{type}/{id}`: plain-text numeric value.
pub(crate) async fn value_path(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Response {
    let Ok(kind) = kind.parse::<MetricKind>() else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match state.service.get(&MetricId::new(name, kind)).await {
        Ok(Some(sample)) => sample.render_value().into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => err.into_response(),
    }
}

/// `POST /value/`: `{id,type}` in, full sample out.
pub(crate) async fn value_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Response {
    let Ok(id) = serde_json::from_slice::<MetricId>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    match state.service.get(&id).await {
        Ok(Some(sample)) => Json(sample).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => err.into_response(),
    }
}

/// `GET /`: human-readable table of everything stored.
pub(crate) async fn index(State(state): State<AppState>) -> Response {
    let samples = match state.service.list().await {
        Ok(samples) => samples,
        Err(err) => return err.into_response(),
    };

    let mut html = String::from(
        "<!DOCTYPE html><html><head><title>metrics</title></head><body>\
         <table><tr><th>name</th><th>type</th><th>value</th></tr>",
    );
    for sample in &samples {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&sample.name),
            sample.kind,
            sample.render_value(),
        ));
    }
    html.push_str("</table></body></html>");
    Html(html).into_response()
}

/// `GET /ping`: storage health probe.
pub(crate) async fn ping(State(state): State<AppState>) -> Response {
    match state.service.ping().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => err.into_response(),
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
