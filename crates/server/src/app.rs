//! Router assembly and shared request state.

use std::sync::Arc;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use ipnet::IpNet;

use crate::handlers;
use crate::middleware::{gzip, integrity, logging, subnet};
use crate::service::MetricsService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MetricsService>,
    pub key: Option<String>,
    pub trusted_subnet: Option<IpNet>,
}

pub fn build_router(state: AppState) -> Router {
    // Layer order, outermost first: logging, subnet gate, gzip codec,
    // integrity digests. The integrity layer therefore sees raw bodies on
    // both sides, and its response digest is computed before compression.
    Router::new()
        .route("/", get(handlers::index))
        .route("/ping", get(handlers::ping))
        .route("/update/{kind}/{name}/{value}", post(handlers::update_path))
        .route("/update/", post(handlers::update_json))
        .route("/updates/", post(handlers::update_batch))
        .route("/value/{kind}/{name}", get(handlers::value_path))
        .route("/value/", post(handlers::value_json))
        .layer(from_fn_with_state(state.clone(), integrity::layer))
        .layer(from_fn(gzip::layer))
        .layer(from_fn_with_state(state.clone(), subnet::layer))
        .layer(from_fn(logging::layer))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode, header};
    use http_body_util::BodyExt as _;
    use tower::ServiceExt as _;

    use metrod_core::{MetricSample, compress, sign};

    use crate::storage::MemoryStorage;

    use super::*;

    fn router_with(key: Option<&str>, trusted_subnet: Option<&str>) -> Router {
        let service = Arc::new(MetricsService::new(
            Arc::new(MemoryStorage::default()),
            None,
        ));
        build_router(AppState {
            service,
            key: key.map(str::to_string),
            trusted_subnet: trusted_subnet.map(|s| s.parse().unwrap()),
        })
    }

    fn router() -> Router {
        router_with(None, None)
    }

    async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
        router.clone().oneshot(request).await.unwrap()
    }

    async fn body_bytes(response: Response<Body>) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    fn json_post(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn counter_accumulates_over_three_updates() {
        let router = router();
        for _ in 0..3 {
            let body = r#"{"id":"PollCount","type":"counter","delta":1}"#;
            let res = send(&router, json_post("/update/", body)).await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = send(&router, get_req("/value/counter/PollCount")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_bytes(res).await, b"3");
    }

    #[tokio::test]
    async fn gauge_replaces_previous_value() {
        let router = router();
        for body in [
            r#"{"id":"Alloc","type":"gauge","value":100.0}"#,
            r#"{"id":"Alloc","type":"gauge","value":250.5}"#,
        ] {
            let res = send(&router, json_post("/update/", body)).await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = send(&router, get_req("/value/gauge/Alloc")).await;
        assert_eq!(body_bytes(res).await, b"250.5");
    }

    #[tokio::test]
    async fn update_returns_the_merged_sample() {
        let router = router();
        send(
            &router,
            json_post("/update/", r#"{"id":"c","type":"counter","delta":2}"#),
        )
        .await;
        let res = send(
            &router,
            json_post("/update/", r#"{"id":"c","type":"counter","delta":5}"#),
        )
        .await;

        let merged: MetricSample = serde_json::from_slice(&body_bytes(res).await).unwrap();
        assert_eq!(merged.delta, Some(7));
        assert!(merged.updated_at.is_some());
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let res = send(
            &router(),
            json_post("/update/", r#"{"id":"","type":"gauge","value":1}"#),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_type_in_path_is_bad_request() {
        let res = send(
            &router(),
            Request::builder()
                .method("POST")
                .uri("/update/unknown/m/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn path_update_parses_and_stores() {
        let router = router();
        let res = send(
            &router,
            Request::builder()
                .method("POST")
                .uri("/update/gauge/Alloc/42.5")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = send(&router, get_req("/value/gauge/Alloc")).await;
        assert_eq!(body_bytes(res).await, b"42.5");
    }

    #[tokio::test]
    async fn bad_path_value_is_bad_request() {
        let res = send(
            &router(),
            Request::builder()
                .method("POST")
                .uri("/update/counter/c/notanumber")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_metric_is_not_found() {
        let res = send(&router(), get_req("/value/gauge/Nope")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_content_type_is_bad_request() {
        let res = send(
            &router(),
            Request::builder()
                .method("POST")
                .uri("/update/")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from(r#"{"id":"x","type":"gauge","value":1}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn batch_applies_in_order_and_commits_prefix_on_failure() {
        let router = router();
        let body = r#"[
            {"id":"PollCount","type":"counter","delta":2},
            {"id":"Alloc","type":"gauge","value":1.5},
            {"id":"","type":"gauge","value":9.0}
        ]"#;
        let res = send(&router, json_post("/updates/", body)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        // The prefix before the failing entry stays applied.
        let res = send(&router, get_req("/value/counter/PollCount")).await;
        assert_eq!(body_bytes(res).await, b"2");
        let res = send(&router, get_req("/value/gauge/Alloc")).await;
        assert_eq!(body_bytes(res).await, b"1.5");
    }

    #[tokio::test]
    async fn value_json_round_trips_a_sample() {
        let router = router();
        send(
            &router,
            json_post("/update/", r#"{"id":"Alloc","type":"gauge","value":7.25}"#),
        )
        .await;

        let res = send(
            &router,
            json_post("/value/", r#"{"id":"Alloc","type":"gauge"}"#),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let sample: MetricSample = serde_json::from_slice(&body_bytes(res).await).unwrap();
        assert_eq!(sample.name, "Alloc");
        assert_eq!(sample.value, Some(7.25));

        let res = send(
            &router,
            json_post("/value/", r#"{"id":"Missing","type":"counter"}"#),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn gzip_request_and_response_round_trip() {
        let router = router();
        let raw = r#"{"id":"Alloc","type":"gauge","value":3.5}"#;
        let packed = compress::gzip(raw.as_bytes()).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/update/")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_ENCODING, "gzip")
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Body::from(packed))
            .unwrap();
        let res = send(&router, request).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::CONTENT_ENCODING).unwrap(),
            "gzip"
        );

        let stored: MetricSample =
            serde_json::from_slice(&compress::gunzip(&body_bytes(res).await).unwrap()).unwrap();
        assert_eq!(stored.name, "Alloc");
        assert_eq!(stored.value, Some(3.5));
    }

    #[tokio::test]
    async fn responses_stay_plain_without_accept_encoding() {
        let router = router();
        let res = send(
            &router,
            json_post("/update/", r#"{"id":"Alloc","type":"gauge","value":1.0}"#),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(header::CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn integrity_mismatch_is_rejected_without_state_change() {
        let router = router_with(Some("secret"), None);
        let body = r#"{"id":"PollCount","type":"counter","delta":1}"#;

        // No digest.
        let res = send(&router, json_post("/update/", body)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        // Wrong digest.
        let request = Request::builder()
            .method("POST")
            .uri("/update/")
            .header(header::CONTENT_TYPE, "application/json")
            .header("HashSHA256", sign::digest("other-key", body.as_bytes()))
            .body(Body::from(body))
            .unwrap();
        let res = send(&router, request).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        // Nothing was stored.
        let res = send(&router, get_req("/value/counter/PollCount")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn integrity_accepts_valid_digest_and_signs_response() {
        let router = router_with(Some("secret"), None);
        let body = r#"{"id":"PollCount","type":"counter","delta":1}"#;

        let request = Request::builder()
            .method("POST")
            .uri("/update/")
            .header(header::CONTENT_TYPE, "application/json")
            .header("HashSHA256", sign::digest("secret", body.as_bytes()))
            .body(Body::from(body))
            .unwrap();
        let res = send(&router, request).await;
        assert_eq!(res.status(), StatusCode::OK);

        let digest = res
            .headers()
            .get("hashsha256")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let bytes = body_bytes(res).await;
        assert!(sign::verify("secret", &bytes, &digest));
    }

    #[tokio::test]
    async fn signed_gzip_request_verifies_over_raw_body() {
        let router = router_with(Some("secret"), None);
        let raw = r#"[{"id":"PollCount","type":"counter","delta":1}]"#;
        let packed = compress::gzip(raw.as_bytes()).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/updates/")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_ENCODING, "gzip")
            .header("HashSHA256", sign::digest("secret", raw.as_bytes()))
            .body(Body::from(packed))
            .unwrap();
        let res = send(&router, request).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn untrusted_requests_are_forbidden() {
        let router = router_with(None, Some("10.0.0.0/8"));

        let res = send(&router, get_req("/ping")).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let request = Request::builder()
            .uri("/ping")
            .header("X-Real-IP", "192.168.1.5")
            .body(Body::empty())
            .unwrap();
        let res = send(&router, request).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let request = Request::builder()
            .uri("/ping")
            .header("X-Real-IP", "10.1.2.3")
            .body(Body::empty())
            .unwrap();
        let res = send(&router, request).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn index_lists_metrics_sorted_by_name() {
        let router = router();
        for body in [
            r#"{"id":"zeta","type":"gauge","value":1.0}"#,
            r#"{"id":"alpha","type":"counter","delta":4}"#,
        ] {
            send(&router, json_post("/update/", body)).await;
        }

        let res = send(&router, get_req("/")).await;
        assert_eq!(res.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(res).await).unwrap();
        let alpha = html.find("alpha").unwrap();
        let zeta = html.find("zeta").unwrap();
        assert!(alpha < zeta);
        assert!(html.contains("<table>"));
    }

    #[tokio::test]
    async fn ping_reports_healthy_storage() {
        let res = send(&router(), get_req("/ping")).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}
