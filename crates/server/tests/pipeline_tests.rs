//! Streaming pipeline integration tests.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{TestServer, body_bytes, body_json, valid_token};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;

fn get(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, cookie: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn preview_without_clojure_code_is_rejected_before_any_network_call() {
    let mock = MockServer::start_async().await;
    let attachment = mock
        .mock_async(|when, then| {
            when.method(GET).path("/myassets/filestores/d/attachment");
            then.status(200);
        })
        .await;
    let server = TestServer::new(&mock.base_url()).await;
    let cookie = server.session_cookie(Some(valid_token()));

    let response = server
        .request(post_json("/preview/d", &cookie, json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("missing"));

    let response = server
        .request(post_json("/preview/d", &cookie, json!({ "clojure": 42 })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("not a string"));

    attachment.assert_hits_async(0).await;
}

#[tokio::test]
async fn source_failure_is_passed_through_verbatim_minus_cors_headers() {
    let mock = MockServer::start_async().await;
    mock.mock_async(|when, then| {
        when.method(GET).path("/myassets/filestores/d/attachment");
        then.status(503)
            .header("access-control-allow-origin", "*")
            .header("access-control-allow-credentials", "true")
            .header("x-upstream-detail", "maintenance")
            .body("store down");
    })
    .await;
    let server = TestServer::new(&mock.base_url()).await;
    let cookie = server.session_cookie(Some(valid_token()));

    let response = server.request(get("/preview_raw/d", &cookie)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().get("access-control-allow-origin").is_none());
    assert!(
        response
            .headers()
            .get("access-control-allow-credentials")
            .is_none()
    );
    assert_eq!(
        response.headers().get("x-upstream-detail").unwrap(),
        "maintenance"
    );
    assert_eq!(body_bytes(response).await, b"store down");
}

#[tokio::test]
async fn wizard_distribution_ids_route_to_the_wizard_sub_path() {
    let mock = MockServer::start_async().await;
    let wizard = mock
        .mock_async(|when, then| {
            when.method(GET).path("/myassets/upwizards/42/attachment");
            then.status(200).body("wizard file");
        })
        .await;
    let server = TestServer::new(&mock.base_url()).await;
    let cookie = server.session_cookie(Some(valid_token()));

    let response = server.request(get("/preview_raw/upwizards--42", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"wizard file");
    wizard.assert_hits_async(1).await;
}

#[tokio::test]
async fn preview_original_parses_the_file_through_the_engine() {
    let mock = MockServer::start_async().await;
    mock.mock_async(|when, then| {
        when.method(GET).path("/myassets/filestores/d/attachment");
        then.status(200).body("a,b\n1,2\n");
    })
    .await;
    let engine = mock
        .mock_async(|when, then| {
            when.method(POST)
                .path("/evaluate/pipe")
                .body_contains("defpipe my-pipe")
                .body_contains("my-pipe");
            then.status(200).body("parsed output");
        })
        .await;
    let server = TestServer::new(&mock.base_url()).await;
    let cookie = server.session_cookie(Some(valid_token()));

    let response = server.request(get("/preview_original/d", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"parsed output");
    engine.assert_hits_async(1).await;
}

#[tokio::test]
async fn transform_graft_sets_download_headers_and_strips_cors() {
    let mock = MockServer::start_async().await;
    mock.mock_async(|when, then| {
        when.method(GET)
            .path("/myassets/transformations/tr/configuration/code");
        then.status(200).body("(graft code)");
    })
    .await;
    mock.mock_async(|when, then| {
        when.method(GET).path("/myassets/filestores/dist/attachment");
        then.status(200)
            .header("content-disposition", "attachment; filename=\"mydata.csv\"")
            .body("a,b\n1,2\n");
    })
    .await;
    let engine = mock
        .mock_async(|when, then| {
            when.method(POST)
                .path("/evaluate/graft")
                .header("accept", "text/turtle")
                .body_contains("(graft code)")
                .body_contains("my-graft");
            then.status(200)
                .header("access-control-allow-origin", "*")
                .header("content-type", "application/octet-stream")
                .body("<subject> <predicate> <object> .");
        })
        .await;
    let server = TestServer::new(&mock.base_url()).await;
    let cookie = server.session_cookie(Some(valid_token()));

    let response = server
        .request(get(
            "/transform/dist/tr?type=graft&rdfFormat=ttl&useCache=false",
            &cookie,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/turtle"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"mydata-processed.ttl\""
    );
    assert!(response.headers().get("access-control-allow-origin").is_none());
    assert!(
        response
            .headers()
            .get("access-control-allow-credentials")
            .is_none()
    );
    assert_eq!(body_bytes(response).await, b"<subject> <predicate> <object> .");
    engine.assert_hits_async(1).await;
}

#[tokio::test]
async fn transform_pipe_defaults_to_csv_download_headers() {
    let mock = MockServer::start_async().await;
    mock.mock_async(|when, then| {
        when.method(GET)
            .path("/myassets/transformations/tr/configuration/code");
        then.status(200).body("(pipe code)");
    })
    .await;
    mock.mock_async(|when, then| {
        when.method(GET).path("/myassets/filestores/dist/attachment");
        then.status(200)
            .header("content-disposition", "attachment; filename=\"my data.csv\"")
            .body("a,b\n");
    })
    .await;
    mock.mock_async(|when, then| {
        when.method(POST).path("/evaluate/pipe");
        then.status(200).body("c,d\n3,4\n");
    })
    .await;
    let server = TestServer::new(&mock.base_url()).await;
    let cookie = server.session_cookie(Some(valid_token()));

    let response = server.request(get("/transform/dist/tr", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/csv"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"mydata-processed.csv\""
    );
}

#[tokio::test]
async fn engine_rejection_renders_html_unless_raw_is_requested() {
    let mock = MockServer::start_async().await;
    mock.mock_async(|when, then| {
        when.method(GET)
            .path("/myassets/transformations/tr/configuration/code");
        then.status(200).body("(code)");
    })
    .await;
    mock.mock_async(|when, then| {
        when.method(GET).path("/myassets/filestores/dist/attachment");
        then.status(200).body("a,b\n");
    })
    .await;
    mock.mock_async(|when, then| {
        when.method(POST).path("/evaluate/pipe");
        then.status(500).body("evaluation <failed>");
    })
    .await;
    let server = TestServer::new(&mock.base_url()).await;
    let cookie = server.session_cookie(Some(valid_token()));

    let html = server.request(get("/transform/dist/tr", &cookie)).await;
    assert_eq!(html.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        html.headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    let page = String::from_utf8(body_bytes(html).await).unwrap();
    assert!(page.contains("evaluation &lt;failed&gt;"));

    let raw = server
        .request(get("/transform/dist/tr?raw=true", &cookie))
        .await;
    assert_eq!(raw.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(raw).await;
    assert_eq!(body["data"], json!("evaluation <failed>"));
}

#[tokio::test]
async fn use_cache_routes_to_the_cache_endpoint_and_keeps_headers() {
    let mock = MockServer::start_async().await;
    mock.mock_async(|when, then| {
        when.method(GET)
            .path("/myassets/transformations/tr/configuration/code");
        then.status(200).body("(code)");
    })
    .await;
    mock.mock_async(|when, then| {
        when.method(GET).path("/myassets/filestores/dist/attachment");
        then.status(200).body("a,b\n");
    })
    .await;
    let cached = mock
        .mock_async(|when, then| {
            when.method(POST).path("/cache/evaluate/pipe");
            then.status(200)
                .header("content-type", "application/json")
                .body("{\"cached\":true}");
        })
        .await;
    let server = TestServer::new(&mock.base_url()).await;
    let cookie = server.session_cookie(Some(valid_token()));

    let response = server
        .request(get("/transform/dist/tr?useCache=true", &cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    // Cache responses keep their own headers.
    assert!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("application/json")
    );
    cached.assert_hits_async(1).await;
}
