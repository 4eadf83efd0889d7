use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

// --- echo ---

#[tokio::test]
async fn echo_get_root() {
    let resp = app()
        .oneshot(Request::builder().uri("/").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.path, "/");
    assert!(echo.query.is_none());
    assert!(echo.body.is_empty());
}

#[tokio::test]
async fn echo_reports_query_verbatim() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/users/42/posts?limit=5&q=a+b")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.path, "/users/42/posts");
    assert_eq!(echo.query.as_deref(), Some("limit=5&q=a+b"));
}

#[tokio::test]
async fn echo_reports_headers_and_body() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/items")
                .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header(http::header::AUTHORIZATION, "Bearer abc")
                .body("name=a%26b".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.headers["content-type"], "application/x-www-form-urlencoded");
    assert_eq!(echo.headers["authorization"], "Bearer abc");
    assert_eq!(echo.body, "name=a%26b");
}

#[tokio::test]
async fn echo_accepts_any_method() {
    for method in ["PUT", "PATCH", "DELETE", "OPTIONS"] {
        let resp = app()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri("/anything")
                    .body(String::new())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let echo: Echo = body_json(resp).await;
        assert_eq!(echo.method, method);
    }
}

// --- status ---

#[tokio::test]
async fn status_route_answers_with_requested_code() {
    let resp = app()
        .oneshot(Request::builder().uri("/status/404").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.path, "/status/404");
}

#[tokio::test]
async fn status_route_server_error() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/status/503")
                .body("payload".to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.body, "payload");
}

#[tokio::test]
async fn status_route_out_of_range_is_bad_request() {
    let resp = app()
        .oneshot(Request::builder().uri("/status/42").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_route_non_numeric_is_rejected() {
    let resp = app()
        .oneshot(Request::builder().uri("/status/teapot").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_bytes(resp).await;
    assert!(!body.is_empty());
}
