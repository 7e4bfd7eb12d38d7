//! End-to-end tests through the Axum transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{ALLOW, SET_COOKIE};
use axum::http::{Request as HttpRequest, StatusCode};
use tower::ServiceExt;

use lightmoon::error::AppError;
use lightmoon::handler::BoxError;
use lightmoon::http::X_REQUEST_ID;
use lightmoon::{
    handler_fn, middleware_fn, App, AppConfig, Callback, Lifecycle, Next, Registrar, Request,
    Response, ResponseCookie,
};

mod common;

fn app() -> App {
    let mut config = AppConfig::default();
    config.server.body_limit_bytes = 64;
    let mut app = App::new(config);

    app.get(
        "/users/{id}",
        handler_fn(|req: Request, res: Response| async move {
            let id = req.param("id").unwrap_or_default().to_string();
            Ok(res
                .with_cookie(ResponseCookie {
                    path: Some("/".into()),
                    http_only: true,
                    ..ResponseCookie::new("last_user", id.clone())
                })
                .with_text(format!("user {id}")))
        }),
    );
    app.post(
        "/echo",
        handler_fn(|req: Request, res: Response| async move { Ok(res.with_body(req.body())) }),
    )
    .middleware(middleware_fn(|req: Request, res: Response, next: Next| async move {
        let response = next.run(req, res).await?;
        Ok(response.with_status(StatusCode::CREATED))
    }));
    app.get(
        "/fail",
        handler_fn(|_req: Request, _res: Response| async move {
            Err::<Response, BoxError>("boom".into())
        }),
    );
    app
}

async fn call(request: HttpRequest<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let router = app().build().unwrap().router().unwrap();
    let response = router.oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    (parts.status, parts.headers, String::from_utf8(bytes.to_vec()).unwrap())
}

fn get(uri: &str) -> HttpRequest<Body> {
    HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_found_route_over_transport() {
    let (status, headers, body) = call(get("/users/7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "user 7");
    let cookie = headers[SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("last_user=7"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
    assert!(headers.contains_key(X_REQUEST_ID));
}

#[tokio::test]
async fn test_misses_over_transport() {
    let (status, _, body) = call(get("/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Not Found");

    let (status, headers, body) = call(get("/echo")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers[ALLOW], "POST");
    assert_eq!(body, "Method Not Allowed");
}

#[tokio::test]
async fn test_middleware_over_transport() {
    let request = HttpRequest::builder()
        .method("POST")
        .uri("/echo")
        .body(Body::from("ping"))
        .unwrap();
    let (status, _, body) = call(request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, "ping");
}

#[tokio::test]
async fn test_handler_failure_is_bare_500() {
    let (status, _, body) = call(get("/fail")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_body_over_limit_is_413() {
    let request = HttpRequest::builder()
        .method("POST")
        .uri("/echo")
        .body(Body::from(vec![b'x'; 65]))
        .unwrap();
    let (status, _, _) = call(request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[test]
fn test_invalid_routes_abort_build() {
    let mut app = App::default();
    app.get("/ok", Callback::service("handlers.missing"));
    app.get("/bad/{", Callback::service("handlers.missing"));

    match app.build() {
        Err(AppError::Configuration(errors)) => assert_eq!(errors.len(), 2),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("build should fail"),
    }
}

#[tokio::test]
async fn test_real_listener_lifecycle() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut app = app();

    let log = events.clone();
    app.on(Lifecycle::start(move |info| {
        log.lock().unwrap().push(format!("start {}", info.local_addr.port()));
    }));
    let log = events.clone();
    app.on_shutdown(move || log.lock().unwrap().push("shutdown".to_string()));

    let (addr, shutdown, handle) = common::spawn_app(app).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/users/42"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "user 42");

    let response = client
        .head(format!("http://{addr}/users/42"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .post(format!("http://{addr}/echo"))
        .body("over the wire")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(response.text().await.unwrap(), "over the wire");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![format!("start {}", addr.port()), "shutdown".to_string()]
    );
}
