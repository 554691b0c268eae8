use std::time::Duration;

use axum::{
    Router,
    body::{self, Body},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use auth_core::{
    auth::{Identity, TokenService},
    routes::API_PREFIX,
    test_helpers::{TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD, test_router},
};

const SECRET: &str = "integration-secret";

fn api_path(path: &str) -> String {
    format!("{API_PREFIX}{path}")
}

async fn app() -> Router {
    test_router(SECRET).await.expect("test router")
}

async fn json_response(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should succeed");
    let status = response.status();
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = serde_json::from_slice(&body).expect("json body");
    (status, json)
}

fn post_json(path: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(api_path(path))
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

fn register_body(email: &str, password: &str) -> Value {
    json!({
        "email": email,
        "full_name": "Ada Example",
        "password": password,
        "confirm_password": password,
    })
}

async fn login(app: &Router, email: &str, password: &str) -> Value {
    let (status, json) = json_response(
        app,
        post_json("/auth/login", json!({"email": email, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {json}");
    json["data"].clone()
}

fn refresh_request(access: &str, refresh: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(api_path("/auth/refresh"))
        .header("authorization", format!("Bearer {access}"))
        .header("x-refresh-token", refresh)
        .body(Body::empty())
        .expect("request")
}

fn me_request(access: &str) -> Request<Body> {
    Request::builder()
        .uri(api_path("/auth/me"))
        .header("authorization", format!("Bearer {access}"))
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn register_login_and_me() {
    let app = app().await;

    let (status, json) = json_response(
        &app,
        post_json("/auth/register", register_body("a@x.com", "pw123456")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], 201);
    assert_eq!(json["data"]["email"], "a@x.com");
    assert!(json["data"].get("password_hash").is_none());

    let tokens = login(&app, "a@x.com", "pw123456").await;
    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["expires_in"], 900);

    let access = tokens["access_token"].as_str().expect("access token");
    let (status, json) = json_response(&app, me_request(access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["email"], "a@x.com");
    assert_eq!(json["data"]["role"], "user");
    assert_eq!(json["data"]["provider"], "local");
}

#[tokio::test]
async fn duplicate_and_invalid_registrations_are_rejected() {
    let app = app().await;

    let (status, _) = json_response(
        &app,
        post_json("/auth/register", register_body("dup@x.com", "pw123456")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = json_response(
        &app,
        post_json("/auth/register", register_body("dup@x.com", "pw123456")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["status"], 409);

    let (status, json) = json_response(
        &app,
        post_json(
            "/auth/register",
            json!({
                "email": "other@x.com",
                "full_name": "Other",
                "password": "pw123456",
                "confirm_password": "pw654321",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "passwords do not match");
}

#[tokio::test]
async fn wrong_password_reads_as_unauthorized() {
    let app = app().await;

    let (status, json) = json_response(
        &app,
        post_json(
            "/auth/login",
            json!({"email": TEST_ADMIN_EMAIL, "password": "not-the-password"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "unauthorized");

    let (status, json) = json_response(
        &app,
        post_json(
            "/auth/login",
            json!({"email": "nobody@x.com", "password": "whatever1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "unauthorized");
}

#[tokio::test]
async fn refresh_rotates_and_rejects_replay() {
    let app = app().await;
    let first = login(&app, TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD).await;
    let access = first["access_token"].as_str().expect("access");
    let refresh = first["refresh_token"].as_str().expect("refresh");

    let (status, json) = json_response(&app, refresh_request(access, refresh)).await;
    assert_eq!(status, StatusCode::OK);
    let second = json["data"].clone();
    let new_refresh = second["refresh_token"].as_str().expect("new refresh");
    assert_ne!(new_refresh, refresh);

    let (status, json) = json_response(&app, refresh_request(access, refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "unauthorized");

    let new_access = second["access_token"].as_str().expect("new access");
    let (status, _) = json_response(&app, refresh_request(new_access, new_refresh)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_requires_both_headers() {
    let app = app().await;
    let tokens = login(&app, TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD).await;
    let access = tokens["access_token"].as_str().expect("access");

    let request = Request::builder()
        .method("POST")
        .uri(api_path("/auth/refresh"))
        .header("authorization", format!("Bearer {access}"))
        .body(Body::empty())
        .expect("request");
    let (status, _) = json_response(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_with_another_users_access_token_fails() {
    let app = app().await;
    let (status, _) = json_response(
        &app,
        post_json("/auth/register", register_body("b@x.com", "pw123456")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let admin = login(&app, TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD).await;
    let user = login(&app, "b@x.com", "pw123456").await;

    let (status, _) = json_response(
        &app,
        refresh_request(
            admin["access_token"].as_str().expect("access"),
            user["refresh_token"].as_str().expect("refresh"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_refresh_token() {
    let app = app().await;
    let tokens = login(&app, TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD).await;
    let access = tokens["access_token"].as_str().expect("access");
    let refresh = tokens["refresh_token"].as_str().expect("refresh");

    let request = Request::builder()
        .method("POST")
        .uri(api_path("/auth/logout"))
        .header("x-refresh-token", refresh)
        .body(Body::empty())
        .expect("request");
    let (status, json) = json_response(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"].is_null());

    let (status, _) = json_response(&app, refresh_request(access, refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_rejects_missing_and_forged_tokens() {
    let app = app().await;

    let request = Request::builder()
        .uri(api_path("/auth/me"))
        .body(Body::empty())
        .expect("request");
    let (status, json) = json_response(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["status"], 401);

    let forged = TokenService::new("some-other-secret", Duration::from_secs(60))
        .issue(
            &Identity {
                user_id: Uuid::new_v4(),
                email: "mallory@x.com".to_string(),
                role: "admin".to_string(),
                permissions: vec!["rbac:manage".to_string()],
                provider: "local".to_string(),
                session_id: Uuid::new_v4().to_string(),
                mfa_completed: false,
            },
            None,
        )
        .expect("issue");
    let (status, json) = json_response(&app, me_request(&forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "unauthorized");
}

#[tokio::test]
async fn malformed_body_and_unknown_route_use_envelope() {
    let app = app().await;

    let request = Request::builder()
        .method("POST")
        .uri(api_path("/auth/login"))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let (status, json) = json_response(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
    assert!(json["data"].is_null());

    let request = Request::builder()
        .uri(api_path("/nowhere"))
        .body(Body::empty())
        .expect("request");
    let (status, json) = json_response(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
}
