use axum::{
    Router,
    body::{self, Body},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use auth_core::{
    routes::API_PREFIX,
    test_helpers::{TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD, test_router},
};

fn api_path(path: &str) -> String {
    format!("{API_PREFIX}{path}")
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

fn request(method: &str, path: &str, token: &str, payload: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(api_path(path))
        .header("authorization", format!("Bearer {token}"));
    match payload {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request")
}

async fn access_token(app: &Router, email: &str, password: &str) -> String {
    let login = Request::builder()
        .method("POST")
        .uri(api_path("/auth/login"))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"email": email, "password": password}).to_string(),
        ))
        .expect("request");
    let (status, json) = json_response(app, login).await;
    assert_eq!(status, StatusCode::OK, "login failed: {json}");
    json["data"]["access_token"]
        .as_str()
        .expect("access token")
        .to_string()
}

async fn admin_token(app: &Router) -> String {
    access_token(app, TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD).await
}

async fn register(app: &Router, email: &str, password: &str) {
    let body = json!({
        "email": email,
        "full_name": "Regular User",
        "password": password,
        "confirm_password": password,
    });
    let request = Request::builder()
        .method("POST")
        .uri(api_path("/auth/register"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    let (status, _) = json_response(app, request).await;
    assert_eq!(status, StatusCode::CREATED);
}

fn id_of(json: &Value) -> String {
    json["data"]["id"].as_str().expect("id").to_string()
}

#[tokio::test]
async fn rbac_routes_require_manage_permission() {
    let app = test_router("rbac-secret").await.expect("router");

    let anonymous = Request::builder()
        .uri(api_path("/rbac/roles"))
        .body(Body::empty())
        .expect("request");
    let (status, _) = json_response(&app, anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    register(&app, "plain@x.com", "pw123456").await;
    let token = access_token(&app, "plain@x.com", "pw123456").await;
    let (status, json) = json_response(&app, request("GET", "/rbac/roles", &token, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["status"], 403);

    let admin = admin_token(&app).await;
    let (status, json) = json_response(&app, request("GET", "/rbac/roles", &admin, None)).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = json["data"]
        .as_array()
        .expect("roles")
        .iter()
        .filter_map(|role| role["name"].as_str())
        .collect();
    assert_eq!(names, vec!["admin", "user"]);
}

#[tokio::test]
async fn grants_flow_into_join_queries_and_new_tokens() {
    let app = test_router("rbac-secret").await.expect("router");
    let admin = admin_token(&app).await;

    let (status, json) = json_response(
        &app,
        request("POST", "/rbac/permissions", &admin, Some(json!({"name": "todo:write"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let permission_id = id_of(&json);

    let (_, json) = json_response(
        &app,
        request("POST", "/rbac/permissions", &admin, Some(json!({"name": "todo:read"}))),
    )
    .await;
    let read_id = id_of(&json);

    let (status, json) = json_response(
        &app,
        request("GET", "/rbac/roles/by-name/user/permissions", &admin, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["permissions"], json!([]));

    let (_, roles) = json_response(&app, request("GET", "/rbac/roles", &admin, None)).await;
    let user_role_id = roles["data"]
        .as_array()
        .expect("roles")
        .iter()
        .find(|role| role["name"] == "user")
        .and_then(|role| role["id"].as_str())
        .expect("user role")
        .to_string();

    for id in [&permission_id, &read_id] {
        let (status, _) = json_response(
            &app,
            request(
                "POST",
                "/rbac/role-permissions",
                &admin,
                Some(json!({"role_id": user_role_id, "permission_id": id})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = json_response(
        &app,
        request(
            "POST",
            "/rbac/role-permissions",
            &admin,
            Some(json!({"role_id": user_role_id, "permission_id": permission_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "duplicate grant: {json}");

    let (_, json) = json_response(
        &app,
        request("GET", &format!("/rbac/roles/{user_role_id}/permissions"), &admin, None),
    )
    .await;
    assert_eq!(json["data"]["role"], "user");
    assert_eq!(json["data"]["permissions"], json!(["todo:read", "todo:write"]));

    let (_, json) = json_response(
        &app,
        request("GET", &format!("/rbac/permissions/{permission_id}/roles"), &admin, None),
    )
    .await;
    let holders: Vec<&str> = json["data"]
        .as_array()
        .expect("roles")
        .iter()
        .filter_map(|role| role["name"].as_str())
        .collect();
    assert_eq!(holders, vec!["user"]);

    register(&app, "granted@x.com", "pw123456").await;
    let token = access_token(&app, "granted@x.com", "pw123456").await;
    let me = Request::builder()
        .uri(api_path("/auth/me"))
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request");
    let (_, json) = json_response(&app, me).await;
    assert_eq!(json["data"]["permissions"], json!(["todo:read", "todo:write"]));
}

#[tokio::test]
async fn role_crud_and_strict_delete() {
    let app = test_router("rbac-secret").await.expect("router");
    let admin = admin_token(&app).await;

    let (status, json) = json_response(
        &app,
        request("POST", "/rbac/roles", &admin, Some(json!({"name": "editor"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let editor_id = id_of(&json);

    let (status, _) = json_response(
        &app,
        request("POST", "/rbac/roles", &admin, Some(json!({"name": "editor"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = json_response(
        &app,
        request("POST", "/rbac/roles", &admin, Some(json!({"name": "   "}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = json_response(
        &app,
        request(
            "PUT",
            &format!("/rbac/roles/{editor_id}"),
            &admin,
            Some(json!({"name": "writer"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "writer");

    let (status, _) = json_response(
        &app,
        request("DELETE", &format!("/rbac/roles/{editor_id}"), &admin, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = json_response(
        &app,
        request("GET", &format!("/rbac/roles/{editor_id}"), &admin, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // admin still holds rbac:manage
    let (_, roles) = json_response(&app, request("GET", "/rbac/roles", &admin, None)).await;
    let admin_role_id = roles["data"]
        .as_array()
        .expect("roles")
        .iter()
        .find(|role| role["name"] == "admin")
        .and_then(|role| role["id"].as_str())
        .expect("admin role")
        .to_string();
    let (status, _) = json_response(
        &app,
        request("DELETE", &format!("/rbac/roles/{admin_role_id}"), &admin, None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn grant_can_be_repointed_and_removed() {
    let app = test_router("rbac-secret").await.expect("router");
    let admin = admin_token(&app).await;

    let (_, json) = json_response(
        &app,
        request("POST", "/rbac/permissions", &admin, Some(json!({"name": "a:one"}))),
    )
    .await;
    let first = id_of(&json);
    let (_, json) = json_response(
        &app,
        request("POST", "/rbac/permissions", &admin, Some(json!({"name": "a:two"}))),
    )
    .await;
    let second = id_of(&json);
    let (_, json) = json_response(
        &app,
        request("POST", "/rbac/roles", &admin, Some(json!({"name": "auditor"}))),
    )
    .await;
    let role_id = id_of(&json);

    let (_, json) = json_response(
        &app,
        request(
            "POST",
            "/rbac/role-permissions",
            &admin,
            Some(json!({"role_id": role_id, "permission_id": first})),
        ),
    )
    .await;
    let grant_id = id_of(&json);

    let (status, json) = json_response(
        &app,
        request(
            "PUT",
            &format!("/rbac/role-permissions/{grant_id}"),
            &admin,
            Some(json!({"role_id": role_id, "permission_id": second})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["permission_id"], second.as_str());

    let (_, json) = json_response(
        &app,
        request("GET", "/rbac/roles/by-name/auditor/permissions", &admin, None),
    )
    .await;
    assert_eq!(json["data"]["permissions"], json!(["a:two"]));

    let (status, _) = json_response(
        &app,
        request("DELETE", &format!("/rbac/role-permissions/{grant_id}"), &admin, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = json_response(
        &app,
        request("DELETE", &format!("/rbac/permissions/{second}"), &admin, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_role_name_is_not_found() {
    let app = test_router("rbac-secret").await.expect("router");
    let admin = admin_token(&app).await;

    let (status, json) = json_response(
        &app,
        request("GET", "/rbac/roles/by-name/ghost/permissions", &admin, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
}
