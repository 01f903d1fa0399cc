use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use inkwell::{
    AppConfig, AppState, InMemoryRepository, MockUploadStore, auth::AUTH_TOKEN_HEADER,
    create_router,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

// --- Test Utilities ---

const BOUNDARY: &str = "inkwell-test-boundary";

fn app() -> Router {
    create_router(AppState::new(
        AppConfig::default(),
        Arc::new(InMemoryRepository::new()),
        Arc::new(MockUploadStore::new()),
    ))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTH_TOKEN_HEADER, token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTH_TOKEN_HEADER, token);
    }
    builder.body(Body::empty()).unwrap()
}

/// Hand-built multipart body: text fields plus an optional `featuredImage` file part.
fn multipart_request(
    method: &str,
    uri: &str,
    token: &str,
    fields: &[(&str, &str)],
    image: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"featuredImage\"; \
                 filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(AUTH_TOKEN_HEADER, token)
        .body(Body::from(body))
        .unwrap()
}

async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({
                "username": username,
                "email": format!("{username}@x.com"),
                "password": "secret1"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {body}");
    body["token"].as_str().unwrap().to_string()
}

async fn create_post(app: &Router, token: &str, title: &str) -> Value {
    let (status, body) = send(
        app,
        multipart_request(
            "POST",
            "/api/posts",
            token,
            &[("title", title), ("content", "World")],
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body
}

// --- Tests ---

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let response = app
        .oneshot(empty_request("GET", "/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = app();
    let (status, body) = send(&app, empty_request("GET", "/api-docs/openapi.json", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/posts/{id}"].is_object());
}

#[tokio::test]
async fn test_protected_routes_require_a_token() {
    let app = app();
    let id = uuid::Uuid::new_v4();

    let requests = vec![
        empty_request("GET", "/api/auth/me", None),
        json_request("POST", "/api/categories", None, json!({ "name": "Rust" })),
        empty_request("POST", "/api/posts", None),
        empty_request("PUT", &format!("/api/posts/{id}"), None),
        empty_request("DELETE", &format!("/api/posts/{id}"), None),
        json_request(
            "POST",
            &format!("/api/posts/{id}/comments"),
            None,
            json!({ "text": "hi" }),
        ),
        empty_request("GET", "/api/auth/me", Some("not-a-token")),
    ];

    for request in requests {
        let uri = request.uri().clone();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(body["message"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_routes_are_served_with_and_without_api_prefix() {
    let app = app();
    let (status, _) = send(&app, empty_request("GET", "/api/posts", None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, empty_request("GET", "/posts", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_bearer_header_is_accepted() {
    let app = app();
    let token = register(&app, "alice").await;

    let request = Request::builder()
        .uri("/api/auth/me")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn test_me_never_exposes_credentials() {
    let app = app();
    let token = register(&app, "alice").await;

    let (status, body) = send(&app, empty_request("GET", "/api/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alice@x.com");
    let object = body.as_object().unwrap();
    assert!(object.keys().all(|k| !k.to_lowercase().contains("password")));
}

#[tokio::test]
async fn test_register_and_login_errors() {
    let app = app();
    register(&app, "alice").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "username": "alice", "email": "alice@x.com", "password": "secret1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User already exists");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "username": "bob", "email": "bob@x.com", "password": "12345" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("6 characters"));

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "alice@x.com", "password": "wrong-one" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid credentials");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "alice@x.com", "password": "secret1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn test_post_round_trip_with_image() {
    let app = app();
    let token = register(&app, "alice").await;

    let (status, created) = send(
        &app,
        multipart_request(
            "POST",
            "/api/posts",
            &token,
            &[("title", "Hi"), ("content", "World")],
            Some(("cat.png", &b"\x89PNG"[..])),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(
        created["featuredImage"]
            .as_str()
            .unwrap()
            .starts_with("/uploads/")
    );

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = send(&app, empty_request("GET", &format!("/api/posts/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Hi");
    assert_eq!(fetched["author"]["username"], "alice");
    assert_eq!(fetched["category"], Value::Null);
    assert!(fetched["createdAt"].is_string());
    assert!(fetched["updatedAt"].is_string());
}

#[tokio::test]
async fn test_create_post_validation_is_bad_request() {
    let app = app();
    let token = register(&app, "alice").await;

    let (status, body) = send(
        &app,
        multipart_request("POST", "/api/posts", &token, &[("content", "World")], None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Title is required");

    let (status, _) = send(
        &app,
        multipart_request(
            "POST",
            "/api/posts",
            &token,
            &[("title", "Hi"), ("content", "World")],
            Some(("notes.txt", &b"text"[..])),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ownership_is_enforced() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let post = create_post(&app, &alice, "Hi").await;
    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());

    let (status, body) = send(
        &app,
        multipart_request("PUT", &uri, &bob, &[("title", "Mine")], None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].is_string());

    let (status, _) = send(&app, empty_request("DELETE", &uri, Some(&bob))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = send(
        &app,
        multipart_request("PUT", &uri, &alice, &[("title", "Edited")], None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Edited");
    assert_eq!(updated["content"], "World");

    let (status, body) = send(&app, empty_request("DELETE", &uri, Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Post deleted successfully");

    let (status, _) = send(&app, empty_request("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_post_id_is_not_found() {
    let app = app();
    let (status, body) = send(&app, empty_request("GET", "/api/posts/not-an-id", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Post not found");
}

#[tokio::test]
async fn test_comments_use_user_key_and_newest_first() {
    let app = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let post = create_post(&app, &alice, "Hi").await;
    let uri = format!("/api/posts/{}/comments", post["id"].as_str().unwrap());

    send(
        &app,
        json_request("POST", &uri, Some(&alice), json!({ "text": "first" })),
    )
    .await;
    let (status, comments) = send(
        &app,
        json_request("POST", &uri, Some(&bob), json!({ "text": "second" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let comments = comments.as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["text"], "second");
    assert_eq!(comments[0]["user"]["username"], "bob");
    assert_eq!(comments[1]["user"]["username"], "alice");

    let (status, body) = send(
        &app,
        json_request("POST", &uri, Some(&bob), json!({ "text": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Comment text is required");
}

#[tokio::test]
async fn test_listing_tolerates_bad_query_values() {
    let app = app();
    let token = register(&app, "alice").await;
    for i in 0..3 {
        create_post(&app, &token, &format!("p{i}")).await;
    }

    let (status, page) = send(
        &app,
        empty_request("GET", "/api/posts?page=abc&limit=-4", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["currentPage"], 1);
    assert_eq!(page["totalPages"], 1);
    assert_eq!(page["total"], 3);
    assert_eq!(page["posts"].as_array().unwrap().len(), 3);
    assert_eq!(page["posts"][0]["title"], "p2");

    let (_, page) = send(&app, empty_request("GET", "/api/posts?page=2&limit=2", None)).await;
    assert_eq!(page["totalPages"], 2);
    assert_eq!(page["posts"].as_array().unwrap().len(), 1);
    assert_eq!(page["posts"][0]["title"], "p0");
}

#[tokio::test]
async fn test_categories_flow() {
    let app = app();
    let token = register(&app, "alice").await;

    let (status, category) = send(
        &app,
        json_request(
            "POST",
            "/api/categories",
            Some(&token),
            json!({ "name": "Rust", "description": "systems" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(category["name"], "Rust");

    let (status, _) = send(
        &app,
        json_request("POST", "/api/categories", Some(&token), json!({ "name": "Rust" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, categories) = send(&app, empty_request("GET", "/api/categories", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(categories.as_array().unwrap().len(), 1);

    let (status, post) = send(
        &app,
        multipart_request(
            "POST",
            "/api/posts",
            &token,
            &[
                ("title", "Hi"),
                ("content", "World"),
                ("category", category["id"].as_str().unwrap()),
            ],
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["category"]["name"], "Rust");
}

#[tokio::test]
async fn test_undecodable_json_bodies_are_bad_request() {
    let app = app();
    let token = register(&app, "alice").await;
    let post = create_post(&app, &token, "Hi").await;
    let post_id = post["id"].as_str().unwrap();

    // Wrongly typed field.
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "username": "bob", "email": "bob@x.com", "password": 123456 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    // Explicit null where a string is required.
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/posts/{post_id}/comments"),
            Some(&token),
            json!({ "text": null }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    // Body that is not JSON at all.
    let request = Request::builder()
        .method("POST")
        .uri("/api/categories")
        .header("Content-Type", "application/json")
        .header(AUTH_TOKEN_HEADER, &token)
        .body(Body::from("{ name: "))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    // Missing content type.
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .body(Body::from(
            json!({ "email": "alice@x.com", "password": "secret1" }).to_string(),
        ))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_unsupported_methods_are_not_masked_by_auth() {
    let app = app();
    let token = register(&app, "alice").await;
    let post = create_post(&app, &token, "Hi").await;
    let post_id = post["id"].as_str().unwrap();

    for uri in [format!("/api/posts/{post_id}"), format!("/posts/{post_id}")] {
        let response = app
            .clone()
            .oneshot(empty_request("PATCH", &uri, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{uri}");
    }

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/api/auth/register", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    // The guarded methods on the same path still demand a token.
    let (status, _) = send(
        &app,
        empty_request("DELETE", &format!("/api/posts/{post_id}"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, fetched) = send(&app, empty_request("GET", &format!("/api/posts/{post_id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Hi");
}
