use inkwell::{
    AppConfig, AppState, InMemoryRepository, LocalUploadStore, config::UploadBackend,
    create_router,
};
use reqwest::multipart;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub uploads_dir: std::path::PathBuf,
}

/// Serves the full router on an ephemeral port with the in-memory store and local uploads.
async fn spawn_app() -> TestApp {
    let uploads_dir = std::env::temp_dir().join(format!("inkwell-api-{}", Uuid::new_v4()));

    let mut config = AppConfig::default();
    config.upload_backend = UploadBackend::Local;
    config.uploads_dir = uploads_dir.to_string_lossy().into_owned();

    let state = AppState::new(
        config,
        Arc::new(InMemoryRepository::new()),
        Arc::new(LocalUploadStore::new(&uploads_dir)),
    );
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}/api", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        uploads_dir,
    }
}

async fn register(client: &reqwest::Client, app: &TestApp, username: &str) -> String {
    let body: Value = client
        .post(format!("{}/auth/register", app.address))
        .json(&json!({
            "username": username,
            "email": format!("{username}@x.com"),
            "password": "secret1"
        }))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let root = app.address.trim_end_matches("/api");
    let response = reqwest::get(format!("{root}/health")).await.expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_publishing_walkthrough() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let alice = register(&client, &app, "alice").await;
    let bob = register(&client, &app, "bob").await;

    // Alice publishes with an image.
    let form = multipart::Form::new()
        .text("title", "Hi")
        .text("content", "World")
        .part(
            "featuredImage",
            multipart::Part::bytes(b"\x89PNG\r\n".to_vec())
                .file_name("cover.png")
                .mime_str("image/png")
                .unwrap(),
        );
    let response = client
        .post(format!("{}/posts", app.address))
        .header("x-auth-token", &alice)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let post: Value = response.json().await.unwrap();
    let post_id = post["id"].as_str().unwrap().to_string();
    let image = post["featuredImage"].as_str().unwrap().to_string();
    assert!(image.starts_with("/uploads/"));

    // The stored image is served back.
    let root = app.address.trim_end_matches("/api");
    let served = client.get(format!("{root}{image}")).send().await.unwrap();
    assert_eq!(served.status(), 200);
    assert_eq!(served.bytes().await.unwrap().as_ref(), b"\x89PNG\r\n");

    // Bob cannot edit it, whatever he sends.
    let response = client
        .put(format!("{}/posts/{post_id}", app.address))
        .header("x-auth-token", &bob)
        .multipart(multipart::Form::new().text("title", ""))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    // Bob comments; the list comes back with his username.
    let comments: Value = client
        .post(format!("{}/posts/{post_id}/comments", app.address))
        .header("x-auth-token", &bob)
        .json(&json!({ "text": "nice" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(comments[0]["user"]["username"], "bob");

    // Anyone can read it.
    let fetched: Value = client
        .get(format!("{}/posts/{post_id}", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["author"]["username"], "alice");
    assert_eq!(fetched["comments"].as_array().unwrap().len(), 1);

    // Alice deletes it.
    let response = client
        .delete(format!("{}/posts/{post_id}", app.address))
        .header("x-auth-token", &alice)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .get(format!("{}/posts/{post_id}", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    tokio::fs::remove_dir_all(&app.uploads_dir).await.ok();
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = spawn_app().await;
    let response = reqwest::Client::new()
        .get(format!("{}/posts", app.address))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("abc-123")
    );
}
