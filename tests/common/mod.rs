// Shared helpers for the HTTP integration tests
#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::PathBuf;

use rewear_exchange::{build_router, AppConfig, AppState};

pub const ADMIN_EMAIL: &str = "admin@rewear.test";

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub data_dir: PathBuf,
}

/// Start the full router on an ephemeral port with a throwaway state file
pub async fn spawn_app() -> TestApp {
    let data_dir = std::env::temp_dir().join(format!("rewear-it-{}", uuid::Uuid::new_v4()));
    let mut config = AppConfig {
        state_path: data_dir.join("state.json"),
        uploads_dir: data_dir.join("uploads"),
        password_cost: 4,
        ..AppConfig::default()
    };
    config.admin_emails.insert(ADMIN_EMAIL.to_string());

    let uploads = config.uploads_dir.clone();
    let state = AppState::new(config).shared();
    let app = build_router(state, &uploads);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server crashed");
    });

    TestApp { base_url: format!("http://{}/api", addr), client: reqwest::Client::new(), data_dir }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register a user and return their bearer token
    pub async fn register(&self, name: &str, email: &str) -> String {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({ "name": name, "email": email, "password": "secret123" }))
            .send()
            .await
            .expect("Failed to register");
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.expect("Failed to parse response");
        body["data"]["token"].as_str().expect("token missing").to_string()
    }

    /// List an item and return its id
    pub async fn list_item(&self, token: &str, title: &str, category: &str, condition: &str) -> String {
        let response = self
            .client
            .post(self.url("/items"))
            .bearer_auth(token)
            .json(&json!({
                "title": title,
                "description": "Gently used, washed and ready to go",
                "category": category,
                "size": "M",
                "condition": condition,
                "images": ["/uploads/sample.jpg"],
            }))
            .send()
            .await
            .expect("Failed to list item");
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.expect("Failed to parse response");
        body["data"]["id"].as_str().expect("item id missing").to_string()
    }

    pub async fn balance(&self, token: &str) -> i64 {
        let body: Value = self
            .client
            .get(self.url("/points"))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to load points")
            .json()
            .await
            .expect("Failed to parse response");
        body["data"]["balance"].as_i64().expect("balance missing")
    }

    pub async fn item(&self, id: &str) -> Value {
        let body: Value = self
            .client
            .get(self.url(&format!("/items/{}", id)))
            .send()
            .await
            .expect("Failed to load item")
            .json()
            .await
            .expect("Failed to parse response");
        body["data"]["item"].clone()
    }

    pub async fn me(&self, token: &str) -> Value {
        let body: Value = self
            .client
            .get(self.url("/auth/me"))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to load profile")
            .json()
            .await
            .expect("Failed to parse response");
        body["data"]["user"].clone()
    }

    pub async fn create_swap(&self, token: &str, offered: &str, requested: &str) -> reqwest::Response {
        self.client
            .post(self.url("/swaps/create"))
            .bearer_auth(token)
            .json(&json!({ "offeredItemId": offered, "requestedItemId": requested }))
            .send()
            .await
            .expect("Failed to create swap")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}
