/// Shared setup for API integration tests
///
/// Each test gets its own in-memory storage with a bootstrap admin, and
/// drives the router in-process.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use pactrack_api::app::{bootstrap_admin, build_router, AppState};
use pactrack_api::config::Config;
use pactrack_shared::storage::{MemStorage, Storage};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub struct TestContext {
    pub storage: Arc<dyn Storage>,
    pub app: Router,
    pub admin_token: String,
}

impl TestContext {
    pub async fn new() -> Self {
        let config = Config::from_lookup(|key| {
            let value = match key {
                "STORAGE_BACKEND" => Some("memory"),
                "JWT_SECRET" => Some(JWT_SECRET),
                "ADMIN_USERNAME" => Some(ADMIN_USERNAME),
                "ADMIN_PASSWORD" => Some(ADMIN_PASSWORD),
                _ => None,
            };
            value.map(str::to_string)
        })
        .expect("Failed to build test config");

        let storage: Arc<dyn Storage> = Arc::new(MemStorage::new());
        bootstrap_admin(storage.as_ref(), &config.admin)
            .await
            .expect("Failed to bootstrap admin");

        let state = AppState::new(storage.clone(), config).expect("Failed to build state");
        let app = build_router(state);

        let mut ctx = TestContext {
            storage,
            app,
            admin_token: String::new(),
        };
        ctx.admin_token = ctx.login(ADMIN_USERNAME, ADMIN_PASSWORD).await;
        ctx
    }

    /// Sends a request and returns status plus parsed JSON body (Null when empty)
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .post(
                "/v1/auth/login",
                None,
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["accessToken"].as_str().unwrap().to_string()
    }

    /// Registers a lawyer, returning `(user id, access token)`
    pub async fn register_lawyer(&self, username: &str) -> (i64, String) {
        let (status, body) = self
            .post(
                "/v1/auth/register",
                None,
                json!({ "username": username, "password": "lawyer-pass" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        (
            body["user"]["id"].as_i64().unwrap(),
            body["accessToken"].as_str().unwrap().to_string(),
        )
    }

    /// Creates a contract as `token`, returning the response body
    pub async fn create_contract(&self, token: &str, body: Value) -> Value {
        let (status, created) = self.post("/v1/contracts", Some(token), body).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", created);
        created
    }
}

/// A valid contract body; `end_date` is any accepted date string
pub fn contract_body(inn: &str, end_date: &str) -> Value {
    json!({
        "companyName": "Romashka LLC",
        "inn": inn,
        "director": "Petrov P.P.",
        "address": "Moscow, Tverskaya 1",
        "endDate": end_date,
        "comments": "",
        "hasND": false
    })
}
