#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use aperture::app::users::Argon2Hasher;
use aperture::store::Stores;
use aperture::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

// 32-byte test-only token key — NOT used in production.
const TEST_TOKEN_KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";
pub const DEFAULT_PASSWORD: &str = "testpassword123";

// ---------------------------------------------------------------------------
// TestApp — fresh per test, backed by the in-memory stores
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub access_token: String,
}

/// Build a fresh app. The in-memory backend makes this cheap, and no graph
/// state leaks between tests.
pub async fn app() -> TestApp {
    let state = AppState {
        stores: Stores::memory(),
        hasher: Arc::new(Argon2Hasher),
        token_key: TEST_TOKEN_KEY,
        access_ttl_minutes: 60,
    };
    let router = aperture::http::router(state.clone());
    TestApp { router, state }
}

impl TestApp {
    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::GET, path, None, &headers).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::PATCH, path, Some(body), &headers)
            .await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::DELETE, path, None, &headers).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Sign a user up through the API and log in for a token.
    pub async fn create_user(&self, suffix: &str) -> TestUser {
        let username = format!("testuser_{}", suffix);
        let email = format!("test_{}@example.com", suffix);

        let resp = self
            .post_json(
                "/users",
                json!({
                    "username": &username,
                    "email": &email,
                    "password": DEFAULT_PASSWORD,
                }),
                None,
            )
            .await;
        assert_eq!(
            resp.status,
            StatusCode::OK,
            "signup failed: {}",
            resp.error_message()
        );
        let id = Uuid::parse_str(resp.json()["id"].as_str().unwrap()).unwrap();

        let resp = self
            .post_json(
                "/auth/login",
                json!({ "identifier": &username, "password": DEFAULT_PASSWORD }),
                None,
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        let access_token = resp.json()["access_token"].as_str().unwrap().to_string();

        TestUser {
            id,
            username,
            email,
            access_token,
        }
    }

    /// Like `create_user`, but the account is flipped private right away.
    pub async fn create_private_user(&self, suffix: &str) -> TestUser {
        let user = self.create_user(suffix).await;
        let resp = self
            .patch_json(
                &format!("/users/{}", user.id),
                json!({ "is_private": true }),
                Some(&user.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK);
        user
    }

    /// Create a single-image post and return its id.
    pub async fn create_post_for_user(&self, user: &TestUser, description: &str) -> Uuid {
        let resp = self
            .post_json(
                "/posts",
                json!({
                    "description": description,
                    "images": ["https://cdn.example.com/img.jpg"],
                }),
                Some(&user.access_token),
            )
            .await;
        assert_eq!(
            resp.status,
            StatusCode::OK,
            "create post failed: {}",
            resp.error_message()
        );
        Uuid::parse_str(resp.json()["id"].as_str().unwrap()).unwrap()
    }
}
