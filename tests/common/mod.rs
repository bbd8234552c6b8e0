//! Shared harness: the full router over an in-memory database, driven
//! in-process with `oneshot`.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use clap::Parser;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use kct_server::auth::password::hash_password;
use kct_server::auth::roles::Role;
use kct_server::db::seed::{seed_demo_data, DEMO_PASSWORD};
use kct_server::db::users::{self, NewUser};
use kct_server::db::Database;
use kct_server::{build_router, AppState, Args};

pub const ADMIN: &str = "test@example.com";
pub const DESIGNER: &str = "designer@example.com";
pub const QA: &str = "qa@example.com";
pub const TEACHER: &str = "teacher@example.com";
/// Admin of a second tenant, see [`TestApp::seed_other_tenant`]
pub const OTHER_ADMIN: &str = "admin@other.example.com";

const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Seeded app with limits high enough to never trigger
    pub fn new() -> Self {
        Self::with_limits(100_000, 100_000)
    }

    pub fn with_limits(max_requests: u32, login_max_requests: u32) -> Self {
        let max = max_requests.to_string();
        let login_max = login_max_requests.to_string();
        let args = Args::parse_from([
            "kct-server",
            "--database-path",
            ":memory:",
            "--jwt-secret",
            TEST_SECRET,
            "--rate-limit-max-requests",
            max.as_str(),
            "--login-rate-limit-max-requests",
            login_max.as_str(),
            "--default-page-size",
            "20",
            "--max-page-size",
            "100",
        ]);

        let db = Database::open_in_memory().expect("open database");
        seed_demo_data(&db).expect("seed demo data");
        let state = AppState::new(args, db).expect("build state");
        let router = build_router(state.clone());
        Self { router, state }
    }

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
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self.router.clone().oneshot(request).await.expect("call router");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Full login response for a seeded user
    pub async fn login_response(&self, email: &str) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": DEMO_PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body
    }

    /// Access token for a seeded user
    pub async fn login(&self, email: &str) -> String {
        self.login_response(email).await["access_token"]
            .as_str()
            .expect("access_token")
            .to_string()
    }

    /// A second tenant with one admin; returns that admin's token
    pub async fn seed_other_tenant(&self) -> String {
        let password_hash = hash_password(DEMO_PASSWORD).expect("hash password");
        self.state
            .db
            .with_conn(|conn| {
                users::insert_tenant(conn, "other-tenant", "Other School", "other")?;
                users::insert_user(
                    conn,
                    &NewUser {
                        tenant_id: "other-tenant",
                        campus_id: None,
                        email: OTHER_ADMIN,
                        password_hash: &password_hash,
                        full_name: "Other Admin",
                        role: Role::Admin,
                    },
                )
            })
            .expect("seed second tenant");
        self.login(OTHER_ADMIN).await
    }

    /// Framework -> version -> course -> unit, all created by `token`
    pub async fn seed_tree(&self, token: &str, code: &str) -> Tree {
        let (status, framework) = self
            .post("/api/v1/kct", token, json!({ "code": code, "name": format!("{} framework", code) }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", framework);
        let framework_id = id_of(&framework);

        let (status, version) = self
            .post(
                &format!("/api/v1/kct/{}/versions", framework_id),
                token,
                json!({ "version_no": "v1.0" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", version);
        let version_id = id_of(&version);

        let (status, course) = self
            .post(
                &format!("/api/v1/versions/{}/courses", version_id),
                token,
                json!({ "title": "Basics", "hours": 10.0 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", course);
        let course_id = id_of(&course);

        let (status, unit) = self
            .post(
                &format!("/api/v1/courses/{}/units", course_id),
                token,
                json!({
                    "title": "Greetings",
                    "hours": 1.0,
                    "objectives": ["Greet a classmate"],
                    "skills": ["speaking"],
                    "activities": [{ "type": "drill", "title": "Hello chain", "duration_minutes": 20 }],
                    "difficulty_level": "beginner"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", unit);
        let unit_id = id_of(&unit);

        Tree {
            framework_id,
            version_id,
            course_id,
            unit_id,
        }
    }
}

pub struct Tree {
    pub framework_id: String,
    pub version_id: String,
    pub course_id: String,
    pub unit_id: String,
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id field").to_string()
}

pub fn error_code(value: &Value) -> &str {
    value["error"]["code"].as_str().unwrap_or_default()
}
