// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end tests.
//!
//! [`MockApi`] is an in-process imitation of the blog API's user endpoints
//! with one account and one valid token pair at a time. [`Quill`] runs the
//! real `quill` binary against it with an isolated state directory.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

pub const MOCK_EMAIL: &str = "ada@example.com";
pub const MOCK_PASSWORD: &str = "secret";

const LOGIN: &str = "/User/login";
const REGISTER: &str = "/User/register";
const REFRESH: &str = "/User/refresh-token";
const CHANGE_PASSWORD: &str = "/User/change-password";
const POSTS: &str = "/Post";

/// Resolve the path to the compiled `quill` binary.
pub fn quill_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("quill")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

struct ApiState {
    password: Mutex<String>,
    access: Mutex<Option<String>>,
    refresh: Mutex<Option<String>>,
    issued: AtomicU64,
    refresh_calls: AtomicU64,
    refresh_revoked: AtomicBool,
    refresh_delay_ms: AtomicU64,
    authorization: Mutex<Vec<(String, Option<String>)>>,
}

impl ApiState {
    fn record(&self, path: &str, headers: &HeaderMap) {
        let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_owned);
        self.authorization.lock().push((path.to_owned(), header));
    }

    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let sent = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match (sent, self.access.lock().as_deref()) {
            (Some(sent), Some(valid)) => sent == valid,
            _ => false,
        }
    }

    fn issue(&self) -> Value {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("access-{n}");
        let refresh_token = format!("refresh-{n}");
        *self.access.lock() = Some(token.clone());
        *self.refresh.lock() = Some(refresh_token.clone());
        json!({
            "user": {
                "id": "user-1",
                "firstName": "Ada",
                "lastName": "Lovelace",
                "email": MOCK_EMAIL,
                "roleId": "role-1",
                "roleName": "Author",
                "createdDate": "2024-01-01T00:00:00Z",
                "updatedDate": "2024-01-01T00:00:00Z"
            },
            "token": token,
            "refreshToken": refresh_token
        })
    }
}

fn ok(data: Value) -> Response {
    Json(json!({ "success": true, "message": null, "data": data })).into_response()
}

fn fail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message, "data": null }))).into_response()
}

async fn login(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(LOGIN, &headers);
    let password_ok = *state.password.lock() == body["password"];
    if body["email"] == MOCK_EMAIL && password_ok {
        ok(state.issue())
    } else {
        fail(StatusCode::UNAUTHORIZED, "Invalid email or password")
    }
}

async fn register(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(REGISTER, &headers);
    if body["email"] == MOCK_EMAIL {
        return fail(StatusCode::BAD_REQUEST, "Email is already registered");
    }
    ok(json!("registered"))
}

async fn refresh(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(REFRESH, &headers);
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    let known = state.refresh.lock().as_deref().is_some_and(|r| body["refreshToken"] == r);
    if state.refresh_revoked.load(Ordering::SeqCst) || !known {
        return fail(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }
    ok(state.issue())
}

async fn change_password(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(CHANGE_PASSWORD, &headers);
    if !state.is_authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut password = state.password.lock();
    if *password != body["oldPassword"] {
        return fail(StatusCode::BAD_REQUEST, "Old password is incorrect");
    }
    *password = body["newPassword"].as_str().unwrap_or_default().to_owned();
    ok(json!(true))
}

async fn posts(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.record(POSTS, &headers);
    if !state.is_authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let page: u64 = params.get("pageNumber").and_then(|p| p.parse().ok()).unwrap_or(1);
    ok(json!({
        "data": [{ "id": "post-1", "title": "Hello, world" }],
        "totalCount": 1,
        "pageNumber": page,
        "pageSize": 10,
        "totalPages": 1,
        "hasPreviousPage": false,
        "hasNextPage": false
    }))
}

/// A running mock API, stopped on drop.
pub struct MockApi {
    addr: SocketAddr,
    state: Arc<ApiState>,
    task: tokio::task::JoinHandle<()>,
}

impl MockApi {
    /// Bind to a random port and serve.
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(ApiState {
            password: Mutex::new(MOCK_PASSWORD.to_owned()),
            access: Mutex::new(None),
            refresh: Mutex::new(None),
            issued: AtomicU64::new(0),
            refresh_calls: AtomicU64::new(0),
            refresh_revoked: AtomicBool::new(false),
            refresh_delay_ms: AtomicU64::new(0),
            authorization: Mutex::new(Vec::new()),
        });
        let router = Router::new()
            .route("/api/User/login", post(login))
            .route("/api/User/register", post(register))
            .route("/api/User/refresh-token", post(refresh))
            .route("/api/User/change-password", post(change_password))
            .route("/api/Post", get(posts))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(Self { addr, state, task })
    }

    /// Base URL including the `/api` prefix.
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Reject the current access token from now on.
    pub fn expire_access_token(&self) {
        *self.state.access.lock() = Some("expired".to_owned());
    }

    /// Fail every refresh call with 401.
    pub fn revoke_refresh_token(&self) {
        self.state.refresh_revoked.store(true, Ordering::SeqCst);
    }

    /// Hold each refresh call for `delay` before answering.
    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.refresh_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> u64 {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    /// The currently valid access token, if one was issued.
    pub fn access_token(&self) -> Option<String> {
        self.state.access.lock().clone()
    }

    /// `Authorization` headers received on `path`, in arrival order.
    pub fn authorization_for(&self, path: &str) -> Vec<Option<String>> {
        self.state
            .authorization
            .lock()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, h)| h.clone())
            .collect()
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Output of one `quill` invocation.
#[derive(Debug)]
pub struct QuillOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl QuillOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs the `quill` binary against one API with a private state directory.
pub struct Quill {
    api_url: String,
    state_dir: tempfile::TempDir,
}

impl Quill {
    pub fn new(api_url: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self { api_url: api_url.into(), state_dir: tempfile::tempdir()? })
    }

    pub fn state_dir(&self) -> &Path {
        self.state_dir.path()
    }

    pub fn session_file(&self) -> PathBuf {
        self.state_dir.path().join("session.json")
    }

    /// Run `quill <args>` to completion.
    pub async fn run(&self, args: &[&str]) -> anyhow::Result<QuillOutput> {
        let binary = quill_binary();
        anyhow::ensure!(binary.exists(), "quill binary not found at {}", binary.display());

        let child = tokio::process::Command::new(&binary)
            .args(args)
            .env("QUILL_API_URL", &self.api_url)
            .env("QUILL_STATE_DIR", self.state_dir.path())
            .env("QUILL_TIMEOUT_MS", "5000")
            .env_remove("QUILL_PASSWORD")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let output = tokio::time::timeout(Duration::from_secs(20), child.wait_with_output())
            .await
            .map_err(|_| anyhow::anyhow!("quill {args:?} did not exit"))??;

        Ok(QuillOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
