// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: scripted transports, storages, fixtures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::Serialize;

use crate::attach::{LOGIN_PATH, REFRESH_PATH, REGISTER_PATH};
use crate::auth::CHANGE_PASSWORD_PATH;
use crate::error::ClientError;
use crate::model::{Credential, LoginResponse, User};
use crate::storage::Storage;
use crate::transport::{ApiRequest, ApiResponse, Transport};

type Handler = Box<dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync>;

/// Transport that answers every request with a handler and records it.
pub struct ScriptedTransport {
    handler: Handler,
    delay: Option<Duration>,
    sent: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static) -> Self {
        Self { handler: Box::new(handler), delay: None, sent: Mutex::new(Vec::new()) }
    }

    /// Sleep before answering, so concurrent callers overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request sent so far, in order.
    pub fn sent(&self) -> Vec<ApiRequest> {
        self.sent.lock().clone()
    }

    /// Number of requests sent to `path`.
    pub fn count(&self, path: &str) -> usize {
        self.sent.lock().iter().filter(|r| r.path == path).count()
    }

    /// Bearer tokens sent to `path`, in order.
    pub fn bearers(&self, path: &str) -> Vec<Option<String>> {
        self.sent
            .lock()
            .iter()
            .filter(|r| r.path == path)
            .map(|r| r.bearer_token().map(str::to_owned))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        self.sent.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok((self.handler)(request))
    }
}

/// 200 with `{ success: true, data }`.
pub fn envelope<T: Serialize>(data: T) -> ApiResponse {
    let body = serde_json::json!({ "success": true, "message": null, "data": data });
    ApiResponse::new(StatusCode::OK, body.to_string())
}

/// Bare status with an empty body.
pub fn status(code: StatusCode) -> ApiResponse {
    ApiResponse::new(code, "")
}

/// 200 with `{ success: false, message }`.
pub fn rejected(message: &str) -> ApiResponse {
    let body = serde_json::json!({ "success": false, "message": message, "data": null });
    ApiResponse::new(StatusCode::OK, body.to_string())
}

/// An in-process imitation of the blog API's token rules.
///
/// Exactly one access token is valid at a time. Login and refresh issue
/// `access-N` / `refresh-N` with increasing `N`.
pub struct FakeApi {
    valid_access: Mutex<String>,
    valid_refresh: Mutex<String>,
    issued: AtomicUsize,
    refresh_revoked: AtomicBool,
}

pub const FAKE_EMAIL: &str = "ada@example.com";
pub const FAKE_PASSWORD: &str = "secret";

impl FakeApi {
    /// Accepts the tokens of [`sample_credential`].
    pub fn new() -> Self {
        Self {
            valid_access: Mutex::new("access-0".to_owned()),
            valid_refresh: Mutex::new("refresh-0".to_owned()),
            issued: AtomicUsize::new(0),
            refresh_revoked: AtomicBool::new(false),
        }
    }

    /// Invalidate the current access token; the refresh token stays valid.
    pub fn expire_access(&self) {
        *self.valid_access.lock() = "expired".to_owned();
    }

    /// Make every refresh call fail with 401.
    pub fn revoke_refresh(&self) {
        self.refresh_revoked.store(true, Ordering::SeqCst);
    }

    pub fn handle(&self, req: &ApiRequest) -> ApiResponse {
        let body = req.body.clone().unwrap_or_default();
        match req.path.as_str() {
            LOGIN_PATH => {
                if body["email"] == FAKE_EMAIL && body["password"] == FAKE_PASSWORD {
                    envelope(self.issue())
                } else {
                    error(StatusCode::UNAUTHORIZED, "Invalid email or password")
                }
            }
            REGISTER_PATH => envelope("registration-token"),
            REFRESH_PATH => {
                let known = *self.valid_refresh.lock() == body["refreshToken"];
                if self.refresh_revoked.load(Ordering::SeqCst) || !known {
                    error(StatusCode::UNAUTHORIZED, "Invalid refresh token")
                } else {
                    envelope(self.issue())
                }
            }
            _ if !self.authorized(req) => status(StatusCode::UNAUTHORIZED),
            CHANGE_PASSWORD_PATH => {
                if body["oldPassword"] == FAKE_PASSWORD {
                    envelope(true)
                } else {
                    error(StatusCode::BAD_REQUEST, "Old password is incorrect")
                }
            }
            _ => envelope(vec!["post-1"]),
        }
    }

    fn authorized(&self, req: &ApiRequest) -> bool {
        req.bearer_token() == Some(self.valid_access.lock().as_str())
    }

    fn issue(&self) -> LoginResponse {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("access-{n}");
        let refresh_token = format!("refresh-{n}");
        *self.valid_access.lock() = token.clone();
        *self.valid_refresh.lock() = refresh_token.clone();
        LoginResponse { user: sample_user(), token, refresh_token }
    }
}

impl Default for FakeApi {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-success status with an enveloped message.
pub fn error(code: StatusCode, message: &str) -> ApiResponse {
    let body = serde_json::json!({ "success": false, "message": message, "data": null });
    ApiResponse::new(code, body.to_string())
}

/// In-memory storage that counts mutations and can be made to fail.
#[derive(Default)]
pub struct RecordingStorage {
    entries: Mutex<BTreeMap<String, String>>,
    writes: AtomicUsize,
    failing: bool,
}

impl RecordingStorage {
    /// Storage whose every operation errors.
    pub fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn seed(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.failing {
            anyhow::bail!("storage unavailable");
        }
        Ok(())
    }
}

impl Storage for RecordingStorage {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.check()?;
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}

pub fn sample_user() -> User {
    User {
        id: "user-1".to_owned(),
        first_name: "Ada".to_owned(),
        last_name: "Lovelace".to_owned(),
        email: "ada@example.com".to_owned(),
        role_id: "role-1".to_owned(),
        role_name: "Author".to_owned(),
        created_date: Some("2024-01-01T00:00:00Z".to_owned()),
        updated_date: None,
    }
}

pub fn sample_credential() -> Credential {
    Credential {
        access_token: "access-0".to_owned(),
        refresh_token: "refresh-0".to_owned(),
        user: sample_user(),
    }
}
