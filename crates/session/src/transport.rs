// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network seam: owned request/response values and the HTTP transport.

use std::sync::Once;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::SessionConfig;
use crate::envelope;
use crate::error::ClientError;

/// An outbound API request, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Endpoint path such as `/User/login`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Copy of this request carrying `Authorization: Bearer <token>`.
    pub fn with_bearer(&self, token: &str) -> Result<Self, ClientError> {
        let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            ClientError::Configuration("access token is not a valid header value".to_owned())
        })?;
        let mut req = self.clone();
        req.headers.insert(AUTHORIZATION, value);
        Ok(req)
    }

    /// The bearer token this request carries, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
    }
}

/// A response with its body fully read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Pass success through, classify anything else.
    pub fn error_for_status(self) -> Result<Self, ClientError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Classify this response as an error, preferring the envelope's message.
    pub fn into_error(&self) -> ClientError {
        let message = envelope::error_message(&self.body).unwrap_or_else(|| {
            if !self.body.is_empty() {
                tracing::debug!(
                    status = %self.status,
                    body = %String::from_utf8_lossy(&self.body),
                    "non-envelope error body"
                );
            }
            self.status.canonical_reason().unwrap_or_default().to_owned()
        });
        ClientError::from_status(self.status, message)
    }

    /// Check the status and decode the envelope's `data`.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        let resp = self.error_for_status()?;
        envelope::decode(&resp.body)
    }
}

/// Sends one request and reads the whole response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError>;
}

/// Transport over a `reqwest::Client` bound to the API base URL.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &SessionConfig) -> Result<Self, ClientError> {
        ensure_crypto();
        let base_url = config.base_url().to_owned();
        reqwest::Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid api url {base_url:?}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("quill/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base_url })
    }

    fn url_for(&self, request: &ApiRequest) -> Result<reqwest::Url, ClientError> {
        let raw = format!("{}{}", self.base_url, request.path);
        let mut url = reqwest::Url::parse(&raw)
            .map_err(|e| ClientError::Configuration(format!("invalid request url {raw:?}: {e}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let url = self.url_for(request)?;
        tracing::debug!(method = %request.method, path = %request.path, "sending request");

        let mut builder =
            self.http.request(request.method.clone(), url).headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        tracing::debug!(path = %request.path, status = status.as_u16(), "response received");
        Ok(ApiResponse { status, body })
    }
}

/// Install the ring crypto provider for rustls. Safe to call repeatedly.
pub fn ensure_crypto() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
