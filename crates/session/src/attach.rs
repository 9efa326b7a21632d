// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token attacher: adds the bearer credential to outgoing requests.

use crate::error::ClientError;
use crate::store::CredentialStore;
use crate::transport::ApiRequest;

pub const LOGIN_PATH: &str = "/User/login";
pub const REGISTER_PATH: &str = "/User/register";
pub const REFRESH_PATH: &str = "/User/refresh-token";

/// Path fragments that never carry a bearer token and never trigger a
/// refresh on 401.
#[derive(Debug, Clone)]
pub struct ExcludedEndpoints {
    fragments: Vec<String>,
}

impl Default for ExcludedEndpoints {
    fn default() -> Self {
        Self::new([LOGIN_PATH, REGISTER_PATH, REFRESH_PATH])
    }
}

impl ExcludedEndpoints {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { fragments: fragments.into_iter().map(Into::into).collect() }
    }

    /// Substring match against the request path.
    pub fn matches(&self, path: &str) -> bool {
        self.fragments.iter().any(|f| path.contains(f.as_str()))
    }
}

/// A request ready to send, plus the access token it carries.
#[derive(Debug, Clone)]
pub struct Authorized {
    pub request: ApiRequest,
    pub token: Option<String>,
}

/// Attach the stored access token unless the path is excluded.
pub fn authorize(
    request: &ApiRequest,
    store: &CredentialStore,
    excluded: &ExcludedEndpoints,
) -> Result<Authorized, ClientError> {
    if excluded.matches(&request.path) {
        return Ok(Authorized { request: request.clone(), token: None });
    }
    match store.access_token() {
        Some(token) => {
            let request = request.with_bearer(&token)?;
            Ok(Authorized { request, token: Some(token) })
        }
        None => Ok(Authorized { request: request.clone(), token: None }),
    }
}

#[cfg(test)]
#[path = "attach_tests.rs"]
mod tests;
