// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client error taxonomy.

use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

const CONNECTIVITY_MESSAGE: &str = "Cannot reach the API. Check your connection and try again.";
const BAD_CREDENTIALS_MESSAGE: &str = "Invalid email or password.";
const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";
const SERVER_MESSAGE: &str = "The server encountered an error.";
const GENERIC_MESSAGE: &str = "Something went wrong while contacting the API.";

/// Errors surfaced by the session layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced an HTTP status (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// 401 that the session layer could not (or must not) recover.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The token refresh itself failed; the session has been invalidated.
    #[error("token refresh failed: {0}")]
    RefreshFailed(#[source] Arc<ClientError>),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Any other non-success status.
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The envelope reported `success: false`, even though HTTP succeeded.
    #[error("request rejected: {message}")]
    Rejected { message: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            code => Self::Status { status: code, message },
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::BadRequest(_) => Some(400),
            Self::Status { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::RefreshFailed(_)
            | Self::Rejected { .. }
            | Self::Decode(_)
            | Self::Configuration(_) => None,
        }
    }

    /// True when the caller should treat the user as signed out.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::RefreshFailed(_))
    }

    /// Message suitable for showing to an end user.
    ///
    /// A message supplied by the server wins over the generic text for the
    /// error's category.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => CONNECTIVITY_MESSAGE.to_owned(),
            Self::RefreshFailed(_) => SESSION_EXPIRED_MESSAGE.to_owned(),
            Self::Rejected { message } | Self::Configuration(message) => message.clone(),
            Self::Decode(_) => GENERIC_MESSAGE.to_owned(),
            Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message)
            | Self::BadRequest(message)
            | Self::Status { message, .. } => {
                let status = self.status().and_then(|s| StatusCode::from_u16(s).ok());
                if is_server_supplied(message, status) {
                    return message.clone();
                }
                match status.map(|s| s.as_u16()) {
                    Some(401) => BAD_CREDENTIALS_MESSAGE.to_owned(),
                    Some(500..=599) => SERVER_MESSAGE.to_owned(),
                    _ => GENERIC_MESSAGE.to_owned(),
                }
            }
        }
    }
}

/// Whether `message` came from the server rather than the status reason phrase.
fn is_server_supplied(message: &str, status: Option<StatusCode>) -> bool {
    if message.trim().is_empty() {
        return false;
    }
    match status.and_then(|s| s.canonical_reason()) {
        Some(reason) => message != reason,
        None => true,
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
