// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `{ success, message, data }` wrapper around every API response.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::ClientError;

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Unwrap `data`, treating `success: false` as a failure.
    pub fn into_data(self) -> Result<T, ClientError> {
        if !self.success {
            return Err(ClientError::Rejected {
                message: self.message.unwrap_or_else(|| "request was rejected".to_owned()),
            });
        }
        self.data.ok_or_else(|| ClientError::Rejected {
            message: self.message.unwrap_or_else(|| "response carried no data".to_owned()),
        })
    }
}

/// Decode an enveloped body and return its payload.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    let envelope: Envelope<T> = serde_json::from_slice(body)?;
    envelope.into_data()
}

/// Extract the `message` of an enveloped error body, if it is one.
pub fn error_message(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct MessageOnly {
        message: Option<String>,
    }
    serde_json::from_slice::<MessageOnly>(body)
        .ok()
        .and_then(|m| m.message)
        .filter(|m| !m.trim().is_empty())
}
