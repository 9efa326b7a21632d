// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the session event channel.
pub const EVENT_CAPACITY: usize = 64;

/// Lifecycle notifications published by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SignedIn { user_id: String },
    TokensRefreshed,
    /// The session is gone; the user must sign in again.
    Ended { reason: EndReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The refresh call failed.
    RefreshFailed,
    /// A 401 arrived while the access or refresh token was missing.
    MissingTokens,
    /// The user signed out.
    SignedOut,
}

pub fn channel() -> broadcast::Sender<SessionEvent> {
    broadcast::channel(EVENT_CAPACITY).0
}
