// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quill session layer: bearer attachment, single-flight token refresh,
//! one-shot retry, and session invalidation for the blog API.
//!
//! Every outbound request goes through [`client::SessionClient::execute`]:
//! the token attacher adds `Authorization: Bearer`, a 401 on a protected
//! endpoint is recovered by the [`refresh::RefreshCoordinator`] (at most one
//! refresh call in flight per process), and the original request is retried
//! once. When recovery is impossible the [`invalidate::SessionInvalidator`]
//! clears the [`store::CredentialStore`] and publishes
//! [`events::SessionEvent::Ended`].

pub mod attach;
pub mod auth;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod events;
pub mod invalidate;
pub mod model;
pub mod refresh;
pub mod retry;
pub mod storage;
pub mod store;
pub mod test_support;
pub mod transport;

pub use client::SessionClient;
pub use config::SessionConfig;
pub use error::ClientError;
pub use events::{EndReason, SessionEvent};
pub use model::{Credential, User};
pub use store::CredentialStore;
