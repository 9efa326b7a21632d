// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh coordinator: at most one token refresh in flight per process.
//!
//! The first caller spawns the refresh as a task and parks a shared handle to
//! it in a single slot; every caller that arrives while it is pending awaits
//! a clone of the same handle. The task runs to completion even when every
//! waiter has gone, and clears its own slot when it settles, so the next 401
//! starts a fresh refresh.
//!
//! Each refresh is tagged with the store epoch it started in. A sign-in or
//! sign-out moves the store to a new epoch: the stale refresh can no longer
//! rotate or clear the session, and the next caller starts its own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::auth;
use crate::error::ClientError;
use crate::events::{EndReason, SessionEvent};
use crate::invalidate::SessionInvalidator;
use crate::model::{Credential, RefreshRequest};
use crate::store::CredentialStore;
use crate::transport::Transport;

const SESSION_CHANGED: &str = "session changed during token refresh";

/// Result shared with every waiter of one refresh.
pub type RefreshOutcome = Result<Credential, Arc<ClientError>>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

struct InFlight {
    generation: u64,
    epoch: u64,
    future: SharedRefresh,
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    invalidator: SessionInvalidator,
    events: broadcast::Sender<SessionEvent>,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
    refresh_calls: AtomicU64,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        invalidator: SessionInvalidator,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                store,
                invalidator,
                events,
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
                refresh_calls: AtomicU64::new(0),
            }),
        }
    }

    /// Exchange the given tokens for new ones, joining a pending refresh if
    /// there is one.
    ///
    /// When the store no longer holds `access_token` the tokens were rotated
    /// already; the current credential is returned without a network call.
    /// On success the store already holds the new tokens. On failure the
    /// session has been invalidated.
    pub async fn refresh(&self, access_token: &str, refresh_token: &str) -> RefreshOutcome {
        let future = {
            let mut slot = self.inner.in_flight.lock();
            let (current, epoch) = self.inner.store.snapshot_in_epoch();
            match slot.as_ref() {
                Some(in_flight) if in_flight.epoch == epoch => {
                    tracing::debug!(generation = in_flight.generation, "joining in-flight refresh");
                    in_flight.future.clone()
                }
                _ if current.access_token.as_deref() != Some(access_token) => {
                    tracing::debug!("tokens already rotated, skipping refresh");
                    return self.inner.current();
                }
                _ => {
                    let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let request = RefreshRequest {
                        token: access_token.to_owned(),
                        refresh_token: refresh_token.to_owned(),
                    };
                    let task =
                        tokio::spawn(Arc::clone(&self.inner).run(generation, epoch, request));
                    let future = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(Arc::new(ClientError::Unauthorized(format!(
                                "token refresh aborted: {e}"
                            ))))
                        })
                    }
                    .boxed()
                    .shared();
                    *slot = Some(InFlight { generation, epoch, future: future.clone() });
                    future
                }
            }
        };
        future.await
    }

    pub fn state(&self) -> RefreshState {
        if self.inner.in_flight.lock().is_some() {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Number of refresh calls sent to the API.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }
}

impl Inner {
    async fn run(
        self: Arc<Self>,
        generation: u64,
        epoch: u64,
        request: RefreshRequest,
    ) -> RefreshOutcome {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(generation, "refreshing access token");

        let outcome = match auth::request_refresh(self.transport.as_ref(), &request).await {
            Ok(grant) => {
                if self.store.update_tokens_in(epoch, &grant.token, &grant.refresh_token) {
                    tracing::info!(generation, "access token refreshed");
                    let _ = self.events.send(SessionEvent::TokensRefreshed);
                    let user = self.store.user().unwrap_or(grant.user);
                    Ok(Credential {
                        access_token: grant.token,
                        refresh_token: grant.refresh_token,
                        user,
                    })
                } else {
                    tracing::warn!(generation, "session changed during refresh, discarding new tokens");
                    Err(Arc::new(ClientError::Unauthorized(SESSION_CHANGED.to_owned())))
                }
            }
            Err(e) => {
                tracing::warn!(generation, err = %e, "token refresh failed");
                self.invalidator.invalidate_in(epoch, EndReason::RefreshFailed);
                Err(Arc::new(e))
            }
        };

        self.release(generation);
        outcome
    }

    /// The stored credential, for callers whose token was already rotated.
    fn current(&self) -> RefreshOutcome {
        self.store
            .current_credential()
            .ok_or_else(|| Arc::new(ClientError::Unauthorized(SESSION_CHANGED.to_owned())))
    }

    /// Empty the slot if it still holds this generation.
    fn release(&self, generation: u64) {
        let finished = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(in_flight) if in_flight.generation == generation => slot.take(),
                _ => None,
            }
        };
        drop(finished);
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
