// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session invalidator: clears credentials and announces the session end.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::events::{EndReason, SessionEvent};
use crate::store::CredentialStore;

#[derive(Clone)]
pub struct SessionInvalidator {
    store: Arc<CredentialStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionInvalidator {
    pub fn new(store: Arc<CredentialStore>, events: broadcast::Sender<SessionEvent>) -> Self {
        Self { store, events }
    }

    /// Clear the store and publish `Ended { reason }`.
    ///
    /// Does nothing when the store is already empty. Returns whether it acted.
    pub fn invalidate(&self, reason: EndReason) -> bool {
        let cleared = self.store.clear();
        self.announce(cleared, reason)
    }

    /// [`invalidate`](Self::invalidate), unless the store has moved past
    /// `epoch` (signed out or signed in again).
    pub fn invalidate_in(&self, epoch: u64, reason: EndReason) -> bool {
        let cleared = self.store.clear_in(epoch);
        self.announce(cleared, reason)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn announce(&self, cleared: bool, reason: EndReason) -> bool {
        if !cleared {
            tracing::debug!(?reason, "nothing to invalidate");
            return false;
        }
        tracing::info!(?reason, "session invalidated");
        // No receivers is fine.
        let _ = self.events.send(SessionEvent::Ended { reason });
        true
    }
}
