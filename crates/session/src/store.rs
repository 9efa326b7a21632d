// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential store: the single owner of the session's tokens and profile.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::{Credential, User};
use crate::storage::{FileStorage, Storage, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};

/// The three raw session fields as of one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

impl SessionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }

    /// Authenticated means an access token and a profile are both present.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.user.is_some()
    }
}

/// Holds the current credential in memory and mirrors it to durable storage.
///
/// Storage failures are logged and otherwise ignored: the in-memory state
/// stays authoritative for the life of the process.
///
/// Every sign-in and sign-out starts a new epoch. Token rotation keeps the
/// epoch, so a refresh tagged with an old epoch cannot touch a newer session.
pub struct CredentialStore {
    state: RwLock<SessionSnapshot>,
    epoch: AtomicU64,
    storage: Option<Arc<dyn Storage>>,
}

impl CredentialStore {
    /// Hydrate from `storage`.
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let access_token = read_item(storage.as_ref(), ACCESS_TOKEN_KEY);
        let refresh_token = read_item(storage.as_ref(), REFRESH_TOKEN_KEY);
        let user = read_item(storage.as_ref(), USER_KEY).and_then(|raw| {
            match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(err = %e, "stored user profile is corrupt, ignoring");
                    None
                }
            }
        });
        let snapshot = SessionSnapshot { access_token, refresh_token, user };
        tracing::debug!(authenticated = snapshot.is_authenticated(), "credential store loaded");
        Self { state: RwLock::new(snapshot), epoch: AtomicU64::new(0), storage: Some(storage) }
    }

    /// Hydrate from the JSON session file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::load(Arc::new(FileStorage::open(path)))
    }

    /// A store with no durable backing.
    pub fn memory_only() -> Self {
        Self {
            state: RwLock::new(SessionSnapshot::default()),
            epoch: AtomicU64::new(0),
            storage: None,
        }
    }

    /// Replace the whole credential (login).
    pub fn set_credential(&self, cred: &Credential) {
        let mut state = self.state.write();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        state.access_token = Some(cred.access_token.clone());
        state.refresh_token = Some(cred.refresh_token.clone());
        state.user = Some(cred.user.clone());

        self.persist(ACCESS_TOKEN_KEY, Some(&cred.access_token));
        self.persist(REFRESH_TOKEN_KEY, Some(&cred.refresh_token));
        match serde_json::to_string(&cred.user) {
            Ok(json) => self.persist(USER_KEY, Some(&json)),
            Err(e) => tracing::warn!(err = %e, "failed to serialize user profile"),
        }
    }

    /// Rotate both tokens, keeping the profile.
    ///
    /// Returns `false` without writing when the session was cleared in the
    /// meantime, so a late refresh cannot resurrect a signed-out session.
    pub fn update_tokens(&self, access_token: &str, refresh_token: &str) -> bool {
        let mut state = self.state.write();
        self.rotate(&mut state, access_token, refresh_token)
    }

    /// [`update_tokens`](Self::update_tokens), but only within `epoch`.
    pub fn update_tokens_in(&self, epoch: u64, access_token: &str, refresh_token: &str) -> bool {
        let mut state = self.state.write();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        self.rotate(&mut state, access_token, refresh_token)
    }

    /// Remove every field. Returns whether anything was present.
    pub fn clear(&self) -> bool {
        let mut state = self.state.write();
        self.wipe(&mut state)
    }

    /// [`clear`](Self::clear), but only within `epoch`.
    pub fn clear_in(&self, epoch: u64) -> bool {
        let mut state = self.state.write();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        self.wipe(&mut state)
    }

    /// Snapshot and the epoch it belongs to, read atomically.
    pub fn snapshot_in_epoch(&self) -> (SessionSnapshot, u64) {
        let state = self.state.read();
        (state.clone(), self.epoch.load(Ordering::SeqCst))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.read().clone()
    }

    /// The complete credential, if every field is present.
    pub fn current_credential(&self) -> Option<Credential> {
        let state = self.state.read();
        Some(Credential {
            access_token: state.access_token.clone()?,
            refresh_token: state.refresh_token.clone()?,
            user: state.user.clone()?,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().is_authenticated()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.read().refresh_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.read().user.clone()
    }

    pub fn full_name(&self) -> Option<String> {
        self.state.read().user.as_ref().map(User::full_name)
    }

    fn rotate(&self, state: &mut SessionSnapshot, access_token: &str, refresh_token: &str) -> bool {
        if state.refresh_token.is_none() {
            return false;
        }
        state.access_token = Some(access_token.to_owned());
        state.refresh_token = Some(refresh_token.to_owned());

        self.persist(ACCESS_TOKEN_KEY, Some(access_token));
        self.persist(REFRESH_TOKEN_KEY, Some(refresh_token));
        true
    }

    fn wipe(&self, state: &mut SessionSnapshot) -> bool {
        if state.is_empty() {
            return false;
        }
        *state = SessionSnapshot::default();
        self.epoch.fetch_add(1, Ordering::SeqCst);

        self.persist(ACCESS_TOKEN_KEY, None);
        self.persist(REFRESH_TOKEN_KEY, None);
        self.persist(USER_KEY, None);
        true
    }

    fn persist(&self, key: &str, value: Option<&str>) {
        let Some(storage) = &self.storage else {
            return;
        };
        let result = match value {
            Some(value) => storage.set_item(key, value),
            None => storage.remove_item(key),
        };
        if let Err(e) = result {
            tracing::warn!(key, err = %e, "session storage write failed, continuing in memory");
        }
    }
}

fn read_item(storage: &dyn Storage, key: &str) -> Option<String> {
    match storage.get_item(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, err = %e, "session storage read failed");
            None
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
