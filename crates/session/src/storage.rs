// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable string key/value storage backing the credential store.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

/// Key of the persisted access token.
pub const ACCESS_TOKEN_KEY: &str = "auth_token";
/// Key of the persisted refresh token.
pub const REFRESH_TOKEN_KEY: &str = "auth_refresh_token";
/// Key of the persisted user profile (JSON).
pub const USER_KEY: &str = "auth_user";

/// A string key/value store that survives process restarts.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove_item(&self, key: &str) -> anyhow::Result<()>;
}

/// JSON file storage with atomic writes.
///
/// The file is read once at open; every mutation stages the full map in a
/// sibling file and renames it over the original.
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries: BTreeMap<String, String> = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| Ok(serde_json::from_str(&raw)?))
            .unwrap_or_else(|e| {
                if path.exists() {
                    tracing::warn!(path = %path.display(), err = %e, "session file unreadable, starting empty");
                }
                BTreeMap::new()
            });
        Self { path, entries: Mutex::new(entries) }
    }

    /// Replace the file's contents with `entries`.
    fn flush(&self, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let staged = self.staging_path();
        std::fs::write(&staged, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&staged, &self.path)?;
        Ok(())
    }

    /// A sibling path no other flush in any process uses concurrently.
    fn staging_path(&self) -> PathBuf {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        let mut name = self.path.file_name().map(OsString::from).unwrap_or_default();
        name.push(format!(".{}.{}.tmp", std::process::id(), NEXT.fetch_add(1, Ordering::Relaxed)));
        self.path.with_file_name(name)
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_owned(), value.to_owned());
        self.flush(&entries)
    }

    fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.flush(&entries)
    }
}

/// Volatile storage for tests and the memory-only fallback.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
