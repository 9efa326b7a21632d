// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// File name of the persisted session inside the state directory.
pub const SESSION_FILE: &str = "session.json";

/// Connection settings for the blog API.
#[derive(Debug, Clone, clap::Args)]
pub struct SessionConfig {
    /// Base URL of the blog API. Endpoint paths such as `/User/login` are appended.
    #[arg(long = "api-url", default_value = "http://localhost:5000/api", env = "QUILL_API_URL")]
    pub api_url: String,

    /// Request timeout in milliseconds.
    #[arg(long, default_value_t = 30000, env = "QUILL_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Directory for persisted session state.
    #[arg(long, env = "QUILL_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

impl SessionConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self { api_url: api_url.into(), timeout_ms: 30000, state_dir: None }
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }

    pub fn session_file(&self) -> PathBuf {
        self.state_dir().join(SESSION_FILE)
    }
}

/// Resolve the default state directory.
///
/// Checks `QUILL_STATE_DIR`, then `$XDG_STATE_HOME/quill`,
/// then `$HOME/.local/state/quill`.
pub fn default_state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("QUILL_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("quill");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/quill");
    }
    PathBuf::from(".quill")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
