// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand, ValueEnum};

use quill_session::SessionConfig;

/// Command-line client for the Quill blog API.
#[derive(Debug, Parser)]
#[command(name = "quill", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub session: SessionConfig,

    /// Log format (json or text).
    #[arg(long, env = "QUILL_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "QUILL_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and remember the session.
    Login {
        email: String,
        #[arg(long, env = "QUILL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account. Does not sign in.
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        email: String,
        #[arg(long, env = "QUILL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Change the signed-in user's password.
    ChangePassword {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },
    /// Send an authenticated request and print the response data.
    Request {
        #[arg(value_enum)]
        method: HttpMethod,
        /// Endpoint path, e.g. `/Post`.
        path: String,
        /// JSON request body.
        #[arg(long)]
        data: Option<String>,
        /// Query parameter, repeatable.
        #[arg(long, value_name = "KEY=VALUE")]
        query: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl Cli {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid --log-format {other:?}: expected json or text"),
        }

        let url = &self.session.api_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("--api-url must start with http:// or https://, got {url:?}");
        }
        if self.session.timeout_ms == 0 {
            anyhow::bail!("--timeout-ms must be greater than zero");
        }

        if let Command::Request { path, data, query, .. } = &self.command {
            if !path.starts_with('/') {
                anyhow::bail!("request path must start with '/', got {path:?}");
            }
            if let Some(pair) = query.iter().find(|q| !q.contains('=')) {
                anyhow::bail!("--query expects KEY=VALUE, got {pair:?}");
            }
            if let Some(data) = data {
                serde_json::from_str::<serde_json::Value>(data)
                    .map_err(|e| anyhow::anyhow!("--data is not valid JSON: {e}"))?;
            }
        }
        if let Command::ChangePassword { old, new } = &self.command {
            if old == new {
                anyhow::bail!("new password must differ from the old one");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
