// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subcommand handlers.

use tokio::sync::broadcast;

use quill_session::transport::ApiRequest;
use quill_session::{EndReason, SessionClient, SessionEvent};

use crate::config::{Cli, Command, HttpMethod};

pub const SESSION_ENDED_NOTICE: &str = "Your session has ended. Sign in again with `quill login`.";

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = SessionClient::connect(&cli.session)?;
    let mut events = client.subscribe();
    let result = dispatch(&client, cli.command).await;
    report_session_end(&mut events);
    result
}

async fn dispatch(client: &SessionClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            let user = client.login(&email, &password).await?;
            println!("Signed in as {} <{}>", user.full_name(), user.email);
        }
        Command::Register { first_name, last_name, email, password } => {
            client.register(&first_name, &last_name, &email, &password).await?;
            println!("Account created for {email}. Sign in with `quill login`.");
        }
        Command::Logout => {
            if client.logout() {
                println!("Signed out.");
            } else {
                println!("Not signed in.");
            }
        }
        Command::Whoami => {
            let store = client.store();
            match store.user().filter(|_| store.is_authenticated()) {
                Some(user) => println!("{} <{}> ({})", user.full_name(), user.email, user.role_name),
                None => anyhow::bail!("not signed in"),
            }
        }
        Command::ChangePassword { old, new } => {
            if !client.change_password(&old, &new).await? {
                anyhow::bail!("password was not changed");
            }
            println!("Password changed.");
        }
        Command::Request { method, path, data, query } => {
            let mut request = match method {
                HttpMethod::Get => ApiRequest::get(path),
                HttpMethod::Post => ApiRequest::post(path),
                HttpMethod::Put => ApiRequest::put(path),
                HttpMethod::Delete => ApiRequest::delete(path),
            };
            for (key, value) in query.iter().filter_map(|q| q.split_once('=')) {
                request = request.with_query(key, value);
            }
            if let Some(data) = data {
                request.body = Some(serde_json::from_str(&data)?);
            }
            let payload: serde_json::Value = client.send(request).await?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }
    Ok(())
}

/// Tell the user when the layer ended the session on its own.
fn report_session_end(events: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Ended { reason: EndReason::RefreshFailed | EndReason::MissingTokens } =
            event
        {
            eprintln!("{SESSION_ENDED_NOTICE}");
            return;
        }
    }
}
