// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `quill` binary against the
//! mock API and check persisted sessions across processes.

use quill_specs::{free_port, MockApi, Quill, MOCK_EMAIL, MOCK_PASSWORD};

async fn signed_in(api: &MockApi) -> anyhow::Result<Quill> {
    let quill = Quill::new(api.base_url())?;
    let out = quill.run(&["login", MOCK_EMAIL, "--password", MOCK_PASSWORD]).await?;
    anyhow::ensure!(out.success(), "login failed: {}", out.stderr);
    Ok(quill)
}

#[tokio::test]
async fn login_whoami_logout() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let quill = Quill::new(api.base_url())?;

    let out = quill.run(&["login", MOCK_EMAIL, "--password", MOCK_PASSWORD]).await?;
    assert!(out.success(), "stderr: {}", out.stderr);
    assert!(out.stdout.contains("Signed in as Ada Lovelace"));
    assert!(quill.session_file().exists());
    assert_eq!(api.authorization_for("/User/login"), vec![None]);

    // A new process restores the session from disk.
    let out = quill.run(&["whoami"]).await?;
    assert!(out.success(), "stderr: {}", out.stderr);
    assert!(out.stdout.contains("Ada Lovelace <ada@example.com> (Author)"));

    let out = quill.run(&["logout"]).await?;
    assert!(out.stdout.contains("Signed out."));

    let out = quill.run(&["whoami"]).await?;
    assert_eq!(out.code, Some(1));
    assert!(out.stderr.contains("not signed in"));

    let out = quill.run(&["logout"]).await?;
    assert!(out.stdout.contains("Not signed in."));
    Ok(())
}

#[tokio::test]
async fn request_carries_bearer() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let quill = signed_in(&api).await?;

    let out = quill.run(&["request", "get", "/Post"]).await?;
    assert!(out.success(), "stderr: {}", out.stderr);
    assert!(out.stdout.contains("Hello, world"));
    assert_eq!(api.authorization_for("/Post"), vec![Some("Bearer access-1".to_owned())]);
    assert_eq!(api.refresh_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn request_forwards_query() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let quill = signed_in(&api).await?;

    let out = quill.run(&["request", "get", "/Post", "--query", "pageNumber=2"]).await?;
    assert!(out.success(), "stderr: {}", out.stderr);
    assert!(out.stdout.contains("\"pageNumber\": 2"));
    Ok(())
}

#[tokio::test]
async fn expired_token_refreshes_transparently() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let quill = signed_in(&api).await?;
    api.expire_access_token();

    let out = quill.run(&["request", "get", "/Post"]).await?;
    assert!(out.success(), "stderr: {}", out.stderr);
    assert_eq!(api.refresh_calls(), 1);
    assert_eq!(
        api.authorization_for("/Post"),
        vec![Some("Bearer access-1".to_owned()), Some("Bearer access-2".to_owned())]
    );
    assert_eq!(api.authorization_for("/User/refresh-token"), vec![None]);

    // The rotated tokens were persisted for the next process.
    let session = std::fs::read_to_string(quill.session_file())?;
    assert!(session.contains("access-2"));
    let out = quill.run(&["request", "get", "/Post"]).await?;
    assert!(out.success(), "stderr: {}", out.stderr);
    assert_eq!(api.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn revoked_refresh_ends_session() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let quill = signed_in(&api).await?;
    api.expire_access_token();
    api.revoke_refresh_token();

    let out = quill.run(&["request", "get", "/Post"]).await?;
    assert_eq!(out.code, Some(1));
    assert!(out.stderr.contains("Your session has expired. Please sign in again."));
    assert!(out.stderr.contains("Sign in again with `quill login`"));

    let out = quill.run(&["whoami"]).await?;
    assert_eq!(out.code, Some(1));
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_reported() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let quill = Quill::new(api.base_url())?;

    let out = quill.run(&["login", MOCK_EMAIL, "--password", "wrong"]).await?;
    assert_eq!(out.code, Some(1));
    assert!(out.stderr.contains("Invalid email or password"));
    assert!(!quill.session_file().exists());
    Ok(())
}

#[tokio::test]
async fn change_password_then_login_with_new_one() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let quill = signed_in(&api).await?;

    let out = quill.run(&["change-password", "--old", MOCK_PASSWORD, "--new", "n3w"]).await?;
    assert!(out.success(), "stderr: {}", out.stderr);

    let out = quill.run(&["login", MOCK_EMAIL, "--password", "n3w"]).await?;
    assert!(out.success(), "stderr: {}", out.stderr);
    Ok(())
}

#[tokio::test]
async fn register_surfaces_server_message() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let quill = Quill::new(api.base_url())?;

    let args =
        ["register", "--first-name", "Ada", "--last-name", "Lovelace", MOCK_EMAIL, "--password", "x"];
    let out = quill.run(&args).await?;
    assert_eq!(out.code, Some(1));
    assert!(out.stderr.contains("Email is already registered"));

    let args = [
        "register",
        "--first-name",
        "Grace",
        "--last-name",
        "Hopper",
        "grace@example.com",
        "--password",
        "x",
    ];
    let out = quill.run(&args).await?;
    assert!(out.success(), "stderr: {}", out.stderr);
    assert!(api.authorization_for("/User/register").iter().all(Option::is_none));
    Ok(())
}

#[tokio::test]
async fn corrupted_state_file_starts_signed_out() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let quill = Quill::new(api.base_url())?;
    std::fs::write(quill.session_file(), "{ not json")?;

    let out = quill.run(&["whoami"]).await?;
    assert_eq!(out.code, Some(1));
    assert!(out.stderr.contains("not signed in"));

    let out = quill.run(&["login", MOCK_EMAIL, "--password", MOCK_PASSWORD]).await?;
    assert!(out.success(), "stderr: {}", out.stderr);
    Ok(())
}

#[tokio::test]
async fn unreachable_api_reports_connectivity() -> anyhow::Result<()> {
    let port = free_port()?;
    let quill = Quill::new(format!("http://127.0.0.1:{port}/api"))?;

    let out = quill.run(&["login", MOCK_EMAIL, "--password", MOCK_PASSWORD]).await?;
    assert_eq!(out.code, Some(1));
    assert!(out.stderr.contains("Cannot reach the API"));
    Ok(())
}

#[tokio::test]
async fn invalid_arguments_exit_2() -> anyhow::Result<()> {
    let api = MockApi::start().await?;
    let quill = Quill::new(api.base_url())?;

    let out = quill.run(&["--log-format", "xml", "whoami"]).await?;
    assert_eq!(out.code, Some(2));
    Ok(())
}
