// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auth API: login, register, change password, logout and the raw refresh call.

use crate::attach::{LOGIN_PATH, REFRESH_PATH, REGISTER_PATH};
use crate::client::SessionClient;
use crate::error::ClientError;
use crate::events::{EndReason, SessionEvent};
use crate::model::{
    ChangePasswordRequest, Credential, LoginRequest, LoginResponse, RefreshRequest,
    RefreshResponse, RegisterRequest, User,
};
use crate::transport::{ApiRequest, Transport};

pub const CHANGE_PASSWORD_PATH: &str = "/User/change-password";

impl SessionClient {
    /// Sign in and store the issued credential.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let body = LoginRequest { email: email.to_owned(), password: password.to_owned() };
        let request = ApiRequest::post(LOGIN_PATH).with_json(&body)?;
        let resp: LoginResponse = self.send(request).await?;

        let cred = Credential::from(resp);
        self.store().set_credential(&cred);
        tracing::info!(user_id = %cred.user.id, "signed in");
        let _ = self.events().send(SessionEvent::SignedIn { user_id: cred.user.id.clone() });
        Ok(cred.user)
    }

    /// Create an account. Does not sign in.
    pub async fn register(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password: &str,
    ) -> Result<String, ClientError> {
        let body = RegisterRequest {
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            email: email.to_owned(),
            password: password.to_owned(),
        };
        let request = ApiRequest::post(REGISTER_PATH).with_json(&body)?;
        self.send(request).await
    }

    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<bool, ClientError> {
        let body = ChangePasswordRequest {
            old_password: old_password.to_owned(),
            new_password: new_password.to_owned(),
        };
        self.post(CHANGE_PASSWORD_PATH, &body).await
    }

    /// Sign out locally. Returns whether a session was present.
    pub fn logout(&self) -> bool {
        self.invalidator().invalidate(EndReason::SignedOut)
    }
}

/// Exchange a token pair at the refresh endpoint.
pub async fn request_refresh(
    transport: &dyn Transport,
    body: &RefreshRequest,
) -> Result<RefreshResponse, ClientError> {
    let request = ApiRequest::post(REFRESH_PATH).with_json(body)?;
    transport.send(&request).await?.into_data()
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
