// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session client: the request pipeline every API call goes through.
//!
//! attach → send → (401) recover → retry once → status check.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::attach::{self, ExcludedEndpoints};
use crate::config::SessionConfig;
use crate::error::ClientError;
use crate::events::{self, EndReason, SessionEvent};
use crate::invalidate::SessionInvalidator;
use crate::refresh::{RefreshCoordinator, RefreshState};
use crate::retry;
use crate::store::CredentialStore;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

pub struct SessionClient {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    excluded: ExcludedEndpoints,
    coordinator: RefreshCoordinator,
    invalidator: SessionInvalidator,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionClient {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<CredentialStore>) -> Self {
        let events = events::channel();
        let invalidator = SessionInvalidator::new(Arc::clone(&store), events.clone());
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&transport),
            Arc::clone(&store),
            invalidator.clone(),
            events.clone(),
        );
        Self {
            transport,
            store,
            excluded: ExcludedEndpoints::default(),
            coordinator,
            invalidator,
            events,
        }
    }

    /// HTTP transport plus a store hydrated from the configured state dir.
    pub fn connect(config: &SessionConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(HttpTransport::new(config)?);
        let store = Arc::new(CredentialStore::open(config.session_file()));
        Ok(Self::new(transport, store))
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn invalidator(&self) -> &SessionInvalidator {
        &self.invalidator
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn events(&self) -> &broadcast::Sender<SessionEvent> {
        &self.events
    }

    /// Send `request` through the full pipeline.
    ///
    /// A 401 on a protected endpoint is recovered (refresh or stale-token
    /// catch-up) and the request retried exactly once. The retry's outcome is
    /// final.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let authorized = attach::authorize(&request, &self.store, &self.excluded)?;
        let resp = self.transport.send(&authorized.request).await?;
        if resp.status != StatusCode::UNAUTHORIZED || self.excluded.matches(&request.path) {
            return resp.error_for_status();
        }

        let token = self.recover(&request, resp, authorized.token.as_deref()).await?;
        retry::reissue(self.transport.as_ref(), &request, &token).await?.error_for_status()
    }

    /// Obtain a token worth retrying with after a 401, or give up.
    async fn recover(
        &self,
        request: &ApiRequest,
        unauthorized: ApiResponse,
        sent_token: Option<&str>,
    ) -> Result<String, ClientError> {
        let snapshot = self.store.snapshot();
        let (Some(access_token), Some(refresh_token)) =
            (snapshot.access_token, snapshot.refresh_token)
        else {
            tracing::info!(path = %request.path, "401 without a token pair, ending session");
            self.invalidator.invalidate(EndReason::MissingTokens);
            return Err(unauthorized.into_error());
        };

        if sent_token != Some(access_token.as_str())
            && self.coordinator.state() == RefreshState::Idle
        {
            tracing::debug!(path = %request.path, "token rotated since send, retrying without refresh");
            return Ok(access_token);
        }

        match self.coordinator.refresh(&access_token, &refresh_token).await {
            Ok(cred) => Ok(cred.access_token),
            Err(e) => Err(ClientError::RefreshFailed(e)),
        }
    }

    /// Execute and decode the envelope's `data`.
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        self.execute(request).await?.into_data()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).with_json(body)?).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::put(path).with_json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(ApiRequest::delete(path)).await
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
