// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request retrier: one re-issue of a request after its token was replaced.

use crate::error::ClientError;
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Send `original` once more with `access_token` attached.
///
/// The response is returned as is. A second 401 is the caller's to handle.
pub async fn reissue(
    transport: &dyn Transport,
    original: &ApiRequest,
    access_token: &str,
) -> Result<ApiResponse, ClientError> {
    let request = original.with_bearer(access_token)?;
    tracing::debug!(method = %request.method, path = %request.path, "retrying with new token");
    transport.send(&request).await
}
