//! Long-running operation tracking.
//!
//! Mutating Service Management requests usually return `202 Accepted` with
//! an `x-ms-request-id` header. The service keeps the operation's state at
//! `{subscription}/operations/{id}`, which reports `InProgress`, `Succeeded`
//! or `Failed`. [`ManagementClient::get_operation_status`] queries it once;
//! [`ManagementClient::wait_for_operation`] polls it at the client's poll
//! interval until the operation finishes or the caller cancels.
//!
//! ## Example
//!
//! ```rust,no_run
//! use azure_management_core::client::ManagementClient;
//! use azure_management_core::operation::OperationId;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(client: &ManagementClient) -> azure_management_core::error::ManagementResult<()> {
//! let operation_id = OperationId::new("9b8a8b10-9c6e-4f5e-8b2a-3a1d0b6f1e2c");
//! let cancel = CancellationToken::new();
//!
//! // Give up after ten minutes.
//! let timeout = cancel.clone();
//! tokio::spawn(async move {
//!     tokio::time::sleep(Duration::from_secs(600)).await;
//!     timeout.cancel();
//! });
//!
//! let status = client.wait_for_operation(&operation_id, &cancel).await?;
//! println!("operation finished with HTTP status {:?}", status.http_status_code);
//! # Ok(())
//! # }
//! ```

use std::fmt;

use reqwest::Method;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::client::ManagementClient;
use crate::error::{ManagementError, ManagementResult, RequestPhase};

/// Name used when annotating status query errors.
const GET_OPERATION_STATUS: &str = "GetOperationStatus";

/// Identifier of an asynchronous operation, taken from the `x-ms-request-id` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationId(String);

impl OperationId {
    /// Wrap an operation identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OperationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for OperationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for OperationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Error detail reported by the service for a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationError {
    /// The error code.
    pub code: String,
    /// The error message.
    pub message: String,
}

/// The state of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    /// The operation is still running. Status values the client does not
    /// recognize are reported as in progress as well.
    InProgress,
    /// The operation completed successfully.
    Succeeded,
    /// The operation failed.
    Failed(OperationError),
}

impl OperationState {
    /// Whether the operation has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// The status of an operation as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationStatus {
    /// The operation identifier.
    pub id: OperationId,
    /// Current state.
    pub state: OperationState,
    /// HTTP status code the operation resolved to, once finished.
    pub http_status_code: Option<u16>,
}

/// Body of `GET {subscription}/operations/{id}`.
#[derive(Debug, Deserialize)]
struct OperationDocument {
    #[serde(rename = "ID", default)]
    id: Option<String>,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "HttpStatusCode", default)]
    http_status_code: Option<u16>,
    #[serde(rename = "Error", default)]
    error: Option<ErrorDocument>,
}

#[derive(Debug, Deserialize)]
struct ErrorDocument {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

/// Decode an operation status document.
pub(crate) fn parse_operation_status(
    body: &[u8],
    requested: &OperationId,
) -> ManagementResult<OperationStatus> {
    let text = std::str::from_utf8(body).map_err(|e| {
        ManagementError::MalformedResponse(format!("operation status is not UTF-8: {e}"))
    })?;
    let document: OperationDocument = quick_xml::de::from_str(text)?;

    let state = match document.status.trim() {
        "Succeeded" => OperationState::Succeeded,
        "Failed" => {
            let error = document.error.map_or_else(
                || OperationError {
                    code: "Unknown".into(),
                    message: "operation failed without error details".into(),
                },
                |e| OperationError {
                    code: e.code,
                    message: e.message,
                },
            );
            OperationState::Failed(error)
        }
        _ => OperationState::InProgress,
    };

    let id = document
        .id
        .filter(|id| !id.trim().is_empty())
        .map_or_else(|| requested.clone(), OperationId::new);

    Ok(OperationStatus {
        id,
        state,
        http_status_code: document.http_status_code,
    })
}

impl ManagementClient {
    /// Get the current status of an operation.
    ///
    /// A response that cannot be decoded is an error, never a `Failed`
    /// status: the state of the operation is unknown and polling again may
    /// succeed.
    ///
    /// # Tracing
    ///
    /// Emits a span named `azure_management::operations::get_status` with
    /// field `operation_id`.
    #[tracing::instrument(
        name = "azure_management::operations::get_status",
        skip(self),
        fields(operation_id = %operation_id)
    )]
    pub async fn get_operation_status(
        &self,
        operation_id: &OperationId,
    ) -> ManagementResult<OperationStatus> {
        let url = self
            .status_url(operation_id)
            .map_err(|e| e.context(GET_OPERATION_STATUS, RequestPhase::Preparing))?;

        let response = self
            .execute(Method::GET, url, None, None)
            .await
            .map_err(|e| e.context(GET_OPERATION_STATUS, RequestPhase::Sending))?;

        let status = async {
            let response = Self::check_response(response).await?;
            let body = response.bytes().await?;
            parse_operation_status(&body, operation_id)
        }
        .await
        .map_err(|e| e.context(GET_OPERATION_STATUS, RequestPhase::Responding))?;

        tracing::debug!(state = ?status.state, "operation status retrieved");
        Ok(status)
    }

    /// `{subscription}/operations/{id}`, with the ID encoded as one segment.
    fn status_url(&self, operation_id: &OperationId) -> ManagementResult<url::Url> {
        let id = operation_id.as_str();
        if id.trim().is_empty() || id == "." || id == ".." {
            return Err(ManagementError::InvalidRequest(format!(
                "invalid operation ID {id:?}"
            )));
        }
        self.subscription_segments_url(["operations", id])
    }

    /// Poll an operation until it succeeds, fails, or `cancel` fires.
    ///
    /// The status is queried immediately, then once per
    /// [`operation_poll_interval`](Self::operation_poll_interval) while the
    /// operation is in progress. There is no built-in time limit; cancel the
    /// token to stop waiting. Both the interval wait and an in-flight query
    /// are abandoned as soon as cancellation is observed, and no further
    /// queries are sent.
    ///
    /// A failed status query ends the wait unless the client was configured
    /// with a [`poll_retry_policy`](crate::config::ClientConfig::poll_retry_policy).
    ///
    /// # Errors
    ///
    /// - [`ManagementError::OperationFailed`] if the operation failed.
    /// - [`ManagementError::Cancelled`] if `cancel` fired first.
    /// - Any error from [`get_operation_status`](Self::get_operation_status).
    ///
    /// # Tracing
    ///
    /// Emits a span named `azure_management::operations::wait` with field
    /// `operation_id`.
    #[tracing::instrument(
        name = "azure_management::operations::wait",
        skip(self, cancel),
        fields(operation_id = %operation_id)
    )]
    pub async fn wait_for_operation(
        &self,
        operation_id: &OperationId,
        cancel: &CancellationToken,
    ) -> ManagementResult<OperationStatus> {
        let interval = self.operation_poll_interval();
        let mut polls = 0u32;

        loop {
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(operation_id)),
                result = self.query_with_retry(operation_id, cancel) => result?,
            };
            polls += 1;

            match status.state {
                OperationState::Succeeded => {
                    tracing::debug!(polls, "operation succeeded");
                    return Ok(status);
                }
                OperationState::Failed(error) => {
                    tracing::debug!(polls, code = %error.code, "operation failed");
                    return Err(ManagementError::OperationFailed {
                        operation_id: operation_id.clone(),
                        code: error.code,
                        message: error.message,
                    });
                }
                OperationState::InProgress => {
                    tracing::trace!(polls, "operation still in progress, waiting");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled(operation_id)),
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
            }
        }
    }

    /// Query the status, retrying failed queries per the poll retry policy.
    async fn query_with_retry(
        &self,
        operation_id: &OperationId,
        cancel: &CancellationToken,
    ) -> ManagementResult<OperationStatus> {
        let policy = self.poll_retry_policy();
        let mut attempt = 0u32;

        loop {
            match self.get_operation_status(operation_id).await {
                Ok(status) => return Ok(status),
                Err(err) if attempt < policy.max_retries && err.is_retriable() => {
                    let backoff = policy.backoff(attempt);
                    attempt += 1;
                    tracing::trace!(attempt, ?backoff, error = %err, "status query failed, retrying");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled(operation_id)),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn cancelled(operation_id: &OperationId) -> ManagementError {
    tracing::debug!("waiting for operation cancelled");
    ManagementError::Cancelled {
        operation_id: operation_id.clone(),
    }
}
