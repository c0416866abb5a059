use std::fmt;

use thiserror::Error;

use crate::operation::OperationId;

/// The phase of a request in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    /// Building the request (URL, headers, body).
    Preparing,
    /// Sending the request over the transport.
    Sending,
    /// Inspecting or decoding the response.
    Responding,
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Preparing => "preparing request",
            Self::Sending => "sending request",
            Self::Responding => "responding to request",
        })
    }
}

/// Errors that can occur when interacting with the Azure management APIs.
#[derive(Error, Debug)]
pub enum ManagementError {
    /// The client configuration is invalid. No client is constructed.
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A request could not be built from the given arguments.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The HTTP request failed at the transport level.
    #[error("Request error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with an error response.
    #[error("Azure error ({status}) {code}: {message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
    },

    /// The response could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// An error annotated with the operation and phase it occurred in.
    #[error("{operation}: failure {phase}: {source}")]
    Context {
        operation: String,
        phase: RequestPhase,
        #[source]
        source: Box<ManagementError>,
    },

    /// A long-running operation reached the `Failed` state.
    #[error("Operation {operation_id} failed ({code}): {message}")]
    OperationFailed {
        operation_id: OperationId,
        code: String,
        message: String,
    },

    /// Waiting for a long-running operation was cancelled by the caller.
    #[error("Waiting for operation {operation_id} was cancelled")]
    Cancelled { operation_id: OperationId },
}

impl ManagementError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error that keeps the underlying cause.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Annotate this error with an operation name and request phase.
    pub fn context(self, operation: impl Into<String>, phase: RequestPhase) -> Self {
        Self::Context {
            operation: operation.into(),
            phase,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through any [`ManagementError::Context`] layers.
    pub fn root_cause(&self) -> &ManagementError {
        let mut current = self;
        while let Self::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// The HTTP status of a remote error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self.root_cause() {
            Self::Remote { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the service reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether this error is the result of caller-initiated cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Self::Cancelled { .. })
    }

    /// Whether repeating the request that produced this error may succeed.
    ///
    /// Transport failures, unparseable responses, and retriable HTTP
    /// statuses qualify. Configuration errors, terminal operation failures
    /// and cancellation never do.
    pub fn is_retriable(&self) -> bool {
        match self.root_cause() {
            Self::Transport(_) | Self::MalformedResponse(_) => true,
            Self::Remote { status, .. } => crate::client::is_retriable_status(*status),
            _ => false,
        }
    }
}

impl From<quick_xml::DeError> for ManagementError {
    fn from(err: quick_xml::DeError) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

impl From<serde_json::Error> for ManagementError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

/// Result type alias for management operations.
pub type ManagementResult<T> = std::result::Result<T, ManagementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_display_includes_operation_and_phase() {
        let err = ManagementError::Remote {
            status: 409,
            code: "ConflictError".into(),
            message: "busy".into(),
        }
        .context("logic/WorkflowRunsClient.Cancel", RequestPhase::Responding);

        assert_eq!(
            err.to_string(),
            "logic/WorkflowRunsClient.Cancel: failure responding to request: Azure error (409) ConflictError: busy"
        );
    }

    #[test]
    fn helpers_look_through_context() {
        let err = ManagementError::Remote {
            status: 404,
            code: "ResourceNotFound".into(),
            message: "gone".into(),
        }
        .context("GetOperationStatus", RequestPhase::Responding);

        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_retriable());
        assert!(matches!(err.root_cause(), ManagementError::Remote { .. }));
    }

    #[test]
    fn retriable_classification() {
        let throttled = ManagementError::Remote {
            status: 503,
            code: "ServerBusy".into(),
            message: "try later".into(),
        };
        assert!(throttled.is_retriable());
        assert!(ManagementError::MalformedResponse("eof".into()).is_retriable());
        assert!(!ManagementError::config("bad").is_retriable());

        let cancelled = ManagementError::Cancelled {
            operation_id: OperationId::new("op-1"),
        };
        assert!(cancelled.is_cancelled());
        assert!(!cancelled.is_retriable());
    }

    #[test]
    fn xml_errors_become_malformed_response() {
        let err: ManagementError = quick_xml::de::from_str::<u32>("abc").unwrap_err().into();
        assert!(matches!(err, ManagementError::MalformedResponse(_)));
    }
}
