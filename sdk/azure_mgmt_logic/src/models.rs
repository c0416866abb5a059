//! Types shared across Logic Apps resources.

use std::collections::HashMap;

use serde::Deserialize;

/// Azure Resource Manager endpoint the Logic Apps API is served from.
///
/// Pass it to
/// [`ClientConfig::management_url`](azure_management_core::config::ClientConfig::management_url)
/// when building the [`ManagementClient`](azure_management_core::ManagementClient).
pub const DEFAULT_BASE_URI: &str = "https://management.azure.com";

/// API version query parameter for Logic Apps requests.
pub(crate) const API_VERSION: &str = "api-version=2015-02-01-preview";

/// Status of a workflow run or trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum WorkflowStatus {
    NotSpecified,
    Paused,
    Running,
    Waiting,
    Succeeded,
    Skipped,
    Suspended,
    Cancelled,
    Failed,
    Faulted,
    TimedOut,
    Aborted,
    /// A status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl WorkflowStatus {
    /// Whether the run will not change status any more.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded
                | Self::Skipped
                | Self::Cancelled
                | Self::Failed
                | Self::Faulted
                | Self::TimedOut
                | Self::Aborted
        )
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotSpecified => "NotSpecified",
            Self::Paused => "Paused",
            Self::Running => "Running",
            Self::Waiting => "Waiting",
            Self::Succeeded => "Succeeded",
            Self::Skipped => "Skipped",
            Self::Suspended => "Suspended",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
            Self::Faulted => "Faulted",
            Self::TimedOut => "TimedOut",
            Self::Aborted => "Aborted",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// A reference to another resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResourceReference {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
}

/// Declared type of a workflow parameter or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ParameterType {
    NotSpecified,
    String,
    SecureString,
    Int,
    Float,
    Bool,
    Array,
    Object,
    SecureObject,
    #[serde(other)]
    Unknown,
}

/// A link to content stored outside the run record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentLink {
    pub uri: Option<String>,
    pub content_version: Option<String>,
    pub content_size: Option<i64>,
    pub metadata: Option<serde_json::Value>,
}

/// An output value produced by a workflow run.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowOutputParameter {
    #[serde(rename = "type")]
    pub parameter_type: Option<ParameterType>,
    pub value: Option<serde_json::Value>,
    pub metadata: Option<serde_json::Value>,
    pub description: Option<String>,
    pub error: Option<serde_json::Value>,
}

/// Outputs keyed by name.
pub type WorkflowOutputs = HashMap<String, WorkflowOutputParameter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_version_format() {
        assert_eq!(API_VERSION, "api-version=2015-02-01-preview");
    }

    #[test]
    fn test_status_deserialization() {
        let status: WorkflowStatus = serde_json::from_str(r#""TimedOut""#).unwrap();
        assert_eq!(status, WorkflowStatus::TimedOut);
        assert!(status.is_terminal());

        let status: WorkflowStatus = serde_json::from_str(r#""Running""#).unwrap();
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let status: WorkflowStatus = serde_json::from_str(r#""Resuming""#).unwrap();
        assert_eq!(status, WorkflowStatus::Unknown);
        assert!(!status.is_terminal());
    }

    #[test]
    fn test_output_parameter_deserialization() {
        let json = r#"{"type": "SecureString", "value": "***", "description": "token"}"#;
        let output: WorkflowOutputParameter = serde_json::from_str(json).unwrap();
        assert_eq!(output.parameter_type, Some(ParameterType::SecureString));
        assert_eq!(output.description.as_deref(), Some("token"));
        assert!(output.error.is_none());
    }

    #[test]
    fn test_resource_reference_type_field() {
        let json = r#"{"id": "/subscriptions/s/x", "name": "wf", "type": "Microsoft.Logic/workflows"}"#;
        let reference: ResourceReference = serde_json::from_str(json).unwrap();
        assert_eq!(
            reference.resource_type.as_deref(),
            Some("Microsoft.Logic/workflows")
        );
    }
}
