//! Logic Apps workflow run operations.
//!
//! Runs live under
//! `/subscriptions/{subscription}/resourceGroups/{group}/providers/Microsoft.Logic/workflows/{workflow}/runs`
//! on the Resource Manager endpoint. Every error returned from this module is
//! a [`ManagementError::Context`] naming the operation (for example
//! `logic/WorkflowRunsClient.Get`) and the [`RequestPhase`] it failed in.
//!
//! # Example
//!
//! ```rust,no_run
//! use azure_management_core::auth::ManagementCertificate;
//! use azure_management_core::config::ClientConfig;
//! use azure_management_core::ManagementClient;
//! use azure_mgmt_logic::models::DEFAULT_BASE_URI;
//! use azure_mgmt_logic::workflow_runs::{self, ListOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ManagementClient::from_config(
//!     "00000000-0000-0000-0000-000000000000",
//!     ManagementCertificate::from_pem_file("management.pem")?,
//!     ClientConfig::default().management_url(DEFAULT_BASE_URI),
//! )?;
//!
//! let options = ListOptions::default().top(10).filter("status eq 'Running'");
//! let mut page = workflow_runs::list(&client, "my-group", "my-workflow", &options).await?;
//! loop {
//!     for run in &page.value {
//!         if let Some(name) = &run.name {
//!             workflow_runs::cancel(&client, "my-group", "my-workflow", name).await?;
//!         }
//!     }
//!     match workflow_runs::list_next(&client, &page).await? {
//!         Some(next) => page = next,
//!         None => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use azure_management_core::error::{ManagementError, ManagementResult, RequestPhase};
use azure_management_core::ManagementClient;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::models::{
    ContentLink, ResourceReference, WorkflowOutputs, WorkflowStatus, API_VERSION,
};

const GET_OPERATION: &str = "logic/WorkflowRunsClient.Get";
const LIST_OPERATION: &str = "logic/WorkflowRunsClient.List";
const CANCEL_OPERATION: &str = "logic/WorkflowRunsClient.Cancel";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single execution of a workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    /// Full resource ID.
    pub id: Option<String>,
    /// Run name.
    pub name: Option<String>,
    /// Resource type, `Microsoft.Logic/workflows/runs`.
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    /// Run details.
    pub properties: Option<WorkflowRunProperties>,
}

impl WorkflowRun {
    /// The run status, if the service reported one.
    pub fn status(&self) -> Option<WorkflowStatus> {
        self.properties.as_ref()?.status
    }
}

/// Details of a workflow run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunProperties {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub status: Option<WorkflowStatus>,
    pub code: Option<String>,
    pub error: Option<serde_json::Value>,
    pub correlation_id: Option<String>,
    pub workflow: Option<ResourceReference>,
    pub trigger: Option<WorkflowRunTrigger>,
    pub outputs: Option<WorkflowOutputs>,
}

/// The trigger that started a run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunTrigger {
    pub name: Option<String>,
    pub inputs: Option<serde_json::Value>,
    pub inputs_link: Option<ContentLink>,
    pub outputs: Option<serde_json::Value>,
    pub outputs_link: Option<ContentLink>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub tracking_id: Option<String>,
    pub code: Option<String>,
    pub status: Option<WorkflowStatus>,
    pub error: Option<serde_json::Value>,
}

/// One page of workflow runs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowRunList {
    /// Runs on this page.
    #[serde(default)]
    pub value: Vec<WorkflowRun>,
    /// Link to the next page, absent on the last one.
    #[serde(rename = "nextLink")]
    pub next_link: Option<String>,
}

impl WorkflowRunList {
    /// Whether another page can be fetched with [`list_next`].
    pub fn has_next(&self) -> bool {
        self.next_link.as_deref().is_some_and(|link| !link.is_empty())
    }
}

/// Optional query parameters for [`list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Maximum number of runs per page (`$top`).
    pub top: Option<u32>,
    /// OData filter expression (`$filter`).
    pub filter: Option<String>,
}

impl ListOptions {
    /// Set the page size.
    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    /// Set the filter expression, e.g. `status eq 'Failed'`.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

// ---------------------------------------------------------------------------
// API functions
// ---------------------------------------------------------------------------

/// Get a workflow run.
///
/// # Tracing
///
/// Emits a span named `azure_mgmt_logic::workflow_runs::get`.
#[tracing::instrument(
    name = "azure_mgmt_logic::workflow_runs::get",
    skip(client),
    fields(resource_group = %resource_group, workflow = %workflow, run = %run)
)]
pub async fn get(
    client: &ManagementClient,
    resource_group: &str,
    workflow: &str,
    run: &str,
) -> ManagementResult<WorkflowRun> {
    tracing::debug!("getting workflow run");

    let url = runs_url(client, resource_group, workflow, &[run])
        .map_err(|e| e.context(GET_OPERATION, RequestPhase::Preparing))?;

    let response = client
        .execute(Method::GET, url, None, None)
        .await
        .map_err(|e| e.context(GET_OPERATION, RequestPhase::Sending))?;

    let result: WorkflowRun = respond_json(response)
        .await
        .map_err(|e| e.context(GET_OPERATION, RequestPhase::Responding))?;

    tracing::debug!(status = ?result.status(), "workflow run fetched");
    Ok(result)
}

/// List the runs of a workflow, first page.
///
/// # Tracing
///
/// Emits a span named `azure_mgmt_logic::workflow_runs::list`.
#[tracing::instrument(
    name = "azure_mgmt_logic::workflow_runs::list",
    skip(client, options),
    fields(resource_group = %resource_group, workflow = %workflow)
)]
pub async fn list(
    client: &ManagementClient,
    resource_group: &str,
    workflow: &str,
    options: &ListOptions,
) -> ManagementResult<WorkflowRunList> {
    tracing::debug!("listing workflow runs");

    let url = runs_url(client, resource_group, workflow, &[])
        .map(|mut url| {
            {
                let mut query = url.query_pairs_mut();
                if let Some(top) = options.top {
                    query.append_pair("$top", &top.to_string());
                }
                if let Some(filter) = &options.filter {
                    query.append_pair("$filter", filter);
                }
            }
            url
        })
        .map_err(|e| e.context(LIST_OPERATION, RequestPhase::Preparing))?;

    fetch_page(client, url).await
}

/// Fetch the page after `page`, or `None` if `page` is the last one.
///
/// The next link is resolved against the client's management URL, so the
/// request never leaves the configured endpoint.
///
/// # Tracing
///
/// Emits a span named `azure_mgmt_logic::workflow_runs::list_next`.
#[tracing::instrument(name = "azure_mgmt_logic::workflow_runs::list_next", skip_all)]
pub async fn list_next(
    client: &ManagementClient,
    page: &WorkflowRunList,
) -> ManagementResult<Option<WorkflowRunList>> {
    let Some(next_link) = page.next_link.as_deref().filter(|link| !link.is_empty()) else {
        return Ok(None);
    };
    tracing::debug!(next_link = %next_link, "fetching next page of workflow runs");

    let url = next_page_url(client, next_link)
        .map_err(|e| e.context(LIST_OPERATION, RequestPhase::Preparing))?;

    fetch_page(client, url).await.map(Some)
}

/// Cancel a running workflow run.
///
/// The service must answer `200 OK`; any other status is an error.
///
/// # Tracing
///
/// Emits a span named `azure_mgmt_logic::workflow_runs::cancel`.
#[tracing::instrument(
    name = "azure_mgmt_logic::workflow_runs::cancel",
    skip(client),
    fields(resource_group = %resource_group, workflow = %workflow, run = %run)
)]
pub async fn cancel(
    client: &ManagementClient,
    resource_group: &str,
    workflow: &str,
    run: &str,
) -> ManagementResult<()> {
    tracing::debug!("cancelling workflow run");

    let url = runs_url(client, resource_group, workflow, &[run, "cancel"])
        .map_err(|e| e.context(CANCEL_OPERATION, RequestPhase::Preparing))?;

    let response = client
        .execute(Method::POST, url, None, None)
        .await
        .map_err(|e| e.context(CANCEL_OPERATION, RequestPhase::Sending))?;

    expect_ok(response)
        .await
        .map_err(|e| e.context(CANCEL_OPERATION, RequestPhase::Responding))?;

    tracing::debug!("workflow run cancelled");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn fetch_page(client: &ManagementClient, url: Url) -> ManagementResult<WorkflowRunList> {
    let response = client
        .execute(Method::GET, url, None, None)
        .await
        .map_err(|e| e.context(LIST_OPERATION, RequestPhase::Sending))?;

    let page: WorkflowRunList = respond_json(response)
        .await
        .map_err(|e| e.context(LIST_OPERATION, RequestPhase::Responding))?;

    tracing::debug!(
        count = page.value.len(),
        has_next = page.has_next(),
        "workflow runs page fetched"
    );
    Ok(page)
}

/// Build `.../workflows/{workflow}/runs[/{extra}...]?api-version=...`,
/// percent-encoding every segment.
fn runs_url(
    client: &ManagementClient,
    resource_group: &str,
    workflow: &str,
    extra: &[&str],
) -> ManagementResult<Url> {
    require_segment("resource group", resource_group)?;
    require_segment("workflow name", workflow)?;
    for segment in extra {
        require_segment("run name", segment)?;
    }

    let mut url = client.resource_url("")?;
    url.path_segments_mut()
        .map_err(|()| {
            ManagementError::InvalidRequest("management URL cannot carry a path".into())
        })?
        .pop_if_empty()
        .extend([
            "subscriptions",
            client.subscription_id(),
            "resourceGroups",
            resource_group,
            "providers",
            "Microsoft.Logic",
            "workflows",
            workflow,
            "runs",
        ])
        .extend(extra);
    url.set_query(Some(API_VERSION));
    Ok(url)
}

fn next_page_url(client: &ManagementClient, next_link: &str) -> ManagementResult<Url> {
    let parsed = Url::parse(next_link)
        .map_err(|e| ManagementError::InvalidRequest(format!("invalid next link: {e}")))?;

    let relative_path = match parsed.query() {
        Some(q) => format!("{}?{q}", parsed.path()),
        None => parsed.path().to_string(),
    };
    client.resource_url(&relative_path)
}

fn require_segment(what: &str, value: &str) -> ManagementResult<()> {
    if value.trim().is_empty() {
        return Err(ManagementError::InvalidRequest(format!("{what} is required")));
    }
    Ok(())
}

async fn expect_ok(response: reqwest::Response) -> ManagementResult<reqwest::Response> {
    let response = ManagementClient::check_response(response).await?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(ManagementError::Remote {
            status: status.as_u16(),
            code: "UnexpectedStatus".into(),
            message: format!("expected 200 OK, got {status}"),
        });
    }
    Ok(response)
}

async fn respond_json<T: DeserializeOwned>(response: reqwest::Response) -> ManagementResult<T> {
    let response = expect_ok(response).await?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
