//! Integration tests for azure_mgmt_logic.
//!
//! These tests require a live subscription with an existing Logic App.
//! Run with: `cargo test --features integration-tests`
//!
//! Required environment variables:
//! - `AZURE_SUBSCRIPTION_ID`: The subscription to query
//! - `AZURE_MANAGEMENT_CERTIFICATE_PATH`: PEM file with the management certificate and key
//! - `AZURE_LOGIC_RESOURCE_GROUP`: Resource group containing the workflow
//! - `AZURE_LOGIC_WORKFLOW`: Workflow name

#![cfg(feature = "integration-tests")]

use azure_management_core::auth::ManagementCertificate;
use azure_management_core::config::ClientConfig;
use azure_management_core::ManagementClient;
use azure_mgmt_logic::models::DEFAULT_BASE_URI;
use azure_mgmt_logic::workflow_runs::{self, ListOptions};

fn get_client() -> ManagementClient {
    let subscription_id =
        std::env::var("AZURE_SUBSCRIPTION_ID").expect("AZURE_SUBSCRIPTION_ID not set");
    let certificate = ManagementCertificate::from_env().expect("certificate not available");

    ManagementClient::from_config(
        subscription_id,
        certificate,
        ClientConfig::default().management_url(DEFAULT_BASE_URI),
    )
    .expect("Failed to build client")
}

fn get_workflow() -> (String, String) {
    let group =
        std::env::var("AZURE_LOGIC_RESOURCE_GROUP").expect("AZURE_LOGIC_RESOURCE_GROUP not set");
    let workflow = std::env::var("AZURE_LOGIC_WORKFLOW").expect("AZURE_LOGIC_WORKFLOW not set");
    (group, workflow)
}

#[tokio::test]
async fn test_list_and_get_runs() {
    let client = get_client();
    let (group, workflow) = get_workflow();

    let page = workflow_runs::list(&client, &group, &workflow, &ListOptions::default().top(5))
        .await
        .expect("list runs");
    assert!(page.value.len() <= 5);

    // Fetch each listed run individually
    for run in &page.value {
        let name = run.name.as_deref().expect("run name");
        let fetched = workflow_runs::get(&client, &group, &workflow, name)
            .await
            .expect("get run");
        assert_eq!(fetched.name.as_deref(), Some(name));
    }
}

#[tokio::test]
async fn test_get_missing_run_is_not_found() {
    let client = get_client();
    let (group, workflow) = get_workflow();

    let err = workflow_runs::get(&client, &group, &workflow, "00000000000000000000")
        .await
        .expect_err("run should not exist");
    assert!(err.is_not_found());
}
