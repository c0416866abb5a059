//! Integration tests for azure_management_core.
//!
//! These tests require a live subscription that accepts management certificates.
//! Run with: `cargo test --features integration-tests`
//!
//! Required environment variables:
//! - `AZURE_SUBSCRIPTION_ID`: The subscription to query
//! - `AZURE_MANAGEMENT_CERTIFICATE_PATH`: PEM file with the management certificate and key

#![cfg(feature = "integration-tests")]

use azure_management_core::operation::OperationId;
use azure_management_core::ManagementClient;
use tokio_util::sync::CancellationToken;

fn get_client() -> ManagementClient {
    ManagementClient::from_env().expect("Failed to build client")
}

#[tokio::test]
async fn test_list_hosted_services() {
    let client = get_client();

    let body = client
        .send_get("services/hostedservices")
        .await
        .expect("list hosted services");
    let body = String::from_utf8_lossy(&body);
    assert!(body.contains("HostedServices"));
}

#[tokio::test]
async fn test_unknown_operation_status_is_an_error() {
    let client = get_client();

    let err = client
        .get_operation_status(&OperationId::new("00000000000000000000000000000000"))
        .await
        .expect_err("operation should not exist");
    assert!(err.status().is_some());
}

#[tokio::test]
async fn test_wait_cancelled_before_start() {
    let client = get_client();
    let token = CancellationToken::new();
    token.cancel();

    let err = client
        .wait_for_operation(&OperationId::new("00000000000000000000000000000000"), &token)
        .await
        .expect_err("should be cancelled");
    assert!(err.is_cancelled());
}
