//! Helpers for testing code built on [`ManagementClient`] against a
//! [`wiremock::MockServer`].
//!
//! Enabled inside this crate's tests and, for sibling crates, through the
//! `test-support` feature.

use std::time::Duration;

use wiremock::MockServer;

use crate::auth::ManagementCertificate;
use crate::client::ManagementClient;
use crate::config::ClientConfig;

/// Self-signed certificate and private key (not a real credential).
pub const TEST_CERTIFICATE_PEM: &[u8] = include_bytes!("../tests/fixtures/management.pem");

/// Subscription ID used in test requests.
pub const TEST_SUBSCRIPTION_ID: &str = "00000000-1111-2222-3333-444444444444";

/// API version sent by test clients.
pub const TEST_API_VERSION: &str = "2014-10-01";

/// Poll interval used by test clients.
pub const TEST_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The test certificate.
pub fn test_certificate() -> ManagementCertificate {
    ManagementCertificate::from_pem(TEST_CERTIFICATE_PEM)
}

/// Create a test client connected to a mock server.
pub async fn setup_mock_client(server: &MockServer) -> ManagementClient {
    setup_mock_client_with(
        server,
        ClientConfig::default().operation_poll_interval(TEST_POLL_INTERVAL),
    )
    .await
}

/// Create a test client connected to a mock server, starting from `config`.
///
/// The management URL and API version of `config` are replaced.
pub async fn setup_mock_client_with(server: &MockServer, config: ClientConfig) -> ManagementClient {
    let config = config
        .management_url(server.uri())
        .api_version(TEST_API_VERSION);

    ManagementClient::from_config(TEST_SUBSCRIPTION_ID, test_certificate(), config)
        .expect("should build client")
}
