//! HTTP transport abstraction.
//!
//! The client sends every request through a [`Transport`]. The default is
//! [`ReqwestTransport`], whose connection pool is shared by all clones of a
//! client. Custom transports may opt in to receiving the management
//! certificate through [`Transport::inject_certificate`].

use std::fmt;

use async_trait::async_trait;

use crate::auth::ManagementCertificate;
use crate::error::ManagementResult;

/// Sends prepared HTTP requests.
///
/// Implementations must allow concurrent calls to [`send`](Self::send).
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send a request and return the raw response.
    async fn send(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response>;

    /// Whether this transport accepts the management certificate through
    /// [`inject_certificate`](Self::inject_certificate).
    fn supports_certificate_injection(&self) -> bool {
        false
    }

    /// Install the management certificate. Called once, at client construction,
    /// and only when [`supports_certificate_injection`](Self::supports_certificate_injection)
    /// returns `true`.
    fn inject_certificate(&mut self, _certificate: &ManagementCertificate) -> ManagementResult<()> {
        Ok(())
    }
}

/// A [`Transport`] backed by a [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wrap an already built reqwest client.
    ///
    /// The client is used as-is; it must carry its own TLS identity.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a transport from `builder` with the certificate as TLS client identity.
    pub(crate) fn with_certificate(
        builder: reqwest::ClientBuilder,
        certificate: &ManagementCertificate,
    ) -> ManagementResult<Self> {
        let identity = certificate.identity()?;
        let client = builder
            .use_rustls_tls()
            .identity(identity)
            .build()
            .map_err(|e| {
                crate::error::ManagementError::config_with_source("failed to build HTTP client", e)
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.client.execute(request).await
    }
}
