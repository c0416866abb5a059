//! Management certificate credentials.
//!
//! The Service Management API authenticates callers with a client
//! certificate presented during the TLS handshake. The certificate and its
//! private key are held as opaque PEM material and only turned into a TLS
//! identity when the transport is built.

use std::path::Path;

use secrecy::{ExposeSecret, SecretSlice};

use crate::error::{ManagementError, ManagementResult};

/// Environment variable holding the path of a PEM file with the management
/// certificate and its private key.
pub const CERTIFICATE_PATH_ENV: &str = "AZURE_MANAGEMENT_CERTIFICATE_PATH";

/// A management certificate and private key in PEM form.
pub struct ManagementCertificate {
    pem: SecretSlice<u8>,
}

impl ManagementCertificate {
    /// Create a certificate from PEM bytes containing both the certificate
    /// and its private key.
    pub fn from_pem(pem: impl Into<Vec<u8>>) -> Self {
        Self {
            pem: SecretSlice::from(pem.into()),
        }
    }

    /// Create a certificate from separate certificate and key PEM blocks.
    pub fn from_pem_parts(certificate: &[u8], private_key: &[u8]) -> Self {
        let mut pem = Vec::with_capacity(certificate.len() + private_key.len() + 1);
        pem.extend_from_slice(certificate);
        if !certificate.is_empty() && !certificate.ends_with(b"\n") {
            pem.push(b'\n');
        }
        pem.extend_from_slice(private_key);
        Self::from_pem(pem)
    }

    /// Read a combined certificate and key PEM file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> ManagementResult<Self> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| {
            ManagementError::config_with_source(
                format!("failed to read management certificate {}", path.display()),
                e,
            )
        })?;
        Ok(Self::from_pem(pem))
    }

    /// Read the certificate file named by `AZURE_MANAGEMENT_CERTIFICATE_PATH`.
    pub fn from_env() -> ManagementResult<Self> {
        match std::env::var(CERTIFICATE_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::from_pem_file(path),
            _ => Err(ManagementError::config(format!(
                "management certificate is required. Set {CERTIFICATE_PATH_ENV}."
            ))),
        }
    }

    /// Whether no certificate material was supplied.
    pub fn is_empty(&self) -> bool {
        self.pem.expose_secret().is_empty()
    }

    /// Build the TLS client identity for this certificate.
    pub(crate) fn identity(&self) -> ManagementResult<reqwest::Identity> {
        reqwest::Identity::from_pem(self.pem.expose_secret()).map_err(|e| {
            ManagementError::config_with_source("invalid management certificate", e)
        })
    }

    /// The raw PEM material, for transports that configure TLS themselves.
    pub fn pem(&self) -> &[u8] {
        self.pem.expose_secret()
    }
}

impl std::fmt::Debug for ManagementCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ManagementCertificate(****)")
    }
}
