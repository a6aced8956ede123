//! TLS utilities for the coordination-store client.
//!
//! Loads the CA bundle, client certificate and private key and turns them
//! into the mutual-TLS options the etcd client expects.

use std::path::PathBuf;

use etcd_client::{Certificate, Identity, TlsOptions};
use tokio::fs;

use crate::config::TlsConfig;

/// Error type for TLS configuration issues.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("CA certificate path not configured")]
    MissingCaCert,

    #[error("Client certificate path not configured")]
    MissingCert,

    #[error("Private key path not configured")]
    MissingKey,

    #[error("Server name not configured")]
    MissingServerName,

    #[error("CA certificate not found: {0}")]
    CaCertNotFound(PathBuf),

    #[error("Client certificate not found: {0}")]
    CertNotFound(PathBuf),

    #[error("Private key not found: {0}")]
    KeyNotFound(PathBuf),

    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),
}

/// Loaded TLS materials ready for use with the etcd client.
#[derive(Clone)]
pub struct TlsIdentity {
    /// Client certificate + private key
    identity: Identity,
    /// CA bundle used to verify the server
    ca_cert: Certificate,
    server_name: String,
}

impl TlsIdentity {
    /// Load TLS materials from file paths specified in the config.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Any required path or the server name is not configured
    /// - Any file does not exist or cannot be read
    pub async fn load(config: &TlsConfig) -> Result<Self, TlsError> {
        let ca_cert_path = config
            .ca_cert_path
            .as_ref()
            .ok_or(TlsError::MissingCaCert)?;
        let cert_path = config.cert_path.as_ref().ok_or(TlsError::MissingCert)?;
        let key_path = config.key_path.as_ref().ok_or(TlsError::MissingKey)?;
        let server_name = config
            .server_name
            .clone()
            .ok_or(TlsError::MissingServerName)?;

        if !ca_cert_path.exists() {
            return Err(TlsError::CaCertNotFound(ca_cert_path.clone()));
        }
        if !cert_path.exists() {
            return Err(TlsError::CertNotFound(cert_path.clone()));
        }
        if !key_path.exists() {
            return Err(TlsError::KeyNotFound(key_path.clone()));
        }

        let ca_pem = fs::read(ca_cert_path).await?;
        let cert_pem = fs::read(cert_path).await?;
        let key_pem = fs::read(key_path).await?;

        Ok(Self {
            identity: Identity::from_pem(cert_pem, key_pem),
            ca_cert: Certificate::from_pem(ca_pem),
            server_name,
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Client TLS options: present our certificate, trust only the CA
    /// bundle, and require the server certificate to match `server_name`.
    pub fn client_tls_options(&self) -> TlsOptions {
        TlsOptions::new()
            .domain_name(self.server_name.clone())
            .ca_certificate(self.ca_cert.clone())
            .identity(self.identity.clone())
    }
}
