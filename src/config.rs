use std::path::PathBuf;
use std::time::Duration;

/// TLS configuration for the coordination-store client.
///
/// When enabled, the client uses mutual TLS (mTLS):
/// - It presents its own certificate and private key
/// - It verifies the server certificate against the supplied CA bundle
/// - It checks the server identity against `server_name`
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Enable TLS. If false, all other TLS settings are ignored.
    pub enabled: bool,

    /// Path to the CA certificate bundle (PEM format).
    pub ca_cert_path: Option<PathBuf>,

    /// Path to the client certificate (PEM format).
    pub cert_path: Option<PathBuf>,

    /// Path to the client private key (PEM format).
    /// Must match the certificate.
    pub key_path: Option<PathBuf>,

    /// Expected server name in the coordination store's certificate.
    pub server_name: Option<String>,

    /// Allow plaintext connections when TLS files are missing.
    /// Intended for development clusters only.
    pub allow_insecure: bool,
}

impl TlsConfig {
    /// Check if TLS is properly configured with all required files.
    pub fn is_complete(&self) -> bool {
        self.enabled
            && self.ca_cert_path.is_some()
            && self.cert_path.is_some()
            && self.key_path.is_some()
            && self.server_name.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct CoordinationConfig {
    pub endpoints: Vec<String>,
    pub dial_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: TlsConfig,
    /// Lifetime of a kill signal before it self-expires.
    pub kill_lease_ttl_secs: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            endpoints: vec!["127.0.0.1:2379".to_string()],
            dial_timeout_ms: 5000,
            request_timeout_ms: 5000,
            username: None,
            password: None,
            tls: TlsConfig::default(),
            kill_lease_ttl_secs: 1,
        }
    }
}

impl CoordinationConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn kill_lease_ttl(&self) -> Duration {
        Duration::from_secs(self.kill_lease_ttl_secs)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordStoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub db_name: String,
    pub max_conns: u32,
    pub max_idle_conns: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            db_name: "cron".to_string(),
            max_conns: 20,
            max_idle_conns: 5,
            acquire_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ControlPlaneConfig {
    /// Machine component of generated snowflake IDs (0..=1023).
    pub machine_id: u16,
    pub coordination: CoordinationConfig,
    pub record: RecordStoreConfig,
}
