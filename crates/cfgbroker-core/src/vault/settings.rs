//! Vault connection settings, read from the `vault` config section

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default secrets engine mount
pub const DEFAULT_ENGINE: &str = "secret";

/// AWS instance metadata service
// https://docs.aws.amazon.com/AWSEC2/latest/UserGuide/ec2-instance-metadata.html
pub const AWS_METADATA_URL: &str = "http://169.254.169.254/latest";

/// Default Kubernetes auth mount
pub const DEFAULT_K8S_AUTH_PATH: &str = "kubernetes";

/// Service account token mounted into every pod
pub const K8S_JWT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// How the source obtains a Vault token when none is configured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthMethod {
    /// AWS auth backend using the instance identity document
    #[default]
    #[serde(rename = "aws")]
    Aws,
    /// Kubernetes auth backend using the pod's service account token
    #[serde(rename = "k8s", alias = "kubernetes")]
    Kubernetes,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Aws => "aws",
            AuthMethod::Kubernetes => "k8s",
        }
    }
}

/// Settings for a [`VaultSource`](super::VaultSource)
///
/// Usually deserialized from the `vault` section of the loaded config:
///
/// ```yaml
/// vault:
///   enabled: true
///   host: https://vault.internal:8200
///   key_prefix: myapp
///   nonce_path: /var/lib/myapp/vault-nonce
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct VaultSettings {
    /// Whether the broker should include a Vault source at all
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the Vault server
    #[serde(default)]
    pub host: Option<String>,

    /// Secrets engine mount (KV v2)
    #[serde(default)]
    pub engine: Option<String>,

    /// Path prefix under the engine where this application's secrets live
    #[serde(default)]
    pub key_prefix: Option<String>,

    /// Pre-supplied token; skips the login bootstrap (local/dev)
    #[serde(default)]
    pub token: Option<String>,

    /// File holding the AWS login nonce
    #[serde(default)]
    pub nonce_path: Option<PathBuf>,

    #[serde(default)]
    pub auth_method: AuthMethod,

    /// Kubernetes auth role
    #[serde(default)]
    pub role: Option<String>,

    /// Kubernetes auth mount, defaults to `kubernetes`
    #[serde(default)]
    pub auth_path: Option<String>,

    /// Instance metadata base URL, defaults to the AWS link-local address
    #[serde(default)]
    pub metadata_url: Option<String>,

    /// Service account token file, defaults to the in-pod location
    #[serde(default)]
    pub jwt_path: Option<PathBuf>,
}

impl VaultSettings {
    /// Settings pointing at `host` with everything else defaulted
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            enabled: true,
            host: Some(host.into()),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_nonce_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.nonce_path = Some(path.into());
        self
    }

    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = Some(url.into());
        self
    }

    pub fn engine(&self) -> &str {
        self.engine.as_deref().unwrap_or(DEFAULT_ENGINE)
    }

    pub fn metadata_url(&self) -> &str {
        self.metadata_url.as_deref().unwrap_or(AWS_METADATA_URL)
    }
}

impl std::fmt::Debug for VaultSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSettings")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("engine", &self.engine())
            .field("key_prefix", &self.key_prefix)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("nonce_path", &self.nonce_path)
            .field("auth_method", &self.auth_method)
            .field("role", &self.role)
            .field("auth_path", &self.auth_path)
            .field("metadata_url", &self.metadata_url())
            .field("jwt_path", &self.jwt_path)
            .finish()
    }
}
