//! Vault login methods that need no pre-shared secret

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::client::VaultClient;
use super::nonce::{persist_nonce, read_nonce};
use super::settings::{DEFAULT_K8S_AUTH_PATH, K8S_JWT_PATH};
use crate::error::{ConfigError, ConfigResult};

/// A way of obtaining a Vault token from the environment the process runs in
///
/// Implementations:
/// - `AwsLogin`: EC2 instance identity document + IAM role
/// - `KubernetesLogin`: pod service account token
#[async_trait]
pub trait VaultLogin: Send + Sync {
    /// Name of the auth method, for logs
    fn name(&self) -> &str;

    /// Log in and return the issued client token
    async fn login(&self, client: &VaultClient) -> ConfigResult<String>;
}

/// Extract `client_token` from a login response's `auth` section
fn client_token(auth: &Value) -> ConfigResult<String> {
    auth.get("client_token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ConfigError::InvalidResponse("missing auth.client_token".to_string()))
}

/// Insert only the values that are present and non-empty
fn insert_present(payload: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        payload.insert(key.to_string(), Value::String(value));
    }
}

/// AWS auth: proves the caller is a given EC2 instance.
///
/// Requires the instance's IAM role to be granted access in Vault.
/// See <https://developer.hashicorp.com/vault/docs/auth/aws>.
#[derive(Debug, Clone)]
pub struct AwsLogin {
    metadata_url: String,
    nonce_path: PathBuf,
}

impl AwsLogin {
    pub fn new(metadata_url: impl Into<String>, nonce_path: impl Into<PathBuf>) -> Self {
        Self {
            metadata_url: metadata_url.into().trim_end_matches('/').to_string(),
            nonce_path: nonce_path.into(),
        }
    }

    /// PKCS7 signature of the instance identity document, newlines removed
    async fn fetch_pkcs7(&self, http: &reqwest::Client) -> ConfigResult<String> {
        let body = self
            .fetch_metadata(http, "/dynamic/instance-identity/pkcs7")
            .await?;
        Ok(body.replace('\n', ""))
    }

    /// Name of the IAM role attached to the instance
    async fn fetch_role(&self, http: &reqwest::Client) -> ConfigResult<String> {
        let body = self
            .fetch_metadata(http, "/meta-data/iam/security-credentials/")
            .await?;
        Ok(body.replace('\n', ""))
    }

    async fn fetch_metadata(&self, http: &reqwest::Client, path: &str) -> ConfigResult<String> {
        let url = format!("{}{}", self.metadata_url, path);
        let context = format!("GET {}", url);
        debug!("Fetching instance metadata: {}", url);

        let response = http.get(&url).send().await.map_err(|source| ConfigError::Request {
            context: format!(
                "{} (is this an AWS instance? If not, configure vault.token explicitly)",
                context
            ),
            source,
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ConfigError::Request {
                context: context.clone(),
                source,
            })?;

        if status != reqwest::StatusCode::OK {
            return Err(ConfigError::Transport {
                context,
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl VaultLogin for AwsLogin {
    fn name(&self) -> &str {
        "aws"
    }

    async fn login(&self, client: &VaultClient) -> ConfigResult<String> {
        let http = client.http();
        let (nonce, pkcs7, role) = tokio::try_join!(
            read_nonce(&self.nonce_path),
            self.fetch_pkcs7(http),
            self.fetch_role(http),
        )?;

        info!(
            "Logging in to Vault with aws auth (role={}, stored_nonce={})",
            role,
            nonce.is_some()
        );
        let mut payload = Map::new();
        insert_present(&mut payload, "nonce", nonce.clone());
        insert_present(&mut payload, "pkcs7", Some(pkcs7));
        insert_present(&mut payload, "role", Some(role));

        let auth = client.login("aws", payload).await?;
        let token = client_token(&auth)?;

        // First login from this instance: Vault issues the nonce
        let issued = auth
            .pointer("/metadata/nonce")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(nonce) = nonce.or(issued) {
            persist_nonce(&self.nonce_path, &nonce).await?;
        }
        Ok(token)
    }
}

/// Kubernetes auth: proves the caller runs under a given service account.
///
/// Requires the role to exist at `auth/<auth_path>/role/<role>`.
#[derive(Debug, Clone)]
pub struct KubernetesLogin {
    role: String,
    auth_path: String,
    jwt_path: PathBuf,
}

impl KubernetesLogin {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            auth_path: DEFAULT_K8S_AUTH_PATH.to_string(),
            jwt_path: PathBuf::from(K8S_JWT_PATH),
        }
    }

    pub fn with_auth_path(mut self, auth_path: impl Into<String>) -> Self {
        self.auth_path = auth_path.into();
        self
    }

    pub fn with_jwt_path(mut self, jwt_path: impl Into<PathBuf>) -> Self {
        self.jwt_path = jwt_path.into();
        self
    }
}

#[async_trait]
impl VaultLogin for KubernetesLogin {
    fn name(&self) -> &str {
        "k8s"
    }

    async fn login(&self, client: &VaultClient) -> ConfigResult<String> {
        let jwt = tokio::fs::read_to_string(&self.jwt_path)
            .await
            .map_err(|e| ConfigError::io(&self.jwt_path, e))?;

        info!("Logging in to Vault with kubernetes auth (role={})", self.role);
        let mut payload = Map::new();
        insert_present(&mut payload, "role", Some(self.role.clone()));
        insert_present(&mut payload, "jwt", Some(jwt.trim().to_string()));

        let auth = client.login(&self.auth_path, payload).await?;
        client_token(&auth)
    }
}
