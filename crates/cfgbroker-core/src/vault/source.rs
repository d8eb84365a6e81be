//! Vault-backed configuration source

use std::collections::BTreeSet;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::client::VaultClient;
use super::login::{AwsLogin, KubernetesLogin, VaultLogin};
use super::settings::{AuthMethod, VaultSettings};
use crate::error::{ConfigError, ConfigResult};
use crate::source::{Lookup, ObjectSource, Source};

/// Marker replacing every secret value in log output
pub const REDACTED: &str = "***";

/// Source serving secrets pre-fetched from Vault
///
/// `initialize` obtains a token (unless one was supplied), lists the keys
/// under the configured prefix and fetches every allow-listed key into an
/// in-memory cache. Keys present in Vault but missing from the allow-list
/// are marked not available, so looking them up is an error instead of a
/// silent miss. After `initialize` every lookup is purely in-memory.
///
/// Before `initialize` completes, every key is absent.
pub struct VaultSource {
    client: VaultClient,
    login: Box<dyn VaultLogin>,
    allowed_keys: Option<Vec<String>>,
    cache: Option<ObjectSource>,
}

impl VaultSource {
    /// Build a source from settings.
    ///
    /// `allowed_keys` is the complete list of secrets the application needs;
    /// `None` allows every key found under the prefix.
    pub fn new(settings: &VaultSettings, allowed_keys: Option<Vec<String>>) -> ConfigResult<Self> {
        let host = settings
            .host
            .clone()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::VaultConfig("vault.host is required".to_string()))?;

        let token = settings
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .map(SecretString::from);
        let needs_login = token.is_none();

        let client = VaultClient::new(host.clone(), settings.engine())
            .with_key_prefix(settings.key_prefix.clone())
            .with_token(token);

        debug!(
            "Vault source for {} (auth={}, token supplied={})",
            host,
            settings.auth_method.as_str(),
            !needs_login
        );
        let login: Box<dyn VaultLogin> = match settings.auth_method {
            AuthMethod::Aws => {
                let nonce_path = match (&settings.nonce_path, needs_login) {
                    (Some(path), _) => path.clone(),
                    (None, true) => {
                        return Err(ConfigError::VaultConfig(
                            "vault.nonce_path is required for aws login".to_string(),
                        ))
                    }
                    (None, false) => Default::default(),
                };
                Box::new(AwsLogin::new(settings.metadata_url(), nonce_path))
            }
            AuthMethod::Kubernetes => {
                let role = match (&settings.role, needs_login) {
                    (Some(role), _) => role.clone(),
                    (None, true) => {
                        return Err(ConfigError::VaultConfig(
                            "vault.role is required for kubernetes login".to_string(),
                        ))
                    }
                    (None, false) => String::new(),
                };
                let mut login = KubernetesLogin::new(role);
                if let Some(auth_path) = &settings.auth_path {
                    login = login.with_auth_path(auth_path.clone());
                }
                if let Some(jwt_path) = &settings.jwt_path {
                    login = login.with_jwt_path(jwt_path.clone());
                }
                Box::new(login)
            }
        };

        Ok(Self::from_parts(client, login, allowed_keys))
    }

    /// Build a source from an already configured client and login method
    pub fn from_parts(
        client: VaultClient,
        login: Box<dyn VaultLogin>,
        allowed_keys: Option<Vec<String>>,
    ) -> Self {
        Self {
            client,
            login,
            allowed_keys,
            cache: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cache.is_some()
    }

    async fn ensure_token(&mut self) -> ConfigResult<()> {
        if self.client.has_token() {
            debug!("Vault token supplied, skipping login");
            return Ok(());
        }
        let token = self.login.login(&self.client).await?;
        self.client.set_token(SecretString::from(token));
        info!("Obtained Vault token via {} login", self.login.name());
        Ok(())
    }

    async fn populate_cache(&self) -> ConfigResult<ObjectSource> {
        let listed = self.client.list_keys().await?;

        let allowed: Vec<String> = match &self.allowed_keys {
            Some(keys) => keys.iter().filter(|k| !k.ends_with('/')).cloned().collect(),
            None => listed.clone(),
        };
        let allowed_set: BTreeSet<&str> = allowed.iter().map(String::as_str).collect();
        let blocked: Vec<&String> = listed
            .iter()
            .filter(|key| !allowed_set.contains(key.as_str()))
            .collect();

        let mut data = Map::new();
        for key in &allowed {
            debug!("Fetching Vault secret '{}'", key);
            let secret = self.client.read_secret(key).await?;
            data.insert(key.clone(), secret);
        }

        let mut cache = ObjectSource::with_name("vault", Value::Object(data));
        for key in &blocked {
            cache.set_not_available(key.as_str());
        }
        if !blocked.is_empty() {
            warn!(
                "{} Vault keys are not in the allow-list and will be unavailable",
                blocked.len()
            );
        }
        info!("Cached {} Vault secrets", allowed.len());
        Ok(cache)
    }
}

/// Replace every leaf of `value` with the redaction marker, keeping structure
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), redact(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        _ => Value::String(REDACTED.to_string()),
    }
}

#[async_trait]
impl Source for VaultSource {
    fn name(&self) -> &str {
        "vault"
    }

    fn get(&self, key: &str) -> Lookup {
        match &self.cache {
            Some(cache) => cache.get(key),
            None => Lookup::Absent,
        }
    }

    async fn initialize(&mut self) -> ConfigResult<()> {
        if self.cache.is_some() {
            return Err(ConfigError::AlreadyInitialized("vault".to_string()));
        }
        info!("Initializing Vault source at {}", self.client.host());

        self.ensure_token().await?;
        let mut cache = self.populate_cache().await?;
        cache.initialize().await?;
        self.cache = Some(cache);
        Ok(())
    }

    fn describe_for_logging(&self) -> Value {
        match &self.cache {
            Some(cache) => redact(&cache.describe_for_logging()),
            None => Value::Object(Map::new()),
        }
    }
}

impl std::fmt::Debug for VaultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSource")
            .field("client", &self.client)
            .field("login", &self.login.name())
            .field("allowed_keys", &self.allowed_keys)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
