//! Minimal HTTP client for the Vault KV v2 and auth APIs

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Header carrying the Vault token on authenticated requests
pub const TOKEN_HEADER: &str = "X-Vault-Token";

/// Vault HTTP client
///
/// Paths follow the KV v2 layout:
/// - `LIST /v1/<engine>/metadata/<prefix>` to enumerate keys
/// - `GET /v1/<engine>/data/<prefix>/<key>` to read a secret
/// - `POST /v1/auth/<backend>/login` to obtain a token
pub struct VaultClient {
    http: reqwest::Client,
    host: String,
    engine: String,
    key_prefix: Option<String>,
    token: Option<SecretString>,
}

impl VaultClient {
    /// Create a client for `host` (e.g. `https://vault.internal:8200`)
    pub fn new(host: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: host.into().trim_end_matches('/').to_string(),
            engine: engine.into(),
            key_prefix: None,
            token: None,
        }
    }

    pub fn with_key_prefix(mut self, prefix: Option<String>) -> Self {
        self.key_prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    pub fn with_token(mut self, token: Option<SecretString>) -> Self {
        self.token = token;
        self
    }

    pub fn set_token(&mut self, token: SecretString) {
        self.token = Some(token);
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// The underlying HTTP client, shared with login methods
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Build `/v1/<engine>/<data_path>[/<prefix>][/<key>]`
    pub fn secret_path(&self, key: Option<&str>, data_path: &str) -> String {
        let parts: Vec<&str> = [Some(data_path), self.key_prefix.as_deref(), key]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();
        format!("/v1/{}/{}", self.engine, parts.join("/"))
    }

    /// List secret names under the configured prefix, sub-directories removed
    pub async fn list_keys(&self) -> ConfigResult<Vec<String>> {
        let path = self.secret_path(None, "metadata");
        let list = Method::from_bytes(b"LIST")
            .map_err(|e| ConfigError::InvalidResponse(e.to_string()))?;
        let response = self.request(list, &path, None).await?;

        let keys = response
            .pointer("/data/keys")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ConfigError::InvalidResponse(format!("missing data.keys in listing of {}", path))
            })?;

        Ok(keys
            .iter()
            .filter_map(Value::as_str)
            .filter(|key| !key.ends_with('/'))
            .map(str::to_string)
            .collect())
    }

    /// Read the data of one secret
    pub async fn read_secret(&self, key: &str) -> ConfigResult<Value> {
        let path = self.secret_path(Some(key), "data");
        let response = self.request(Method::GET, &path, None).await?;
        response
            .pointer("/data/data")
            .cloned()
            .ok_or_else(|| ConfigError::InvalidResponse(format!("missing data.data in {}", path)))
    }

    /// Log in against `/v1/auth/<auth_path>/login`.
    ///
    /// Returns the full `auth` section of the response; the token is under
    /// `client_token`.
    pub async fn login(
        &self,
        auth_path: &str,
        payload: Map<String, Value>,
    ) -> ConfigResult<Value> {
        let path = format!("/v1/auth/{}/login", auth_path);
        let response = self
            .request(Method::POST, &path, Some(&Value::Object(payload)))
            .await?;
        response
            .get("auth")
            .filter(|auth| auth.get("client_token").and_then(Value::as_str).is_some())
            .cloned()
            .ok_or_else(|| {
                ConfigError::InvalidResponse(format!("missing auth.client_token from {}", path))
            })
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ConfigResult<Value> {
        let url = format!("{}{}", self.host, path);
        let context = format!("{} {}", method, url);
        debug!("Vault request: {}", context);

        let mut request = self.http.request(method, &url);
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ConfigError::Request {
                context: context.clone(),
                source,
            })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| ConfigError::Request {
                context: context.clone(),
                source,
            })?;

        if !status.is_success() {
            return Err(ConfigError::Transport {
                context,
                status: status.as_u16(),
                body: text,
            });
        }
        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(&text)
            .map_err(|e| ConfigError::InvalidResponse(format!("{}: {}", context, e)))
    }
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("host", &self.host)
            .field("engine", &self.engine)
            .field("key_prefix", &self.key_prefix)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_secret_path() {
        let client = VaultClient::new("http://vault:8200/", "secret");
        assert_eq!(client.host(), "http://vault:8200");
        assert_eq!(client.secret_path(None, "metadata"), "/v1/secret/metadata");
        assert_eq!(client.secret_path(Some("db"), "data"), "/v1/secret/data/db");

        let prefixed =
            VaultClient::new("http://vault:8200", "kv").with_key_prefix(Some("app".to_string()));
        assert_eq!(prefixed.secret_path(None, "metadata"), "/v1/kv/metadata/app");
        assert_eq!(prefixed.secret_path(Some("db"), "data"), "/v1/kv/data/app/db");
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = VaultClient::new("http://vault:8200", "secret")
            .with_token(Some(SecretString::from("s.hidden".to_string())));
        let debug = format!("{:?}", client);
        assert!(!debug.contains("s.hidden"));
    }

    #[tokio::test]
    async fn test_list_keys_drops_directories() {
        let server = MockServer::start().await;
        Mock::given(method("LIST"))
            .and(path("/v1/secret/metadata/app"))
            .and(header(TOKEN_HEADER, "root"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"keys": ["db", "nested/", "api"]}
            })))
            .mount(&server)
            .await;

        let client = VaultClient::new(server.uri(), "secret")
            .with_key_prefix(Some("app".to_string()))
            .with_token(Some(SecretString::from("root".to_string())));
        assert_eq!(client.list_keys().await.unwrap(), vec!["db", "api"]);
    }

    #[tokio::test]
    async fn test_read_secret() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/db"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"data": {"password": "pw"}, "metadata": {"version": 3}}
            })))
            .mount(&server)
            .await;

        let client = VaultClient::new(server.uri(), "secret");
        assert_eq!(client.read_secret("db").await.unwrap(), json!({"password": "pw"}));
    }

    #[tokio::test]
    async fn test_error_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/forbidden"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let client = VaultClient::new(server.uri(), "secret");
        let err = client.read_secret("forbidden").await.unwrap_err();
        match err {
            ConfigError::Transport { context, status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "permission denied");
                assert!(context.starts_with("GET "));
                assert!(context.ends_with("/v1/secret/data/forbidden"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_returns_auth_section() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/aws/login"))
            .and(body_json(json!({"pkcs7": "doc", "role": "web"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "auth": {"client_token": "s.token", "metadata": {"nonce": "n-1"}}
            })))
            .mount(&server)
            .await;

        let client = VaultClient::new(server.uri(), "secret");
        let mut payload = Map::new();
        payload.insert("pkcs7".to_string(), json!("doc"));
        payload.insert("role".to_string(), json!("web"));

        let auth = client.login("aws", payload).await.unwrap();
        assert_eq!(auth["client_token"], "s.token");
        assert_eq!(auth["metadata"]["nonce"], "n-1");
    }

    #[tokio::test]
    async fn test_login_without_token_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/aws/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"auth": null})))
            .mount(&server)
            .await;

        let client = VaultClient::new(server.uri(), "secret");
        let err = client.login("aws", Map::new()).await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_no_content_is_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/aws/login"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = VaultClient::new(server.uri(), "secret");
        // 204 has no auth section
        assert!(client.login("aws", Map::new()).await.is_err());
    }
}
