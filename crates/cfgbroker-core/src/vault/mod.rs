//! HashiCorp Vault integration
//!
//! This module provides the Vault-backed source with:
//! - `VaultSource`: pre-fetches an allow-list of secrets during `initialize`
//! - `VaultLogin` trait with `AwsLogin` and `KubernetesLogin` bootstraps
//! - `VaultClient`: the KV v2 / auth HTTP calls
//! - `VaultSettings`: the `vault` config section

mod client;
mod login;
mod nonce;
mod settings;
mod source;

pub use client::{VaultClient, TOKEN_HEADER};
pub use login::{AwsLogin, KubernetesLogin, VaultLogin};
pub use nonce::{persist_nonce, read_nonce};
pub use settings::{
    AuthMethod, VaultSettings, AWS_METADATA_URL, DEFAULT_ENGINE, DEFAULT_K8S_AUTH_PATH,
    K8S_JWT_PATH,
};
pub use source::{redact, VaultSource, REDACTED};
