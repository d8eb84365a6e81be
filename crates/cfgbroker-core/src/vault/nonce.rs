//! Nonce file used by the AWS login to prevent identity replay
//!
//! Vault binds the first login from an instance to a nonce; later logins
//! from the same instance must present it again. Losing the file means the
//! instance has to be removed from Vault's identity access list before it
//! can log in again.

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Read a previously persisted nonce.
///
/// A missing or empty file is `None`, not an error.
pub async fn read_nonce(path: &Path) -> ConfigResult<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => {
            let nonce = content.trim();
            Ok((!nonce.is_empty()).then(|| nonce.to_string()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigError::io(path, e)),
    }
}

/// Persist `nonce` with create-if-absent semantics and owner-only permissions.
///
/// Returns `false` without error when the file already exists; another
/// bootstrap on this instance already wrote it.
pub async fn persist_nonce(path: &Path, nonce: &str) -> ConfigResult<bool> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = match options.open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!("Nonce file {} already exists, keeping it", path.display());
            return Ok(false);
        }
        Err(e) => return Err(ConfigError::io(path, e)),
    };

    file.write_all(nonce.as_bytes())
        .await
        .map_err(|e| ConfigError::io(path, e))?;
    file.flush().await.map_err(|e| ConfigError::io(path, e))?;
    debug!("Persisted Vault nonce to {}", path.display());
    Ok(true)
}
