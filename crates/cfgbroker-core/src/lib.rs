//! cfgbroker Core
//!
//! Layered application configuration behind one precedence-ordered view.
//! Sources can be static data (usually parsed from YAML/JSON files), process
//! environment variables, or secrets pre-fetched from HashiCorp Vault.
//!
//! ## Brokers
//!
//! A [`ConfigBroker`] queries its sources highest precedence first:
//! - `get` returns the first value found and refuses mappings
//! - `get_object` merges the mapping from every source defining the key
//!
//! ```rust,ignore
//! use cfgbroker_core::{ConfigBroker, EnvironmentSource, ObjectSource};
//!
//! let data = cfgbroker_core::loader::load_directory("./config")?;
//! let mut broker = ConfigBroker::new(vec![
//!     Box::new(EnvironmentSource::new()),
//!     Box::new(ObjectSource::new(data)),
//! ])
//! .with_vault(Some(vec!["database".to_string()]))?;
//!
//! broker.initialize().await?;
//! let password = broker.get_string("database.password")?;
//! ```

pub mod broker;
pub mod error;
pub mod loader;
pub mod logging;
pub mod path;
pub mod source;
pub mod vault;

pub use broker::ConfigBroker;
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_directory, merge_layers, FileLoader};
pub use source::{EnvironmentSource, Lookup, ObjectSource, Source};
pub use vault::{AuthMethod, VaultClient, VaultLogin, VaultSettings, VaultSource};
