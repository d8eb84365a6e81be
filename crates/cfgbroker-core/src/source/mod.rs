//! Configuration source abstractions and implementations
//!
//! This module provides the pluggable source system with:
//! - `Source` trait and the tri-state `Lookup` result
//! - Built-in implementations: `ObjectSource`, `EnvironmentSource`
//!
//! The Vault-backed source lives in [`crate::vault`].

mod traits;
mod object;
mod env;

pub use traits::{Lookup, Source};
pub use object::ObjectSource;
pub use env::EnvironmentSource;
