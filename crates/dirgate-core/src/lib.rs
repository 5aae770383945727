//! Dirgate Core Library
//!
//! Configuration, error and user types shared by the Dirgate crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    ConfigSource, DirgateConfig, FileConfigSource, GroupToOrgRole, LdapConfig, LdapSettings,
    ServerConfig,
};
pub use error::{Error, Result};
pub use types::{ExternalUser, OrgRole, ServerStatus};

/// Dirgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
