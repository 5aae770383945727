//! Directory-backed identity resolution for Dirgate
//!
//! Authenticates users against one or more LDAP servers and turns directory
//! entries into [`ExternalUser`](dirgate_core::ExternalUser) records with
//! organization roles derived from group membership.

pub mod client;
pub mod connection;
pub mod mapping;
pub mod metrics;
pub mod multi;
pub mod search;
pub mod service;
pub mod tls;

#[cfg(test)]
mod mock;

pub use client::{ClientOptions, LdapClient};
pub use connection::{
    Connection, Connector, DirectoryEntry, Ldap3Connection, Ldap3Connector, SearchRequest,
};
pub use multi::MultiLdap;
pub use search::USERS_MAX_REQUEST;
pub use service::LdapService;
