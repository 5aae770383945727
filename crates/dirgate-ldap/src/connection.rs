//! Directory connections
//!
//! A [`Connector`] opens one [`Connection`] per server attempt. The ldap3
//! backed implementation handles plain LDAP, LDAPS and StartTLS, trying each
//! configured host in order until one accepts the connection.

use async_trait::async_trait;
use dirgate_core::{Error, Result, ServerConfig};
use ldap3::{
    DerefAliases, Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry,
    SearchOptions,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::tls;

/// A subtree search below one base DN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base_dn: String,
    pub filter: String,
    pub attributes: Vec<String>,
}

/// One entry returned by a search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, values: &[&str]) -> Self {
        self.attrs.insert(
            name.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    /// All values of an attribute, matched case-insensitively.
    /// The pseudo attribute `dn` yields the entry DN.
    pub fn values(&self, name: &str) -> Vec<String> {
        if name.is_empty() {
            return Vec::new();
        }
        if name.eq_ignore_ascii_case("dn") {
            return vec![self.dn.clone()];
        }

        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.clone())
            .unwrap_or_default()
    }

    /// First value of an attribute, or an empty string
    pub fn first(&self, name: &str) -> String {
        self.values(name).into_iter().next().unwrap_or_default()
    }
}

impl From<SearchEntry> for DirectoryEntry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
        }
    }
}

/// An open session with one directory server
#[async_trait]
pub trait Connection: Send {
    /// Simple bind; a rejected bind comes back as [`Error::Protocol`]
    async fn bind(&mut self, dn: &str, password: &str) -> Result<()>;

    /// Simple bind with an empty password
    async fn unauthenticated_bind(&mut self, dn: &str) -> Result<()>;

    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryEntry>>;

    /// Unbind and drop the session. Errors are logged, not returned.
    async fn close(&mut self);
}

/// Opens connections to a configured server
#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(&self, config: &ServerConfig) -> Result<Box<dyn Connection>>;
}

// ============================================================================
// ldap3 implementation
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct Ldap3Connector;

#[async_trait]
impl Connector for Ldap3Connector {
    async fn dial(&self, config: &ServerConfig) -> Result<Box<dyn Connection>> {
        let tls_config = if config.use_ssl {
            Some(tls::client_config(config)?)
        } else {
            None
        };

        let mut last_error = None;

        for host in config.hosts() {
            let url = server_url(config, host);

            let mut settings = LdapConnSettings::new()
                .set_conn_timeout(Duration::from_secs(config.timeout))
                .set_starttls(config.use_ssl && config.start_tls);
            if let Some(tls_config) = &tls_config {
                settings = settings.set_config(tls_config.clone());
            }

            debug!("Connecting to LDAP server: {}", url);

            match LdapConnAsync::with_settings(settings, &url).await {
                Ok((conn, ldap)) => {
                    ldap3::drive!(conn);
                    return Ok(Box::new(Ldap3Connection { ldap, address: url }));
                }
                Err(e) => {
                    debug!("Failed to connect to {}: {}", url, e);
                    last_error = Some(Error::Dial {
                        address: url,
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Config("LDAP server has no host".into())))
    }
}

/// Session over an ldap3 handle
pub struct Ldap3Connection {
    ldap: Ldap,
    address: String,
}

impl Ldap3Connection {
    fn map_error(&self, err: LdapError) -> Error {
        match err {
            LdapError::LdapResult { result } => Error::Protocol {
                code: result.rc,
                message: result.text,
            },
            other => Error::Transport {
                address: self.address.clone(),
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl Connection for Ldap3Connection {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let result = self
            .ldap
            .simple_bind(dn, password)
            .await
            .and_then(|res| res.success());

        result.map(|_| ()).map_err(|e| self.map_error(e))
    }

    async fn unauthenticated_bind(&mut self, dn: &str) -> Result<()> {
        self.bind(dn, "").await
    }

    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryEntry>> {
        let result = self
            .ldap
            .with_search_options(SearchOptions::new().deref(DerefAliases::Never))
            .search(
                &request.base_dn,
                Scope::Subtree,
                &request.filter,
                request.attributes.clone(),
            )
            .await
            .and_then(|res| res.success());

        let (entries, _res) = result.map_err(|e| self.map_error(e))?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(DirectoryEntry::from)
            .collect())
    }

    async fn close(&mut self) {
        if let Err(e) = self.ldap.unbind().await {
            debug!("Failed to unbind from {}: {}", self.address, e);
        }
    }
}

/// URL for one host of a server definition
pub fn server_url(config: &ServerConfig, host: &str) -> String {
    let scheme = if config.use_ssl && !config.start_tls {
        "ldaps"
    } else {
        "ldap"
    };

    if host.contains(':') && !host.starts_with('[') {
        format!("{}://[{}]:{}", scheme, host, config.port)
    } else {
        format!("{}://{}:{}", scheme, host, config.port)
    }
}
