//! Configuration for Dirgate
//!
//! Two files are involved:
//! - the service configuration (`DirgateConfig`), holding the `[ldap]`
//!   feature switch and logging settings
//! - the LDAP server list (`LdapConfig`), referenced by `ldap.config_file`
//!   and re-read on every reload

use once_cell::sync::OnceCell;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::types::OrgRole;
use crate::{Error, Result};

/// Default organization for group mappings that do not name one
pub const DEFAULT_ORG_ID: i64 = 1;

/// Default connection timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_PORT: u16 = 389;
pub const DEFAULT_SSL_PORT: u16 = 636;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirgateConfig {
    #[serde(default)]
    pub ldap: LdapSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DirgateConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(enabled) = std::env::var("DIRGATE_LDAP_ENABLED") {
            config.ldap.enabled = enabled == "true";
        }
        if let Ok(path) = std::env::var("DIRGATE_LDAP_CONFIG_FILE") {
            config.ldap.config_file = PathBuf::from(path);
        }
        if std::env::var("DIRGATE_LDAP_SKIP_ORG_ROLE_SYNC")
            .map(|v| v == "true")
            .unwrap_or(false)
        {
            config.ldap.skip_org_role_sync = true;
        }
        if let Ok(level) = std::env::var("DIRGATE_LOG_LEVEL") {
            config.logging.level = level;
        }

        config
    }
}

/// LDAP feature settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapSettings {
    /// Enable LDAP authentication
    #[serde(default)]
    pub enabled: bool,

    /// Path to the server list file
    #[serde(default = "default_ldap_config_file")]
    pub config_file: PathBuf,

    /// Do not map directory groups onto organization roles
    #[serde(default)]
    pub skip_org_role_sync: bool,
}

fn default_ldap_config_file() -> PathBuf {
    PathBuf::from("/etc/dirgate/ldap.toml")
}

impl Default for LdapSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            config_file: default_ldap_config_file(),
            skip_org_role_sync: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

// ============================================================================
// LDAP Server List
// ============================================================================

/// Contents of the LDAP server list file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LdapConfig {
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

impl LdapConfig {
    /// Read, expand and validate a server list file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read LDAP config {:?}: {}", path, e))
        })?;

        Self::from_toml(&content)
    }

    /// Parse a server list, expanding `${VAR}` and `$VAR` from the environment
    pub fn from_toml(content: &str) -> Result<Self> {
        let expanded = expand_env(content)?;

        let mut config: LdapConfig = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse LDAP config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Apply defaults and reject unusable server definitions
    pub fn validate(&mut self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(Error::Config(
                "LDAP enabled but no LDAP servers defined in config file".into(),
            ));
        }

        for server in &mut self.servers {
            server.validate()?;
        }

        Ok(())
    }
}

/// One directory server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// One or more hosts separated by spaces, tried in order
    pub host: String,

    /// Defaults to 389, or 636 for LDAPS
    #[serde(default)]
    pub port: u16,

    /// Use TLS (LDAPS, or StartTLS with `start_tls`)
    #[serde(default)]
    pub use_ssl: bool,

    /// Connect in plain text and upgrade with StartTLS
    #[serde(default)]
    pub start_tls: bool,

    /// Skip TLS certificate verification (not recommended for production)
    #[serde(default)]
    pub ssl_skip_verify: bool,

    #[serde(default)]
    pub min_tls_version: Option<TlsVersion>,

    /// Allowed cipher suites, e.g. "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"
    #[serde(default)]
    pub tls_ciphers: Vec<String>,

    /// CA certificate files separated by spaces
    #[serde(default)]
    pub root_ca_cert: String,

    /// Base64 encoded CA certificates (PEM)
    #[serde(default)]
    pub root_ca_cert_value: Vec<String>,

    #[serde(default)]
    pub client_cert: String,

    #[serde(default)]
    pub client_key: String,

    /// Base64 encoded client certificate (PEM)
    #[serde(default)]
    pub client_cert_value: String,

    /// Base64 encoded client key (PEM)
    #[serde(default)]
    pub client_key_value: String,

    /// Search user bind DN; `%s` is replaced by the login for single bind
    #[serde(default)]
    pub bind_dn: String,

    #[serde(default)]
    pub bind_password: String,

    /// Connection timeout in seconds
    #[serde(default)]
    pub timeout: u64,

    /// User search filter, `%s` is replaced by the login
    /// Example: "(cn=%s)" or "(sAMAccountName=%s)"
    #[serde(default)]
    pub search_filter: String,

    #[serde(default)]
    pub search_base_dns: Vec<String>,

    /// Group search filter for directories without a member-of attribute
    /// Example: "(&(objectClass=posixGroup)(memberUid=%s))"
    #[serde(default)]
    pub group_search_filter: String,

    #[serde(default)]
    pub group_search_base_dns: Vec<String>,

    /// User attribute substituted into the group search filter
    #[serde(default)]
    pub group_search_filter_user_attribute: String,

    #[serde(default)]
    pub attributes: AttributeMap,

    /// Group to organization role mappings, first match per org wins
    #[serde(default)]
    pub group_mappings: Vec<GroupToOrgRole>,
}

impl ServerConfig {
    /// Hosts in the order they are tried
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.host.split_whitespace()
    }

    pub fn validate(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(missing_option("host"));
        }
        if self.search_filter.is_empty() {
            return Err(missing_option("search_filter"));
        }
        if self.search_base_dns.is_empty() {
            return Err(missing_option("search_base_dns"));
        }
        if self.client_cert.is_empty() != self.client_key.is_empty() {
            return Err(Error::Config(
                "client_cert and client_key must be set together".into(),
            ));
        }
        if self.client_cert_value.is_empty() != self.client_key_value.is_empty() {
            return Err(Error::Config(
                "client_cert_value and client_key_value must be set together".into(),
            ));
        }

        for mapping in &mut self.group_mappings {
            if mapping.org_role.is_none() && mapping.platform_admin.is_none() {
                return Err(Error::Config(format!(
                    "LDAP group mapping {}: organization role or platform admin status is required",
                    mapping.group_dn
                )));
            }
            if mapping.org_id == 0 {
                mapping.org_id = DEFAULT_ORG_ID;
            }
        }

        if self.timeout == 0 {
            self.timeout = DEFAULT_TIMEOUT_SECS;
        }
        if self.port == 0 {
            self.port = if self.use_ssl && !self.start_tls {
                DEFAULT_SSL_PORT
            } else {
                DEFAULT_PORT
            };
        }

        Ok(())
    }
}

fn missing_option(name: &str) -> Error {
    Error::Config(format!("LDAP config file is missing option: {}", name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsVersion {
    #[serde(rename = "TLS1.2")]
    Tls12,
    #[serde(rename = "TLS1.3")]
    Tls13,
}

/// Logical user attributes and the directory attributes holding them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeMap {
    #[serde(default)]
    pub username: String,

    /// Given name
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub surname: String,

    #[serde(default)]
    pub email: String,

    /// Membership attribute, e.g. "memberOf"
    #[serde(default)]
    pub member_of: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupToOrgRole {
    /// Group DN, or "*" to match every user
    pub group_dn: String,

    #[serde(default)]
    pub org_id: i64,

    #[serde(default)]
    pub org_role: Option<OrgRole>,

    /// Unset and explicitly false are distinct
    #[serde(default)]
    pub platform_admin: Option<bool>,
}

// ============================================================================
// Config Sources
// ============================================================================

/// Supplies a validated server list on demand
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<LdapConfig>;
}

/// Reads the server list from a TOML file
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<LdapConfig> {
        LdapConfig::from_file(&self.path)
    }
}

/// Replace `${VAR}` and `$VAR` with the value of the environment variable,
/// or nothing when it is unset
fn expand_env(content: &str) -> Result<String> {
    static ENV_VAR: OnceCell<Regex> = OnceCell::new();

    let pattern = ENV_VAR
        .get_or_try_init(|| {
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        })
        .map_err(|e| Error::Config(e.to_string()))?;

    Ok(pattern
        .replace_all(content, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();

            std::env::var(name).unwrap_or_else(|_| {
                warn!("LDAP config references unset environment variable {}", name);
                String::new()
            })
        })
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[[servers]]
host = "ldap1.example.com ldap2.example.com"
bind_dn = "cn=admin,dc=example,dc=org"
bind_password = "${DIRGATE_TEST_BIND_PASSWORD}"
search_filter = "(cn=%s)"
search_base_dns = ["dc=example,dc=org"]

[servers.attributes]
username = "cn"
name = "givenName"
surname = "sn"
email = "mail"
member_of = "memberOf"

[[servers.group_mappings]]
group_dn = "cn=admins,ou=groups,dc=example,dc=org"
org_role = "Admin"
platform_admin = true

[[servers.group_mappings]]
group_dn = "*"
org_id = 2
org_role = "Viewer"
"#;

    #[test]
    fn test_parse_applies_defaults() {
        std::env::set_var("DIRGATE_TEST_BIND_PASSWORD", "s3cret");
        let config = LdapConfig::from_toml(SAMPLE).unwrap();

        let server = &config.servers[0];
        assert_eq!(server.bind_password, "s3cret");
        assert_eq!(server.port, DEFAULT_PORT);
        assert_eq!(server.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(
            server.hosts().collect::<Vec<_>>(),
            vec!["ldap1.example.com", "ldap2.example.com"]
        );
        assert_eq!(server.group_mappings[0].org_id, DEFAULT_ORG_ID);
        assert_eq!(server.group_mappings[0].org_role, Some(OrgRole::Admin));
        assert_eq!(server.group_mappings[0].platform_admin, Some(true));
        assert_eq!(server.group_mappings[1].org_id, 2);
        assert_eq!(server.group_mappings[1].platform_admin, None);
    }

    #[test]
    fn test_ssl_port_default() {
        let mut server: ServerConfig = toml::from_str(
            r#"
host = "ldap.example.com"
use_ssl = true
search_filter = "(uid=%s)"
search_base_dns = ["dc=example,dc=org"]
"#,
        )
        .unwrap();
        server.validate().unwrap();
        assert_eq!(server.port, DEFAULT_SSL_PORT);

        server.port = 0;
        server.start_tls = true;
        server.validate().unwrap();
        assert_eq!(server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_missing_search_options_rejected() {
        let err = LdapConfig::from_toml(
            r#"
[[servers]]
host = "ldap.example.com"
search_base_dns = ["dc=example,dc=org"]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("search_filter"));

        let err = LdapConfig::from_toml(
            r#"
[[servers]]
host = "ldap.example.com"
search_filter = "(cn=%s)"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("search_base_dns"));
    }

    #[test]
    fn test_empty_server_list_rejected() {
        assert!(matches!(LdapConfig::from_toml(""), Err(Error::Config(_))));
    }

    #[test]
    fn test_group_mapping_requires_role_or_admin() {
        let err = LdapConfig::from_toml(
            r#"
[[servers]]
host = "ldap.example.com"
search_filter = "(cn=%s)"
search_base_dns = ["dc=example,dc=org"]

[[servers.group_mappings]]
group_dn = "cn=users,dc=example,dc=org"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cn=users,dc=example,dc=org"));
    }

    #[test]
    fn test_tls_settings_parse() {
        let config = LdapConfig::from_toml(
            r#"
[[servers]]
host = "ldap.example.com"
use_ssl = true
min_tls_version = "TLS1.3"
tls_ciphers = ["TLS_AES_128_GCM_SHA256"]
search_filter = "(cn=%s)"
search_base_dns = ["dc=example,dc=org"]
"#,
        )
        .unwrap();
        assert_eq!(config.servers[0].min_tls_version, Some(TlsVersion::Tls13));
        assert_eq!(config.servers[0].tls_ciphers.len(), 1);
    }

    #[test]
    fn test_unknown_env_var_expands_to_empty() {
        let expanded = expand_env("password = \"${DIRGATE_TEST_UNSET_VARIABLE}\"").unwrap();
        assert_eq!(expanded, "password = \"\"");
        assert_eq!(expand_env("cost = \"$5\"").unwrap(), "cost = \"$5\"");

        let expanded = expand_env("password = \"$DIRGATE_TEST_UNSET_VARIABLE\"").unwrap();
        assert_eq!(expanded, "password = \"\"");
    }

    #[test]
    fn test_file_config_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[servers]]
host = "127.0.0.1"
search_filter = "(uid=%s)"
search_base_dns = ["ou=people,dc=example,dc=org"]
"#
        )
        .unwrap();

        let source = FileConfigSource::new(file.path());
        let config = source.load().unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].host, "127.0.0.1");

        let missing = FileConfigSource::new("/nonexistent/ldap.toml");
        assert!(matches!(missing.load(), Err(Error::Config(_))));
    }

    #[test]
    fn test_service_config_defaults() {
        let config: DirgateConfig = toml::from_str("[ldap]\nenabled = true\n").unwrap();
        assert!(config.ldap.enabled);
        assert!(!config.ldap.skip_org_role_sync);
        assert_eq!(config.ldap.config_file, default_ldap_config_file());
        assert_eq!(config.logging.level, "info");
    }
}
