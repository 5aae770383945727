//! Directory service
//!
//! Owns the active server list and the client built from it. Readers take a
//! snapshot (`Arc`) of both; a reload builds a complete replacement and swaps
//! it in, so a failed reload leaves the previous configuration serving.

use dirgate_core::{
    ConfigSource, Error, ExternalUser, FileConfigSource, LdapConfig, LdapSettings, Result,
    ServerConfig,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{error, info};

use crate::client::ClientOptions;
use crate::connection::{Connector, Ldap3Connector};
use crate::metrics;
use crate::multi::MultiLdap;

struct Active {
    config: Arc<LdapConfig>,
    client: Arc<MultiLdap>,
}

pub struct LdapService {
    settings: LdapSettings,
    source: Arc<dyn ConfigSource>,
    connector: Arc<dyn Connector>,
    /// Serializes reloads; readers never take it
    reload_lock: Mutex<()>,
    active: RwLock<Active>,
}

impl LdapService {
    /// Create the service and load the server list if LDAP is enabled.
    /// A failed initial load is logged and leaves the service without servers.
    pub fn new(
        settings: LdapSettings,
        source: Arc<dyn ConfigSource>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let options = ClientOptions {
            skip_org_role_sync: settings.skip_org_role_sync,
        };
        let active = Active {
            config: Arc::new(LdapConfig::default()),
            client: Arc::new(MultiLdap::new(Vec::new(), connector.clone(), options)),
        };

        let service = Self {
            settings,
            source,
            connector,
            reload_lock: Mutex::new(()),
            active: RwLock::new(active),
        };

        if service.settings.enabled {
            if let Err(e) = service.reload() {
                error!("Failed to load LDAP configuration: {}", e);
            }
        }

        service
    }

    /// Service reading `settings.config_file` and talking to real servers
    pub fn from_settings(settings: LdapSettings) -> Self {
        let source = Arc::new(FileConfigSource::new(settings.config_file.clone()));
        Self::new(settings, source, Arc::new(Ldap3Connector))
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Snapshot of the active server list
    pub fn config(&self) -> Arc<LdapConfig> {
        self.active.read().config.clone()
    }

    /// Snapshot of the active client
    pub fn client(&self) -> Arc<MultiLdap> {
        self.active.read().client.clone()
    }

    /// Reload from the service's own config source
    pub fn reload(&self) -> Result<()> {
        self.reload_from(self.source.as_ref())
    }

    /// Load and validate a server list, then replace the active one
    pub fn reload_from(&self, source: &dyn ConfigSource) -> Result<()> {
        if !self.settings.enabled {
            return Err(Error::NotEnabled);
        }

        let _guard = self.reload_lock.lock();

        let config = match source.load().and_then(|mut config| {
            config.validate()?;
            Ok(config)
        }) {
            Ok(config) => config,
            Err(e) => {
                metrics::record_reload(false);
                return Err(e);
            }
        };

        let server_count = config.servers.len();
        let client = MultiLdap::new(
            config.servers.clone(),
            self.connector.clone(),
            self.options(),
        );

        *self.active.write() = Active {
            config: Arc::new(config),
            client: Arc::new(client),
        };

        metrics::record_reload(true);
        info!("LDAP configuration loaded with {} server(s)", server_count);

        Ok(())
    }

    fn options(&self) -> ClientOptions {
        ClientOptions {
            skip_org_role_sync: self.settings.skip_org_role_sync,
        }
    }

    /// Authenticate a user against the active servers
    pub async fn login(&self, username: &str, password: &str) -> Result<ExternalUser> {
        if !self.settings.enabled {
            return Err(Error::NotEnabled);
        }

        self.client().login(username, password).await
    }

    /// Look up one user on the active servers
    pub async fn user(&self, username: &str) -> Result<(ExternalUser, ServerConfig)> {
        if !self.settings.enabled {
            return Err(Error::NotEnabled);
        }

        self.client().user(username).await
    }
}
