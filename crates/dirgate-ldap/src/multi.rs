//! Multi-server orchestration
//!
//! Applies an operation to the configured servers in order. Every server
//! gets a fresh connection that is closed before moving on.

use dirgate_core::{Error, ExternalUser, Result, ServerConfig, ServerStatus};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::client::{ClientOptions, LdapClient};
use crate::connection::Connector;
use crate::metrics;

/// Client over every configured directory server
pub struct MultiLdap {
    servers: Vec<ServerConfig>,
    connector: Arc<dyn Connector>,
    options: ClientOptions,
}

impl MultiLdap {
    pub fn new(
        servers: Vec<ServerConfig>,
        connector: Arc<dyn Connector>,
        options: ClientOptions,
    ) -> Self {
        Self {
            servers,
            connector,
            options,
        }
    }

    pub fn servers(&self) -> &[ServerConfig] {
        &self.servers
    }

    /// Dial one server. `Ok(None)` means the failure was logged and the
    /// caller should move on; the last server's failure is returned instead.
    async fn dial<'a>(
        &self,
        index: usize,
        config: &'a ServerConfig,
    ) -> Result<Option<LdapClient<'a>>> {
        match LdapClient::dial(self.connector.as_ref(), config, self.options).await {
            Ok(client) => Ok(Some(client)),
            Err(e) => {
                warn!("Failed to connect to LDAP server {}: {}", config.host, e);
                metrics::record_dial_failure(&config.host);

                if index + 1 == self.servers.len() {
                    Err(e)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Check that every server accepts a connection
    pub async fn ping(&self) -> Result<Vec<ServerStatus>> {
        if self.servers.is_empty() {
            return Err(Error::NoServersConfigured);
        }

        let mut statuses = Vec::with_capacity(self.servers.len());

        for config in &self.servers {
            let status = match LdapClient::dial(self.connector.as_ref(), config, self.options).await
            {
                Ok(client) => {
                    client.close().await;
                    ServerStatus {
                        host: config.host.clone(),
                        port: config.port,
                        available: true,
                        error: None,
                    }
                }
                Err(e) => {
                    debug!("LDAP server {} is unavailable: {}", config.host, e);
                    ServerStatus {
                        host: config.host.clone(),
                        port: config.port,
                        available: false,
                        error: Some(e.to_string()),
                    }
                }
            };

            statuses.push(status);
        }

        Ok(statuses)
    }

    /// Authenticate against the servers in order until one accepts the user.
    ///
    /// Invalid credentials and unknown users move on to the next server; any
    /// other error ends the login. When every server declines, invalid
    /// credentials win over an unknown user.
    pub async fn login(&self, username: &str, password: &str) -> Result<ExternalUser> {
        if self.servers.is_empty() {
            return Err(Error::NoServersConfigured);
        }

        let started = Instant::now();
        let result = self.try_login(username, password).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(Error::InvalidCredentials) => "invalid_credentials",
            Err(Error::CouldNotFindUser) => "not_found",
            Err(_) => "error",
        };
        metrics::record_login(outcome, started.elapsed().as_secs_f64());

        result
    }

    async fn try_login(&self, username: &str, password: &str) -> Result<ExternalUser> {
        let mut invalid_credentials = false;

        for (index, config) in self.servers.iter().enumerate() {
            let Some(mut client) = self.dial(index, config).await? else {
                continue;
            };

            let result = client.login(username, password).await;
            client.close().await;

            match result {
                Ok(user) => return Ok(user),
                Err(e) if e.is_silent() => {
                    debug!(
                        "Login of {} declined by LDAP server {}: {}",
                        username, config.host, e
                    );
                    if matches!(e, Error::InvalidCredentials) {
                        invalid_credentials = true;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        if invalid_credentials {
            return Err(Error::InvalidCredentials);
        }

        Err(Error::CouldNotFindUser)
    }

    /// Find one user, returning the definition of the server that had it
    pub async fn user(&self, login: &str) -> Result<(ExternalUser, ServerConfig)> {
        if self.servers.is_empty() {
            return Err(Error::NoServersConfigured);
        }

        let logins = [login.to_string()];

        for (index, config) in self.servers.iter().enumerate() {
            let Some(mut client) = self.dial(index, config).await? else {
                continue;
            };

            let result = Self::bind_and_search(&mut client, &logins).await;
            client.close().await;

            if let Some(user) = result?.into_iter().next() {
                return Ok((user, config.clone()));
            }
        }

        Err(Error::DidNotFindUser)
    }

    /// Find users on every server. A login present on two servers yields
    /// two records.
    pub async fn users(&self, logins: &[String]) -> Result<Vec<ExternalUser>> {
        if self.servers.is_empty() {
            return Err(Error::NoServersConfigured);
        }

        let mut users = Vec::new();

        for (index, config) in self.servers.iter().enumerate() {
            let Some(mut client) = self.dial(index, config).await? else {
                continue;
            };

            let result = Self::bind_and_search(&mut client, logins).await;
            client.close().await;

            users.extend(result?);
        }

        Ok(users)
    }

    async fn bind_and_search(
        client: &mut LdapClient<'_>,
        logins: &[String],
    ) -> Result<Vec<ExternalUser>> {
        client.bind().await?;
        client.users(logins).await
    }
}
