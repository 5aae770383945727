//! Single-server directory client
//!
//! Wraps one open connection and knows how to bind, find users and resolve
//! their groups according to one server definition. Bind strategy:
//! - `bind_password` set: bind as the search account, then verify the user
//!   with a second bind
//! - `bind_dn` contains `%s`: bind directly as the user (single bind)
//! - otherwise: unauthenticated bind, then verify the user

use dirgate_core::error::RESULT_INVALID_CREDENTIALS;
use dirgate_core::{Error, ExternalUser, Result, ServerConfig};
use ldap3::dn_escape;
use std::collections::HashSet;
use tracing::{debug, error};

use crate::connection::{Connection, Connector, DirectoryEntry};
use crate::mapping::build_user;
use crate::search::{batches, group_id_attribute, group_search_request, user_search_request};

/// Behavior shared by every server of a deployment
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientOptions {
    /// Leave org roles and admin flag unset and skip the group validation gate
    pub skip_org_role_sync: bool,
}

/// Session with one directory server
pub struct LdapClient<'a> {
    config: &'a ServerConfig,
    options: ClientOptions,
    connection: Box<dyn Connection>,
}

impl<'a> LdapClient<'a> {
    /// Open a connection to the server
    pub async fn dial(
        connector: &dyn Connector,
        config: &'a ServerConfig,
        options: ClientOptions,
    ) -> Result<LdapClient<'a>> {
        let connection = connector.dial(config).await?;
        Ok(Self::with_connection(config, options, connection))
    }

    pub fn with_connection(
        config: &'a ServerConfig,
        options: ClientOptions,
        connection: Box<dyn Connection>,
    ) -> Self {
        Self {
            config,
            options,
            connection,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        self.config
    }

    pub async fn close(mut self) {
        self.connection.close().await;
    }

    fn should_admin_bind(&self) -> bool {
        !self.config.bind_password.is_empty()
    }

    fn should_single_bind(&self) -> bool {
        self.config.bind_dn.contains("%s")
    }

    fn single_bind_dn(&self, username: &str) -> String {
        self.config.bind_dn.replace("%s", &dn_escape(username))
    }

    // =========================================================================
    // Binds
    // =========================================================================

    /// Bind with the search account, or unauthenticated without one
    pub async fn bind(&mut self) -> Result<()> {
        if self.should_admin_bind() {
            self.admin_bind().await
        } else {
            self.connection
                .unauthenticated_bind(&self.config.bind_dn)
                .await
        }
    }

    /// Bind as the configured search account
    pub async fn admin_bind(&mut self) -> Result<()> {
        let config = self.config;

        if let Err(e) = self.user_bind(&config.bind_dn, &config.bind_password).await {
            error!(
                "Cannot authenticate admin user in LDAP {}: {}",
                self.config.host, e
            );
            return Err(e);
        }

        Ok(())
    }

    async fn user_bind(&mut self, dn: &str, password: &str) -> Result<()> {
        match self.connection.bind(dn, password).await {
            Ok(()) => Ok(()),
            Err(e) if e.result_code() == Some(RESULT_INVALID_CREDENTIALS) => {
                debug!("Invalid credentials for {}", dn);
                Err(Error::InvalidCredentials)
            }
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Authenticate a user and resolve their record
    pub async fn login(&mut self, username: &str, password: &str) -> Result<ExternalUser> {
        // an empty password would be accepted as an unauthenticated bind
        if password.is_empty() {
            return Err(Error::InvalidCredentials);
        }

        let authenticated = if self.should_admin_bind() {
            self.admin_bind().await?;
            false
        } else if self.should_single_bind() {
            let dn = self.single_bind_dn(username);
            self.user_bind(&dn, password).await?;
            true
        } else {
            self.connection
                .unauthenticated_bind(&self.config.bind_dn)
                .await?;
            false
        };

        let user = self
            .users(&[username.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(Error::CouldNotFindUser)?;

        self.validate_user(&user)?;

        if !authenticated {
            self.user_bind(&user.auth_id, password).await?;
        }

        Ok(user)
    }

    /// Reject users that match none of the group mappings
    fn validate_user(&self, user: &ExternalUser) -> Result<()> {
        if self.options.skip_org_role_sync || self.config.group_mappings.is_empty() {
            return Ok(());
        }

        if user.org_roles.is_empty() && !user.is_platform_admin() {
            error!(
                "User {} does not belong in any of the specified LDAP groups: {:?}",
                user.login, user.groups
            );
            return Err(Error::InvalidCredentials);
        }

        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Look up users by login. Logins with no entry are skipped.
    pub async fn users(&mut self, logins: &[String]) -> Result<Vec<ExternalUser>> {
        let mut entries = Vec::new();

        for range in batches(logins.len()) {
            entries.extend(self.search_entries(&logins[range]).await?);
        }

        if entries.is_empty() {
            return Ok(Vec::new());
        }

        self.serialize_users(entries).await
    }

    async fn search_entries(&mut self, logins: &[String]) -> Result<Vec<DirectoryEntry>> {
        let config = self.config;
        let mut entries = Vec::new();

        for base_dn in &config.search_base_dns {
            let request = user_search_request(config, base_dn, logins);
            debug!(
                "LDAP user search: base={} filter={}",
                request.base_dn, request.filter
            );

            entries.extend(self.connection.search(&request).await?);
        }

        Ok(entries)
    }

    /// Convert entries to users, keeping the first entry seen for each login
    async fn serialize_users(&mut self, entries: Vec<DirectoryEntry>) -> Result<Vec<ExternalUser>> {
        let mut seen = HashSet::new();
        let mut users = Vec::new();

        for entry in entries {
            let login = entry.first(&self.config.attributes.username);
            let key = if login.is_empty() { entry.dn.clone() } else { login };
            if !seen.insert(key) {
                continue;
            }

            let member_of = self.member_of(&entry).await?;
            users.push(build_user(
                self.config,
                &entry,
                member_of,
                self.options.skip_org_role_sync,
            ));
        }

        Ok(users)
    }

    async fn member_of(&mut self, entry: &DirectoryEntry) -> Result<Vec<String>> {
        if self.config.group_search_filter.is_empty() {
            Ok(entry.values(&self.config.attributes.member_of))
        } else {
            self.request_member_of(entry).await
        }
    }

    /// Groups of an entry found by searching the group bases. The first base
    /// returning any group ends the search.
    async fn request_member_of(&mut self, entry: &DirectoryEntry) -> Result<Vec<String>> {
        let config = self.config;

        let user_attribute = if config.group_search_filter_user_attribute.is_empty() {
            &config.attributes.username
        } else {
            &config.group_search_filter_user_attribute
        };
        let value = entry.first(user_attribute);

        for base_dn in &config.group_search_base_dns {
            let request = group_search_request(config, base_dn, &value);
            debug!(
                "LDAP group search: base={} filter={}",
                request.base_dn, request.filter
            );

            let groups = self.connection.search(&request).await?;
            if groups.is_empty() {
                continue;
            }

            return Ok(groups
                .iter()
                .map(|group| match group_id_attribute(config) {
                    Some(attribute) => group.first(attribute),
                    None => group.dn.clone(),
                })
                .filter(|id| !id.is_empty())
                .collect());
        }

        Ok(Vec::new())
    }
}
