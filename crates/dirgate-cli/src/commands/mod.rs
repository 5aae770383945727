//! CLI command implementations

pub mod check_config;
pub mod login;
pub mod ping;
pub mod user;
pub mod users;

use anyhow::{Context, Result};
use dirgate_core::{ExternalUser, LdapConfig, LdapSettings};
use dirgate_ldap::LdapService;
use serde::Serialize;

use crate::OutputFormat;

/// Context passed to all commands
pub struct CommandContext {
    pub settings: LdapSettings,
    pub output_format: OutputFormat,
    pub quiet: bool,
}

impl CommandContext {
    /// Check if output should be JSON
    pub fn is_json(&self) -> bool {
        matches!(self.output_format, OutputFormat::Json)
    }

    /// Print info message if not quiet
    pub fn info(&self, msg: &str) {
        if !self.quiet && !self.is_json() {
            println!("{}", msg);
        }
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Read and validate the server list
    pub fn load_config(&self) -> Result<LdapConfig> {
        LdapConfig::from_file(&self.settings.config_file).with_context(|| {
            format!(
                "Failed to load LDAP server list from {}",
                self.settings.config_file.display()
            )
        })
    }

    /// Service over the server list. The list is validated first so a broken
    /// file is reported instead of leaving the service without servers.
    pub fn service(&self) -> Result<LdapService> {
        self.load_config()?;
        Ok(LdapService::from_settings(self.settings.clone()))
    }
}

/// Human readable rendering of a user record
pub fn print_user(user: &ExternalUser) {
    println!("DN:        {}", user.auth_id);
    println!("Login:     {}", user.login);
    println!("Name:      {}", user.name);
    println!("Email:     {}", user.email);

    if user.groups.is_empty() {
        println!("Groups:    -");
    } else {
        println!("Groups:");
        for group in &user.groups {
            println!("  {}", group);
        }
    }

    if !user.org_roles.is_empty() {
        println!("Org roles:");
        for (org_id, role) in &user.org_roles {
            println!("  {}: {}", org_id, role);
        }
    }

    match user.is_platform_admin {
        Some(admin) => println!("Admin:     {}", admin),
        None => println!("Admin:     unset"),
    }
    if user.is_disabled {
        println!("Disabled:  true");
    }
}
