//! Directory user types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Module name recorded on users resolved from a directory
pub const AUTH_MODULE_LDAP: &str = "ldap";

/// Role inside an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrgRole {
    Admin,
    Editor,
    Viewer,
    None,
}

impl OrgRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgRole::Admin => "Admin",
            OrgRole::Editor => "Editor",
            OrgRole::Viewer => "Viewer",
            OrgRole::None => "None",
        }
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User resolved from a directory entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalUser {
    pub auth_module: String,
    /// DN of the directory entry
    pub auth_id: String,
    pub login: String,
    /// Display name
    pub name: String,
    pub email: String,
    /// Raw group memberships
    pub groups: Vec<String>,
    /// Organization id to role, at most one role per organization
    pub org_roles: BTreeMap<i64, OrgRole>,
    /// `None` when no matching group mapping said anything about it
    pub is_platform_admin: Option<bool>,
    pub is_disabled: bool,
}

impl ExternalUser {
    pub fn new(auth_id: impl Into<String>, login: impl Into<String>) -> Self {
        Self {
            auth_module: AUTH_MODULE_LDAP.to_string(),
            auth_id: auth_id.into(),
            login: login.into(),
            name: String::new(),
            email: String::new(),
            groups: Vec::new(),
            org_roles: BTreeMap::new(),
            is_platform_admin: None,
            is_disabled: false,
        }
    }

    pub fn is_platform_admin(&self) -> bool {
        self.is_platform_admin == Some(true)
    }

    pub fn org_role(&self, org_id: i64) -> Option<OrgRole> {
        self.org_roles.get(&org_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = ExternalUser::new("cn=alice,dc=example,dc=org", "alice");
        assert_eq!(user.auth_module, "ldap");
        assert!(!user.is_platform_admin());
        assert!(!user.is_disabled);
        assert!(user.org_roles.is_empty());
    }

    #[test]
    fn test_org_role_serde_names() {
        let role: OrgRole = serde_json::from_str("\"Editor\"").unwrap();
        assert_eq!(role, OrgRole::Editor);
        assert_eq!(serde_json::to_string(&OrgRole::None).unwrap(), "\"None\"");
        assert!(serde_json::from_str::<OrgRole>("\"Owner\"").is_err());
    }
}
