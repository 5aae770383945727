//! Directory entry to user conversion and group role mapping

use dirgate_core::{ExternalUser, GroupToOrgRole, OrgRole, ServerConfig};
use std::collections::BTreeMap;

use crate::connection::DirectoryEntry;

/// Group DN that matches every user
pub const WILDCARD_GROUP: &str = "*";

/// Whether any membership matches the mapping's group, ignoring case
pub fn is_member_of(member_of: &[String], group_dn: &str) -> bool {
    if group_dn == WILDCARD_GROUP {
        return true;
    }

    let group_dn = group_dn.to_lowercase();
    member_of
        .iter()
        .any(|member| member.to_lowercase() == group_dn)
}

/// Organization roles and platform-admin flag granted by group mappings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleGrants {
    pub org_roles: BTreeMap<i64, OrgRole>,
    pub is_platform_admin: Option<bool>,
}

/// Walk the mappings in order; the first mapping that assigns a role to an
/// organization wins it, later mappings for that organization are ignored.
pub fn resolve_roles(mappings: &[GroupToOrgRole], member_of: &[String]) -> RoleGrants {
    let mut grants = RoleGrants::default();

    for mapping in mappings {
        if grants.org_roles.contains_key(&mapping.org_id) {
            continue;
        }
        if !is_member_of(member_of, &mapping.group_dn) {
            continue;
        }

        if let Some(role) = mapping.org_role {
            grants.org_roles.insert(mapping.org_id, role);
        }

        // once granted, admin stays granted
        if grants.is_platform_admin != Some(true) && mapping.platform_admin.is_some() {
            grants.is_platform_admin = mapping.platform_admin;
        }
    }

    grants
}

/// Build the user record for an entry and its resolved memberships
pub fn build_user(
    config: &ServerConfig,
    entry: &DirectoryEntry,
    member_of: Vec<String>,
    skip_org_role_sync: bool,
) -> ExternalUser {
    let attributes = &config.attributes;

    let name = format!(
        "{} {}",
        entry.first(&attributes.name),
        entry.first(&attributes.surname)
    );

    let mut user = ExternalUser::new(entry.dn.clone(), entry.first(&attributes.username));
    user.name = name.trim().to_string();
    user.email = entry.first(&attributes.email);
    user.groups = member_of;

    if skip_org_role_sync {
        return user;
    }

    let grants = resolve_roles(&config.group_mappings, &user.groups);
    user.org_roles = grants.org_roles;
    user.is_platform_admin = grants.is_platform_admin;

    // mappings exist but none matched
    user.is_disabled = !config.group_mappings.is_empty()
        && user.org_roles.is_empty()
        && !user.is_platform_admin();

    user
}
