//! Search request construction
//!
//! Login lists are searched in batches so a single filter never grows past
//! [`USERS_MAX_REQUEST`] alternatives.

use dirgate_core::ServerConfig;
use ldap3::ldap_escape;
use std::ops::Range;

use crate::connection::SearchRequest;

/// Maximum number of logins in one user search filter
pub const USERS_MAX_REQUEST: usize = 500;

/// Attribute list meaning "no attributes", so only DNs come back
const NO_ATTRIBUTES: &str = "1.1";

/// Index ranges of the batches for `total` logins
pub fn batches(total: usize) -> impl Iterator<Item = Range<usize>> {
    (0..total.div_ceil(USERS_MAX_REQUEST)).map(move |i| {
        let start = i * USERS_MAX_REQUEST;
        start..(start + USERS_MAX_REQUEST).min(total)
    })
}

/// Replace every `%s` in a filter template with the escaped value
pub fn substitute(template: &str, value: &str) -> String {
    template.replace("%s", &ldap_escape(value))
}

/// OR of the user search filter over every login
pub fn user_filter(template: &str, logins: &[String]) -> String {
    let mut filter = String::from("(|");
    for login in logins {
        filter.push_str(&substitute(template, login));
    }
    filter.push(')');
    filter
}

/// Configured user attributes, skipping the ones left empty
pub fn user_attributes(config: &ServerConfig) -> Vec<String> {
    let attributes = &config.attributes;

    [
        &attributes.username,
        &attributes.surname,
        &attributes.email,
        &attributes.name,
        &attributes.member_of,
        &config.group_search_filter_user_attribute,
    ]
    .into_iter()
    .filter(|name| !name.is_empty())
    .cloned()
    .collect()
}

pub fn user_search_request(config: &ServerConfig, base_dn: &str, logins: &[String]) -> SearchRequest {
    SearchRequest {
        base_dn: base_dn.to_string(),
        filter: user_filter(&config.search_filter, logins),
        attributes: user_attributes(config),
    }
}

/// Group search for directories that record membership on the group entry
/// Attribute identifying a group found by the group search. Groups are
/// identified by their DN when none is set or when it is left at `memberOf`.
pub fn group_id_attribute(config: &ServerConfig) -> Option<&str> {
    let attribute = config.attributes.member_of.as_str();
    if attribute.is_empty() || attribute.eq_ignore_ascii_case("memberOf") {
        None
    } else {
        Some(attribute)
    }
}

pub fn group_search_request(config: &ServerConfig, base_dn: &str, value: &str) -> SearchRequest {
    let attributes = match group_id_attribute(config) {
        Some(attribute) => vec![attribute.to_string()],
        None => vec![NO_ATTRIBUTES.to_string()],
    };

    SearchRequest {
        base_dn: base_dn.to_string(),
        filter: substitute(&config.group_search_filter, value),
        attributes,
    }
}
