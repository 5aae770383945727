//! In-memory directory for tests
//!
//! Understands simple binds and `&`, `|` and equality filters, and records
//! every dial, bind, search and close so tests can assert on the traffic.

use async_trait::async_trait;
use dirgate_core::config::AttributeMap;
use dirgate_core::error::RESULT_INVALID_CREDENTIALS;
use dirgate_core::{ConfigSource, Error, LdapConfig, Result, ServerConfig};
use ldap3::ldap_escape;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::{Connection, Connector, DirectoryEntry, SearchRequest};

pub const ADMIN_DN: &str = "cn=admin,dc=example,dc=org";
pub const ADMIN_PASSWORD: &str = "admin-pw";
pub const ADMINS_DN: &str = "cn=admins,ou=groups,dc=example,dc=org";

/// Result code for a bind the server refuses without credentials
const RESULT_INAPPROPRIATE_AUTH: u32 = 48;

#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    Dial(String),
    DialFailed(String),
    Bind(String),
    Search(SearchRequest),
    Close(String),
}

/// Contents and behavior of one mock server
#[derive(Debug, Clone, Default)]
pub struct MockServer {
    entries: Vec<DirectoryEntry>,
    passwords: HashMap<String, String>,
    anonymous: bool,
    unreachable: bool,
    search_error: Option<u32>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default().account(ADMIN_DN, ADMIN_PASSWORD)
    }

    pub fn account(mut self, dn: &str, password: &str) -> Self {
        self.passwords.insert(dn.to_string(), password.to_string());
        self
    }

    pub fn user(self, entry: DirectoryEntry, password: &str) -> Self {
        let dn = entry.dn.clone();
        self.entry(entry).account(&dn, password)
    }

    pub fn entry(mut self, entry: DirectoryEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn allow_anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn fail_searches(mut self, code: u32) -> Self {
        self.search_error = Some(code);
        self
    }
}

/// Directory with alice (member of the admins group) and bob (no groups)
pub fn directory(suffix: &str) -> MockServer {
    MockServer::new()
        .user(person(suffix, "alice", "Alice", "Liddell").with_attr("memberOf", &[ADMINS_DN]), "alice-pw")
        .user(person(suffix, "bob", "Bob", "Builder"), "bob-pw")
}

/// Directory recording membership on posixGroup entries
pub fn posix_directory(suffix: &str) -> MockServer {
    let group = DirectoryEntry::new(format!("cn=devs,ou=groups,{}", suffix))
        .with_attr("objectClass", &["posixGroup"])
        .with_attr("cn", &["devs"])
        .with_attr("memberUid", &["alice"]);

    MockServer::new()
        .user(person(suffix, "alice", "Alice", "Liddell"), "alice-pw")
        .user(person(suffix, "bob", "Bob", "Builder"), "bob-pw")
        .entry(group)
}

pub fn person(suffix: &str, uid: &str, given_name: &str, surname: &str) -> DirectoryEntry {
    let mail = format!("{}@example.org", uid);
    DirectoryEntry::new(format!("uid={},ou=people,{}", uid, suffix))
        .with_attr("objectClass", &["inetOrgPerson"])
        .with_attr("uid", &[uid])
        .with_attr("givenName", &[given_name])
        .with_attr("sn", &[surname])
        .with_attr("mail", &[mail.as_str()])
}

/// Server definition matching [`directory`] and [`posix_directory`]
pub fn server_config(host: &str, suffix: &str) -> ServerConfig {
    ServerConfig {
        host: host.to_string(),
        port: 389,
        bind_dn: ADMIN_DN.to_string(),
        bind_password: ADMIN_PASSWORD.to_string(),
        timeout: 10,
        search_filter: "(uid=%s)".to_string(),
        search_base_dns: vec![suffix.to_string()],
        attributes: AttributeMap {
            username: "uid".into(),
            name: "givenName".into(),
            surname: "sn".into(),
            email: "mail".into(),
            member_of: "memberOf".into(),
        },
        ..Default::default()
    }
}

// ============================================================================
// Connector
// ============================================================================

#[derive(Clone, Default)]
pub struct MockConnector {
    servers: HashMap<String, MockServer>,
    events: Arc<Mutex<Vec<MockEvent>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, host: &str, server: MockServer) -> Self {
        self.servers.insert(host.to_string(), server);
        self
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.events.lock().clone()
    }

    pub fn dials(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Dial(host) => Some(host),
                _ => None,
            })
            .collect()
    }

    pub fn binds(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Bind(dn) => Some(dn),
                _ => None,
            })
            .collect()
    }

    pub fn searches(&self) -> Vec<SearchRequest> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Search(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn closes(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, MockEvent::Close(_)))
            .count()
    }

    fn record(&self, event: MockEvent) {
        self.events.lock().push(event);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn dial(&self, config: &ServerConfig) -> Result<Box<dyn Connection>> {
        let mut last_error = None;

        for host in config.hosts() {
            match self.servers.get(host) {
                Some(server) if !server.unreachable => {
                    self.record(MockEvent::Dial(host.to_string()));
                    return Ok(Box::new(MockConnection {
                        server: server.clone(),
                        host: host.to_string(),
                        events: self.events.clone(),
                    }));
                }
                _ => {
                    self.record(MockEvent::DialFailed(host.to_string()));
                    last_error = Some(Error::Dial {
                        address: format!("{}:{}", host, config.port),
                        message: "connection refused".into(),
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Config("no host".into())))
    }
}

struct MockConnection {
    server: MockServer,
    host: String,
    events: Arc<Mutex<Vec<MockEvent>>>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn bind(&mut self, dn: &str, password: &str) -> Result<()> {
        self.events.lock().push(MockEvent::Bind(dn.to_string()));

        match self.server.passwords.get(dn) {
            Some(expected) if expected == password => Ok(()),
            _ => Err(Error::Protocol {
                code: RESULT_INVALID_CREDENTIALS,
                message: "Invalid Credentials".into(),
            }),
        }
    }

    async fn unauthenticated_bind(&mut self, dn: &str) -> Result<()> {
        self.events.lock().push(MockEvent::Bind(dn.to_string()));

        if self.server.anonymous {
            Ok(())
        } else {
            Err(Error::Protocol {
                code: RESULT_INAPPROPRIATE_AUTH,
                message: "Unauthenticated binds are not allowed".into(),
            })
        }
    }

    async fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryEntry>> {
        self.events.lock().push(MockEvent::Search(request.clone()));

        if let Some(code) = self.server.search_error {
            return Err(Error::Protocol {
                code,
                message: "search failed".into(),
            });
        }

        let filter = parse_filter(&request.filter);
        let base = request.base_dn.to_lowercase();

        Ok(self
            .server
            .entries
            .iter()
            .filter(|entry| entry.dn.to_lowercase().ends_with(&base))
            .filter(|entry| filter.as_ref().is_some_and(|f| f.matches(entry)))
            .cloned()
            .collect())
    }

    async fn close(&mut self) {
        self.events.lock().push(MockEvent::Close(self.host.clone()));
    }
}

// ============================================================================
// Filters
// ============================================================================

enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Equal(String, String),
}

impl Filter {
    fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Filter::Equal(attr, value) => entry
                .values(attr)
                .iter()
                .any(|v| ldap_escape(v.as_str()).eq_ignore_ascii_case(value)),
        }
    }
}

fn parse_filter(input: &str) -> Option<Filter> {
    match parse(input) {
        Some((filter, "")) => Some(filter),
        _ => None,
    }
}

fn parse(input: &str) -> Option<(Filter, &str)> {
    let rest = input.strip_prefix('(')?;

    if let Some(rest) = rest.strip_prefix('&') {
        let (filters, rest) = parse_list(rest)?;
        Some((Filter::And(filters), rest))
    } else if let Some(rest) = rest.strip_prefix('|') {
        let (filters, rest) = parse_list(rest)?;
        Some((Filter::Or(filters), rest))
    } else {
        let end = rest.find(')')?;
        let (attr, value) = rest[..end].split_once('=')?;
        Some((Filter::Equal(attr.to_string(), value.to_string()), &rest[end + 1..]))
    }
}

fn parse_list(mut input: &str) -> Option<(Vec<Filter>, &str)> {
    let mut filters = Vec::new();

    while !input.starts_with(')') {
        let (filter, rest) = parse(input)?;
        filters.push(filter);
        input = rest;
    }

    Some((filters, &input[1..]))
}

// ============================================================================
// Config sources
// ============================================================================

/// Serves a fixed server list, or fails when constructed empty
pub struct StaticSource(pub Option<LdapConfig>);

impl StaticSource {
    pub fn servers(servers: Vec<ServerConfig>) -> Self {
        Self(Some(LdapConfig { servers }))
    }

    pub fn failing() -> Self {
        Self(None)
    }
}

impl ConfigSource for StaticSource {
    fn load(&self) -> Result<LdapConfig> {
        self.0
            .clone()
            .ok_or_else(|| Error::Config("Failed to read LDAP config".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_evaluation() {
        let alice = person("dc=one", "alice", "Alice", "Liddell");

        assert!(parse_filter("(uid=alice)").unwrap().matches(&alice));
        assert!(parse_filter("(|(uid=bob)(UID=ALICE))").unwrap().matches(&alice));
        assert!(!parse_filter("(&(uid=alice)(sn=Builder))").unwrap().matches(&alice));
        assert!(parse_filter("(uid=alice").is_none());
    }
}
