//! Directory metrics
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the embedding application.

use metrics::{counter, histogram};

/// Metric names
pub mod names {
    pub const LOGIN_TOTAL: &str = "dirgate_ldap_login_total";
    pub const LOGIN_DURATION_SECONDS: &str = "dirgate_ldap_login_duration_seconds";
    pub const DIAL_FAILURES_TOTAL: &str = "dirgate_ldap_dial_failures_total";
    pub const RELOAD_TOTAL: &str = "dirgate_ldap_reload_total";
}

/// Record the outcome of a multi-server login
pub fn record_login(result: &'static str, duration_secs: f64) {
    counter!(names::LOGIN_TOTAL, "result" => result).increment(1);
    histogram!(names::LOGIN_DURATION_SECONDS).record(duration_secs);
}

pub fn record_dial_failure(host: &str) {
    counter!(names::DIAL_FAILURES_TOTAL, "host" => host.to_string()).increment(1);
}

pub fn record_reload(success: bool) {
    counter!(
        names::RELOAD_TOTAL,
        "result" => if success { "success" } else { "error" }
    )
    .increment(1);
}
