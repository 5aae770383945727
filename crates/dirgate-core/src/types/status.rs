//! Server health types

use serde::{Deserialize, Serialize};

/// Reachability of one configured directory server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    pub host: String,
    pub port: u16,
    pub available: bool,
    /// Error message if the server could not be reached
    pub error: Option<String>,
}
