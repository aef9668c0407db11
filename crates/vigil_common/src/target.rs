//! Registered audit targets and their credential descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// How to authenticate against a target host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "method", content = "value")]
pub enum Credential {
    /// SSH password authentication
    Password(String),
    /// Path to a private key file on the daemon host
    KeyFile(PathBuf),
}

/// Last-known reachability of a target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Reachability {
    #[default]
    Unknown,
    Reachable,
    Unreachable,
}

/// A registered remote Linux host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: Uuid,
    /// Operator-chosen display name
    pub name: String,
    /// Hostname or IP address
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    pub credential: Credential,
    #[serde(default)]
    pub reachability: Reachability,
    pub registered_at: DateTime<Utc>,
}

fn default_ssh_port() -> u16 {
    22
}

impl Target {
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            host: host.into(),
            port: default_ssh_port(),
            username: username.into(),
            credential,
            reachability: Reachability::Unknown,
            registered_at: Utc::now(),
        }
    }

    /// host:port pair used for the TCP connect
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_defaults_to_port_22() {
        let t = Target::new(
            "web-01",
            "10.0.0.5",
            "auditor",
            Credential::Password("secret".into()),
        );
        assert_eq!(t.port, 22);
        assert_eq!(t.addr(), "10.0.0.5:22");
        assert_eq!(t.reachability, Reachability::Unknown);
    }

    #[test]
    fn test_credential_serialization_tags_method() {
        let c = Credential::KeyFile(PathBuf::from("/etc/vigil/keys/web-01"));
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("key_file"));
    }
}
