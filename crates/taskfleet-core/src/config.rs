//! Fleet configuration and credential lookup.
//!
//! Two JSON files: the main config (hosts, groups, notification settings,
//! API keys) and a separate credentials file so secrets stay out of the
//! config that gets edited and shared freely.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// A configured PC. `name` is the key used for credential lookup and in
/// logs; `address` is what WinRM actually connects to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostTarget {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub google_chat_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiKeys {
    #[serde(default)]
    pub gemini: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub hosts: Vec<HostTarget>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub notification: NotificationSettings,
    #[serde(default)]
    pub api_keys: ApiKeys,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("config {} is malformed: {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn list_hosts(&self) -> &[HostTarget] {
        &self.hosts
    }

    pub fn host(&self, name: &str) -> Option<&HostTarget> {
        self.hosts.iter().find(|h| h.name == name)
    }
}

/// Username/password pair for one host. The password never appears in
/// `Debug` output; executors receive the credential by value and keep it
/// out of the scripts they log.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Host name → credential mapping with an optional `default` entry used
/// when no per-host credential exists.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    entries: HashMap<String, Credential>,
}

impl CredentialStore {
    pub fn new(entries: HashMap<String, Credential>) -> Self {
        Self { entries }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read credentials {}: {}", path.display(), e))
        })?;
        let entries: HashMap<String, Credential> = serde_json::from_str(&raw).map_err(|e| {
            Error::Config(format!("credentials {} are malformed: {}", path.display(), e))
        })?;
        Ok(Self { entries })
    }

    pub fn lookup(&self, host_name: &str) -> Option<&Credential> {
        self.entries
            .get(host_name)
            .or_else(|| self.entries.get("default"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_falls_back_to_default_entry() {
        let mut entries = HashMap::new();
        entries.insert(
            "PC-A".to_string(),
            Credential { username: "admin-a".to_string(), password: "secret-a".to_string() },
        );
        entries.insert(
            "default".to_string(),
            Credential { username: "admin".to_string(), password: "secret".to_string() },
        );
        let store = CredentialStore::new(entries);

        assert_eq!(store.lookup("PC-A").unwrap().username, "admin-a");
        assert_eq!(store.lookup("PC-B").unwrap().username, "admin");
    }

    #[test]
    fn empty_store_yields_nothing() {
        let store = CredentialStore::default();
        assert!(store.lookup("PC-A").is_none());
    }

    #[test]
    fn credential_debug_redacts_password() {
        let cred = Credential {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
        };
        let debugged = format!("{:?}", cred);
        assert!(debugged.contains("admin"));
        assert!(!debugged.contains("hunter2"));
    }

    #[test]
    fn config_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = AppConfig {
            hosts: vec![HostTarget {
                name: "PC-A".to_string(),
                address: "192.168.1.10".to_string(),
                group: Some("office".to_string()),
            }],
            groups: vec!["office".to_string()],
            ..AppConfig::default()
        };
        config.save(&path).unwrap();

        let reloaded = AppConfig::load(&path).unwrap();
        assert_eq!(reloaded.hosts.len(), 1);
        assert_eq!(reloaded.host("PC-A").unwrap().address, "192.168.1.10");
        assert!(reloaded.host("PC-Z").is_none());
    }
}
