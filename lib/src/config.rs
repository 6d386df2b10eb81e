//! Persisted config types.
//!
//! All sections are optional in the TOML file; missing sections fall back to
//! the defaults below so a hand-edited file only needs the keys it changes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level persisted config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankerConfig {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub webserver: HashMap<String, WebserverSection>,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub cleanup: CleanupSection,
    #[serde(default)]
    pub rate_limit: RateLimitSection,
    #[serde(default)]
    pub monitoring: MonitoringSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebserverSection {
    #[serde(default)]
    pub name: String,
    pub bind: String,
}

/// Game store backend. No path keeps games in memory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Periodic removal of stale games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
}

impl Default for CleanupSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_cleanup_interval(),
        }
    }
}

/// Per-client limits on the create and join endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_create_per_day")]
    pub create_per_day: u32,
    #[serde(default = "default_join_per_day")]
    pub join_per_day: u32,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            enabled: true,
            create_per_day: default_create_per_day(),
            join_per_day: default_join_per_day(),
        }
    }
}

/// Access to the monitoring endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringSection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_keys: Vec<ApiKeySection>,
}

/// A monitoring key. Only the BLAKE3 hex digest of the key is stored; see
/// [`hash_api_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeySection {
    #[serde(default)]
    pub label: String,
    pub key_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl MonitoringSection {
    /// Look up a key whose hash is configured and not yet expired at `now`.
    /// Entries with a malformed hash never match.
    pub fn find_key(&self, key: &str, now: DateTime<Utc>) -> Option<&ApiKeySection> {
        if key.is_empty() {
            return None;
        }
        // blake3::Hash equality is constant-time
        let presented = blake3::hash(key.as_bytes());
        self.api_keys.iter().find(|k| {
            blake3::Hash::from_hex(k.key_hash.trim()).is_ok_and(|stored| stored == presented)
                && k.expires_at.is_none_or(|exp| exp > now)
        })
    }
}

/// Hex digest stored in `key_hash` for a plaintext monitoring key.
pub fn hash_api_key(key: &str) -> String {
    blake3::hash(key.as_bytes()).to_hex().to_string()
}

fn default_true() -> bool {
    true
}

fn default_cleanup_interval() -> u64 {
    3600
}

fn default_create_per_day() -> u32 {
    5
}

fn default_join_per_day() -> u32 {
    20
}

impl Default for BankerConfig {
    /// A single public web server and an in-memory store.
    fn default() -> Self {
        let mut webserver = HashMap::new();
        webserver.insert(
            "0".into(),
            WebserverSection {
                name: "Web Server".into(),
                bind: "0.0.0.0:3030".into(),
            },
        );
        Self {
            webserver,
            store: StoreSection::default(),
            cleanup: CleanupSection::default(),
            rate_limit: RateLimitSection::default(),
            monitoring: MonitoringSection::default(),
        }
    }
}
