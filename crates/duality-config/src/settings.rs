// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted client settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Config key the client settings are stored under.
pub const SETTINGS_KEY: &str = "client";

/// What loading a scene does with payloads cached for earlier scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CachePolicy {
    /// Keep every cached payload; identical identities are served from cache.
    #[default]
    ReuseAcrossScenes,
    /// Drop the whole cache before each load.
    RefetchOnLoad,
}

/// Settings of a Duality client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientSettings {
    /// Cache reuse between scene loads.
    pub cache_policy: CachePolicy,
    /// Directory of the persistent payload cache; `None` keeps payloads in
    /// memory only.
    pub cache_dir: Option<PathBuf>,
    /// Advisory byte budget of the in-memory cache.
    pub max_cache_bytes: Option<usize>,
    /// Server address, carried for the embedding application.
    pub server_address: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: ClientSettings = serde_json::from_str(r#"{ "maxCacheBytes": 1024 }"#).unwrap();
        assert_eq!(settings.cache_policy, CachePolicy::ReuseAcrossScenes);
        assert_eq!(settings.max_cache_bytes, Some(1024));
        assert!(settings.cache_dir.is_none());
    }

    #[test]
    fn policy_uses_camel_case_tags() {
        let json = serde_json::to_string(&CachePolicy::RefetchOnLoad).unwrap();
        assert_eq!(json, r#""refetchOnLoad""#);
    }
}
