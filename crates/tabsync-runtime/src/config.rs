//! Document-wide synchronization settings.
//!
//! Settings come from code ([`SyncConfig::default`] plus `with_*` setters),
//! from the environment ([`SyncConfig::from_env`]), or, with the
//! `policy-config` feature, from a TOML or JSON file.

use std::env;
use std::fmt;
#[cfg(feature = "policy-config")]
use std::path::Path;

/// Environment variable that overrides [`SyncConfig::namespace`].
pub const NAMESPACE_ENV: &str = "TABSYNC_NAMESPACE";
/// Environment variable that overrides [`SyncConfig::broadcast_on_remove`].
pub const BROADCAST_ON_REMOVE_ENV: &str = "TABSYNC_BROADCAST_ON_REMOVE";

const DEFAULT_NAMESPACE: &str = "tabsync";

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(default, deny_unknown_fields)
)]
pub struct SyncConfig {
    /// Prefix of same-document event names.
    pub namespace: String,
    /// Also announce `remove()` to same-document siblings.
    pub broadcast_on_remove: bool,
    /// Skip backend writes whose text equals the last text written or seen.
    pub skip_redundant_writes: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            broadcast_on_remove: false,
            skip_redundant_writes: true,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_broadcast_on_remove(mut self, enabled: bool) -> Self {
        self.broadcast_on_remove = enabled;
        self
    }

    #[must_use]
    pub fn with_skip_redundant_writes(mut self, enabled: bool) -> Self {
        self.skip_redundant_writes = enabled;
        self
    }

    /// Defaults overridden by `TABSYNC_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|name| env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable lookup.
    #[must_use]
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(ns) = lookup(NAMESPACE_ENV).filter(|ns| !ns.trim().is_empty()) {
            config.namespace = ns.trim().to_owned();
        }
        if let Some(flag) = lookup(BROADCAST_ON_REMOVE_ENV) {
            match parse_flag(&flag) {
                Some(enabled) => config.broadcast_on_remove = enabled,
                None => tracing::warn!(
                    var = BROADCAST_ON_REMOVE_ENV,
                    value = %flag,
                    "ignoring unrecognized boolean"
                ),
            }
        }
        config
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Errors from loading a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    /// File extension is neither `.toml` nor `.json`.
    UnsupportedFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "config i/o error: {msg}"),
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::UnsupportedFormat(ext) => write!(f, "unsupported config format: {ext:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(feature = "policy-config")]
impl SyncConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from a `.toml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        match ext.as_str() {
            "toml" => Self::from_toml_str(&text),
            "json" => Self::from_json_str(&text),
            _ => Err(ConfigError::UnsupportedFormat(ext)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.namespace, "tabsync");
        assert!(!config.broadcast_on_remove);
        assert!(config.skip_redundant_writes);
    }

    #[test]
    fn builder_setters() {
        let config = SyncConfig::new()
            .with_namespace("app")
            .with_broadcast_on_remove(true)
            .with_skip_redundant_writes(false);
        assert_eq!(config.namespace, "app");
        assert!(config.broadcast_on_remove);
        assert!(!config.skip_redundant_writes);
    }

    #[test]
    fn env_overrides() {
        let config = SyncConfig::from_env_with(|name| match name {
            NAMESPACE_ENV => Some(" shop ".into()),
            BROADCAST_ON_REMOVE_ENV => Some("Yes".into()),
            _ => None,
        });
        assert_eq!(config.namespace, "shop");
        assert!(config.broadcast_on_remove);
    }

    #[test]
    fn env_ignores_blank_and_garbage() {
        let config = SyncConfig::from_env_with(|name| match name {
            NAMESPACE_ENV => Some("   ".into()),
            BROADCAST_ON_REMOVE_ENV => Some("maybe".into()),
            _ => None,
        });
        assert_eq!(config, SyncConfig::default());
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn toml_partial_uses_defaults() {
        let config = SyncConfig::from_toml_str("namespace = \"inbox\"\n").unwrap();
        assert_eq!(config.namespace, "inbox");
        assert!(config.skip_redundant_writes);
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn json_and_unknown_fields() {
        let config = SyncConfig::from_json_str(r#"{"broadcast_on_remove":true}"#).unwrap();
        assert!(config.broadcast_on_remove);
        assert!(matches!(
            SyncConfig::from_json_str(r#"{"nope":1}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn load_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("sync.toml");
        std::fs::write(&toml_path, "broadcast_on_remove = true\n").unwrap();
        assert!(SyncConfig::load(&toml_path).unwrap().broadcast_on_remove);

        let yaml_path = dir.path().join("sync.yaml");
        std::fs::write(&yaml_path, "x: 1\n").unwrap();
        assert!(matches!(
            SyncConfig::load(&yaml_path),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"
        ));
    }
}
