// disco-core/src/infrastructure/config.rs
//
// Layered agent configuration. Three sources compose, lowest priority
// first: built-in defaults, a YAML file, and the DISCO_CFG environment
// string. Sections other than `disco` name discovery sources.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::domain::knowledge::deep_merge;
use crate::infrastructure::error::InfrastructureError;

/// Well-known directory where the packaging side drops rule/schema files
/// and where the default config file lives.
pub const AGENT_DIR: &str = "/etc/disco";

/// Environment variable holding `|`-separated `a.b.c=value` tokens.
pub const CFG_ENV_VAR: &str = "DISCO_CFG";

/// Nested configuration mapping with dotted-path readers. Values coming
/// from the environment are plain strings; the typed getters coerce.
#[derive(Debug, Clone, Default)]
pub struct DiscoConfig {
    root: Map<String, Value>,
}

impl DiscoConfig {
    /// Built-in defaults: rule/schema search path under the agent dir.
    pub fn defaults() -> Self {
        let mut disco = Map::new();
        disco.insert("path".to_string(), Value::String(AGENT_DIR.to_string()));
        let mut root = Map::new();
        root.insert("disco".to_string(), Value::Object(disco));
        Self { root }
    }

    pub fn from_map(root: Map<String, Value>) -> Self {
        Self { root }
    }

    pub fn from_file(path: &Path) -> Result<Self, InfrastructureError> {
        let content = fs::read_to_string(path)?;
        let root: Map<String, Value> = serde_yaml::from_str(&content)?;
        info!(path = ?path, "agent configuration loaded");
        Ok(Self { root })
    }

    /// Parse the environment string form: tokens separated by `|`, each
    /// `a.b.c=value` or a bare `a.b.c` meaning boolean true.
    pub fn from_env_str(cfg: &str) -> Self {
        let mut root = Map::new();
        for token in cfg.split('|') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (key, value) = match token.split_once('=') {
                Some((k, v)) => (k, Value::String(v.to_string())),
                None => (token, Value::Bool(true)),
            };
            insert_dotted(&mut root, key, value);
        }
        debug!(keys = ?root.keys().collect::<Vec<_>>(), "environment configuration parsed");
        Self { root }
    }

    /// Assemble the full layered configuration for the agent: defaults,
    /// then the config file (when present), then the environment.
    pub fn layered(conf_file: Option<&Path>) -> Result<Self, InfrastructureError> {
        let mut config = Self::defaults();
        if let Some(path) = conf_file {
            if path.exists() {
                config.merge(Self::from_file(path)?);
            } else {
                debug!(path = ?path, "no config file; using defaults");
            }
        }
        if let Ok(env) = std::env::var(CFG_ENV_VAR) {
            config.merge(Self::from_env_str(&env));
        }
        Ok(config)
    }

    /// Deep-merge `other` on top of this configuration (other wins).
    pub fn merge(&mut self, other: DiscoConfig) {
        deep_merge(&mut self.root, other.root);
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.root.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn get_f64(&self, path: &str, default: f64) -> f64 {
        match self.get(path) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
            Some(Value::String(s)) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn get_u32(&self, path: &str, default: u32) -> u32 {
        match self.get(path) {
            Some(Value::Number(n)) => n.as_u64().map_or(default, |v| v as u32),
            Some(Value::String(s)) => s.parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Top-level sections in declaration order. Every section apart from
    /// `disco` names a discovery source.
    pub fn sections(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.root.iter()
    }
}

fn insert_dotted(root: &mut Map<String, Value>, key: &str, value: Value) {
    let mut current = root;
    let mut parts = key.split('.').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            current.insert(part.to_string(), value);
            return;
        }
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        match entry.as_object_mut() {
            Some(next) => current = next,
            None => return,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_env_str_nesting() {
        let config = DiscoConfig::from_env_str("consul.host=foo|consul.user=bar");
        assert_eq!(config.get("consul.host"), Some(&json!("foo")));
        assert_eq!(config.get("consul.user"), Some(&json!("bar")));
    }

    #[test]
    fn test_env_str_bare_key_is_boolean() {
        let config = DiscoConfig::from_env_str("disco.debug|flat.file=/tmp/x.yaml");
        assert_eq!(config.get("disco.debug"), Some(&json!(true)));
        assert_eq!(config.get("flat.file"), Some(&json!("/tmp/x.yaml")));
    }

    #[test]
    fn test_env_str_ignores_empty_tokens() {
        let config = DiscoConfig::from_env_str(" | a.b=1 ||");
        assert_eq!(config.get("a.b"), Some(&json!("1")));
        assert!(config.get("").is_none());
    }

    #[test]
    fn test_merge_is_deep_and_newest_wins() {
        let mut config = DiscoConfig::defaults();
        config.merge(DiscoConfig::from_env_str("disco.interval=0.5"));
        // the default path survives the env override of a sibling key
        assert_eq!(config.get_str("disco.path"), Some(AGENT_DIR.to_string()));
        assert_eq!(config.get_f64("disco.interval", 1.0), 0.5);
    }

    #[test]
    fn test_typed_getters_coerce_env_strings() {
        let config = DiscoConfig::from_env_str("disco.fail_limit=3|disco.interval=0.25");
        assert_eq!(config.get_u32("disco.fail_limit", 5), 3);
        assert_eq!(config.get_f64("disco.interval", 1.0), 0.25);
        assert_eq!(config.get_u32("disco.missing", 5), 5);
        assert_eq!(config.get_u32("disco.interval", 7), 7); // non-integer falls back
    }

    #[test]
    fn test_sections_skip_nothing() {
        let config = DiscoConfig::from_env_str("flat.file=a|consul.host=b|disco.path=c");
        let names: Vec<&String> = config.sections().map(|(name, _)| name).collect();
        assert_eq!(names, ["flat", "consul", "disco"]);
    }

    #[test]
    fn test_from_file_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("disco.conf");
        std::fs::write(&path, "disco:\n  interval: 2.5\nflat:\n  file: /x.yaml\n")?;
        let config = DiscoConfig::from_file(&path)?;
        assert_eq!(config.get_f64("disco.interval", 1.0), 2.5);
        assert_eq!(config.get_str("flat.file"), Some("/x.yaml".to_string()));
        Ok(())
    }
}
