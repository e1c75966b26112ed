// disco-core/src/infrastructure/sources/mod.rs
//
// Concrete discovery sources behind the `Source` port. Construction is a
// tagged dispatch on the configuration key; an unknown kind is fatal.

pub mod consul;
pub mod etcd;
pub mod flat;

use serde_json::{Map, Value};

use crate::error::DiscoError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::source::Source;

pub use consul::ConsulSource;
pub use etcd::EtcdSource;
pub use flat::FlatFileSource;

/// Build one source from its configuration section. `beacon` is a Consul
/// with a conventional name.
pub fn build_source(kind: &str, config: &Map<String, Value>) -> Result<Box<dyn Source>, DiscoError> {
    match kind {
        "flat" => Ok(Box::new(FlatFileSource::from_config(config)?)),
        "consul" => Ok(Box::new(ConsulSource::from_config(config, "consul")?)),
        "beacon" => Ok(Box::new(ConsulSource::from_config(config, "beacon")?)),
        "etcd" => Ok(Box::new(EtcdSource::from_config(config)?)),
        other => Err(InfrastructureError::UnknownSourceKind(other.to_string()).into()),
    }
}

/// Sources with an explicit `name` override it; otherwise the kind is used.
pub(crate) fn source_name(config: &Map<String, Value>, kind: &str) -> String {
    config
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(kind)
        .to_string()
}

pub(crate) fn config_str(config: &Map<String, Value>, key: &str) -> Option<String> {
    match config.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// KV stores flatten their trees into slash-separated keys; rebuild the
/// nested mapping. Empty segments are dropped, so `/a//b` and `a/b` agree.
pub(crate) fn insert_slash_key(state: &mut Map<String, Value>, key: &str, value: Value) {
    let parts: Vec<&str> = key.split('/').filter(|p| !p.is_empty()).collect();
    let Some((leaf, branches)) = parts.split_last() else {
        return;
    };
    let mut current = state;
    for part in branches {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            // a leaf turned into a directory; the directory wins
            *entry = Value::Object(Map::new());
        }
        match entry.as_object_mut() {
            Some(next) => current = next,
            None => return,
        }
    }
    current.insert(leaf.to_string(), value);
}
