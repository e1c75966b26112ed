// disco-core/src/infrastructure/sources/consul.rs

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::DiscoError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::sources::{config_str, insert_slash_key, source_name};
use crate::ports::source::Source;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8500;

/// One entry of the Consul KV listing. Values come back base64-encoded.
#[derive(Debug, Deserialize)]
struct KvEntry {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value")]
    value: Option<String>,
}

/// Consul KV over its HTTP API. Keys under `prefix` are listed recursively
/// and re-nested by splitting on `/`. A transport failure is this source's
/// own problem: it logs and reports an empty mapping so the discovery loop
/// keeps ticking.
#[derive(Debug)]
pub struct ConsulSource {
    name: String,
    base: String,
    prefix: String,
    client: reqwest::Client,
}

impl ConsulSource {
    pub fn from_config(config: &Map<String, Value>, kind: &str) -> Result<Self, DiscoError> {
        let host = config_str(config, "host").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = config_str(config, "port").unwrap_or_else(|| DEFAULT_PORT.to_string());
        let prefix = config_str(config, "prefix").unwrap_or_default();
        Ok(Self {
            name: source_name(config, kind),
            base: format!("http://{host}:{port}"),
            prefix,
            client: reqwest::Client::new(),
        })
    }

    async fn fetch(&self) -> Result<Vec<KvEntry>, InfrastructureError> {
        let url = format!("{}/v1/kv/{}?recurse=true", self.base, self.prefix);
        let response = self.client.get(&url).send().await?;
        // an empty prefix is not an error, just nothing learned yet
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        Ok(response.error_for_status()?.json().await?)
    }
}

#[async_trait]
impl Source for ConsulSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), DiscoError> {
        // The HTTP client is connectionless; every state() is a fresh list.
        Ok(())
    }

    async fn state(&self) -> Result<Value, DiscoError> {
        let entries = match self.fetch().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(source = %self.name, error = %e, "consul unreachable; empty state this tick");
                return Ok(Value::Object(Map::new()));
            }
        };

        let mut state = Map::new();
        for entry in entries {
            let Some(encoded) = entry.value else {
                continue; // directory placeholder
            };
            let decoded = match base64::decode(&encoded) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                Err(e) => {
                    warn!(source = %self.name, key = %entry.key, error = %e, "undecodable value skipped");
                    continue;
                }
            };
            insert_slash_key(&mut state, &entry.key, Value::String(decoded));
        }
        Ok(Value::Object(state))
    }

    async fn disconnect(&self) -> Result<(), DiscoError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_config_defaults() {
        let source = ConsulSource::from_config(&Map::new(), "consul").unwrap();
        assert_eq!(source.name(), "consul");
        assert_eq!(source.base, "http://localhost:8500");
        assert_eq!(source.prefix, "");
    }

    #[test]
    fn test_from_config_overrides() {
        let mut config = Map::new();
        config.insert("host".to_string(), json!("consul.internal"));
        config.insert("port".to_string(), json!("8501"));
        config.insert("prefix".to_string(), json!("app"));
        config.insert("name".to_string(), json!("beacon"));
        let source = ConsulSource::from_config(&config, "consul").unwrap();
        assert_eq!(source.name(), "beacon");
        assert_eq!(source.base, "http://consul.internal:8501");
        assert_eq!(source.prefix, "app");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_yields_empty_state() {
        let mut config = Map::new();
        // reserved port on localhost that nothing listens on
        config.insert("host".to_string(), json!("127.0.0.1"));
        config.insert("port".to_string(), json!("9"));
        let source = ConsulSource::from_config(&config, "consul").unwrap();
        source.connect().await.unwrap();
        assert_eq!(source.state().await.unwrap(), json!({}));
    }
}
