// disco-core/src/infrastructure/sources/etcd.rs

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::DiscoError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::sources::{config_str, insert_slash_key, source_name};
use crate::ports::source::Source;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 4001;

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: Node,
}

/// etcd v2 node tree: directories carry `nodes`, leaves carry `value`.
#[derive(Debug, Deserialize)]
struct Node {
    key: Option<String>,
    value: Option<String>,
    #[serde(default)]
    nodes: Vec<Node>,
}

/// etcd over the v2 keys API (default port 4001). A recursive read under
/// `prefix` is flattened to its leaves and re-nested by splitting each key
/// on `/`. Transport-error policy matches Consul: log, report empty.
#[derive(Debug)]
pub struct EtcdSource {
    name: String,
    base: String,
    prefix: String,
    client: reqwest::Client,
}

impl EtcdSource {
    pub fn from_config(config: &Map<String, Value>) -> Result<Self, DiscoError> {
        let host = config_str(config, "host").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = config_str(config, "port").unwrap_or_else(|| DEFAULT_PORT.to_string());
        let prefix = config_str(config, "prefix").unwrap_or_default();
        Ok(Self {
            name: source_name(config, "etcd"),
            base: format!("http://{host}:{port}"),
            prefix,
            client: reqwest::Client::new(),
        })
    }

    async fn fetch(&self) -> Result<KeysResponse, InfrastructureError> {
        let url = format!(
            "{}/v2/keys/{}?recursive=true",
            self.base,
            self.prefix.trim_start_matches('/')
        );
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

fn collect_leaves(node: &Node, state: &mut Map<String, Value>) {
    if let (Some(key), Some(value)) = (&node.key, &node.value) {
        insert_slash_key(state, key, Value::String(value.clone()));
    }
    for child in &node.nodes {
        collect_leaves(child, state);
    }
}

#[async_trait]
impl Source for EtcdSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), DiscoError> {
        Ok(())
    }

    async fn state(&self) -> Result<Value, DiscoError> {
        let tree = match self.fetch().await {
            Ok(tree) => tree,
            Err(e) => {
                warn!(source = %self.name, error = %e, "etcd unreachable; empty state this tick");
                return Ok(Value::Object(Map::new()));
            }
        };
        let mut state = Map::new();
        collect_leaves(&tree.node, &mut state);
        Ok(Value::Object(state))
    }

    async fn disconnect(&self) -> Result<(), DiscoError> {
        Ok(())
    }
}
