// disco-core/src/infrastructure/sources/flat.rs

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::DiscoError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::sources::{config_str, source_name};
use crate::ports::source::Source;

/// A YAML document on disk. `connect` reads and memoises the parsed
/// contents; `state` hands the memoised document back.
#[derive(Debug)]
pub struct FlatFileSource {
    name: String,
    path: PathBuf,
    state: RwLock<Option<Value>>,
}

impl FlatFileSource {
    pub fn from_config(config: &Map<String, Value>) -> Result<Self, DiscoError> {
        let path = config_str(config, "file").ok_or_else(|| {
            InfrastructureError::ConfigError("flat source requires a 'file' key".to_string())
        })?;
        Ok(Self {
            name: source_name(config, "flat"),
            path: PathBuf::from(path),
            state: RwLock::new(None),
        })
    }
}

#[async_trait]
impl Source for FlatFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<(), DiscoError> {
        if self.state.read().await.is_some() {
            return Ok(());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        let parsed: Value = serde_yaml::from_str(&content).map_err(InfrastructureError::Yaml)?;
        debug!(file = ?self.path, "flat source loaded");
        *self.state.write().await = Some(parsed);
        Ok(())
    }

    async fn state(&self) -> Result<Value, DiscoError> {
        Ok(self
            .state
            .read()
            .await
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    async fn disconnect(&self) -> Result<(), DiscoError> {
        *self.state.write().await = None;
        Ok(())
    }
}
