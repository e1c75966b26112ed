// disco-core/src/application/discoverer.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use crate::domain::hash::{StateHash, state_hash};
use crate::domain::knowledge::Knowledge;
use crate::error::DiscoError;
use crate::infrastructure::config::DiscoConfig;
use crate::infrastructure::sources::build_source;
use crate::ports::source::Source;

pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

/// Owns the source set and feeds the knowledge base. One digest is kept per
/// source so an unchanged state never injects a new layer; that hash is the
/// only change-detection signal the engine relies on.
pub struct Discoverer {
    sources: Vec<Box<dyn Source>>,
    hashes: Mutex<HashMap<String, StateHash>>,
    running: AtomicBool,
    interval: Duration,
}

impl Discoverer {
    /// Instantiate every source named by a top-level configuration section
    /// (in declaration order). The `disco` section configures the agent
    /// itself; any other unknown section kind is fatal.
    pub fn from_config(config: &DiscoConfig) -> Result<Self, DiscoError> {
        let mut sources: Vec<Box<dyn Source>> = Vec::new();
        for (kind, section) in config.sections() {
            if kind == "disco" {
                continue;
            }
            let section = section.as_object().cloned().unwrap_or_default();
            sources.push(build_source(kind, &section)?);
        }
        Ok(Self {
            sources,
            hashes: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
            interval: Duration::from_secs_f64(
                config.get_f64("disco.interval", DEFAULT_INTERVAL_SECS),
            ),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_sources(sources: Vec<Box<dyn Source>>, interval: Duration) -> Self {
        Self {
            sources,
            hashes: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
            interval,
        }
    }

    /// One discovery pass: connect, read, hash, and inject changed state.
    /// A failing source is skipped this tick, never fatal.
    #[instrument(skip_all)]
    pub async fn populate(&self, kb: &RwLock<Knowledge>) {
        for source in &self.sources {
            let name = source.name();
            if let Err(e) = source.connect().await {
                warn!(source = %name, error = %e, "connect failed; skipping this tick");
                continue;
            }
            let state = match source.state().await {
                Ok(state) => state,
                Err(e) => {
                    warn!(source = %name, error = %e, "state read failed; skipping this tick");
                    continue;
                }
            };
            let Value::Object(state) = state else {
                warn!(source = %name, "source state is not a mapping; ignored");
                continue;
            };

            let digest = state_hash(&Value::Object(state.clone()));
            let mut hashes = self.hashes.lock().await;
            if hashes.get(name) != Some(&digest) {
                // Only the keys reach the log; values can hold secrets.
                let keys: Vec<&String> = state.keys().collect();
                debug!(source = %name, keys = ?keys, "learned new state");
                kb.write().await.inject(state);
                hashes.insert(name.to_string(), digest);
            }
        }
    }

    /// Poll all sources on the configured interval until `shutdown`.
    pub async fn watch(&self, kb: Arc<RwLock<Knowledge>>) {
        self.running.store(true, Ordering::SeqCst);
        while self.running.load(Ordering::SeqCst) {
            self.populate(&kb).await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Stop the watch loop and release every source connection.
    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        for source in &self.sources {
            if let Err(e) = source.disconnect().await {
                warn!(source = %source.name(), error = %e, "disconnect failed");
            }
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}
