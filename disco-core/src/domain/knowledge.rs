// disco-core/src/domain/knowledge.rs

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::domain::error::DomainError;

pub type Layer = Map<String, Value>;

/// Key under which schemas live inside the knowledge base itself.
const SCHEMA_ROOT: &str = "schemas";

/// Layered composite of the knowledge learned from every available source.
///
/// Layers are immutable once pushed; a dotted-path lookup walks from the
/// newest layer down and the first layer resolving the *full* path wins.
/// Sibling keys from older layers therefore stay visible without any global
/// merge cost.
#[derive(Debug, Default)]
pub struct Knowledge {
    layers: Vec<Layer>,
}

impl Knowledge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new layer on top of the stack.
    pub fn inject(&mut self, data: Layer) -> &mut Self {
        self.layers.push(data);
        self
    }

    /// Replace the top layer with a deep-merged copy of itself and `data`.
    /// Falls back to a plain `inject` on an empty stack.
    pub fn update(&mut self, data: Layer) -> &mut Self {
        match self.layers.pop() {
            Some(mut top) => {
                deep_merge(&mut top, data);
                self.layers.push(top);
            }
            None => self.layers.push(data),
        }
        self
    }

    /// Parse a YAML document and push it as a new layer. When `to` is given,
    /// the document is re-rooted so its contents appear under that dotted
    /// path (`to = "schemas.mysql"` wraps the doc twice).
    pub fn load(&mut self, text: &str, to: Option<&str>) -> Result<&mut Self, DomainError> {
        let mut data: Value =
            serde_yaml::from_str(text).map_err(|e| DomainError::Document(e.to_string()))?;
        if let Some(path) = to {
            for part in path.rsplit('.') {
                let mut wrapper = Map::new();
                wrapper.insert(part.to_string(), data);
                data = Value::Object(wrapper);
            }
        }
        match data {
            Value::Object(map) => Ok(self.inject(map)),
            other => Err(DomainError::Document(format!(
                "expected a mapping at the top level, found {}",
                kind_of(&other)
            ))),
        }
    }

    /// Parse a schema document, read its mandatory top-level `name`, and
    /// store it under `schemas.<name>`. Returns the schema name.
    pub fn load_schema(&mut self, text: &str) -> Result<String, DomainError> {
        let data: Value =
            serde_yaml::from_str(text).map_err(|e| DomainError::Document(e.to_string()))?;
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .ok_or(DomainError::UnnamedSchema)?
            .to_string();
        let mut wrapper = Map::new();
        wrapper.insert(name.clone(), data);
        let mut root = Map::new();
        root.insert(SCHEMA_ROOT.to_string(), Value::Object(wrapper));
        self.inject(root);
        debug!(schema = %name, "schema loaded");
        Ok(name)
    }

    /// Dotted-path lookup, newest layer first. Either the full path resolves
    /// in one layer or the lookup moves on; no partial reads.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| resolve(layer, path))
    }

    /// Validate the subtree at `path` (or the whole composed mapping) against
    /// the schema stored under `schemas.<schema>`.
    pub fn validate(&self, schema: &str, path: Option<&str>) -> Result<(), DomainError> {
        let schema_doc = self
            .get(&format!("{SCHEMA_ROOT}.{schema}"))
            .ok_or_else(|| DomainError::SchemaMissing {
                name: schema.to_string(),
            })?;

        let instance = match path {
            Some(p) => self
                .get(p)
                .cloned()
                .ok_or_else(|| DomainError::PathMissing {
                    path: p.to_string(),
                })?,
            None => Value::Object(self.composed()),
        };

        let validator =
            jsonschema::validator_for(schema_doc).map_err(|e| DomainError::SchemaInvalid {
                name: schema.to_string(),
                at: e.to_string(),
            })?;

        if let jsonschema::BasicOutput::Invalid(errs) = validator.apply(&instance).basic() {
            // Only the location, never the offending value (secrets)
            let at = errs
                .iter()
                .map(|e| e.instance_location().to_string())
                .next()
                .unwrap_or_default();
            return Err(DomainError::SchemaInvalid {
                name: schema.to_string(),
                at,
            });
        }

        debug!(schema = %schema, "validated");
        Ok(())
    }

    /// Boolean form of `validate`. A violation is logged at info level with
    /// its location only; the document body never reaches the log.
    pub fn is_valid(&self, schema: &str, path: Option<&str>) -> bool {
        match self.validate(schema, path) {
            Ok(()) => true,
            Err(DomainError::SchemaInvalid { name, at }) => {
                info!(schema = %name, at = %at, "failed to validate");
                false
            }
            Err(_) => false,
        }
    }

    /// Top-level composition, newest layer wins per key. Used when validating
    /// the knowledge base as a whole.
    pub fn composed(&self) -> Layer {
        let mut out = Map::new();
        for layer in self.layers.iter().rev() {
            for (key, value) in layer {
                out.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        out
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

fn resolve<'a>(layer: &'a Layer, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = layer.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Recursive merge: mappings merge key-wise, everything else is replaced by
/// the newer value.
pub fn deep_merge(dst: &mut Layer, src: Layer) {
    for (key, value) in src {
        match (dst.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                dst.insert(key, value);
            }
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
