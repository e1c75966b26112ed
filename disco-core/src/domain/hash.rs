// disco-core/src/domain/hash.rs
//
// Change detection for discovered state. The discoverer keeps one digest per
// source and only injects into the knowledge base when the digest moves.

use serde_json::Value;
use sha2::{Digest, Sha256};

pub type StateHash = [u8; 32];

/// Digest of a JSON value, stable across runs and across key ordering.
/// Mappings hash by sorted key, sequences in order, scalars by value.
pub fn state_hash(value: &Value) -> StateHash {
    let mut hasher = Sha256::new();
    hash_value(&mut hasher, value);
    hasher.finalize().into()
}

fn hash_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update([0u8]),
        Value::Bool(b) => {
            hasher.update([1u8]);
            hasher.update([u8::from(*b)]);
        }
        Value::Number(n) => {
            hasher.update([2u8]);
            // serde_json renders numbers canonically (1 vs 1.0 stay distinct)
            hash_bytes(hasher, n.to_string().as_bytes());
        }
        Value::String(s) => {
            hasher.update([3u8]);
            hash_bytes(hasher, s.as_bytes());
        }
        Value::Array(items) => {
            hasher.update([4u8]);
            hasher.update((items.len() as u64).to_be_bytes());
            for item in items {
                hash_value(hasher, item);
            }
        }
        Value::Object(map) => {
            hasher.update([5u8]);
            hasher.update((map.len() as u64).to_be_bytes());
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                hash_bytes(hasher, key.as_bytes());
                if let Some(v) = map.get(key) {
                    hash_value(hasher, v);
                }
            }
        }
    }
}

// Length prefix keeps adjacent strings from colliding ("ab"+"c" vs "a"+"bc")
fn hash_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}
