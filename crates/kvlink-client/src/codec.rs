//! JSON encoding of stored values.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{KvError, KvResult};

/// Serialize `value` to the raw text stored remotely.
pub fn encode<V: Serialize + ?Sized>(key: &str, value: &V) -> KvResult<String> {
    serde_json::to_string(value).map_err(|source| KvError::Serialize {
        key: key.to_string(),
        source,
    })
}

/// Parse a raw value. Absent and empty raw values decode to `None`.
pub fn decode<T: DeserializeOwned>(key: &str, raw: Option<&str>) -> KvResult<Option<T>> {
    match raw {
        None | Some("") => Ok(None),
        Some(text) => serde_json::from_str(text)
            .map(Some)
            .map_err(|source| KvError::Parse {
                key: key.to_string(),
                source,
            }),
    }
}

/// JavaScript-style truthiness: `null`, `false`, `0` and `""` are falsy,
/// everything else (including empty arrays and objects) is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
