//! KBase booleans travel as `0`/`1` as often as `true`/`false`.
//!
//! Use with `#[serde(deserialize_with = "flag::deserialize")]`, or
//! `flag::optional` for `Option<bool>` fields.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    truthy(&value).map_err(serde::de::Error::custom)
}

pub fn optional<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => truthy(&v).map(Some).map_err(serde::de::Error::custom),
    }
}

fn truthy(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::Null => Ok(false),
        other => Err(format!("expected a boolean or 0/1, got {}", other)),
    }
}
