//! Convenience helpers for reading untrusted `serde_json` trees.

use serde_json::{Map, Value};

/// Lightweight view over a JSON object.
///
/// `null` fields are treated the same as missing ones.
#[derive(Debug, Clone, Copy)]
pub struct ObjectView<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> ObjectView<'a> {
    /// Access a non-null field.
    pub fn field(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|value| !value.is_null())
    }

    /// Interpret the field as a string.
    pub fn field_str(&self, key: &str) -> Option<&'a str> {
        self.field(key)?.as_str()
    }

    /// Interpret the field as a number, see [`coerce_number`].
    pub fn field_number(&self, key: &str) -> Option<f64> {
        coerce_number(self.field(key)?)
    }
}

/// Attempt to treat a JSON value as an object.
pub fn as_object(value: &Value) -> Option<ObjectView<'_>> {
    value.as_object().map(|map| ObjectView { map })
}

/// Numeric reading that accepts numbers, numeric strings and booleans.
///
/// Non-finite results are rejected.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(num) => num.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Parse `text` as JSON, falling back to the outermost `{...}` span.
///
/// Language models like to wrap their answer in prose or code fences.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}
