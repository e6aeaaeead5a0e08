//! Firestore typed values
//!
//! The REST API wraps every field in a one-key object naming its type
//! (`{"integerValue": "1815"}`, `{"stringValue": "Ada"}`, ...). Command-line
//! values are plain strings, so [`encode`] infers the narrowest type and
//! [`decode`] flattens stored values back into ordinary JSON.

use super::Snapshot;
use crate::error::BackendError;
use serde_json::{json, Map, Value};

/// Encode a command-line string as a Firestore value
///
/// Inference order: integer, double, boolean, null, string. A number is only
/// inferred when it renders back to exactly the input, so `01234`, `+5` or
/// integers past `i64` stay strings. Quote a value (`'"1815"'`) to force a
/// string.
pub fn encode(raw: &str) -> Value {
    if let Some(quoted) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return json!({ "stringValue": quoted });
    }
    if let Some(int) = raw.parse::<i64>().ok().filter(|i| i.to_string() == raw) {
        // int64 travels as a decimal string
        return json!({ "integerValue": int.to_string() });
    }
    if let Some(double) = raw.parse::<f64>().ok().map(Value::from) {
        // Value::from maps non-finite doubles to null
        if double.is_number() && double.to_string() == raw {
            return json!({ "doubleValue": double });
        }
    }
    match raw {
        "true" => json!({ "booleanValue": true }),
        "false" => json!({ "booleanValue": false }),
        "null" => json!({ "nullValue": null }),
        _ => json!({ "stringValue": raw }),
    }
}

/// Encode named fields as a Firestore `fields` map
pub fn encode_fields<'a>(
    fields: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(name, raw)| (name.to_string(), encode(raw)))
        .collect()
}

/// Flatten a Firestore value into plain JSON
pub fn decode(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| inner.clone()),
            other => other.clone(),
        },
        "mapValue" => Value::Object(decode_fields(inner.get("fields"))),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(|v| v.as_array())
                .map(|values| values.iter().map(decode).collect())
                .unwrap_or_default(),
        ),
        "nullValue" => Value::Null,
        // doubleValue, booleanValue, stringValue, timestampValue,
        // referenceValue, bytesValue, geoPointValue
        _ => inner.clone(),
    }
}

/// Flatten a Firestore `fields` map
pub fn decode_fields(fields: Option<&Value>) -> Map<String, Value> {
    fields
        .and_then(|f| f.as_object())
        .map(|map| {
            map.iter()
                .map(|(name, value)| (name.clone(), decode(value)))
                .collect()
        })
        .unwrap_or_default()
}

/// Snapshot of a Firestore document resource
///
/// The id is the last segment of the document's `name`
/// (`projects/p/databases/(default)/documents/users/<id>`).
pub fn decode_document(document: &Value) -> Result<Snapshot, BackendError> {
    let name = document
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BackendError::malformed("document without a name"))?;
    let id = name.rsplit('/').next().unwrap_or(name);
    let id = urlencoding::decode(id)
        .map(|id| id.into_owned())
        .unwrap_or_else(|_| id.to_string());

    Ok(Snapshot::new(id, decode_fields(document.get("fields"))))
}

/// Quote a field name for use in a field path (`updateMask.fieldPaths`)
///
/// Simple names pass through; anything else is wrapped in backticks with
/// backticks and backslashes escaped.
pub fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}
