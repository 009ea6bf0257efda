//! Records: the decoded `data` payload of one live event.
//!
//! Wire values are reduced once, here, into a closed [`Scalar`] set so that
//! classification downstream never inspects raw JSON again.

use crate::error::DecodeError;
use crate::session_log::render_scalar;
use indexmap::IndexMap;
use serde_json::Value;

/// The routable form of a field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Any JSON number, or a sequence whose first element is a number.
    Number(f64),
    /// Everything else, in its string form.
    Text(String),
}

impl Scalar {
    pub fn is_number(&self) -> bool {
        matches!(self, Scalar::Number(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(_) => None,
        }
    }

    /// String form used when pushing onto a string stream.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }
}

/// One field of a record: the wire value (kept for the session log) and its
/// reduced scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValue {
    raw: Value,
    scalar: Scalar,
}

impl FieldValue {
    pub fn from_json(raw: Value) -> Self {
        let scalar = match &raw {
            // single-element sequences are reduced to their first element
            Value::Array(items) => match items.first() {
                Some(first) => scalar_of(first),
                None => Scalar::Text(render_scalar(&raw)),
            },
            other => scalar_of(other),
        };
        Self { raw, scalar }
    }

    /// The value exactly as it arrived on the wire.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn scalar(&self) -> &Scalar {
        &self.scalar
    }
}

fn scalar_of(value: &Value) -> Scalar {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) => Scalar::Number(f),
            None => Scalar::Text(n.to_string()),
        },
        Value::String(s) => Scalar::Text(s.clone()),
        other => Scalar::Text(render_scalar(other)),
    }
}

/// A decoded record: field name → value, in wire order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, FieldValue>,
}

impl Record {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Fields in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Wire values in field order, as written to the session log.
    pub fn raw_values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values().map(FieldValue::raw)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k, FieldValue::from_json(v)))
                .collect(),
        }
    }
}

/// Decode one framed text into a [`Record`].
///
/// The text must be a JSON object whose `data` member is a non-empty object;
/// every other top-level member is ignored.
pub fn decode_record(text: &str) -> Result<Record, DecodeError> {
    let item: Value = serde_json::from_str(text)?;
    let data = match item {
        Value::Object(mut top) => top.remove("data"),
        _ => None,
    };

    match data {
        Some(Value::Object(map)) if !map.is_empty() => Ok(map.into_iter().collect()),
        Some(other) if !is_empty_value(&other) => Err(DecodeError::NotAnObject {
            found: json_kind(&other),
        }),
        _ => Err(DecodeError::EmptyPayload),
    }
}

/// Values that count as "no data": null, false, 0, "", [] and {}.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_data_in_wire_order() {
        let rec = decode_record(r#"{"type":"live_event","data":{"y":2,"x":1,"time":3}}"#).unwrap();
        let names: Vec<_> = rec.field_names().collect();
        assert_eq!(names, vec!["y", "x", "time"]);
        assert_eq!(rec.get("x").unwrap().scalar(), &Scalar::Number(1.0));
    }

    #[test]
    fn single_element_sequence_is_reduced() {
        let rec = decode_record(r#"{"data":{"a":[4.5],"b":["blink"],"c":[]}}"#).unwrap();
        assert_eq!(rec.get("a").unwrap().scalar(), &Scalar::Number(4.5));
        assert_eq!(rec.get("b").unwrap().scalar(), &Scalar::Text("blink".into()));
        assert_eq!(rec.get("c").unwrap().scalar(), &Scalar::Text("[]".into()));
        // the raw value is kept for the log
        assert_eq!(rec.get("a").unwrap().raw(), &json!([4.5]));
    }

    #[test]
    fn non_string_scalars_become_text() {
        let rec = decode_record(r#"{"data":{"ok":true,"none":null,"obj":{"k":1}}}"#).unwrap();
        assert_eq!(rec.get("ok").unwrap().scalar(), &Scalar::Text("True".into()));
        assert_eq!(rec.get("none").unwrap().scalar(), &Scalar::Text("None".into()));
        assert_eq!(rec.get("obj").unwrap().scalar(), &Scalar::Text("{'k': 1}".into()));
    }

    #[test]
    fn string_channel_text_matches_log_rendering() {
        let rec = decode_record(r#"{"data":{"ok":true,"n":null,"seq":["a","b"]}}"#).unwrap();
        let texts: Vec<String> = rec.iter().map(|(_, v)| v.scalar().to_text()).collect();
        assert_eq!(texts, ["True", "None", "a"]);
        assert_eq!(
            crate::session_log::render_values(rec.raw_values()),
            "[True, None, ['a', 'b']]"
        );
    }

    #[test]
    fn invalid_json_is_decode_error() {
        let err = decode_record(r#"{"data":{"x":1"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson(_)));
    }

    #[test]
    fn missing_or_empty_data_is_empty_payload() {
        for text in [
            r#"{"type":"live_event"}"#,
            r#"{"data":{}}"#,
            r#"{"data":null}"#,
            r#"{"data":""}"#,
            r#"[1,2]"#,
        ] {
            let err = decode_record(text).unwrap_err();
            assert!(err.is_silent(), "{text} should be silent, got {err}");
        }
    }

    #[test]
    fn non_object_data_is_rejected() {
        let err = decode_record(r#"{"data":[1,2]}"#).unwrap_err();
        assert!(matches!(err, DecodeError::NotAnObject { found: "array" }));
    }
}
