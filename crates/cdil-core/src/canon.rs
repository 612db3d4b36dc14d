//! Canonical JSON encoding ("c14n v1").
//!
//! This is the root of trust for every hash and every signature in CDIL:
//! any drift in these rules silently invalidates the entire certificate
//! corpus. The rule set below is frozen — a change here is a new
//! canonicalization version requiring a coordinated migration of every
//! stored signature.
//!
//! Rules:
//! - Supported value space: null, bool, finite number, string, an ordered
//!   sequence, and a mapping with string keys. Anything else is a hard
//!   failure.
//! - No whitespace outside strings.
//! - Mapping keys are emitted in code-point-ascending order (`BTreeMap`'s
//!   `Ord` on `String` compares UTF-8 bytes, which agrees with code-point
//!   order for valid UTF-8).
//! - Sequence order is preserved verbatim.
//! - Integers emit their minimal decimal form.
//! - Finite non-integer numbers emit Rust's shortest round-tripping `f64`
//!   representation, with a trailing `.0` forced when that representation
//!   would otherwise read back as an integer (so `Int` and `Float` never
//!   collide on the wire).

use std::collections::BTreeMap;
use std::fmt::Write as _;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CanonError {
    #[error("non-finite float is not representable in c14n v1")]
    NonFiniteFloat,
    #[error("object keys must be strings; got {0}")]
    NonStringKey(&'static str),
    #[error("unsupported json value: {0}")]
    Unsupported(&'static str),
    #[error("malformed canonical bytes: {0}")]
    Malformed(String),
}

/// The c14n v1 value space: null | bool | int64 | float64 | string | list |
/// map[string].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        if n <= i64::MAX as u64 {
            Value::Int(n as i64)
        } else {
            Value::Float(n as f64)
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        match o {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

/// Ergonomic builder for c14n objects — fields are accepted in any order,
/// `BTreeMap` sorts them on insert.
#[derive(Default)]
pub struct ObjectBuilder(BTreeMap<String, Value>);

impl ObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.0)
    }
}

/// Encode `value` as canonical UTF-8 bytes. Deterministic across runs,
/// processes, and platforms.
pub fn encode(value: &Value) -> Result<Vec<u8>, CanonError> {
    let mut out = String::new();
    write_value(value, &mut out)?;
    Ok(out.into_bytes())
}

fn write_value(value: &Value, out: &mut String) -> Result<(), CanonError> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => {
            write!(out, "{n}").expect("writing to String never fails");
        }
        Value::Float(f) => write_float(*f, out)?,
        Value::Str(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(k, out);
                out.push(':');
                write_value(v, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_float(f: f64, out: &mut String) -> Result<(), CanonError> {
    if !f.is_finite() {
        return Err(CanonError::NonFiniteFloat);
    }
    let mut s = format!("{f}");
    if !s.contains('.') && !s.contains('e') && !s.contains('E') {
        s.push_str(".0");
    }
    out.push_str(&s);
    Ok(())
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                write!(out, "\\u{:04x}", c as u32).expect("writing to String never fails");
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Parse an external `serde_json::Value` into the c14n value space.
/// Rejects non-finite numbers; anything `serde_json` can parse from text
/// is otherwise representable here since JSON object keys are always
/// strings.
pub fn from_serde_json(v: &serde_json::Value) -> Result<Value, CanonError> {
    match v {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::from(u))
            } else {
                let f = n.as_f64().ok_or(CanonError::Unsupported("number"))?;
                if !f.is_finite() {
                    return Err(CanonError::NonFiniteFloat);
                }
                Ok(Value::Float(f))
            }
        }
        serde_json::Value::String(s) => Ok(Value::Str(s.clone())),
        serde_json::Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(from_serde_json(item)?);
            }
            Ok(Value::Array(out))
        }
        serde_json::Value::Object(map) => {
            let mut out = BTreeMap::new();
            for (k, v) in map {
                out.insert(k.clone(), from_serde_json(v)?);
            }
            Ok(Value::Object(out))
        }
    }
}

/// Parse canonical (or any valid JSON) bytes back into the c14n value
/// space, for the `encode(parse(encode(v))) == encode(v)` round-trip law.
pub fn parse(bytes: &[u8]) -> Result<Value, CanonError> {
    let v: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| CanonError::Malformed(e.to_string()))?;
    from_serde_json(&v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_keys_ascending() {
        let v = ObjectBuilder::new().field("b", 2i64).field("a", 1i64).build();
        assert_eq!(encode(&v).unwrap(), b"{\"a\":1,\"b\":2}");
    }

    #[test]
    fn array_order_preserved() {
        let v = Value::from(vec![3i64, 1, 2]);
        assert_eq!(encode(&v).unwrap(), b"[3,1,2]");
    }

    #[test]
    fn no_whitespace() {
        let v = ObjectBuilder::new()
            .field("x", "y")
            .field("n", Value::Null)
            .build();
        let bytes = encode(&v).unwrap();
        assert!(!bytes.contains(&b' '));
    }

    #[test]
    fn rejects_non_finite_float() {
        let v = Value::Float(f64::NAN);
        assert_eq!(encode(&v), Err(CanonError::NonFiniteFloat));
        assert_eq!(encode(&Value::Float(f64::INFINITY)), Err(CanonError::NonFiniteFloat));
    }

    #[test]
    fn unicode_passes_through_as_utf8() {
        let v = Value::Str("héllo \u{1F600}".to_string());
        let bytes = encode(&v).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "\"héllo \u{1F600}\"");
    }

    #[test]
    fn key_order_in_input_does_not_affect_output() {
        let a = ObjectBuilder::new().field("z", 1i64).field("a", 2i64).build();
        let b = ObjectBuilder::new().field("a", 2i64).field("z", 1i64).build();
        assert_eq!(encode(&a).unwrap(), encode(&b).unwrap());
    }

    #[test]
    fn round_trip_through_parse() {
        let v = ObjectBuilder::new()
            .field("s", "hi")
            .field("arr", Value::from(vec![1i64, 2, 3]))
            .field("f", Value::Float(1.5))
            .field("whole_float", Value::Float(2.0))
            .build();
        let bytes = encode(&v).unwrap();
        let reparsed = parse(&bytes).unwrap();
        assert_eq!(encode(&reparsed).unwrap(), bytes);
    }

    #[test]
    fn whole_float_keeps_decimal_point() {
        assert_eq!(encode(&Value::Float(2.0)).unwrap(), b"2.0");
    }
}
