//! Runtime values of the expression language and their coercions.

use std::{fmt, rc::Rc};

use kstring::KString;
use serde_json::Value as JsonValue;

use crate::{error::EvaluationError, methods::{Method, MethodRegistry}};
use super::parser::json_number;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Json(JsonValue),
    /// NaN and the infinities, which JSON can't hold.
    NonFinite(f64),
    Method(KString, Method),
    Methods(Rc<MethodRegistry>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Json(v) => write!(f, "{v}"),
            Value::NonFinite(n) => write!(f, "{n}"),
            Value::Method(name, _) => write!(f, "<method {name}>"),
            Value::Methods(_) => f.write_str("<methods>"),
        }
    }
}

impl PartialEq for Value {
    /// Strict equality (`===`), except that arrays and objects are
    /// compared by content.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Json(JsonValue::Number(a)), Value::Json(JsonValue::Number(b))) =>
                a.as_f64() == b.as_f64(),
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::NonFinite(a), Value::NonFinite(b)) => a == b,
            (Value::Method(a, ma), Value::Method(b, mb)) => a == b && Rc::ptr_eq(ma, mb),
            (Value::Methods(a), Value::Methods(b)) => Rc::ptr_eq(a, b),
            _ => false
        }
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Value::Json(v)
    }
}

impl Value {
    pub fn number(f: f64) -> Self {
        match json_number(f) {
            Some(v) => Value::Json(v),
            None => Value::NonFinite(f)
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Json(JsonValue::String(s.into()))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Json(JsonValue::Null))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Json(v) => crate::error::json_type_name(v),
            Value::NonFinite(_) => "a number",
            Value::Method(..) => "a method",
            Value::Methods(_) => "the method registry",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Json(v) => match v {
                JsonValue::Null => false,
                JsonValue::Bool(b) => *b,
                JsonValue::Number(n) => n.as_f64().map_or(false, |f| f != 0.),
                JsonValue::String(s) => ! s.is_empty(),
                JsonValue::Array(_) | JsonValue::Object(_) => true,
            },
            Value::NonFinite(f) => ! f.is_nan(),
            Value::Method(..) | Value::Methods(_) => true,
        }
    }

    /// Numeric coercion.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Json(v) => match v {
                JsonValue::Null => 0.,
                JsonValue::Bool(b) => if *b { 1. } else { 0. },
                JsonValue::Number(n) => n.as_f64().unwrap_or(f64::NAN),
                JsonValue::String(s) => {
                    let s = s.trim();
                    if s.is_empty() {
                        0.
                    } else {
                        s.parse().unwrap_or(f64::NAN)
                    }
                }
                JsonValue::Array(_) | JsonValue::Object(_) => f64::NAN,
            },
            Value::NonFinite(f) => *f,
            Value::Method(..) | Value::Methods(_) => f64::NAN,
        }
    }

    /// The text an interpolation renders: nothing for undefined and
    /// null, compact JSON for arrays and objects.
    pub fn render(&self) -> String {
        match self {
            Value::Undefined | Value::Json(JsonValue::Null) => String::new(),
            _ => self.concat_string()
        }
    }

    /// String coercion as used by `+`.
    pub fn concat_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Json(JsonValue::String(s)) => s.clone(),
            Value::Json(v) => v.to_string(),
            Value::NonFinite(f) =>
                if f.is_nan() { "NaN".into() }
                else if *f > 0. { "Infinity".into() }
                else { "-Infinity".into() },
            Value::Method(name, _) => format!("[method {name}]"),
            Value::Methods(_) => "[methods]".into(),
        }
    }

    /// Conversion for passing to methods. Like JSON serialization,
    /// undefined and non-finite numbers become null.
    pub fn to_json(&self) -> Result<JsonValue, EvaluationError> {
        match self {
            Value::Undefined | Value::NonFinite(_) => Ok(JsonValue::Null),
            Value::Json(v) => Ok(v.clone()),
            Value::Method(..) | Value::Methods(_) =>
                Err(EvaluationError::NotJson(self.type_name())),
        }
    }

    /// The key used for `base[key]`.
    pub fn property_key(&self) -> String {
        match self {
            Value::Json(JsonValue::String(s)) => s.clone(),
            _ => self.concat_string()
        }
    }

    /// `base.key`; `None` if the base is undefined or null.
    pub fn get_property(&self, key: &str) -> Option<Value> {
        let utf16_len = |s: &str| s.encode_utf16().count();
        Some(match self {
            Value::Undefined | Value::Json(JsonValue::Null) => return None,
            Value::Json(JsonValue::Object(map)) =>
                map.get(key).cloned().map_or(Value::Undefined, Value::Json),
            Value::Json(JsonValue::Array(items)) =>
                if key == "length" {
                    Value::number(items.len() as f64)
                } else {
                    key.parse::<usize>().ok()
                        .and_then(|i| items.get(i))
                        .cloned()
                        .map_or(Value::Undefined, Value::Json)
                },
            Value::Json(JsonValue::String(s)) =>
                if key == "length" {
                    Value::number(utf16_len(s) as f64)
                } else {
                    key.parse::<usize>().ok()
                        .and_then(|i| s.chars().nth(i))
                        .map_or(Value::Undefined, |c| Value::string(c))
                },
            Value::Methods(registry) => match registry.get(key) {
                Some(m) => Value::Method(KString::from_ref(key), m.clone()),
                None => Value::Undefined
            },
            _ => Value::Undefined
        })
    }

    /// `==`
    pub fn loose_eq(&self, other: &Value) -> bool {
        use JsonValue::*;
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Json(String(_)), Value::Json(Number(_)))
                | (Value::Json(Number(_)), Value::Json(String(_)))
                | (Value::Json(Bool(_)), _)
                | (_, Value::Json(Bool(_)))
                | (Value::NonFinite(_), _)
                | (_, Value::NonFinite(_)) =>
                self.to_number() == other.to_number(),
            _ => self == other
        }
    }
}
