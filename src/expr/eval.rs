//! Evaluation of parsed expressions against a `Scope`.

use std::rc::Rc;

use kstring::KString;
use serde_json::{Value as JsonValue, Map};

use crate::{error::EvaluationError, methods::{MethodRegistry, Outcome}};
use super::{parser::{Expr, UnaryOp, BinaryOp, LogicalOp}, value::Value};

/// The bindings visible to an expression. Nothing else is reachable.
#[derive(Clone, Copy, Default)]
pub struct Scope<'s> {
    /// `$state` and `it`; undefined if `None`.
    pub state: Option<&'s JsonValue>,
    /// `$item`, only bound inside iteration output.
    pub item: Option<&'s JsonValue>,
    /// `$event`, only bound when dispatching an action.
    pub event: Option<&'s JsonValue>,
    /// `$methods`.
    pub methods: Option<&'s Rc<MethodRegistry>>,
    /// Whether method names are bound bare, as in action calls.
    pub bare_methods: bool,
}

impl<'s> Scope<'s> {
    pub fn new(state: Option<&'s JsonValue>) -> Self {
        Scope { state, ..Default::default() }
    }

    pub fn with_item(self, item: &'s JsonValue) -> Self {
        Scope { item: Some(item), ..self }
    }

    pub fn with_event(self, event: &'s JsonValue) -> Self {
        Scope { event: Some(event), ..self }
    }

    pub fn with_methods(self, methods: &'s Rc<MethodRegistry>) -> Self {
        Scope { methods: Some(methods), ..self }
    }

    pub fn with_bare_methods(self) -> Self {
        Scope { bare_methods: true, ..self }
    }

    pub fn lookup(&self, name: &str) -> Result<Value, EvaluationError> {
        let json = |v: Option<&JsonValue>| v.cloned().map_or(Value::Undefined, Value::Json);
        match name {
            "$state" | "it" => return Ok(json(self.state)),
            "$item" if self.item.is_some() => return Ok(json(self.item)),
            "$event" if self.event.is_some() => return Ok(json(self.event)),
            "$methods" => if let Some(m) = self.methods {
                return Ok(Value::Methods(m.clone()))
            },
            _ => if self.bare_methods {
                if let Some(m) = self.methods.and_then(|ms| ms.get(name)) {
                    return Ok(Value::Method(KString::from_ref(name), m.clone()))
                }
            }
        }
        Err(EvaluationError::Unbound(name.into()))
    }
}

fn describe(e: &Expr) -> String {
    match e {
        Expr::Identifier(name) => name.to_string(),
        Expr::Member(base, name) => format!("{}.{name}", describe(base)),
        _ => "expression".into()
    }
}

fn property(base: &Value, key: &str) -> Result<Value, EvaluationError> {
    base.get_property(key).ok_or_else(|| EvaluationError::PropertyOfNothing {
        property: key.into(),
        base: if matches!(base, Value::Undefined) { "undefined" } else { "null" },
    })
}

fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Value {
    let (x, y) = (a.to_number(), b.to_number());
    Value::number(match op {
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        BinaryOp::Rem => x % y,
        _ => unreachable!("not an arithmetic operator: {op:?}")
    })
}

fn compare(op: BinaryOp, a: &Value, b: &Value) -> bool {
    if let (Value::Json(JsonValue::String(x)), Value::Json(JsonValue::String(y))) = (a, b) {
        return match op {
            BinaryOp::Lt => x < y,
            BinaryOp::Le => x <= y,
            BinaryOp::Gt => x > y,
            _ => x >= y,
        }
    }
    let (x, y) = (a.to_number(), b.to_number());
    // false for NaN on either side
    match op {
        BinaryOp::Lt => x < y,
        BinaryOp::Le => x <= y,
        BinaryOp::Gt => x > y,
        _ => x >= y,
    }
}

fn binary(op: BinaryOp, a: Value, b: Value) -> Value {
    let boolean = |x: bool| Value::Json(JsonValue::Bool(x));
    match op {
        BinaryOp::Add => {
            let is_stringy = |v: &Value| matches!(
                v,
                Value::Json(JsonValue::String(_) | JsonValue::Array(_) | JsonValue::Object(_)));
            if is_stringy(&a) || is_stringy(&b) {
                let mut s = a.concat_string();
                s.push_str(&b.concat_string());
                Value::string(s)
            } else {
                Value::number(a.to_number() + b.to_number())
            }
        }
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem =>
            arithmetic(op, &a, &b),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge =>
            boolean(compare(op, &a, &b)),
        BinaryOp::StrictEq => boolean(a == b),
        BinaryOp::StrictNe => boolean(a != b),
        BinaryOp::LooseEq => boolean(a.loose_eq(&b)),
        BinaryOp::LooseNe => boolean(! a.loose_eq(&b)),
    }
}

pub fn eval(e: &Expr, scope: &Scope) -> Result<Value, EvaluationError> {
    Ok(match e {
        Expr::Undefined => Value::Undefined,
        Expr::Literal(v) => Value::Json(v.clone()),
        Expr::Identifier(name) => scope.lookup(name)?,
        Expr::Array(items) => Value::Json(JsonValue::Array(
            items.iter()
                .map(|item| eval(item, scope)?.to_json())
                .collect::<Result<_, _>>()?)),
        Expr::Object(entries) => {
            let mut map = Map::new();
            for (k, v) in entries {
                let v = eval(v, scope)?;
                // like JSON serialization, undefined members are left out
                if ! matches!(v, Value::Undefined) {
                    map.insert(k.to_string(), v.to_json()?);
                }
            }
            Value::Json(JsonValue::Object(map))
        }
        Expr::Member(base, name) => property(&eval(base, scope)?, name)?,
        Expr::Index(base, index) => {
            let b = eval(base, scope)?;
            let key = eval(index, scope)?.property_key();
            property(&b, &key)?
        }
        Expr::Call(callee, args) => {
            let (name, method) = match eval(callee, scope)? {
                Value::Method(name, method) => (name, method),
                _ => return Err(EvaluationError::NotCallable(describe(callee)))
            };
            let args = args.iter()
                .map(|a| eval(a, scope)?.to_json())
                .collect::<Result<Vec<_>, _>>()?;
            match method(args) {
                Ok(Outcome::Ready(Some(result))) => Value::Json(result.to_json()),
                Ok(Outcome::Ready(None)) => Value::Undefined,
                Ok(Outcome::Pending(_)) => return Err(EvaluationError::Asynchronous(name.to_string())),
                Err(e) => return Err(EvaluationError::MethodFailed {
                    name: name.to_string(),
                    message: e.to_string()
                })
            }
        }
        Expr::Unary(op, operand) => {
            let v = eval(operand, scope)?;
            match op {
                UnaryOp::Not => Value::Json(JsonValue::Bool(! v.is_truthy())),
                UnaryOp::Negate => Value::number(- v.to_number()),
                UnaryOp::Plus => Value::number(v.to_number()),
            }
        }
        Expr::Binary(op, a, b) => binary(*op, eval(a, scope)?, eval(b, scope)?),
        Expr::Logical(op, a, b) => {
            let left = eval(a, scope)?;
            let take_left = match op {
                LogicalOp::And => ! left.is_truthy(),
                LogicalOp::Or => left.is_truthy(),
                LogicalOp::Nullish => ! left.is_nullish(),
            };
            if take_left { left } else { eval(b, scope)? }
        }
        Expr::Conditional(test, then, otherwise) =>
            if eval(test, scope)?.is_truthy() {
                eval(then, scope)?
            } else {
                eval(otherwise, scope)?
            },
    })
}
