//! Action methods: named functions producing a `{path, value}` commit,
//! right away or asynchronously.

use std::{collections::BTreeMap, rc::Rc, fmt};

use futures_util::{future::LocalBoxFuture, FutureExt};
use kstring::KString;
use serde_json::{Value as JsonValue, json};

use crate::{
    error::{SprinkleError, EvaluationError, NetworkError, json_type_name},
    store::Store,
    http::{Transport, HttpRequest, HttpMethod, with_query},
    expr::Value,
};

/// What a method asks to be committed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub path: String,
    pub value: JsonValue,
}

impl ActionResult {
    pub fn new(path: impl Into<String>, value: JsonValue) -> Self {
        ActionResult { path: path.into(), value }
    }

    /// The `{path, value}` object seen by expressions calling a
    /// method.
    pub fn to_json(&self) -> JsonValue {
        json!({ "path": self.path, "value": self.value })
    }
}

pub type PendingResult = LocalBoxFuture<'static, Result<Option<ActionResult>, SprinkleError>>;

pub enum Outcome {
    /// `None` means there is nothing to commit.
    Ready(Option<ActionResult>),
    Pending(PendingResult),
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ready(r) => f.debug_tuple("Ready").field(r).finish(),
            Outcome::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

pub type Method = Rc<dyn Fn(Vec<JsonValue>) -> Result<Outcome, SprinkleError>>;

#[derive(Clone, Default)]
pub struct MethodRegistry {
    methods: BTreeMap<KString, Method>,
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.methods.keys()).finish()
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        name: &str,
        method: impl Fn(Vec<JsonValue>) -> Result<Outcome, SprinkleError> + 'static
    ) {
        self.methods.insert(KString::from_ref(name), Rc::new(method));
    }

    /// Builder style `insert`.
    pub fn with(
        mut self,
        name: &str,
        method: impl Fn(Vec<JsonValue>) -> Result<Outcome, SprinkleError> + 'static
    ) -> Self {
        self.insert(name, method);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(|k| k.as_str())
    }

    /// Entries in `overrides` replace same-named ones whole.
    pub fn merge(mut self, overrides: MethodRegistry) -> Self {
        self.methods.extend(overrides.methods);
        self
    }

    /// `get`, `post`, `put`, `set` and `toggle`.
    pub fn defaults(store: Rc<dyn Store>, transport: Rc<dyn Transport>) -> Self {
        let mut registry = MethodRegistry::new();
        for method in [HttpMethod::Get, HttpMethod::Post, HttpMethod::Put] {
            let transport = transport.clone();
            registry.insert(&method.as_str().to_lowercase(),
                            move |args| http_method(method, &*transport, args));
        }
        registry.insert("set", set);
        registry.insert("toggle", move |args| toggle(&*store, args));
        registry
    }
}

fn failed(name: &str, message: String) -> SprinkleError {
    EvaluationError::MethodFailed { name: name.into(), message }.into()
}

fn path_argument(name: &str, args: &[JsonValue]) -> Result<String, SprinkleError> {
    match args.first() {
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(other) => Err(failed(name, format!("expected a path string, got {}",
                                                json_type_name(other)))),
        None => Err(failed(name, "missing path argument".into())),
    }
}

/// `set(path, value)`: commit `value` at `path`.
fn set(args: Vec<JsonValue>) -> Result<Outcome, SprinkleError> {
    let path = path_argument("set", &args)?;
    let value = args.into_iter().nth(1).unwrap_or(JsonValue::Null);
    Ok(Outcome::Ready(Some(ActionResult { path, value })))
}

/// `toggle(path)`: commit the negation of the current value.
fn toggle(store: &dyn Store, args: Vec<JsonValue>) -> Result<Outcome, SprinkleError> {
    let path = path_argument("toggle", &args)?;
    let current = store.retrieve(&path).map_or(Value::Undefined, Value::Json);
    Ok(Outcome::Ready(Some(ActionResult {
        path,
        value: JsonValue::Bool(! current.is_truthy()),
    })))
}

/// `get(location, params)`, `post(location, params)`,
/// `put(location, params)`: the response is committed at `location`.
fn http_method(
    method: HttpMethod,
    transport: &dyn Transport,
    args: Vec<JsonValue>
) -> Result<Outcome, SprinkleError> {
    let mut args = args.into_iter();
    let location = match args.next() {
        Some(JsonValue::String(s)) => s,
        other => return Err(NetworkError::Arguments {
            method: method.as_str(),
            location: other.map(|v| v.to_string()).unwrap_or_default(),
            message: "expected a location string".into(),
        }.into())
    };
    let params = args.next().unwrap_or(JsonValue::Null);
    let request = match method {
        HttpMethod::Get => HttpRequest {
            method,
            url: with_query(&location, &params)?,
            body: None,
        },
        HttpMethod::Post | HttpMethod::Put => HttpRequest {
            method,
            url: location.clone(),
            body: Some(if params.is_null() { json!({}) } else { params }),
        },
    };
    let response = transport.send(request);
    Ok(Outcome::Pending(async move {
        let value = response.await?;
        Ok::<_, SprinkleError>(Some(ActionResult { path: location, value }))
    }.boxed_local()))
}
