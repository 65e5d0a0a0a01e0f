//! Error taxonomy. Each component has its own error type; they all
//! convert into `SprinkleError` so `?` works across component
//! boundaries.

use kstring::KString;

use crate::def_boxed_thiserror;

/// Fatal for the one template, element or setting affected, found at
/// bind time.
#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("template {id:?}: initial state is not valid JSON: {source}")]
    InitialState { id: KString, source: serde_json::Error },
    #[error("template {id:?}: initial state can't be committed: {source}")]
    InitialCommit { id: KString, source: StoreError },
    #[error("element <{tag}> has an empty {attribute} attribute")]
    EmptyAttribute { tag: KString, attribute: String },
    #[error("action spec {spec:?}: missing ':' between trigger and method call")]
    MissingSeparator { spec: String },
    #[error("action spec {spec:?}: empty trigger event name")]
    EmptyTrigger { spec: String },
    #[error("action spec {spec:?}: expected a call of a method by name, like `set('a', 1)`")]
    NotAMethodCall { spec: String },
    #[error("action spec {spec:?}: {source}")]
    InvalidCall { spec: String, source: EvaluationError },
    #[error("action spec {spec:?}: unknown method {method:?}")]
    UnknownMethod { spec: String, method: String },
    #[error("the {0} interpolation delimiter must not be empty")]
    EmptyDelimiter(&'static str),
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Scoped to one render pass or one action dispatch.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("syntax error in {source_text:?} at offset {position}: {message}")]
    Syntax { source_text: String, position: usize, message: String },
    #[error("unbound identifier `{0}`")]
    Unbound(String),
    #[error("can't read property {property:?} of {base}")]
    PropertyOfNothing { property: String, base: &'static str },
    #[error("{0} is not a method")]
    NotCallable(String),
    #[error("method {0:?} is asynchronous, it can't be used while rendering")]
    Asynchronous(String),
    #[error("method {name:?} failed: {message}")]
    MethodFailed { name: String, message: String },
    #[error("iteration over {expression:?}: expected an array, got {found}")]
    NotAnArray { expression: String, found: &'static str },
    #[error("value can't be represented as JSON: {0}")]
    NotJson(&'static str),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("{method} {url}: request failed: {message}")]
    Request { method: &'static str, url: String, message: String },
    #[error("{method} {url}: HTTP status {status}")]
    Status { method: &'static str, url: String, status: u16 },
    #[error("{method} {url}: response is not JSON: {message}")]
    Decode { method: &'static str, url: String, message: String },
    #[error("{method} {location:?}: {message}")]
    Arguments { method: &'static str, location: String, message: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("form field {field:?}: namespace {namespace:?} holds {found}, not an object")]
    NotAnObject { namespace: String, field: String, found: &'static str },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("commit to {path:?}: {at:?} holds {found}, not an object")]
    NotAnObject { path: String, at: String, found: &'static str },
}

def_boxed_thiserror!(SprinkleError, pub enum SprinkleErrorKind {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("network error: {0}")]
    Network(#[from] NetworkError),
    #[error("merge error: {0}")]
    Merge(#[from] MergeError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("document error: {0}")]
    Dom(#[from] anyhow::Error),
});

/// The JSON type name used in error messages.
pub fn json_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
