//! The key-path state store: a tree of JSON values addressed by
//! `/`-separated paths, with change subscriptions.

use std::{cell::RefCell, rc::Rc};

use itertools::Itertools;
use serde_json::{Value as JsonValue, Map};
use kstring::KString;

use chj_util::{slice::{first_and_rest, is_prefix_related}, nodt as dt};

use crate::error::{StoreError, json_type_name};

/// Called with the path that was committed to.
pub type StoreListener = Rc<dyn Fn(&str)>;

pub trait Store {
    /// The value at `path`, `None` if there is nothing there.
    fn retrieve(&self, path: &str) -> Option<JsonValue>;

    /// Set the value at `path` and synchronously notify the listeners
    /// of that path, its ancestors and its descendants.
    fn commit(&self, path: &str, value: JsonValue) -> Result<(), StoreError>;

    fn subscribe(&self, path: &str, listener: StoreListener);
}

fn split_path(path: &str) -> Vec<KString> {
    path.split('/')
        .filter(|s| ! s.is_empty())
        .map(KString::from_ref)
        .collect()
}

fn lookup<'v>(v: &'v JsonValue, keys: &[KString]) -> Option<&'v JsonValue> {
    match first_and_rest(keys) {
        None => Some(v),
        Some((key, rest)) => lookup(v.as_object()?.get(key.as_str())?, rest)
    }
}

/// Store `value` at `keys` below `v`, creating objects on the way
/// where nothing (or null) is. `done` are the keys already walked, for
/// the error message.
fn store(
    v: &mut JsonValue,
    keys: &[KString],
    done: usize,
    path: &str,
    value: JsonValue
) -> Result<(), StoreError> {
    match first_and_rest(keys) {
        None => {
            *v = value;
            Ok(())
        }
        Some((key, rest)) => {
            if v.is_null() {
                *v = JsonValue::Object(Map::new());
            }
            match v {
                JsonValue::Object(map) => {
                    let entry = map.entry(key.as_str()).or_insert(JsonValue::Null);
                    store(entry, rest, done + 1, path, value)
                }
                other => Err(StoreError::NotAnObject {
                    path: path.into(),
                    at: split_path(path)[..done].iter().map(|k| k.as_str()).join("/"),
                    found: json_type_name(other),
                })
            }
        }
    }
}

pub struct PathStore {
    state: RefCell<JsonValue>,
    listeners: RefCell<Vec<(Vec<KString>, StoreListener)>>,
}

impl Default for PathStore {
    fn default() -> Self {
        PathStore::new(JsonValue::Object(Map::new()))
    }
}

impl PathStore {
    pub fn new(initial: JsonValue) -> Self {
        PathStore {
            state: RefCell::new(initial),
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// A copy of the whole state tree.
    pub fn snapshot(&self) -> JsonValue {
        self.state.borrow().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl Store for PathStore {
    fn retrieve(&self, path: &str) -> Option<JsonValue> {
        let state = self.state.borrow();
        lookup(&state, &split_path(path)).cloned()
    }

    fn commit(&self, path: &str, value: JsonValue) -> Result<(), StoreError> {
        let keys = split_path(path);
        store(&mut self.state.borrow_mut(), &keys, 0, path, value)?;
        // Snapshot, so that listeners may commit or subscribe in turn.
        let affected: Vec<StoreListener> = self.listeners.borrow().iter()
            .filter(|(p, _)| is_prefix_related(p, &keys))
            .map(|(_, l)| l.clone())
            .collect();
        dt!("commit {:?}: notifying {} listener(s)", path, affected.len());
        for listener in affected {
            listener(path);
        }
        Ok(())
    }

    fn subscribe(&self, path: &str, listener: StoreListener) {
        self.listeners.borrow_mut().push((split_path(path), listener));
    }
}
