//! Declarative view binding for HTML documents: templates rendered
//! from a key-path state store, re-rendered on every change to their
//! namespace, with actions and form input feeding back into the store.

pub mod boxed_error;
pub mod error;
pub mod store;
pub mod expr;
pub mod config;
pub mod directive;
pub mod http;
pub mod methods;
pub mod event_loop;
pub mod discovery;
pub mod template;
pub mod action;
pub mod form;
pub mod bootstrap;

pub use bootstrap::{start, Sprinkle};
pub use config::{Options, Settings};
pub use error::{SprinkleError, SprinkleErrorKind};
pub use methods::{ActionResult, MethodRegistry, Outcome};
pub use store::{PathStore, Store};
