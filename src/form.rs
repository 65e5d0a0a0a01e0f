//! Binding forms: input into a named field is merged into the object
//! at the form's namespace.

use std::rc::{Rc, Weak};

use adom::{Document, Event};
use serde_json::{Map, Value as JsonValue};

use chj_util::nodt as dt;

use crate::{
    discovery::FormBinding,
    error::{MergeError, SprinkleError, json_type_name},
    event_loop::FailureLog,
    store::Store,
};

/// Set `field` to `value` in the object at `namespace`, keeping the
/// other keys. Nothing (or null) at the namespace counts as an empty
/// object.
pub fn merge_field(
    store: &dyn Store,
    namespace: &str,
    field: &str,
    value: JsonValue
) -> Result<(), SprinkleError> {
    let mut object = match store.retrieve(namespace) {
        None | Some(JsonValue::Null) => Map::new(),
        Some(JsonValue::Object(m)) => m,
        Some(other) => return Err(MergeError::NotAnObject {
            namespace: namespace.into(),
            field: field.into(),
            found: json_type_name(&other),
        }.into())
    };
    object.insert(field.into(), value);
    store.commit(namespace, JsonValue::Object(object))?;
    Ok(())
}

/// Add an `input` listener to each of the form's fields.
pub fn bind_form(
    doc: &Rc<Document>,
    binding: &FormBinding,
    store: &Rc<dyn Store>,
    failures: &FailureLog,
) {
    for field in &binding.fields {
        let weak_doc: Weak<Document> = Rc::downgrade(doc);
        let store = store.clone();
        let failures = failures.clone();
        let namespace = binding.namespace.clone();
        let name = field.name.clone();
        let node = field.node;
        doc.add_event_listener(node, "input", Rc::new(move |_event: &Event| {
            let Some(doc) = weak_doc.upgrade() else {
                return
            };
            let value = match doc.dom().field_value(node) {
                Ok(v) => v,
                Err(e) => {
                    failures.report(&format!("form field {:?}", name), e.into());
                    return
                }
            };
            dt!("form {:?}: {:?} = {:?}", namespace, name, value);
            if let Err(e) = merge_field(&*store, &namespace, &name,
                                        JsonValue::String(value.to_string())) {
                failures.report(&format!("form field {:?}", name), e);
            }
        }));
    }
}
