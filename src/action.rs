//! Binding action attributes: each `trigger:method(args)` becomes an
//! event listener that evaluates the arguments, calls the method and
//! commits its result.

use std::rc::{Rc, Weak};

use adom::{Document, Event, NodeId};
use serde_json::{json, Value as JsonValue};

use chj_util::nodt as dt;

use crate::{
    discovery::{ActionBinding, ActionSpec},
    error::{ConfigurationError, EvaluationError, SprinkleError},
    event_loop::EventLoop,
    expr::{Evaluator, Scope},
    methods::{MethodRegistry, Outcome},
    store::Store,
};

/// What action listeners need.
#[derive(Clone)]
pub struct ActionContext {
    pub store: Rc<dyn Store>,
    pub methods: Rc<MethodRegistry>,
    pub evaluator: Rc<Evaluator>,
    pub event_loop: Rc<EventLoop>,
}

/// The value of `$event` in action arguments.
pub fn event_object(doc: &Document, event: &Event) -> JsonValue {
    let dom = doc.dom();
    let target = match dom.element(event.target) {
        Some(elt) => json!({
            "tagName": elt.tag_name.to_uppercase(),
            "name": elt.attribute("name"),
            "value": dom.field_value(event.target).ok().map(|v| v.to_string()),
        }),
        None => JsonValue::Null
    };
    json!({
        "type": event.event_type.as_str(),
        "target": target,
    })
}

/// Run one action for `event`. Arguments see the whole state as `it`
/// and `$state`, the event as `$event`, and the methods both as
/// `$methods` members and as bare names.
pub fn dispatch_action(
    ctx: &ActionContext,
    doc: &Document,
    spec: &ActionSpec,
    event: &Event,
) -> Result<(), SprinkleError> {
    let event_value = event_object(doc, event);
    let state = ctx.store.retrieve("");
    let scope = Scope::new(state.as_ref())
        .with_event(&event_value)
        .with_methods(&ctx.methods)
        .with_bare_methods();
    let args = spec.args.iter()
        .map(|arg| ctx.evaluator.evaluate_expr(arg, &scope)?.to_json())
        .collect::<Result<Vec<_>, EvaluationError>>()?;
    dt!("{}: calling {} with {:?}", event.event_type, spec.method, args);
    let method = ctx.methods.get(&spec.method).ok_or_else(
        || EvaluationError::Unbound(spec.method.to_string()))?;
    match method(args)? {
        Outcome::Ready(Some(result)) => ctx.store.commit(&result.path, result.value)?,
        Outcome::Ready(None) => (),
        Outcome::Pending(pending) => ctx.event_loop.spawn(
            format!("action {:?}", spec.source), pending),
    }
    Ok(())
}

/// Add a listener per action spec to the binding's element. Specs
/// naming unknown methods are not bound; an error is returned for
/// each.
pub fn bind_actions(
    doc: &Rc<Document>,
    binding: &ActionBinding,
    ctx: &ActionContext,
) -> Vec<SprinkleError> {
    let mut errors = Vec::new();
    for spec in &binding.actions {
        if ! ctx.methods.contains(&spec.method) {
            errors.push(ConfigurationError::UnknownMethod {
                spec: spec.source.clone(),
                method: spec.method.to_string(),
            }.into());
            continue
        }
        doc.add_event_listener(binding.node, &spec.trigger,
                               action_listener(doc, binding.node, spec.clone(), ctx.clone()));
    }
    errors
}

fn action_listener(
    doc: &Rc<Document>,
    node: NodeId,
    spec: ActionSpec,
    ctx: ActionContext
) -> adom::Listener {
    let weak_doc: Weak<Document> = Rc::downgrade(doc);
    Rc::new(move |event: &Event| {
        let Some(doc) = weak_doc.upgrade() else {
            return
        };
        if let Err(e) = dispatch_action(&ctx, &doc, &spec, event) {
            ctx.event_loop.failures().report(
                &format!("action {:?} on {:?}", spec.source, node), e);
        }
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Settings, discovery::discover_interactions,
        error::SprinkleErrorKind, store::PathStore,
    };

    fn context(store: Rc<PathStore>) -> ActionContext {
        let store: Rc<dyn Store> = store;
        let methods = MethodRegistry::new()
            .with("set", |args| Ok(Outcome::Ready(Some(crate::methods::ActionResult::new(
                args[0].as_str().unwrap_or(""), args[1].clone())))))
            .with("fail", |_| Err(EvaluationError::MethodFailed {
                name: "fail".into(), message: "always".into() }.into()));
        ActionContext {
            event_loop: Rc::new(EventLoop::new(store.clone())),
            store,
            methods: Rc::new(methods),
            evaluator: Rc::new(Evaluator::new()),
        }
    }

    fn bind_all(doc: &Rc<Document>, ctx: &ActionContext) -> Vec<SprinkleError> {
        let d = discover_interactions(doc, &Settings::default());
        assert!(d.errors.is_empty());
        d.actions.iter().flat_map(|b| bind_actions(doc, b, ctx)).collect()
    }

    #[test]
    fn t_event_object() {
        let doc = Document::parse(r#"<input name="q" value="v"><p>x</p>"#).unwrap();
        let children = doc.dom().children(doc.root()).unwrap().to_vec();
        let e = event_object(&doc, &Event::new("input", children[0]));
        assert_eq!(e, json!({"type": "input",
                             "target": {"tagName": "INPUT", "name": "q", "value": "v"}}));
        let e = event_object(&doc, &Event::new("click", children[1]));
        assert_eq!(e["target"]["name"], JsonValue::Null);
        assert_eq!(e["target"]["value"], json!(""));
    }

    #[test]
    fn t_click_commits() {
        let doc = Rc::new(Document::parse(
            r#"<button name="b" data-sprinkle-actions="click:set('x/y', $event.target.name + it.n); mouseover:set('over', true)">B</button>"#
        ).unwrap());
        let store = Rc::new(PathStore::new(json!({"n": 1})));
        let ctx = context(store.clone());
        assert!(bind_all(&doc, &ctx).is_empty());
        let button = doc.dom().children(doc.root()).unwrap()[0];
        assert_eq!(doc.listener_count(button), 2);

        assert_eq!(doc.click(button), 1);
        assert_eq!(store.retrieve("x/y"), Some(json!("b1")));
        assert_eq!(store.retrieve("over"), None);
        doc.dispatch_event(&Event::new("mouseover", button));
        assert_eq!(store.retrieve("over"), Some(json!(true)));
    }

    #[test]
    fn t_unknown_method_and_failures() {
        let doc = Rc::new(Document::parse(
            r#"<a data-sprinkle-actions="click:nope(1); click:fail(); click:set('n', it.missing.x); click:set('ok', 1)">A</a>"#
        ).unwrap());
        let store = Rc::new(PathStore::default());
        let ctx = context(store.clone());
        let errors = bind_all(&doc, &ctx);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind(),
                         SprinkleErrorKind::Configuration(ConfigurationError::UnknownMethod { method, .. })
                         if method == "nope"));

        let a = doc.dom().children(doc.root()).unwrap()[0];
        assert_eq!(doc.click(a), 3);
        // the failing actions don't keep the others from running
        assert_eq!(store.retrieve("ok"), Some(json!(1)));
        let failures = ctx.event_loop.take_failures();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|e| matches!(e.kind(), SprinkleErrorKind::Evaluation(_))));
    }
}
