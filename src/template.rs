//! Binding a discovered template: the `<template>` element is replaced
//! by a container holding the rendered view, and the view is rendered
//! again on every change at or around the template's namespace.

use std::rc::{Rc, Weak};

use adom::{Document, NodeId};
use kstring::KString;

use chj_util::nodt as dt;

use crate::{
    directive::DirectiveProcessor,
    discovery::TemplateDecl,
    error::SprinkleError,
    event_loop::FailureLog,
    store::Store,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    pub id: KString,
    pub namespace: KString,
    /// The container element now in the document.
    pub view: NodeId,
    /// The original, now detached, `<template>` element.
    pub model: NodeId,
    pub markup: Rc<str>,
}

/// Render the view for `namespace` into `container`. On failure the
/// container is left as it was.
fn render_into(
    doc: &Document,
    store: &dyn Store,
    processor: &DirectiveProcessor,
    namespace: &str,
    markup: &str,
    container: NodeId,
) -> Result<(), SprinkleError> {
    let state = store.retrieve(namespace);
    let html = processor.render(markup, state.as_ref())?;
    dt!("rendered {:?}: {:?}", namespace, html);
    doc.set_inner_html(container, &html)?;
    Ok(())
}

/// Replace the declaration's `<template>` element with a rendered
/// container and subscribe it to its namespace. A failing first render
/// leaves the container empty and is reported to `failures`; the
/// template stays bound and renders on the next change.
pub fn bind_template(
    doc: &Rc<Document>,
    store: &Rc<dyn Store>,
    processor: &Rc<DirectiveProcessor>,
    container_tag: &str,
    decl: &TemplateDecl,
    failures: &FailureLog,
) -> Result<CompiledTemplate, SprinkleError> {
    let container = {
        let mut dom = doc.dom_mut();
        let container = dom.create_element(container_tag, Vec::new());
        dom.replace_with(decl.node, container)?;
        container
    };
    let origin = format!("template {:?}", decl.id);
    let markup: Rc<str> = decl.markup.as_str().into();
    if let Err(e) = render_into(doc, &**store, processor, &decl.namespace, &markup, container) {
        failures.report(&origin, e);
    }

    let weak_doc: Weak<Document> = Rc::downgrade(doc);
    let weak_store: Weak<dyn Store> = Rc::downgrade(store);
    let processor = processor.clone();
    let namespace = decl.namespace.clone();
    let listener_markup = markup.clone();
    let failures = failures.clone();
    store.subscribe(&decl.namespace, Rc::new(move |_path: &str| {
        let (Some(doc), Some(store)) = (weak_doc.upgrade(), weak_store.upgrade()) else {
            return
        };
        if let Err(e) = render_into(&doc, &*store, &processor, &namespace,
                                    &listener_markup, container) {
            failures.report(&format!("{} (keeping previous content)", origin), e);
        }
    }));

    Ok(CompiledTemplate {
        id: decl.id.clone(),
        namespace: decl.namespace.clone(),
        view: container,
        model: decl.node,
        markup,
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::{
        config::Settings, discovery::discover_templates, expr::Evaluator,
        methods::MethodRegistry, store::PathStore,
    };

    fn setup(markup: &str) -> (Rc<Document>, Rc<dyn Store>, Rc<DirectiveProcessor>, TemplateDecl) {
        let doc = Rc::new(Document::parse(markup).unwrap());
        let store: Rc<dyn Store> = Rc::new(PathStore::default());
        let processor = Rc::new(DirectiveProcessor::new(
            &Settings::default(), Rc::new(Evaluator::new()), Rc::new(MethodRegistry::new())));
        let mut d = discover_templates(&doc, &Settings::default());
        let decl = d.templates.remove(0);
        (doc, store, processor, decl)
    }

    #[test]
    fn t_bind_and_rerender() {
        let (doc, store, processor, decl) = setup(
            r#"<main><template data-sprinkle-id="t"><b>{{it.n}}</b></template></main>"#);
        store.commit("t", json!({"n": 1})).unwrap();
        let failures = FailureLog::default();
        let t = bind_template(&doc, &store, &processor, "div", &decl, &failures).unwrap();
        assert_eq!(t.model, decl.node);
        assert_eq!(doc.dom().parent(t.model), None);
        assert_eq!(doc.to_html_string().unwrap(), "<main><div><b>1</b></div></main>");

        store.commit("t/n", json!(2)).unwrap();
        assert_eq!(doc.to_html_string().unwrap(), "<main><div><b>2</b></div></main>");
        // unrelated paths leave the view alone
        store.commit("other", json!(3)).unwrap();
        assert_eq!(doc.to_html_string().unwrap(), "<main><div><b>2</b></div></main>");
        assert!(failures.is_empty());
    }

    #[test]
    fn t_failed_render_keeps_content() {
        let (doc, store, processor, decl) = setup(
            r#"<template data-sprinkle-id="t"><b>{{it.a.b}}</b></template>"#);
        store.commit("t", json!({"a": {"b": "ok"}})).unwrap();
        let failures = FailureLog::default();
        bind_template(&doc, &store, &processor, "section", &decl, &failures).unwrap();
        assert_eq!(doc.to_html_string().unwrap(), "<section><b>ok</b></section>");

        store.commit("t/a", json!(null)).unwrap();
        assert_eq!(doc.to_html_string().unwrap(), "<section><b>ok</b></section>");
        assert_eq!(failures.len(), 1);

        store.commit("t/a", json!({"b": "again"})).unwrap();
        assert_eq!(doc.to_html_string().unwrap(), "<section><b>again</b></section>");
    }

    #[test]
    fn t_failed_first_render() {
        let (doc, store, processor, decl) = setup(
            r#"<template data-sprinkle-id="t">{{it.a.b}}</template>"#);
        let failures = FailureLog::default();
        bind_template(&doc, &store, &processor, "div", &decl, &failures).unwrap();
        assert_eq!(doc.to_html_string().unwrap(), "<div></div>");
        assert_eq!(failures.len(), 1);
        store.commit("t", json!({"a": {"b": "late"}})).unwrap();
        assert_eq!(doc.to_html_string().unwrap(), "<div>late</div>");
    }

    #[test]
    fn t_dropped_document() {
        let (doc, store, processor, decl) = setup(
            r#"<template data-sprinkle-id="t">{{it}}</template>"#);
        bind_template(&doc, &store, &processor, "div", &decl, &FailureLog::default()).unwrap();
        drop(doc);
        store.commit("t", json!(1)).unwrap();
    }
}
