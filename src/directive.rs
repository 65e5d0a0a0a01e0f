//! Rendering: conditional removal, iteration and interpolation on a
//! parsed fragment, in that order.
//!
//! Interpolated values become text and attribute values, so they are
//! escaped on serialization; a value containing markup shows up as
//! that markup's text, it never adds elements.

use std::rc::Rc;

use adom::{Dom, NodeId, Node, parse_fragment};
use kstring::KString;
use serde_json::Value as JsonValue;

use chj_util::nodt as dt;

use crate::{
    config::{Settings, AttributeNames},
    error::{SprinkleError, EvaluationError},
    expr::{Evaluator, Scope, Value},
    methods::MethodRegistry,
};

pub struct DirectiveProcessor {
    open: String,
    close: String,
    print_marker: String,
    names: AttributeNames,
    evaluator: Rc<Evaluator>,
    methods: Rc<MethodRegistry>,
}

/// Whether some node strictly between `id` and `root` satisfies
/// `pred`.
fn has_ancestor_below(
    dom: &Dom,
    id: NodeId,
    root: NodeId,
    pred: impl Fn(NodeId) -> bool
) -> bool {
    let mut current = dom.parent(id);
    while let Some(p) = current {
        if p == root {
            return false
        }
        if pred(p) {
            return true
        }
        current = dom.parent(p);
    }
    false
}

impl DirectiveProcessor {
    pub fn new(settings: &Settings, evaluator: Rc<Evaluator>, methods: Rc<MethodRegistry>) -> Self {
        DirectiveProcessor {
            open: settings.open_delimiter.clone(),
            close: settings.close_delimiter.clone(),
            print_marker: settings.print_marker.clone(),
            names: settings.attribute_names(),
            evaluator,
            methods,
        }
    }

    /// Render template `markup` against `state` (the value at the
    /// template's namespace), returning the resulting HTML.
    pub fn render(&self, markup: &str, state: Option<&JsonValue>) -> Result<String, SprinkleError> {
        let mut dom = Dom::new();
        let fragment = parse_fragment(&mut dom, markup)?;
        self.process(&mut dom, fragment, state)?;
        Ok(dom.inner_html(fragment)?)
    }

    /// Apply all directives below `root` in place.
    pub fn process(
        &self,
        dom: &mut Dom,
        root: NodeId,
        state: Option<&JsonValue>
    ) -> Result<(), SprinkleError> {
        let scope = Scope::new(state).with_methods(&self.methods);
        self.apply(dom, root, &scope)
    }

    fn is_repeat(&self, dom: &Dom, id: NodeId) -> bool {
        dom.element(id).map_or(false, |e| e.has_attribute(&self.names.repeat))
    }

    fn apply(&self, dom: &mut Dom, root: NodeId, scope: &Scope) -> Result<(), SprinkleError> {
        // 1. Conditionals, except inside iterations (they are handled
        // per item there).
        for id in dom.descendants(root, false)? {
            if dom.get_node(id).is_none()
                || has_ancestor_below(dom, id, root, |p| self.is_repeat(dom, p))
            {
                continue
            }
            if let Some(condition) = dom.attribute(id, &self.names.condition) {
                let condition = condition.to_string();
                if self.evaluator.evaluate(&condition, scope)?.is_truthy() {
                    dom.remove_attribute(id, &self.names.condition)?;
                } else {
                    dt!("removing element, {:?} is false", condition);
                    dom.free_subtree(id)?;
                }
            }
        }

        // 2. Iterations, outermost only; inner ones expand within
        // each copy.
        let repeats: Vec<NodeId> = dom.descendants(root, false)?
            .into_iter()
            .filter(|id| self.is_repeat(dom, *id)
                    && ! has_ancestor_below(dom, *id, root, |p| self.is_repeat(dom, p)))
            .collect();
        for &id in &repeats {
            self.expand(dom, id, scope)?;
        }

        // 3. Interpolation of everything else.
        for id in dom.descendants(root, false)? {
            if has_ancestor_below(dom, id, root, |p| repeats.contains(&p)) {
                continue
            }
            self.interpolate_node(dom, id, scope)?;
        }
        Ok(())
    }

    fn expand(&self, dom: &mut Dom, container: NodeId, scope: &Scope) -> Result<(), SprinkleError> {
        let expression = dom.remove_attribute(container, &self.names.repeat)?
            .unwrap_or_default();
        let items = match self.evaluator.evaluate(&expression, scope)? {
            Value::Json(JsonValue::Array(items)) => items,
            other => return Err(EvaluationError::NotAnArray {
                expression: expression.to_string(),
                found: other.type_name(),
            }.into())
        };
        dt!("expanding {:?} over {} items", expression, items.len());

        // Each item gets a copy of the whole element (without the
        // attribute); the copies become the element's new contents.
        let original = dom.create_fragment();
        let element = dom.clone_subtree(container)?;
        dom.append_child(original, element)?;
        dom.free_children(container)?;
        let result = self.expand_items(dom, container, original, &items, scope);
        dom.free_subtree(original)?;
        result
    }

    fn expand_items(
        &self,
        dom: &mut Dom,
        container: NodeId,
        original: NodeId,
        items: &[JsonValue],
        scope: &Scope
    ) -> Result<(), SprinkleError> {
        for item in items {
            let item_scope = scope.with_item(item);
            let copy = dom.create_fragment();
            for child in dom.children(original)?.to_vec() {
                let c = dom.clone_subtree(child)?;
                dom.append_child(copy, c)?;
            }
            let applied = self.apply(dom, copy, &item_scope);
            if applied.is_ok() {
                for child in dom.children(copy)?.to_vec() {
                    dom.append_child(container, child)?;
                }
            }
            dom.free_subtree(copy)?;
            applied?;
        }
        Ok(())
    }

    fn interpolate_node(&self, dom: &mut Dom, id: NodeId, scope: &Scope) -> Result<(), SprinkleError> {
        match dom.get_node(id) {
            Some(Node::Text(t)) if t.contains(self.open.as_str()) => {
                let t = t.to_string();
                let s = self.interpolate(&t, scope)?;
                dom.set_text(id, &s)?;
            }
            Some(Node::Element(e)) => {
                let attr: Vec<(KString, KString)> = e.attr.iter()
                    .filter(|(_, v)| v.contains(self.open.as_str()))
                    .cloned()
                    .collect();
                for (k, v) in attr {
                    let s = self.interpolate(&v, scope)?;
                    dom.set_attribute(id, &k, &s)?;
                }
            }
            _ => ()
        }
        Ok(())
    }

    /// Replace every delimited expression in `s` by its rendered
    /// value. An opening delimiter without a closing one is left as
    /// it is.
    pub fn interpolate(&self, s: &str, scope: &Scope) -> Result<String, EvaluationError> {
        let mut out = String::with_capacity(s.len());
        let mut rest = s;
        while let Some(start) = rest.find(self.open.as_str()) {
            let after = &rest[start + self.open.len()..];
            let end = match after.find(self.close.as_str()) {
                Some(end) => end,
                None => break
            };
            out.push_str(&rest[..start]);
            let value = self.evaluator.evaluate(self.expression_body(&after[..end]), scope)?;
            out.push_str(&value.render());
            rest = &after[end + self.close.len()..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn expression_body<'b>(&self, body: &'b str) -> &'b str {
        let body = body.trim();
        if self.print_marker.is_empty() {
            body
        } else {
            body.strip_prefix(self.print_marker.as_str()).unwrap_or(body).trim_start()
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::error::SprinkleErrorKind;

    fn processor_with(settings: &Settings) -> DirectiveProcessor {
        DirectiveProcessor::new(settings, Default::default(), Default::default())
    }

    fn processor() -> DirectiveProcessor {
        processor_with(&Settings::default())
    }

    fn render(markup: &str, state: JsonValue) -> String {
        processor().render(markup, Some(&state)).unwrap()
    }

    #[test]
    fn t_interpolation() {
        assert_eq!(render("<div>This is {{= it.name }}</div>", json!({"name": "unmutated."})),
                   "<div>This is unmutated.</div>");
        assert_eq!(render("<a href=\"/u/{{it.id}}\" title=\"x\">{{it.id}}{{ it.id + 1 }}</a>",
                          json!({"id": 7})),
                   "<a href=\"/u/7\" title=\"x\">78</a>");
        assert_eq!(render("{{ it.missing }}|{{ null }}|{{ it.list }}", json!({"list": [1, 2]})),
                   "||[1,2]");
        assert_eq!(render("open {{ without close", json!({})), "open {{ without close");
    }

    #[test]
    fn t_values_are_escaped() {
        assert_eq!(render("<p title=\"{{it.s}}\">{{it.s}}</p>", json!({"s": "<b>\"&\"</b>"})),
                   "<p title=\"&lt;b&gt;&quot;&amp;&quot;&lt;/b&gt;\">\
                    &lt;b&gt;&quot;&amp;&quot;&lt;/b&gt;</p>");
        // substituted text is not interpolated again
        assert_eq!(render("<p>{{it.s}}</p>", json!({"s": "{{it.s}}"})), "<p>{{it.s}}</p>");
    }

    #[test]
    fn t_conditionals() {
        let markup = "<p data-sprinkle-if=\"it.show\">shown</p>\
                      <p class=\"other\" data-sprinkle-if=\"!it.show\">hidden</p>";
        assert_eq!(render(markup, json!({"show": true})), "<p>shown</p>");
        assert_eq!(render(markup, json!({"show": false})), "<p class=\"other\">hidden</p>");
        // expressions inside removed elements are never evaluated
        assert_eq!(render("<p data-sprinkle-if=\"false\">{{ it.nope.x }}</p>ok", json!({})),
                   "ok");
    }

    #[test]
    fn t_iteration() {
        // every item gets its own copy of the element, nested in the original
        let markup = "<div class=\"row\" data-sprinkle-for=\"it.items\">\
                      <span class=\"{{$item}}\">{{ $item }}</span></div>";
        assert_eq!(render(markup, json!({"items": ["a", "b", "c"]})),
                   "<div class=\"row\">\
                    <div class=\"row\"><span class=\"a\">a</span></div>\
                    <div class=\"row\"><span class=\"b\">b</span></div>\
                    <div class=\"row\"><span class=\"c\">c</span></div></div>");
        assert_eq!(render(markup, json!({"items": []})), "<div class=\"row\"></div>");
        assert_eq!(render("<ul data-sprinkle-for=\"it.xs\"><li>{{$item}}</li></ul>",
                          json!({"xs": ["a", "b"]})),
                   "<ul><ul><li>a</li></ul><ul><li>b</li></ul></ul>");
    }

    #[test]
    fn t_iteration_uses_state_and_nested_items() {
        let markup = "<div data-sprinkle-for=\"it.rows\">\
                        <h2>{{ $item.title }} of {{ it.total }}</h2>\
                        <span data-sprinkle-for=\"$item.cells\">[{{ $item }}]</span>\
                        <i data-sprinkle-if=\"$item.cells.length > 1\">many</i>\
                      </div>";
        let state = json!({"total": 2, "rows": [
            {"title": "one", "cells": [1]},
            {"title": "two", "cells": [2, 3]},
        ]});
        assert_eq!(render(markup, state),
                   "<div>\
                    <div><h2>one of 2</h2><span><span>[1]</span></span></div>\
                    <div><h2>two of 2</h2><span><span>[2]</span><span>[3]</span></span>\
                    <i>many</i></div></div>");
    }

    #[test]
    fn t_iteration_errors() {
        let e = processor().render("<ul data-sprinkle-for=\"it.n\"></ul>", Some(&json!({"n": 1})))
            .unwrap_err();
        assert!(matches!(e.kind(),
                         SprinkleErrorKind::Evaluation(EvaluationError::NotAnArray { found, .. })
                         if *found == "a number"));
        let e = processor().render("<ul data-sprinkle-for=\"it.xs\"><li>{{ $item.a.b }}</li></ul>",
                                   Some(&json!({"xs": [1]}))).unwrap_err();
        assert!(matches!(e.kind(), SprinkleErrorKind::Evaluation(_)));
    }

    #[test]
    fn t_item_outside_iteration_is_unbound() {
        let e = processor().render("<p>{{ $item }}</p>", Some(&json!({}))).unwrap_err();
        assert!(matches!(e.kind(),
                         SprinkleErrorKind::Evaluation(EvaluationError::Unbound(name))
                         if name == "$item"));
    }

    #[test]
    fn t_idempotent() {
        let markup = "<ul data-sprinkle-for=\"it.xs\"><li>{{$item}}</li></ul>\
                      <p data-sprinkle-if=\"it.xs.length\">{{ it.xs.length }} items</p>";
        let state = json!({"xs": [1, 2, 3]});
        let p = processor();
        let first = p.render(markup, Some(&state)).unwrap();
        let second = p.render(markup, Some(&state)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "<ul><ul><li>1</li></ul><ul><li>2</li></ul><ul><li>3</li></ul></ul>\
                           <p>3 items</p>");
    }

    #[test]
    fn t_custom_settings() {
        let settings = Settings {
            open_delimiter: "[[".into(),
            close_delimiter: "]]".into(),
            attribute_prefix: "data-x".into(),
            print_marker: "".into(),
            ..Default::default()
        };
        let p = processor_with(&settings);
        assert_eq!(p.render("<p data-x-if=\"it.a\">[[ it.a ]] {{ it.a }}</p>",
                            Some(&json!({"a": 1}))).unwrap(),
                   "<p>1 {{ it.a }}</p>");
    }

    #[test]
    fn t_methods_in_expressions() {
        let methods = Rc::new(MethodRegistry::new().with("twice", |args| {
            let n = args.first().and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(crate::methods::Outcome::Ready(Some(
                crate::methods::ActionResult::new("n", json!(n * 2)))))
        }));
        let p = DirectiveProcessor::new(&Settings::default(), Default::default(), methods);
        assert_eq!(p.render("{{ $methods.twice(it.n).value }}", Some(&json!({"n": 21}))).unwrap(),
                   "42");
    }
}
