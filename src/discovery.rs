//! Finding the declarative bindings in a document. Pure: nothing here
//! changes the document, the results are descriptors for the binders.

use adom::{Document, NodeId, Selector};
use kstring::KString;
use serde_json::Value as JsonValue;

use crate::{
    config::{Settings, AttributeNames},
    error::{ConfigurationError, SprinkleError},
    expr::{parse, Expr},
};

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDecl {
    /// The `<template>` element.
    pub node: NodeId,
    pub id: KString,
    /// The explicit namespace, or the id.
    pub namespace: KString,
    pub initial_state: Option<JsonValue>,
    /// The template's content, as written.
    pub markup: String,
}

#[derive(Debug, Default)]
pub struct TemplateDiscovery {
    pub templates: Vec<TemplateDecl>,
    pub errors: Vec<SprinkleError>,
}

/// One `trigger:method(args)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    pub trigger: KString,
    pub method: KString,
    /// Evaluated on each dispatch.
    pub args: Vec<Expr>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionBinding {
    pub node: NodeId,
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub node: NodeId,
    pub name: KString,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormBinding {
    pub form: NodeId,
    pub namespace: KString,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Default)]
pub struct InteractionDiscovery {
    pub actions: Vec<ActionBinding>,
    pub forms: Vec<FormBinding>,
    pub errors: Vec<SprinkleError>,
}

fn non_empty_attribute(
    doc: &Document,
    node: NodeId,
    attribute: &str
) -> Result<Option<KString>, ConfigurationError> {
    let dom = doc.dom();
    match dom.attribute(node, attribute) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Err(ConfigurationError::EmptyAttribute {
            tag: KString::from_ref(dom.tag_name(node).unwrap_or("?")),
            attribute: attribute.into(),
        }),
        Some(v) => Ok(Some(KString::from_ref(v.trim())))
    }
}

fn template_decl(
    doc: &Document,
    node: NodeId,
    names: &AttributeNames
) -> Result<TemplateDecl, SprinkleError> {
    let id = non_empty_attribute(doc, node, &names.id)?
        .ok_or_else(|| ConfigurationError::EmptyAttribute {
            tag: KString::from_static("template"),
            attribute: names.id.clone(),
        })?;
    let namespace = non_empty_attribute(doc, node, &names.namespace)?
        .unwrap_or_else(|| id.clone());
    let dom = doc.dom();
    let initial_state = match dom.attribute(node, &names.state) {
        Some(s) => Some(serde_json::from_str(s).map_err(
            |source| ConfigurationError::InitialState { id: id.clone(), source })?),
        None => None
    };
    Ok(TemplateDecl {
        node,
        id,
        namespace,
        initial_state,
        markup: dom.inner_html(node)?,
    })
}

/// All `<template>` elements carrying the id attribute, in document
/// order.
pub fn discover_templates(doc: &Document, settings: &Settings) -> TemplateDiscovery {
    let names = settings.attribute_names();
    let mut discovery = TemplateDiscovery::default();
    let nodes = match doc.query_all(&Selector::tag_with_attribute("template", &names.id)) {
        Ok(nodes) => nodes,
        Err(e) => {
            discovery.errors.push(e.into());
            return discovery
        }
    };
    for node in nodes {
        match template_decl(doc, node, &names) {
            Ok(decl) => discovery.templates.push(decl),
            Err(e) => discovery.errors.push(e),
        }
    }
    discovery
}

/// Split `value` at the `;` that are outside of string literals.
fn split_specs(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in value.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => (),
            None => match c {
                '\'' | '"' => quote = Some(c),
                ';' => {
                    parts.push(&value[start..i]);
                    start = i + 1;
                }
                _ => ()
            }
        }
    }
    parts.push(&value[start..]);
    parts
}

/// Parse an actions attribute value, `trigger:method(args);...`.
pub fn parse_actions(value: &str) -> Result<Vec<ActionSpec>, ConfigurationError> {
    let mut specs = Vec::new();
    for spec in split_specs(value) {
        if spec.trim().is_empty() {
            continue
        }
        let (trigger, call) = spec.split_once(':').ok_or_else(
            || ConfigurationError::MissingSeparator { spec: spec.into() })?;
        let trigger = trigger.trim();
        if trigger.is_empty() {
            return Err(ConfigurationError::EmptyTrigger { spec: spec.into() })
        }
        let call = call.trim();
        let expr = parse(call).map_err(
            |source| ConfigurationError::InvalidCall { spec: spec.into(), source })?;
        match expr {
            Expr::Call(callee, args) => match *callee {
                Expr::Identifier(method) => specs.push(ActionSpec {
                    trigger: KString::from_ref(trigger),
                    method,
                    args,
                    source: call.into(),
                }),
                _ => return Err(ConfigurationError::NotAMethodCall { spec: spec.into() })
            },
            _ => return Err(ConfigurationError::NotAMethodCall { spec: spec.into() })
        }
    }
    Ok(specs)
}

fn form_binding(
    doc: &Document,
    form: NodeId,
    names: &AttributeNames
) -> Result<FormBinding, SprinkleError> {
    let namespace = non_empty_attribute(doc, form, &names.namespace)?
        .ok_or_else(|| ConfigurationError::EmptyAttribute {
            tag: KString::from_static("form"),
            attribute: names.namespace.clone(),
        })?;
    let dom = doc.dom();
    let fields = adom::query_all(&dom, form, &Selector::FormField)?
        .into_iter()
        .filter_map(|node| dom.attribute(node, "name")
                    .map(|name| FormField { node, name: KString::from_ref(name) }))
        .collect();
    Ok(FormBinding { form, namespace, fields })
}

/// Elements carrying the actions attribute and forms carrying the
/// namespace attribute, in document order. Content of `<template>`
/// elements is not searched.
pub fn discover_interactions(doc: &Document, settings: &Settings) -> InteractionDiscovery {
    let names = settings.attribute_names();
    let mut discovery = InteractionDiscovery::default();

    match doc.query_all(&Selector::attribute(&names.actions)) {
        Ok(nodes) => for node in nodes {
            let value = doc.dom().attribute(node, &names.actions).unwrap_or("").to_string();
            match parse_actions(&value) {
                Ok(actions) => discovery.actions.push(ActionBinding { node, actions }),
                Err(e) => discovery.errors.push(e.into()),
            }
        },
        Err(e) => discovery.errors.push(e.into()),
    }

    match doc.query_all(&Selector::tag_with_attribute("form", &names.namespace)) {
        Ok(nodes) => for form in nodes {
            match form_binding(doc, form, &names) {
                Ok(binding) => discovery.forms.push(binding),
                Err(e) => discovery.errors.push(e),
            }
        },
        Err(e) => discovery.errors.push(e.into()),
    }
    discovery
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::error::SprinkleErrorKind;

    fn is_config_error(e: &SprinkleError) -> bool {
        matches!(e.kind(), SprinkleErrorKind::Configuration(_))
    }

    #[test]
    fn t_discover_templates() {
        let doc = Document::parse(r#"
            <template data-sprinkle-id="a" data-sprinkle-state='{"n": 1}'><p>{{it.n}}</p></template>
            <template data-sprinkle-id="b" data-sprinkle-namespace="shared"><i>x</i></template>
            <template data-sprinkle-id="c" data-sprinkle-state='{broken'>c</template>
            <template><p>not bound</p></template>
        "#).unwrap();
        let d = discover_templates(&doc, &Settings::default());
        assert_eq!(d.templates.len(), 2);
        let a = &d.templates[0];
        assert_eq!((a.id.as_str(), a.namespace.as_str()), ("a", "a"));
        assert_eq!(a.initial_state, Some(json!({"n": 1})));
        assert_eq!(a.markup, "<p>{{it.n}}</p>");
        let b = &d.templates[1];
        assert_eq!((b.id.as_str(), b.namespace.as_str()), ("b", "shared"));
        assert_eq!(b.initial_state, None);
        assert_eq!(d.errors.len(), 1);
        assert!(matches!(d.errors[0].kind(),
                         SprinkleErrorKind::Configuration(ConfigurationError::InitialState { id, .. })
                         if id == "c"));
    }

    #[test]
    fn t_empty_id() {
        let doc = Document::parse(r#"<template data-sprinkle-id=" ">x</template>"#).unwrap();
        let d = discover_templates(&doc, &Settings::default());
        assert!(d.templates.is_empty());
        assert!(is_config_error(&d.errors[0]));
    }

    #[test]
    fn t_parse_actions() {
        let specs = parse_actions("click:set('name/name', 'now mutated.'); mouseover : toggle('f');")
            .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].trigger, "click");
        assert_eq!(specs[0].method, "set");
        assert_eq!(specs[0].args.len(), 2);
        assert_eq!(specs[0].source, "set('name/name', 'now mutated.')");
        assert_eq!(specs[1].trigger, "mouseover");
        assert_eq!(specs[1].method, "toggle");

        // a ':' inside the call is kept
        let specs = parse_actions("click:set('a', {b: 1})").unwrap();
        assert_eq!(specs[0].args[1], parse("{b: 1}").unwrap());

        // and so is a ';' inside a string
        let specs = parse_actions(r#"click:set('a', 'x;y'); input:set("b", "it's; \"q\"")"#)
            .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].source, "set('a', 'x;y')");
        assert_eq!(specs[0].args[1], parse("'x;y'").unwrap());
        assert_eq!(specs[1].trigger, "input");
        assert_eq!(specs[1].args[1], parse(r#""it's; \"q\"""#).unwrap());
    }

    #[test]
    fn t_parse_actions_errors() {
        assert!(matches!(parse_actions("click"),
                         Err(ConfigurationError::MissingSeparator { .. })));
        assert!(matches!(parse_actions(":set('a', 1)"),
                         Err(ConfigurationError::EmptyTrigger { .. })));
        assert!(matches!(parse_actions("click:set("),
                         Err(ConfigurationError::InvalidCall { .. })));
        assert!(matches!(parse_actions("click:$methods.set('a', 1)"),
                         Err(ConfigurationError::NotAMethodCall { .. })));
        assert!(matches!(parse_actions("click:42"),
                         Err(ConfigurationError::NotAMethodCall { .. })));
    }

    #[test]
    fn t_discover_interactions() {
        let doc = Document::parse(r#"
            <button data-sprinkle-actions="click:toggle('a')">A</button>
            <button data-sprinkle-actions="oops">B</button>
            <form data-sprinkle-namespace="user">
              <input name="first"><input type="submit">
              <select name="color"><option>red</option></select>
              <textarea name="bio"></textarea>
            </form>
            <form data-sprinkle-namespace="">bad</form>
            <template data-sprinkle-id="t"><button data-sprinkle-actions="click:x()">T</button></template>
        "#).unwrap();
        let d = discover_interactions(&doc, &Settings::default());
        assert_eq!(d.actions.len(), 1);
        assert_eq!(d.actions[0].actions[0].method, "toggle");
        assert_eq!(d.forms.len(), 1);
        assert_eq!(d.forms[0].namespace, "user");
        let names: Vec<&str> = d.forms[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["first", "color", "bio"]);
        assert_eq!(d.errors.len(), 2);
        assert!(d.errors.iter().all(is_config_error));
    }
}
