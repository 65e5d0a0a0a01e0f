//! The few element queries the binding engine needs, in place of CSS
//! selectors.

use anyhow::Result;
use kstring::KString;

use crate::{dom::{Dom, NodeId, Element}, meta::is_form_field};

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// `[name]`
    Attribute(KString),
    /// `tag[name]`
    TagWithAttribute(KString, KString),
    /// `input[name],select[name],textarea[name]`
    FormField,
}

impl Selector {
    pub fn attribute(name: &str) -> Self {
        Selector::Attribute(KString::from_ref(name))
    }

    pub fn tag_with_attribute(tag: &str, name: &str) -> Self {
        Selector::TagWithAttribute(KString::from_ref(tag), KString::from_ref(name))
    }

    pub fn matches(&self, elt: &Element) -> bool {
        match self {
            Selector::Attribute(name) => elt.has_attribute(name),
            Selector::TagWithAttribute(tag, name) =>
                elt.tag_name == *tag && elt.has_attribute(name),
            Selector::FormField =>
                is_form_field(&elt.tag_name) && elt.has_attribute("name"),
        }
    }
}

/// All elements below `root` matching `selector`, in document
/// order. Like `querySelectorAll`, does not look into the content of
/// `<template>` elements.
pub fn query_all(dom: &Dom, root: NodeId, selector: &Selector) -> Result<Vec<NodeId>> {
    Ok(dom.descendants(root, false)?
       .into_iter()
       .filter(|id| dom.element(*id).map_or(false, |e| selector.matches(e)))
       .collect())
}

pub fn query_first(dom: &Dom, root: NodeId, selector: &Selector) -> Result<Option<NodeId>> {
    Ok(query_all(dom, root, selector)?.into_iter().next())
}
