//! What little we need to know about HTML elements.

use std::collections::HashSet;

use lazy_static::lazy_static;

// https://developer.mozilla.org/en-US/docs/Glossary/Void_element
const VOID_ELEMENT_NAMES: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link",
    "meta", "param", "source", "track", "wbr",
];

// Elements whose user-editable value is submitted with a form.
const FORM_FIELD_NAMES: &[&str] = &["input", "select", "textarea"];

lazy_static!{
    static ref VOID_ELEMENTS: HashSet<&'static str> =
        VOID_ELEMENT_NAMES.iter().copied().collect();
    static ref FORM_FIELDS: HashSet<&'static str> =
        FORM_FIELD_NAMES.iter().copied().collect();
}

/// Void elements never have children and are serialized without a
/// closing tag.
pub fn is_void_element(tag_name: &str) -> bool {
    VOID_ELEMENTS.contains(tag_name)
}

pub fn is_form_field(tag_name: &str) -> bool {
    FORM_FIELDS.contains(tag_name)
}

/// Content of `<template>` elements is inert: it is not part of the
/// live document until something renders it.
pub fn is_template(tag_name: &str) -> bool {
    tag_name == "template"
}
