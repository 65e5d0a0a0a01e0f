//! The node arena.
//!
//! Nodes are addressed by `NodeId`s handed out by a `Dom`. Freed slots
//! are never reused, so a stale id resolves to nothing (and gives an
//! error) instead of silently pointing at some other node.

use anyhow::{Result, bail, anyhow};
use kstring::KString;

use crate::meta::{is_void_element, is_template};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    /// A parentless container, e.g. the document root or a scratch
    /// area for rendering.
    Fragment,
    Element(Element),
    Text(KString),
    Comment(KString),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Fragment => None,
            Node::Text(_) => None,
            Node::Comment(_) => None,
        }
    }

    fn can_have_children(&self) -> bool {
        match self {
            Node::Fragment => true,
            Node::Element(e) => ! is_void_element(&e.tag_name),
            Node::Text(_) => false,
            Node::Comment(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag_name: KString,
    /// In source order for created elements; parsed elements come in
    /// the order the tokenizer reports them (sorted by name).
    pub attr: Vec<(KString, KString)>,
    /// The live value of a form field, as changed by user input. Like
    /// in browsers it shadows the `value` attribute without changing
    /// it.
    pub value: Option<KString>,
}

impl Element {
    pub fn new(tag_name: KString, attr: Vec<(KString, KString)>) -> Self {
        Element { tag_name, attr, value: None }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attr.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attr.iter().any(|(k, _)| k == name)
    }

    pub fn is_template(&self) -> bool {
        is_template(&self.tag_name)
    }
}

#[derive(Debug)]
struct Slot {
    node: Node,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct Dom {
    slots: Vec<Option<Slot>>,
    live: usize,
}

impl Dom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes that have not been freed.
    pub fn live_nodes(&self) -> usize {
        self.live
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Some(Slot { node, parent: None, children: Vec::new() }));
        self.live += 1;
        id
    }

    fn slot(&self, id: NodeId) -> Result<&Slot> {
        self.slots.get(id.index())
            .and_then(|s| s.as_ref())
            .ok_or_else(|| anyhow!("stale or foreign node id {id:?}"))
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut Slot> {
        self.slots.get_mut(id.index())
            .and_then(|s| s.as_mut())
            .ok_or_else(|| anyhow!("stale or foreign node id {id:?}"))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(Node::Fragment)
    }

    pub fn create_element(
        &mut self,
        tag_name: &str,
        attr: Vec<(KString, KString)>
    ) -> NodeId {
        self.alloc(Node::Element(Element::new(KString::from_ref(tag_name), attr)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(Node::Text(KString::from_ref(text)))
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.alloc(Node::Comment(KString::from_ref(text)))
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.slot(id).ok().map(|s| &s.node)
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slot_mut(id).ok().map(|s| &mut s.node)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.get_node(id).and_then(Node::as_element)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.get_node_mut(id) {
            Some(Node::Element(e)) => Some(e),
            _ => None,
        }
    }

    fn try_element_mut(&mut self, id: NodeId) -> Result<&mut Element> {
        self.element_mut(id).ok_or_else(|| anyhow!("node {id:?} is not an element"))
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag_name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).ok().and_then(|s| s.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(&self.slot(id)?.children)
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == ancestor {
                return true
            }
            current = self.parent(p);
        }
        false
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attribute(name))
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        let elt = self.try_element_mut(id)?;
        if let Some(entry) = elt.attr.iter_mut().find(|(k, _)| k == name) {
            entry.1 = KString::from_ref(value);
        } else {
            elt.attr.push((KString::from_ref(name), KString::from_ref(value)));
        }
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<Option<KString>> {
        let elt = self.try_element_mut(id)?;
        Ok(elt.attr.iter().position(|(k, _)| k == name)
           .map(|i| elt.attr.remove(i).1))
    }

    /// Append `child` as the last child of `parent`, detaching it
    /// from where it was first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if parent == child || self.is_ancestor_of(child, parent) {
            bail!("appending {child:?} to {parent:?} would create a cycle")
        }
        if ! self.slot(parent)?.node.can_have_children() {
            bail!("node {parent:?} can't have children")
        }
        self.detach(child)?;
        self.slot_mut(child)?.parent = Some(parent);
        self.slot_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Remove `id` from its parent, if it has one. The node stays
    /// allocated.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        if let Some(parent) = self.slot(id)?.parent {
            let siblings = &mut self.slot_mut(parent)?.children;
            siblings.retain(|c| *c != id);
            self.slot_mut(id)?.parent = None;
        }
        Ok(())
    }

    /// Put `new` into the place of `old`; `old` ends up detached.
    pub fn replace_with(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        if old == new {
            return Ok(())
        }
        let parent = self.slot(old)?.parent.ok_or_else(
            || anyhow!("node {old:?} has no parent to be replaced in"))?;
        if new == parent || self.is_ancestor_of(new, parent) {
            bail!("replacing {old:?} with {new:?} would create a cycle")
        }
        self.detach(new)?;
        let siblings = &mut self.slot_mut(parent)?.children;
        let pos = siblings.iter().position(|c| *c == old).expect(
            "a node is always among the children of its parent");
        siblings[pos] = new;
        self.slot_mut(new)?.parent = Some(parent);
        self.slot_mut(old)?.parent = None;
        Ok(())
    }

    /// Detach `id` and release it and all of its descendants. Returns
    /// the ids that were released.
    pub fn free_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        self.detach(id)?;
        let mut freed = Vec::new();
        let mut todo = vec![id];
        while let Some(current) = todo.pop() {
            if let Some(slot) = self.slots.get_mut(current.index()).and_then(Option::take) {
                self.live -= 1;
                freed.push(current);
                todo.extend(slot.children);
            }
        }
        Ok(freed)
    }

    /// Release all children of `id`, returning the released ids.
    pub fn free_children(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let children = self.slot(id)?.children.clone();
        let mut freed = Vec::new();
        for child in children {
            freed.extend(self.free_subtree(child)?);
        }
        Ok(freed)
    }

    /// All nodes below `root` in document order (pre-order), not
    /// including `root` itself. If `into_templates` is false, the
    /// children of `<template>` elements are skipped (the template
    /// elements themselves are still reported).
    pub fn descendants(&self, root: NodeId, into_templates: bool) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut todo: Vec<NodeId> = self.children(root)?.iter().rev().copied().collect();
        while let Some(id) = todo.pop() {
            out.push(id);
            let slot = self.slot(id)?;
            let descend = into_templates || match &slot.node {
                Node::Element(e) => ! e.is_template(),
                _ => true
            };
            if descend {
                todo.extend(slot.children.iter().rev());
            }
        }
        Ok(out)
    }

    /// Deep copy of `id`, detached. Live form values are not copied.
    pub fn clone_subtree(&mut self, id: NodeId) -> Result<NodeId> {
        let (node, children) = {
            let slot = self.slot(id)?;
            let node = match &slot.node {
                Node::Element(e) => Node::Element(Element::new(e.tag_name.clone(),
                                                               e.attr.clone())),
                other => other.clone(),
            };
            (node, slot.children.clone())
        };
        let copy = self.alloc(node);
        for child in children {
            let child_copy = self.clone_subtree(child)?;
            self.append_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    /// The concatenated text of all text nodes below (and including)
    /// `id`.
    pub fn text_content(&self, id: NodeId) -> Result<String> {
        let mut s = String::new();
        if let Node::Text(t) = &self.slot(id)?.node {
            s.push_str(t);
        }
        for d in self.descendants(id, true)? {
            if let Some(Node::Text(t)) = self.get_node(d) {
                s.push_str(t);
            }
        }
        Ok(s)
    }

    /// The current value of a form field: the live value if the user
    /// changed it, otherwise the `value` attribute, otherwise (for
    /// textarea) its text.
    pub fn field_value(&self, id: NodeId) -> Result<KString> {
        let elt = self.element(id).ok_or_else(
            || anyhow!("node {id:?} is not an element"))?;
        if let Some(v) = &elt.value {
            Ok(v.clone())
        } else if let Some(v) = elt.attribute("value") {
            Ok(KString::from_ref(v))
        } else if &*elt.tag_name == "textarea" {
            Ok(KString::from_string(self.text_content(id)?))
        } else {
            Ok(KString::from_static(""))
        }
    }

    pub fn set_field_value(&mut self, id: NodeId, value: &str) -> Result<()> {
        self.try_element_mut(id)?.value = Some(KString::from_ref(value));
        Ok(())
    }

    /// Replace the text of a text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<()> {
        match &mut self.slot_mut(id)?.node {
            Node::Text(t) => {
                *t = KString::from_ref(text);
                Ok(())
            }
            _ => bail!("node {id:?} is not a text node")
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn att(k: &str, v: &str) -> (KString, KString) {
        (KString::from_ref(k), KString::from_ref(v))
    }

    #[test]
    fn t_tree_ops() -> Result<()> {
        let mut dom = Dom::new();
        let root = dom.create_fragment();
        let div = dom.create_element("div", vec![att("id", "a")]);
        let text = dom.create_text("hi");
        dom.append_child(root, div)?;
        dom.append_child(div, text)?;
        assert_eq!(dom.children(root)?, &[div]);
        assert_eq!(dom.parent(text), Some(div));
        assert!(dom.is_ancestor_of(root, text));
        assert!(dom.append_child(text, root).is_err());
        assert!(dom.append_child(div, root).is_err());

        let span = dom.create_element("span", vec![]);
        dom.replace_with(div, span)?;
        assert_eq!(dom.children(root)?, &[span]);
        assert_eq!(dom.parent(div), None);
        assert_eq!(dom.text_content(div)?, "hi");
        Ok(())
    }

    #[test]
    fn t_void_elements_take_no_children() {
        let mut dom = Dom::new();
        let input = dom.create_element("input", vec![]);
        let text = dom.create_text("x");
        assert!(dom.append_child(input, text).is_err());
    }

    #[test]
    fn t_attributes() -> Result<()> {
        let mut dom = Dom::new();
        let div = dom.create_element("div", vec![att("a", "1")]);
        dom.set_attribute(div, "a", "2")?;
        dom.set_attribute(div, "b", "3")?;
        assert_eq!(dom.attribute(div, "a"), Some("2"));
        assert_eq!(dom.remove_attribute(div, "a")?.as_deref(), Some("2"));
        assert_eq!(dom.attribute(div, "a"), None);
        assert_eq!(dom.element(div).unwrap().attr.len(), 1);
        Ok(())
    }

    #[test]
    fn t_free_subtree() -> Result<()> {
        let mut dom = Dom::new();
        let root = dom.create_fragment();
        let div = dom.create_element("div", vec![]);
        let text = dom.create_text("x");
        dom.append_child(root, div)?;
        dom.append_child(div, text)?;
        assert_eq!(dom.live_nodes(), 3);
        let mut freed = dom.free_subtree(div)?;
        freed.sort();
        assert_eq!(freed, vec![div, text]);
        assert_eq!(dom.live_nodes(), 1);
        assert!(dom.children(root)?.is_empty());
        assert!(dom.get_node(text).is_none());
        assert!(dom.children(div).is_err());
        Ok(())
    }

    #[test]
    fn t_descendants_skip_templates() -> Result<()> {
        let mut dom = Dom::new();
        let root = dom.create_fragment();
        let template = dom.create_element("template", vec![]);
        let inner = dom.create_element("p", vec![]);
        let after = dom.create_element("b", vec![]);
        dom.append_child(root, template)?;
        dom.append_child(template, inner)?;
        dom.append_child(root, after)?;
        assert_eq!(dom.descendants(root, false)?, vec![template, after]);
        assert_eq!(dom.descendants(root, true)?, vec![template, inner, after]);
        Ok(())
    }

    #[test]
    fn t_field_value() -> Result<()> {
        let mut dom = Dom::new();
        let input = dom.create_element("input", vec![att("value", "initial")]);
        assert_eq!(dom.field_value(input)?.as_str(), "initial");
        dom.set_field_value(input, "typed")?;
        assert_eq!(dom.field_value(input)?.as_str(), "typed");
        assert_eq!(dom.attribute(input, "value"), Some("initial"));
        let copy = dom.clone_subtree(input)?;
        assert_eq!(dom.field_value(copy)?.as_str(), "initial");
        Ok(())
    }
}
