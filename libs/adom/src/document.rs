//! A `Dom` with a root and event listeners, shared by reference.
//!
//! Listeners run with no borrow of the document held, so they are free
//! to read and change the tree (and to add or remove listeners).

use std::{cell::{RefCell, Ref, RefMut}, collections::HashMap, rc::Rc};

use anyhow::Result;
use kstring::KString;

use crate::{dom::{Dom, NodeId}, parse::parse_into, query::{Selector, query_all}};

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_type: KString,
    pub target: NodeId,
}

impl Event {
    pub fn new(event_type: &str, target: NodeId) -> Self {
        Event { event_type: KString::from_ref(event_type), target }
    }
}

pub type Listener = Rc<dyn Fn(&Event)>;

pub struct Document {
    dom: RefCell<Dom>,
    root: NodeId,
    listeners: RefCell<HashMap<NodeId, Vec<(KString, Listener)>>>,
}

impl Default for Document {
    fn default() -> Self {
        let mut dom = Dom::new();
        let root = dom.create_fragment();
        Document {
            dom: RefCell::new(dom),
            root,
            listeners: Default::default(),
        }
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document holding the nodes parsed from `markup` below its
    /// root.
    pub fn parse(markup: &str) -> Result<Self> {
        let doc = Self::new();
        {
            let mut dom = doc.dom.borrow_mut();
            parse_into(&mut dom, doc.root, markup)?;
        }
        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Panics if the document is currently borrowed mutably, as with
    /// any `RefCell`.
    pub fn dom(&self) -> Ref<'_, Dom> {
        self.dom.borrow()
    }

    pub fn dom_mut(&self) -> RefMut<'_, Dom> {
        self.dom.borrow_mut()
    }

    pub fn query_all(&self, selector: &Selector) -> Result<Vec<NodeId>> {
        query_all(&self.dom(), self.root, selector)
    }

    pub fn to_html_string(&self) -> Result<String> {
        self.dom().inner_html(self.root)
    }

    pub fn add_event_listener(&self, target: NodeId, event_type: &str, listener: Listener) {
        self.listeners.borrow_mut()
            .entry(target)
            .or_default()
            .push((KString::from_ref(event_type), listener));
    }

    pub fn listener_count(&self, target: NodeId) -> usize {
        self.listeners.borrow().get(&target).map_or(0, Vec::len)
    }

    /// Run the listeners registered on the target for this event
    /// type, in registration order. Returns how many ran. Listeners
    /// added while dispatching only see later events.
    pub fn dispatch_event(&self, event: &Event) -> usize {
        let matching: Vec<Listener> = match self.listeners.borrow().get(&event.target) {
            Some(ls) => ls.iter()
                .filter(|(t, _)| *t == event.event_type)
                .map(|(_, l)| l.clone())
                .collect(),
            None => return 0
        };
        for listener in &matching {
            listener(event);
        }
        matching.len()
    }

    pub fn click(&self, target: NodeId) -> usize {
        self.dispatch_event(&Event::new("click", target))
    }

    /// Simulate user input into a form field: set its live value,
    /// then dispatch `input`.
    pub fn input(&self, target: NodeId, value: &str) -> Result<usize> {
        self.dom_mut().set_field_value(target, value)?;
        Ok(self.dispatch_event(&Event::new("input", target)))
    }

    fn forget_listeners(&self, freed: &[NodeId]) {
        let mut listeners = self.listeners.borrow_mut();
        for id in freed {
            listeners.remove(id);
        }
    }

    /// Release a subtree along with the listeners registered on it.
    pub fn free_subtree(&self, id: NodeId) -> Result<()> {
        let freed = self.dom_mut().free_subtree(id)?;
        self.forget_listeners(&freed);
        Ok(())
    }

    /// Replace the children of `id` by parsing `markup`, releasing
    /// the old children along with their listeners.
    pub fn set_inner_html(&self, id: NodeId, markup: &str) -> Result<()> {
        let freed = self.dom_mut().set_inner_html(id, markup)?;
        self.forget_listeners(&freed);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn t_dispatch() -> Result<()> {
        let doc = Document::parse("<button id=\"b\">Go</button><p>x</p>")?;
        let button = doc.query_all(&Selector::attribute("id"))?[0];

        let clicks = Rc::new(Cell::new(0));
        {
            let clicks = clicks.clone();
            doc.add_event_listener(button, "click", Rc::new(move |e: &Event| {
                assert_eq!(e.event_type, "click");
                clicks.set(clicks.get() + 1);
            }));
        }
        assert_eq!(doc.click(button), 1);
        assert_eq!(doc.click(button), 1);
        assert_eq!(doc.dispatch_event(&Event::new("input", button)), 0);
        assert_eq!(clicks.get(), 2);
        Ok(())
    }

    #[test]
    fn t_listener_may_change_document() -> Result<()> {
        let doc = Rc::new(Document::parse("<button>Go</button><p>x</p>")?);
        let (button, p) = {
            let dom = doc.dom();
            let cs = dom.children(doc.root())?;
            (cs[0], cs[1])
        };
        let weak = Rc::downgrade(&doc);
        doc.add_event_listener(button, "click", Rc::new(move |_| {
            if let Some(doc) = weak.upgrade() {
                doc.set_inner_html(p, "<b>changed</b>").unwrap();
            }
        }));
        doc.click(button);
        assert_eq!(doc.to_html_string()?, "<button>Go</button><p><b>changed</b></p>");
        Ok(())
    }

    #[test]
    fn t_input_and_freeing() -> Result<()> {
        let doc = Document::parse("<div><input name=\"a\"></div>")?;
        let input = doc.query_all(&Selector::FormField)?[0];
        let seen = Rc::new(RefCell::new(String::new()));
        {
            let seen = seen.clone();
            doc.add_event_listener(input, "input", Rc::new(move |e: &Event| {
                seen.borrow_mut().push_str(&format!("{:?}", e.target));
            }));
        }
        assert_eq!(doc.input(input, "hello")?, 1);
        assert_eq!(doc.dom().field_value(input)?.as_str(), "hello");
        assert!(! seen.borrow().is_empty());

        let div = doc.dom().parent(input).unwrap();
        doc.free_subtree(div)?;
        assert_eq!(doc.listener_count(input), 0);
        assert_eq!(doc.to_html_string()?, "");
        Ok(())
    }
}
