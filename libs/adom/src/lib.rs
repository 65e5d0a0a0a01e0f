//! Mutable HTML document model: an arena of nodes, parsing via
//! html5gum, serialization, simple queries and event listeners.

pub mod meta;
pub mod dom;
pub mod parse;
pub mod query;
pub mod document;

use std::io::Write;

use anyhow::Result;

pub use dom::{Dom, NodeId, Node, Element};
pub use parse::{parse_into, parse_fragment};
pub use query::{Selector, query_all, query_first};
pub use document::{Document, Event, Listener};

use meta::is_void_element;

fn html_escape(bytes: &[u8], out: &mut impl Write) -> Result<()> {
    let mut start = 0;
    for (i, b) in bytes.iter().enumerate() {
        let replacement: &[u8] = match b {
            b'&' => b"&amp;",
            b'<' => b"&lt;",
            b'>' => b"&gt;",
            b'"' => b"&quot;",
            b'\'' => b"&#39;",
            _ => continue
        };
        out.write_all(&bytes[start..i])?;
        out.write_all(replacement)?;
        start = i + 1;
    }
    out.write_all(&bytes[start..])?;
    Ok(())
}

pub trait Print {
    /// Print serialized HTML.
    fn print_html_fragment(&self, out: &mut impl Write, dom: &Dom) -> Result<()>;

    fn to_html_fragment_string(&self, dom: &Dom) -> Result<String> {
        let mut s = Vec::new();
        self.print_html_fragment(&mut s, dom)?;
        // All pieces written were either &str or ASCII literals.
        Ok(String::from_utf8(s)?)
    }
}

impl Print for (kstring::KString, kstring::KString) {
    fn print_html_fragment(&self, out: &mut impl Write, _dom: &Dom) -> Result<()> {
        out.write_all(self.0.as_bytes())?; // names come from the tokenizer or our code
        out.write_all(b"=\"")?;
        html_escape(self.1.as_bytes(), out)?;
        out.write_all(b"\"")?;
        Ok(())
    }
}

impl Print for NodeId {
    fn print_html_fragment(&self, out: &mut impl Write, dom: &Dom) -> Result<()> {
        let node = dom.get_node(*self).ok_or_else(
            || anyhow::anyhow!("stale or foreign node id {self:?}"))?;
        match node {
            Node::Fragment => {
                for child in dom.children(*self)? {
                    child.print_html_fragment(out, dom)?;
                }
            }
            Node::Element(e) => {
                out.write_all(b"<")?;
                out.write_all(e.tag_name.as_bytes())?;
                for att in &e.attr {
                    out.write_all(b" ")?;
                    att.print_html_fragment(out, dom)?;
                }
                out.write_all(b">")?;
                if ! is_void_element(&e.tag_name) {
                    for child in dom.children(*self)? {
                        child.print_html_fragment(out, dom)?;
                    }
                    out.write_all(b"</")?;
                    out.write_all(e.tag_name.as_bytes())?;
                    out.write_all(b">")?;
                }
            }
            Node::Text(s) => html_escape(s.as_bytes(), out)?,
            Node::Comment(s) => {
                // XX no check for "--" inside
                out.write_all(b"<!--")?;
                out.write_all(s.as_bytes())?;
                out.write_all(b"-->")?;
            }
        }
        Ok(())
    }
}

impl Dom {
    /// The serialized node itself, including its own tag.
    pub fn outer_html(&self, id: NodeId) -> Result<String> {
        id.to_html_fragment_string(self)
    }

    /// The serialized children of the node.
    pub fn inner_html(&self, id: NodeId) -> Result<String> {
        let mut s = Vec::new();
        for child in self.children(id)? {
            child.print_html_fragment(&mut s, self)?;
        }
        Ok(String::from_utf8(s)?)
    }

    /// Replace the children of `id` with the nodes parsed from
    /// `markup`. Returns the released ids of the old children.
    pub fn set_inner_html(&mut self, id: NodeId, markup: &str) -> Result<Vec<NodeId>> {
        let freed = self.free_children(id)?;
        parse_into(self, id, markup)?;
        Ok(freed)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn escaped(s: &str) -> String {
        let mut v = Vec::new();
        html_escape(s.as_bytes(), &mut v).unwrap();
        String::from_utf8(v).unwrap()
    }

    #[test]
    fn t_html_escape() {
        assert_eq!(escaped(""), "");
        assert_eq!(escaped("plain"), "plain");
        assert_eq!(escaped("<a href='x'>&\"</a>"),
                   "&lt;a href=&#39;x&#39;&gt;&amp;&quot;&lt;/a&gt;");
        assert_eq!(escaped("ünïcödé & more"), "ünïcödé &amp; more");
    }

    #[test]
    fn t_inner_outer_html() -> Result<()> {
        let mut dom = Dom::new();
        let fragment = parse_fragment(&mut dom, "<ul class=\"x\"><li>a</li><li>b</li></ul>")?;
        let ul = dom.children(fragment)?[0];
        assert_eq!(dom.inner_html(ul)?, "<li>a</li><li>b</li>");
        assert_eq!(dom.outer_html(ul)?, "<ul class=\"x\"><li>a</li><li>b</li></ul>");
        let freed = dom.set_inner_html(ul, "<li>c</li>")?;
        assert_eq!(freed.len(), 4);
        assert_eq!(dom.outer_html(ul)?, "<ul class=\"x\"><li>c</li></ul>");
        Ok(())
    }
}
