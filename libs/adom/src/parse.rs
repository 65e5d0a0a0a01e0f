//! Build `Dom` trees from HTML markup, using the html5gum tokenizer.

use anyhow::Result;
use html5gum::{Token, HtmlString};
use kstring::KString;

use chj_util::{warn, nodt as dt};

use crate::{dom::{Dom, NodeId, Node}, meta::is_void_element};

/// This can't be a plain conversion, because it can fail.
fn kstring(s: HtmlString) -> Result<KString> {
    Ok(KString::from_string(String::from_utf8(s.0)?))
}

/// Parse `markup` and append the resulting nodes to `parent`.
///
/// The tokenizer is lenient and so are we: end tags without a
/// matching open element are dropped, elements still open at the end
/// of the input are closed there, and a self-closing tag (`<div/>`)
/// never takes children.
pub fn parse_into(dom: &mut Dom, parent: NodeId, markup: &str) -> Result<()> {
    // Open elements, innermost last; `parent` is never popped.
    let mut open: Vec<NodeId> = vec![parent];
    let current = |open: &Vec<NodeId>| *open.last().expect("parent is never popped");

    for token in html5gum::Tokenizer::new(markup).infallible() {
        match token {
            Token::StartTag(starttag) => {
                let name = kstring(starttag.name)?;
                let mut attr = Vec::with_capacity(starttag.attributes.len());
                for (k, v) in starttag.attributes {
                    attr.push((kstring(k)?, kstring(v)?));
                }
                let elt = dom.create_element(&name, attr);
                dom.append_child(current(&open), elt)?;
                if ! (starttag.self_closing || is_void_element(&name)) {
                    open.push(elt);
                }
            }
            Token::EndTag(endtag) => {
                let name = kstring(endtag.name)?;
                if is_void_element(&name) {
                    continue;
                }
                // Search from the innermost open element outwards, but
                // never past `parent`.
                let found = open.iter().skip(1).rposition(
                    |id| dom.tag_name(*id) == Some(name.as_str()));
                match found {
                    Some(i) => {
                        // `i` counts from index 1 of `open`
                        let depth = i + 1;
                        if depth + 1 < open.len() {
                            warn!("closing <{}> implicitly closes {} element(s)",
                                  name, open.len() - depth - 1);
                        }
                        open.truncate(depth);
                    }
                    None => warn!("ignoring unmatched end tag </{}>", name),
                }
            }
            Token::String(s) => {
                let s = kstring(s)?;
                let target = current(&open);
                // The tokenizer may report one run of text in pieces;
                // keep it in one node.
                let last = dom.children(target)?.last().copied();
                let merged = match last.and_then(|id| dom.get_node_mut(id)) {
                    Some(Node::Text(t)) => {
                        let mut joined = String::with_capacity(t.len() + s.len());
                        joined.push_str(t.as_str());
                        joined.push_str(&s);
                        *t = KString::from_string(joined);
                        true
                    }
                    _ => false
                };
                if ! merged {
                    let text = dom.create_text(&s);
                    dom.append_child(target, text)?;
                }
            }
            Token::Comment(s) => {
                let comment = dom.create_comment(&kstring(s)?);
                dom.append_child(current(&open), comment)?;
            }
            Token::Doctype(_) => (),
            Token::Error(_e) => {
                // Recovered from by the tokenizer, e.g. for a `<`
                // followed by a space inside an expression.
                dt!("html5gum: {}", _e);
            }
        }
    }
    Ok(())
}

/// Parse `markup` into a new, detached fragment node.
pub fn parse_fragment(dom: &mut Dom, markup: &str) -> Result<NodeId> {
    let fragment = dom.create_fragment();
    parse_into(dom, fragment, markup)?;
    Ok(fragment)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::Print;

    fn roundtrip(s: &str) -> String {
        let mut dom = Dom::new();
        let fragment = parse_fragment(&mut dom, s).unwrap();
        dom.inner_html(fragment).unwrap()
    }

    #[test]
    fn t_parse_simple() {
        assert_eq!(roundtrip("<div>This is <b>bold</b></div>"),
                   "<div>This is <b>bold</b></div>");
        assert_eq!(roundtrip("plain"), "plain");
        assert_eq!(roundtrip(""), "");
    }

    #[test]
    fn t_parse_void_and_self_closing() {
        assert_eq!(roundtrip("<p><input name=\"a\">x</p>"),
                   "<p><input name=\"a\">x</p>");
        assert_eq!(roundtrip("<div/>after"), "<div></div>after");
    }

    #[test]
    fn t_parse_recovers() {
        assert_eq!(roundtrip("<div><span>unclosed</div>tail"),
                   "<div><span>unclosed</span></div>tail");
        assert_eq!(roundtrip("stray</p>end"), "strayend");
        assert_eq!(roundtrip("<b>x</b></b>"), "<b>x</b>");
    }

    #[test]
    fn t_parse_text_is_escaped_again() {
        assert_eq!(roundtrip("a &amp; b"), "a &amp; b");
        assert_eq!(roundtrip("{{ it.a < 3 }}"), "{{ it.a &lt; 3 }}");
    }

    #[test]
    fn t_parse_attributes_and_comments() {
        let mut dom = Dom::new();
        let fragment = parse_fragment(
            &mut dom,
            "<button data-sprinkle-actions=\"click:set('a', 1)\">Go</button><!-- c -->"
        ).unwrap();
        let children = dom.children(fragment).unwrap().to_vec();
        assert_eq!(children.len(), 2);
        assert_eq!(dom.attribute(children[0], "data-sprinkle-actions"),
                   Some("click:set('a', 1)"));
        assert_eq!(children[1].to_html_fragment_string(&dom).unwrap(), "<!-- c -->");
    }
}
