//! HTML bridge: parse markup into a [`Document`] and serialize it back.
//!
//! Parsing goes through the html5ever-backed `kuchikiki` tree builder so the
//! arena sees the same tree a browser would build. The kuchiki tree is copied
//! once into the arena and then dropped. Output is written by html5ever's own
//! serializer, driven over the arena.

use std::io;

use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::{LocalName, Namespace as NamespaceUrl, Prefix, QualName};
use kuchikiki::{NodeData as KNodeData, NodeRef};
use tendril::TendrilSink;
use tracing::warn;

use crate::dom::{Document, Element, Namespace, NodeData, NodeId};

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";
const SVG_NS: &str = "http://www.w3.org/2000/svg";
const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// Parses a complete HTML document.
pub fn parse_html(html: &str) -> Document {
    let parsed = kuchikiki::parse_html().one(html);
    let mut doc = Document::new();
    let root = doc.root();

    let mut stack: Vec<(NodeRef, NodeId)> = child_nodes(&parsed.document_node)
        .into_iter()
        .rev()
        .map(|child| (child, root))
        .collect();
    while let Some((source, parent)) = stack.pop() {
        let Some(id) = import_node(&mut doc, &source) else {
            continue;
        };
        doc.append(parent, id);
        for child in child_nodes(&source).into_iter().rev() {
            stack.push((child, id));
        }
    }
    doc
}

/// Children of `node`. A `<template>` keeps its parsed content in a separate
/// fragment; that content is read as ordinary children.
fn child_nodes(node: &NodeRef) -> Vec<NodeRef> {
    let mut children: Vec<NodeRef> = node.children().collect();
    if let Some(fragment) = node.as_element().and_then(|el| el.template_contents.clone()) {
        children.extend(fragment.children());
    }
    children
}

fn import_node(doc: &mut Document, source: &NodeRef) -> Option<NodeId> {
    match source.data() {
        KNodeData::Element(data) => {
            let mut el = match namespace_of(&data.name.ns) {
                Namespace::Html => Element::new(&data.name.local),
                ns => Element::foreign(ns, &data.name.local),
            };
            for (name, attr) in data.attributes.borrow().map.iter() {
                let key = match &attr.prefix {
                    Some(prefix) => format!("{prefix}:{}", name.local),
                    None => name.local.to_string(),
                };
                el.attrs.push((key, attr.value.clone()));
            }
            Some(doc.adopt_element(el))
        }
        KNodeData::Text(text) => Some(doc.create_text(text.borrow().clone())),
        KNodeData::Comment(text) => Some(doc.create_comment(text.borrow().clone())),
        KNodeData::Doctype(doctype) => Some(doc.create_doctype(doctype.name.clone())),
        _ => None,
    }
}

fn namespace_of(ns: &NamespaceUrl) -> Namespace {
    match &**ns {
        SVG_NS => Namespace::Svg,
        MATHML_NS => Namespace::MathMl,
        _ => Namespace::Html,
    }
}

fn namespace_url(ns: Namespace) -> NamespaceUrl {
    NamespaceUrl::from(match ns {
        Namespace::Html => HTML_NS,
        Namespace::Svg => SVG_NS,
        Namespace::MathMl => MATHML_NS,
    })
}

fn element_name(el: &Element) -> QualName {
    QualName::new(None, namespace_url(el.ns), LocalName::from(el.tag.as_str()))
}

/// Attribute names are stored flat. The `xlink:`, `xml:` and `xmlns:` prefixes
/// map back to their namespaces; anything else has no namespace.
fn attr_name(name: &str) -> QualName {
    if let Some((prefix, local)) = name.split_once(':') {
        let ns = match prefix {
            "xlink" => Some(XLINK_NS),
            "xml" => Some(XML_NS),
            "xmlns" => Some(XMLNS_NS),
            _ => None,
        };
        if let Some(ns) = ns {
            return QualName::new(
                Some(Prefix::from(prefix)),
                NamespaceUrl::from(ns),
                LocalName::from(local),
            );
        }
    }
    QualName::new(None, NamespaceUrl::from(""), LocalName::from(name))
}

/// The parser eats one newline right after `<pre>`, `<textarea>` and
/// `<listing>`, so a text child that starts with one needs another in front.
fn needs_leading_newline(doc: &Document, id: NodeId, el: &Element) -> bool {
    (el.is_html("pre") || el.is_html("textarea") || el.is_html("listing"))
        && doc
            .first_child(id)
            .and_then(|child| doc.text(child))
            .is_some_and(|text| text.starts_with('\n'))
}

/// A node of the arena as seen by html5ever's serializer.
struct Subtree<'a> {
    doc: &'a Document,
    id: NodeId,
}

enum Step {
    Open(NodeId),
    Close(NodeId),
}

impl Subtree<'_> {
    fn push_children(&self, node: NodeId, stack: &mut Vec<Step>) {
        let children: Vec<NodeId> = self.doc.children(node).collect();
        stack.extend(children.into_iter().rev().map(Step::Open));
    }
}

impl Serialize for Subtree<'_> {
    fn serialize<S: Serializer>(&self, serializer: &mut S, scope: TraversalScope) -> io::Result<()> {
        let mut stack = Vec::new();
        match scope {
            TraversalScope::IncludeNode => stack.push(Step::Open(self.id)),
            TraversalScope::ChildrenOnly(_) => self.push_children(self.id, &mut stack),
        }
        while let Some(step) = stack.pop() {
            match step {
                Step::Open(node) => match self.doc.data(node) {
                    NodeData::Document => self.push_children(node, &mut stack),
                    NodeData::Doctype(name) => serializer.write_doctype(name)?,
                    NodeData::Comment(text) => serializer.write_comment(text)?,
                    NodeData::Text(text) => serializer.write_text(text)?,
                    NodeData::Element(el) => {
                        let attrs: Vec<(QualName, &str)> = el
                            .attrs
                            .iter()
                            .map(|(name, value)| (attr_name(name), value.as_str()))
                            .collect();
                        serializer
                            .start_elem(element_name(el), attrs.iter().map(|(n, v)| (n, *v)))?;
                        if needs_leading_newline(self.doc, node, el) {
                            serializer.write_text("\n")?;
                        }
                        stack.push(Step::Close(node));
                        self.push_children(node, &mut stack);
                    }
                },
                Step::Close(node) => {
                    if let Some(el) = self.doc.element(node) {
                        serializer.end_elem(element_name(el))?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn write(doc: &Document, id: NodeId, traversal_scope: TraversalScope) -> String {
    let mut buf = Vec::new();
    let opts = SerializeOpts {
        traversal_scope,
        ..SerializeOpts::default()
    };
    if let Err(err) = serialize(&mut buf, &Subtree { doc, id }, opts) {
        warn!(%err, "html serialization stopped early");
    }
    match String::from_utf8(buf) {
        Ok(html) => html,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

/// Serializes the whole document.
pub fn to_html(doc: &Document) -> String {
    write(doc, doc.root(), TraversalScope::ChildrenOnly(None))
}

/// Serializes one node and its subtree.
pub fn node_to_html(doc: &Document, id: NodeId) -> String {
    write(doc, id, TraversalScope::IncludeNode)
}

/// Serializes only the children of `id`, like `innerHTML`.
pub fn inner_html(doc: &Document, id: NodeId) -> String {
    let parent = doc.element(id).map(element_name);
    write(doc, id, TraversalScope::ChildrenOnly(parent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_into_html_head_body() {
        let doc = parse_html("<p>Hello <b>world</b></p>");
        let body = doc.body().expect("body");
        assert_eq!(doc.text_content(body), "Hello world");
        assert_eq!(inner_html(&doc, body), "<p>Hello <b>world</b></p>");
    }

    #[test]
    fn keeps_attributes_and_comments() {
        let doc = parse_html(r#"<div class="note"><!-- hi -->x</div>"#);
        let div = doc.find_first("div").expect("div");
        assert_eq!(doc.element(div).unwrap().attr("class"), Some("note"));
        assert_eq!(node_to_html(&doc, div), r#"<div class="note"><!-- hi -->x</div>"#);
    }

    #[test]
    fn escapes_text_but_not_script_bodies() {
        let doc = parse_html("<p>a &amp; b &lt; c</p><script>if (a < b) {}</script>");
        let body = doc.body().expect("body");
        let html = inner_html(&doc, body);
        assert!(html.contains("<p>a &amp; b &lt; c</p>"), "{html}");
        assert!(html.contains("<script>if (a < b) {}</script>"), "{html}");
    }

    #[test]
    fn void_elements_have_no_end_tag() {
        let doc = parse_html("<p>one<br>two</p>");
        let p = doc.find_first("p").expect("p");
        assert_eq!(node_to_html(&doc, p), "<p>one<br>two</p>");
    }

    #[test]
    fn round_trips_doctype() {
        let doc = parse_html("<!DOCTYPE html><html><head></head><body>x</body></html>");
        assert_eq!(
            to_html(&doc),
            "<!DOCTYPE html><html><head></head><body>x</body></html>"
        );
    }

    #[test]
    fn noscript_content_is_written_raw() {
        let html = to_html(&parse_html(r#"<noscript><img src="a.png"></noscript>"#));
        assert!(html.contains(r#"<noscript><img src="a.png"></noscript>"#), "{html}");
    }

    #[test]
    fn template_content_survives() {
        let doc = parse_html("<p>a</p><template><p>row</p></template>");
        let template = doc.find_first("template").expect("template");
        assert_eq!(doc.text_content(template), "row");
        let html = to_html(&doc);
        assert!(html.contains("<template><p>row</p></template>"), "{html}");
    }

    #[test]
    fn foreign_attributes_keep_their_prefix() {
        let doc = parse_html(r##"<svg><use xlink:href="#i"></use></svg>"##);
        let node = doc.find_first("use").expect("use");
        assert_eq!(doc.element(node).unwrap().attr("xlink:href"), Some("#i"));
        let html = to_html(&doc);
        assert!(html.contains(r##"<use xlink:href="#i"></use>"##), "{html}");
    }

    #[test]
    fn svg_tags_keep_their_case() {
        let html = to_html(&parse_html(r#"<svg><clipPath id="c"></clipPath></svg>"#));
        assert!(html.contains(r#"<clipPath id="c"></clipPath>"#), "{html}");
    }

    #[test]
    fn leading_newline_in_pre_is_stable() {
        let once = to_html(&parse_html("<pre>\n\nx</pre>"));
        assert!(once.contains("<pre>\n\nx</pre>"), "{once:?}");
        let twice = to_html(&parse_html(&once));
        assert_eq!(twice, once);
    }
}
