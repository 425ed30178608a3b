//! Arena-backed document tree.
//!
//! Every node lives in a slot of the owning [`Document`] and is addressed by a
//! [`NodeId`]. Unlinking a node never frees its slot, so a detached node keeps
//! its identity and can be linked back in later. The splice engine relies on
//! this to restore the exact nodes it removed.

use std::fmt;

/// Dense node identifier. Only meaningful for the document that issued it.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Namespace an element was parsed into. Everything outside `<svg>` and
/// `<math>` is HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
    MathMl,
}

/// Element name plus attributes in source order. Prefixed attributes keep
/// their prefix in the name (`xlink:href`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub ns: Namespace,
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

impl Element {
    /// An HTML element. The tag is lowercased.
    pub fn new(tag: &str) -> Self {
        Self {
            ns: Namespace::Html,
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    /// An SVG or MathML element. The tag keeps its case (`clipPath`).
    pub fn foreign(ns: Namespace, tag: &str) -> Self {
        Self {
            ns,
            tag: tag.to_string(),
            attrs: Vec::new(),
        }
    }

    pub fn is_html(&self, tag: &str) -> bool {
        self.ns == Namespace::Html && self.tag == tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|list| list.split_ascii_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let next = match self.attr("class") {
            Some(list) if !list.trim().is_empty() => format!("{} {class}", list.trim()),
            _ => class.to_string(),
        };
        self.set_attr("class", next);
    }
}

/// Payload carried by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Doctype(String),
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl Slot {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }
}

/// One entry of [`Document::outline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub depth: usize,
    pub id: NodeId,
    pub data: NodeData,
}

/// A mutable tree of nodes rooted at a document node.
#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::new(NodeData::Document)],
            root: NodeId(0),
        }
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of slots ever allocated, linked or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() <= 1
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Slot::new(data));
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(Element::new(tag)))
    }

    /// Adds an element built elsewhere, e.g. by the HTML importer.
    pub fn adopt_element(&mut self, element: Element) -> NodeId {
        self.alloc(NodeData::Element(element))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Comment(text.into()))
    }

    pub fn create_doctype(&mut self, name: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Doctype(name.into()))
    }

    /// Fallible lookup; `None` for ids this document never issued.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.slots.get(id.index()).map(|slot| &slot.data)
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.slots[id.index()].data
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.get(id) {
            Some(NodeData::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.get(id) {
            Some(NodeData::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.slots.get_mut(id.index()).map(|slot| &mut slot.data) {
            Some(NodeData::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.index()].parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.index()].first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.index()].last_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.index()].next_sibling
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.index()].prev_sibling
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.first_child(id),
        }
    }

    /// Pre-order walk of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: Some(id),
        }
    }

    /// Unlinks `id` from its parent and siblings. The node and its subtree
    /// stay intact and can be re-inserted.
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let slot = &self.slots[id.index()];
            (slot.parent, slot.prev_sibling, slot.next_sibling)
        };
        match prev {
            Some(prev) => self.slots[prev.index()].next_sibling = next,
            None => {
                if let Some(parent) = parent {
                    self.slots[parent.index()].first_child = next;
                }
            }
        }
        match next {
            Some(next) => self.slots[next.index()].prev_sibling = prev,
            None => {
                if let Some(parent) = parent {
                    self.slots[parent.index()].last_child = prev;
                }
            }
        }
        let slot = &mut self.slots[id.index()];
        slot.parent = None;
        slot.prev_sibling = None;
        slot.next_sibling = None;
    }

    /// Appends `child` as the last child of `parent`, detaching it first.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let last = self.slots[parent.index()].last_child;
        {
            let slot = &mut self.slots[child.index()];
            slot.parent = Some(parent);
            slot.prev_sibling = last;
        }
        match last {
            Some(last) => self.slots[last.index()].next_sibling = Some(child),
            None => self.slots[parent.index()].first_child = Some(child),
        }
        self.slots[parent.index()].last_child = Some(child);
    }

    /// Inserts `node` immediately before `reference`. Returns `false` when
    /// `reference` has no parent, in which case nothing changes.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> bool {
        let Some(parent) = self.parent(reference) else {
            return false;
        };
        self.detach(node);
        let prev = self.slots[reference.index()].prev_sibling;
        {
            let slot = &mut self.slots[node.index()];
            slot.parent = Some(parent);
            slot.prev_sibling = prev;
            slot.next_sibling = Some(reference);
        }
        self.slots[reference.index()].prev_sibling = Some(node);
        match prev {
            Some(prev) => self.slots[prev.index()].next_sibling = Some(node),
            None => self.slots[parent.index()].first_child = Some(node),
        }
        true
    }

    /// Puts `new` where `old` is and detaches `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> bool {
        if !self.insert_before(old, new) {
            return false;
        }
        self.detach(old);
        true
    }

    /// Concatenated character data of every text node under `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            if let Some(text) = self.text(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// First element with the given tag in document order.
    pub fn find_first(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .find(|&id| self.element(id).is_some_and(|el| el.tag == tag))
    }

    pub fn body(&self) -> Option<NodeId> {
        self.find_first("body")
    }

    /// Flat pre-order snapshot of the subtree at `id`. Two outlines are equal
    /// exactly when the trees hold the same nodes in the same arrangement.
    pub fn outline(&self, id: NodeId) -> Vec<OutlineEntry> {
        let mut out = Vec::new();
        let mut stack = vec![(id, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            out.push(OutlineEntry {
                depth,
                id: node,
                data: self.data(node).clone(),
            });
            let children: Vec<NodeId> = self.children(node).collect();
            for child in children.into_iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }
}

pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.next_sibling(current);
        Some(current)
    }
}

pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = if let Some(child) = self.doc.first_child(current) {
            Some(child)
        } else {
            let mut node = current;
            loop {
                if node == self.root {
                    break None;
                }
                if let Some(sibling) = self.doc.next_sibling(node) {
                    break Some(sibling);
                }
                match self.doc.parent(node) {
                    Some(parent) => node = parent,
                    None => break None,
                }
            }
        };
        Some(current)
    }
}
