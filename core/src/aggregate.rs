//! Text aggregation over a document subtree.
//!
//! The result mirrors block structure: inline children share one running
//! string, while an element the [`ContextPolicy`] marks as a boundary gets its
//! own nested group. Patterns are matched leaf by leaf, so a match can cross
//! `<b>` or `<a>` but never a paragraph or table cell edge.

use std::mem;

use crate::dom::{Document, Element, NodeData, NodeId};

/// Decides which elements are visible to matching and which split contexts.
pub trait ContextPolicy {
    /// `false` hides the element and its subtree from matching.
    fn accepts(&self, _el: &Element) -> bool {
        true
    }

    /// `true` closes the running context before the element and opens a
    /// fresh one after it.
    fn forces_context(&self, _el: &Element) -> bool {
        false
    }
}

/// Sees every element and never splits.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllElements;

impl ContextPolicy for AllElements {}

/// Sees every element and splits at each one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Isolated;

impl ContextPolicy for Isolated {
    fn forces_context(&self, _el: &Element) -> bool {
        true
    }
}

/// Text of a subtree grouped by context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregatedText {
    Leaf(String),
    Group(Vec<AggregatedText>),
}

impl AggregatedText {
    pub fn empty() -> Self {
        AggregatedText::Group(Vec::new())
    }

    /// Leaf strings in depth-first order.
    pub fn leaves(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(item) = stack.pop() {
            match item {
                AggregatedText::Leaf(text) => out.push(text.as_str()),
                AggregatedText::Group(items) => stack.extend(items.iter().rev()),
            }
        }
        out
    }

    /// All leaves concatenated; the stream match offsets index into.
    pub fn flatten(&self) -> String {
        self.leaves().concat()
    }

    /// Byte length of [`flatten`](Self::flatten).
    pub fn len(&self) -> usize {
        self.leaves().iter().map(|leaf| leaf.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Frame {
    next: Option<NodeId>,
    forced: bool,
    items: Vec<AggregatedText>,
    current: String,
}

impl Frame {
    fn new(next: Option<NodeId>, forced: bool) -> Self {
        Self {
            next,
            forced,
            items: Vec::new(),
            current: String::new(),
        }
    }

    fn push_context(&mut self, inner: Vec<AggregatedText>) {
        self.items
            .push(AggregatedText::Leaf(mem::take(&mut self.current)));
        self.items.push(AggregatedText::Group(inner));
    }

    /// Bridges an inline child into the running context: its first leaf
    /// continues the current string and its last leaf stays open.
    ///
    /// This holds even when the inline child wraps a block. Text after the
    /// inline element joins whatever the child ended with, rather than
    /// starting a fresh context.
    fn merge_inline(&mut self, inner: Vec<AggregatedText>) {
        let mut rest = inner.into_iter();
        let mut middle: Vec<AggregatedText> = Vec::new();
        match rest.next() {
            Some(AggregatedText::Leaf(text)) => self.current.push_str(&text),
            Some(group) => middle.push(group),
            None => return,
        }
        middle.extend(rest);
        if middle.is_empty() {
            return;
        }
        let tail = match middle.last() {
            Some(AggregatedText::Leaf(_)) => match middle.pop() {
                Some(AggregatedText::Leaf(text)) => text,
                _ => String::new(),
            },
            _ => String::new(),
        };
        self.items
            .push(AggregatedText::Leaf(mem::take(&mut self.current)));
        self.items.extend(middle);
        self.current = tail;
    }

    fn finish(mut self) -> (bool, Vec<AggregatedText>) {
        self.items.push(AggregatedText::Leaf(self.current));
        (self.forced, self.items)
    }
}

/// Aggregates the text under `root`. Unknown ids and filtered roots yield an
/// empty group.
pub fn aggregate(doc: &Document, root: NodeId, policy: &dyn ContextPolicy) -> AggregatedText {
    match doc.get(root) {
        None => return AggregatedText::empty(),
        Some(NodeData::Text(text)) => {
            return AggregatedText::Group(vec![AggregatedText::Leaf(text.clone())])
        }
        Some(NodeData::Element(el)) if !policy.accepts(el) => return AggregatedText::empty(),
        Some(NodeData::Element(_)) | Some(NodeData::Document) => {}
        Some(_) => return AggregatedText::empty(),
    }

    let mut stack = vec![Frame::new(doc.first_child(root), false)];
    loop {
        let Some(frame) = stack.last_mut() else {
            return AggregatedText::empty();
        };
        match frame.next {
            Some(child) => {
                frame.next = doc.next_sibling(child);
                match doc.data(child) {
                    NodeData::Text(text) => frame.current.push_str(text),
                    NodeData::Element(el) => {
                        let forced = policy.forces_context(el);
                        if policy.accepts(el) {
                            stack.push(Frame::new(doc.first_child(child), forced));
                        } else if forced {
                            frame.push_context(Vec::new());
                        }
                    }
                    _ => {}
                }
            }
            None => {
                let Some(done) = stack.pop() else {
                    return AggregatedText::empty();
                };
                let (forced, items) = done.finish();
                match stack.last_mut() {
                    None => return AggregatedText::Group(items),
                    Some(parent) if forced => parent.push_context(items),
                    Some(parent) => parent.merge_inline(items),
                }
            }
        }
    }
}
