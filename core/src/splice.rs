//! Splicing matches back into the document.
//!
//! [`Finder::process`] walks the subtree once, depth first, with an explicit
//! node stack. It keeps a running byte offset over every visible text node and
//! uses it to find the text nodes a match starts in, ends in, and fully covers.
//! Those nodes are swapped for replacement nodes and every swap is recorded as
//! a [`RevertStep`] so the run can be undone.

use std::mem;

use tracing::debug;

use crate::aggregate::{aggregate, AllElements, ContextPolicy};
use crate::dom::{Document, NodeData, NodeId};
use crate::error::FinderError;
use crate::prose::Prose;
use crate::search::{search, Match, Pattern};

/// The part of one text node covered by one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portion {
    pub node: NodeId,
    /// Position among the portions of its match, in document order.
    pub index: usize,
    /// The covered text.
    pub text: String,
    /// Byte offset of this portion from the start of the match.
    pub index_in_match: usize,
    pub index_in_node: usize,
    pub end_index_in_node: usize,
    /// Set on the portion holding the end of the match.
    pub is_end: bool,
}

impl Portion {
    pub fn is_first(&self) -> bool {
        self.index_in_match == 0
    }
}

/// Builds the node that stands in for one portion.
pub type PortionFactory<'a> = Box<dyn FnMut(&mut Document, &Portion, &Match) -> NodeId + 'a>;

/// What each portion is replaced with.
pub enum Replace<'a> {
    /// Text built from a template. `$&` is the whole match, `` $` `` and `$'`
    /// the context text before and after it, `$1`… capture groups. The text is
    /// wrapped in a `wrap` element when one is given.
    Template {
        text: String,
        wrap: Option<String>,
        wrap_class: Option<String>,
    },
    Factory(PortionFactory<'a>),
}

impl<'a> Replace<'a> {
    pub fn template(text: impl Into<String>) -> Self {
        Replace::Template {
            text: text.into(),
            wrap: None,
            wrap_class: None,
        }
    }

    /// Keeps the matched text but wraps each portion in `tag`.
    pub fn wrap(tag: impl Into<String>, class: Option<&str>) -> Self {
        Replace::Template {
            text: "$&".into(),
            wrap: Some(tag.into()),
            wrap_class: class.map(str::to_string),
        }
    }

    pub fn factory<F>(f: F) -> Self
    where
        F: FnMut(&mut Document, &Portion, &Match) -> NodeId + 'a,
    {
        Replace::Factory(Box::new(f))
    }
}

impl Default for Replace<'_> {
    fn default() -> Self {
        Replace::template("$&")
    }
}

/// How template text is spread over a match that spans several nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortionMode {
    /// Each portion gets the slice of the replacement that lines up with it.
    #[default]
    Retain,
    /// The first portion gets all of it, the rest become empty.
    First,
}

pub struct FinderOptions<'a> {
    pub replace: Replace<'a>,
    pub portion_mode: PortionMode,
    pub policy: Box<dyn ContextPolicy + 'a>,
}

impl Default for FinderOptions<'_> {
    fn default() -> Self {
        Self {
            replace: Replace::default(),
            portion_mode: PortionMode::Retain,
            policy: Box::new(AllElements),
        }
    }
}

impl<'a> FinderOptions<'a> {
    /// Prose preset: skips non-prose elements, splits at block elements.
    pub fn prose() -> Self {
        Self {
            policy: Box::new(Prose::new()),
            ..Self::default()
        }
    }

    pub fn replace(mut self, replace: Replace<'a>) -> Self {
        self.replace = replace;
        self
    }

    pub fn portion_mode(mut self, mode: PortionMode) -> Self {
        self.portion_mode = mode;
        self
    }

    pub fn policy(mut self, policy: impl ContextPolicy + 'a) -> Self {
        self.policy = Box::new(policy);
        self
    }
}

/// Inverse of one splice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertStep {
    ReplaceSingle {
        original: NodeId,
        inserted: NodeId,
        before: Option<NodeId>,
        after: Option<NodeId>,
    },
    ReplaceRange {
        /// Start node, inner nodes, end node.
        originals: Vec<NodeId>,
        inserted_first: NodeId,
        inserted_inner: Vec<NodeId>,
        inserted_last: NodeId,
        before: Option<NodeId>,
        after: Option<NodeId>,
    },
}

impl RevertStep {
    pub fn undo(&self, doc: &mut Document) {
        match self {
            RevertStep::ReplaceSingle {
                original,
                inserted,
                before,
                after,
            } => {
                if let Some(before) = *before {
                    if doc.prev_sibling(*inserted) == Some(before) {
                        doc.detach(before);
                    }
                }
                if let Some(after) = *after {
                    if doc.next_sibling(*inserted) == Some(after) {
                        doc.detach(after);
                    }
                }
                doc.replace(*inserted, *original);
            }
            RevertStep::ReplaceRange {
                originals,
                inserted_first,
                inserted_inner,
                inserted_last,
                before,
                after,
            } => {
                if let Some(before) = *before {
                    doc.detach(before);
                }
                if let Some(after) = *after {
                    doc.detach(after);
                }
                if let Some(first) = originals.first() {
                    doc.replace(*inserted_first, *first);
                }
                if let Some(last) = originals.last() {
                    doc.replace(*inserted_last, *last);
                }
                let inner_originals = originals
                    .iter()
                    .skip(1)
                    .take(originals.len().saturating_sub(2));
                for (inserted, original) in inserted_inner.iter().zip(inner_originals) {
                    doc.replace(*inserted, *original);
                }
            }
        }
    }
}

/// Recorded splices, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevertLog {
    steps: Vec<RevertStep>,
}

impl RevertLog {
    pub fn steps(&self) -> &[RevertStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn push(&mut self, step: RevertStep) {
        self.steps.push(step);
    }

    /// Undoes every step, newest first, and empties the log.
    pub fn revert(&mut self, doc: &mut Document) {
        while let Some(step) = self.steps.pop() {
            step.undo(doc);
        }
    }
}

/// Finds matches in a subtree and replaces them in place.
pub struct Finder<'a> {
    options: FinderOptions<'a>,
    log: RevertLog,
}

impl<'a> Finder<'a> {
    pub fn new(options: FinderOptions<'a>) -> Self {
        Self {
            options,
            log: RevertLog::default(),
        }
    }

    pub fn policy(&self) -> &dyn ContextPolicy {
        self.options.policy.as_ref()
    }

    /// Aggregates the subtree with this finder's policy and searches it.
    pub fn search(
        &self,
        doc: &Document,
        root: NodeId,
        pattern: &Pattern,
    ) -> Result<Vec<Match>, FinderError> {
        let text = aggregate(doc, root, self.policy());
        search(&text, pattern)
    }

    pub fn reverts(&self) -> &RevertLog {
        &self.log
    }

    /// Hands over the recorded steps, leaving this finder with none.
    pub fn take_reverts(&mut self) -> RevertLog {
        mem::take(&mut self.log)
    }

    /// Undoes everything this finder has spliced so far.
    pub fn revert(&mut self, doc: &mut Document) {
        self.log.revert(doc);
    }

    /// Splices `matches` into the subtree at `root`. Returns how many were
    /// replaced. On error, matches replaced before the failing one stay in
    /// place and remain revertible.
    pub fn process(
        &mut self,
        doc: &mut Document,
        root: NodeId,
        mut matches: Vec<Match>,
    ) -> Result<usize, FinderError> {
        if matches.is_empty() {
            return Ok(0);
        }
        match doc.get(root) {
            Some(NodeData::Text(_)) => return Err(FinderError::UnsupportedRoot),
            Some(_) => {}
            None => {
                let first = &matches[0];
                return Err(FinderError::OffsetOutOfRange {
                    index: first.index,
                    start: first.start,
                    end: first.end,
                    len: 0,
                });
            }
        }
        matches.sort_by_key(|m| m.start);

        let visible = visible_len(doc, root, self.policy());
        let mut queue = matches.into_iter();
        let Some(mut current) = queue.next() else {
            return Ok(0);
        };
        check_match(&current, 0, visible)?;

        let mut cur = root;
        let mut stack: Vec<NodeId> = Vec::new();
        let mut at_index = 0usize;
        let mut start: Option<Portion> = None;
        let mut end: Option<Portion> = None;
        let mut inner: Vec<Portion> = Vec::new();
        let mut committed = 0usize;

        'walk: loop {
            if let Some(data) = doc.text(cur) {
                let len = data.len();
                if end.is_none() && at_index + len >= current.end {
                    let from = current.start.saturating_sub(at_index);
                    let to = current.end - at_index;
                    end = Some(Portion {
                        node: cur,
                        index: 0,
                        text: data.get(from..to).unwrap_or("").to_string(),
                        index_in_match: at_index.saturating_sub(current.start),
                        index_in_node: from,
                        end_index_in_node: to,
                        is_end: true,
                    });
                } else if start.is_some() {
                    inner.push(Portion {
                        node: cur,
                        index: inner.len() + 1,
                        text: data.to_string(),
                        index_in_match: at_index - current.start,
                        index_in_node: 0,
                        end_index_in_node: len,
                        is_end: false,
                    });
                }
                if start.is_none() && at_index + len > current.start {
                    let from = current.start - at_index;
                    let to = (current.end - at_index).min(len);
                    start = Some(Portion {
                        node: cur,
                        index: 0,
                        text: data.get(from..to).unwrap_or("").to_string(),
                        index_in_match: 0,
                        index_in_node: from,
                        end_index_in_node: to,
                        is_end: false,
                    });
                }
                at_index += len;
            }

            let avoid = doc
                .element(cur)
                .is_some_and(|el| !self.options.policy.accepts(el));

            if start.is_some() && end.is_some() {
                let (Some(first), Some(last)) = (start.take(), end.take()) else {
                    break 'walk;
                };
                let tail = doc
                    .text(last.node)
                    .map(str::len)
                    .unwrap_or(0)
                    .saturating_sub(last.end_index_in_node);
                let portions = mem::take(&mut inner);
                cur = self.replace_match(doc, &current, first, portions, last)?;
                at_index -= tail;
                committed += 1;

                let previous_end = current.end;
                match queue.next() {
                    Some(next) => {
                        check_match(&next, previous_end, visible)?;
                        current = next;
                    }
                    None => break 'walk,
                }
            } else if !avoid {
                if let Some(child) = doc.first_child(cur) {
                    stack.push(cur);
                    cur = child;
                    continue;
                }
                if cur != root {
                    if let Some(next) = doc.next_sibling(cur) {
                        cur = next;
                        continue;
                    }
                }
            }

            loop {
                if cur != root {
                    if let Some(next) = doc.next_sibling(cur) {
                        cur = next;
                        break;
                    }
                }
                match stack.pop() {
                    Some(parent) if parent != root => cur = parent,
                    _ => break 'walk,
                }
            }
        }

        debug!(committed, visible, "spliced matches");
        Ok(committed)
    }

    fn replace_match(
        &mut self,
        doc: &mut Document,
        m: &Match,
        start: Portion,
        inner: Vec<Portion>,
        mut end: Portion,
    ) -> Result<NodeId, FinderError> {
        let nodes = [start.node, end.node]
            .into_iter()
            .chain(inner.iter().map(|p| p.node));
        for node in nodes {
            if doc.parent(node).is_none() {
                return Err(FinderError::Detached(node));
            }
        }

        if start.node == end.node {
            let node = end.node;
            let data = doc.text(node).unwrap_or("").to_string();
            end.index = 0;

            let before = if start.index_in_node > 0 {
                let text = doc.create_text(data.get(..start.index_in_node).unwrap_or(""));
                doc.insert_before(node, text);
                Some(text)
            } else {
                None
            };
            let inserted = self.portion_node(doc, &end, m);
            doc.insert_before(node, inserted);
            let after = if end.end_index_in_node < data.len() {
                let text = doc.create_text(data.get(end.end_index_in_node..).unwrap_or(""));
                doc.insert_before(node, text);
                Some(text)
            } else {
                None
            };
            doc.detach(node);

            self.log.push(RevertStep::ReplaceSingle {
                original: node,
                inserted,
                before,
                after,
            });
            return Ok(inserted);
        }

        let start_data = doc.text(start.node).unwrap_or("").to_string();
        let end_data = doc.text(end.node).unwrap_or("").to_string();
        end.index = inner.len() + 1;

        let first = self.portion_node(doc, &start, m);
        let mut inserted_inner = Vec::with_capacity(inner.len());
        for portion in &inner {
            let node = self.portion_node(doc, portion, m);
            doc.replace(portion.node, node);
            inserted_inner.push(node);
        }
        let last = self.portion_node(doc, &end, m);

        let before = if start.index_in_node > 0 {
            let text = doc.create_text(start_data.get(..start.index_in_node).unwrap_or(""));
            doc.insert_before(start.node, text);
            Some(text)
        } else {
            None
        };
        doc.insert_before(start.node, first);
        doc.detach(start.node);

        doc.insert_before(end.node, last);
        let after = if end.end_index_in_node < end_data.len() {
            let text = doc.create_text(end_data.get(end.end_index_in_node..).unwrap_or(""));
            doc.insert_before(end.node, text);
            Some(text)
        } else {
            None
        };
        doc.detach(end.node);

        let mut originals = Vec::with_capacity(inner.len() + 2);
        originals.push(start.node);
        originals.extend(inner.iter().map(|p| p.node));
        originals.push(end.node);
        self.log.push(RevertStep::ReplaceRange {
            originals,
            inserted_first: first,
            inserted_inner,
            inserted_last: last,
            before,
            after,
        });
        Ok(last)
    }

    fn portion_node(&mut self, doc: &mut Document, portion: &Portion, m: &Match) -> NodeId {
        match &mut self.options.replace {
            Replace::Factory(factory) => factory(doc, portion, m),
            Replace::Template {
                text,
                wrap,
                wrap_class,
            } => {
                let value = prepare_replacement(text, portion, m, self.options.portion_mode);
                let empty = value.is_empty();
                let text_node = doc.create_text(value);
                let Some(tag) = wrap.as_deref().filter(|_| !empty) else {
                    return text_node;
                };
                let el = doc.create_element(tag);
                if let (Some(class), Some(element)) = (wrap_class.as_deref(), doc.element_mut(el))
                {
                    element.add_class(class);
                }
                doc.append(el, text_node);
                el
            }
        }
    }
}

/// Searches `root` for `pattern` and replaces every match. The returned
/// finder can undo the edits.
pub fn find_and_replace<'a>(
    doc: &mut Document,
    root: NodeId,
    pattern: &Pattern,
    options: FinderOptions<'a>,
) -> Result<Finder<'a>, FinderError> {
    let mut finder = Finder::new(options);
    let matches = finder.search(doc, root, pattern)?;
    finder.process(doc, root, matches)?;
    Ok(finder)
}

fn check_match(m: &Match, previous_end: usize, visible: usize) -> Result<(), FinderError> {
    if m.start >= m.end {
        return Err(FinderError::InvalidPattern {
            pattern: m.text().to_string(),
        });
    }
    if m.end > visible || m.start < previous_end {
        return Err(FinderError::OffsetOutOfRange {
            index: m.index,
            start: m.start,
            end: m.end,
            len: visible,
        });
    }
    Ok(())
}

/// Bytes of text the splice walk will visit under `root`.
fn visible_len(doc: &Document, root: NodeId, policy: &dyn ContextPolicy) -> usize {
    let mut total = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match doc.data(node) {
            NodeData::Text(text) => total += text.len(),
            NodeData::Element(el) if !policy.accepts(el) => {}
            _ => {
                let children: Vec<NodeId> = doc.children(node).collect();
                stack.extend(children.into_iter().rev());
            }
        }
    }
    total
}

fn prepare_replacement(template: &str, portion: &Portion, m: &Match, mode: PortionMode) -> String {
    if mode == PortionMode::First && portion.index_in_match > 0 {
        return String::new();
    }
    let expanded = expand_template(template, m);
    if mode == PortionMode::First {
        return expanded;
    }
    let from = portion.index_in_match;
    if portion.is_end {
        return slice_clamped(&expanded, from, expanded.len()).to_string();
    }
    slice_clamped(&expanded, from, from + portion.text.len()).to_string()
}

fn expand_template(template: &str, m: &Match) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((_, ch)) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.peek().map(|&(_, next)| next) {
            Some('&') => {
                chars.next();
                out.push_str(m.text());
            }
            Some('`') => {
                chars.next();
                out.push_str(m.before());
            }
            Some('\'') => {
                chars.next();
                out.push_str(m.after());
            }
            Some(d) if d.is_ascii_digit() => {
                let mut group = 0usize;
                while let Some(&(_, digit)) = chars.peek() {
                    let Some(value) = digit.to_digit(10) else {
                        break;
                    };
                    group = group.saturating_mul(10).saturating_add(value as usize);
                    chars.next();
                }
                out.push_str(m.group(group).unwrap_or(""));
            }
            _ => out.push('$'),
        }
    }
    out
}

fn slice_clamped(s: &str, from: usize, to: usize) -> &str {
    let floor = |mut i: usize| {
        i = i.min(s.len());
        while !s.is_char_boundary(i) {
            i -= 1;
        }
        i
    };
    let (from, to) = (floor(from), floor(to));
    if from >= to {
        return "";
    }
    &s[from..to]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Isolated;
    use crate::html::inner_html;

    struct Fixture {
        doc: Document,
        root: NodeId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut doc = Document::new();
            let root = doc.create_element("div");
            let top = doc.root();
            doc.append(top, root);
            Self { doc, root }
        }

        fn el(&mut self, parent: NodeId, tag: &str) -> NodeId {
            let id = self.doc.create_element(tag);
            self.doc.append(parent, id);
            id
        }

        fn text(&mut self, parent: NodeId, text: &str) -> NodeId {
            let id = self.doc.create_text(text);
            self.doc.append(parent, id);
            id
        }

        fn html(&self) -> String {
            inner_html(&self.doc, self.root)
        }
    }

    fn run(fx: &mut Fixture, pattern: &str, options: FinderOptions<'static>) -> Finder<'static> {
        let pattern = Pattern::parse(pattern, true).unwrap();
        find_and_replace(&mut fx.doc, fx.root, &pattern, options).unwrap()
    }

    #[test]
    fn replaces_inside_a_single_node() {
        let mut fx = Fixture::new();
        let root = fx.root;
        fx.text(root, "I am an addict.");
        run(&mut fx, "addict", FinderOptions::default().replace(Replace::wrap("mark", None)));
        assert_eq!(fx.html(), "I am an <mark>addict</mark>.");
        assert_eq!(fx.doc.children(root).count(), 3);
    }

    #[test]
    fn match_at_node_edges_adds_no_leftovers() {
        let mut fx = Fixture::new();
        let root = fx.root;
        fx.text(root, "addict");
        run(&mut fx, "addict", FinderOptions::default().replace(Replace::wrap("mark", None)));
        assert_eq!(fx.html(), "<mark>addict</mark>");
        assert_eq!(fx.doc.children(root).count(), 1);
    }

    #[test]
    fn several_matches_in_one_node() {
        let mut fx = Fixture::new();
        let root = fx.root;
        fx.text(root, "a-b-a-b");
        let finder = run(&mut fx, "a", FinderOptions::default().replace(Replace::template("X")));
        assert_eq!(fx.doc.text_content(root), "X-b-X-b");
        assert_eq!(finder.reverts().len(), 2);
    }

    #[test]
    fn spans_inline_siblings_with_portions() {
        let mut fx = Fixture::new();
        let root = fx.root;
        let b = fx.el(root, "b");
        fx.text(b, "xbasket");
        fx.text(root, " ca");
        let i = fx.el(root, "i");
        fx.text(i, "se!");
        run(
            &mut fx,
            "basket case",
            FinderOptions::default().replace(Replace::wrap("mark", Some("hit"))),
        );
        assert_eq!(
            fx.html(),
            r#"<b>x<mark class="hit">basket</mark></b><mark class="hit"> ca</mark><i><mark class="hit">se</mark>!</i>"#
        );
    }

    #[test]
    fn first_portion_mode_puts_everything_up_front() {
        let mut fx = Fixture::new();
        let root = fx.root;
        let b = fx.el(root, "b");
        fx.text(b, "basket");
        fx.text(root, " case");
        run(
            &mut fx,
            "basket case",
            FinderOptions::default()
                .replace(Replace::template("nutcase"))
                .portion_mode(PortionMode::First),
        );
        assert_eq!(fx.html(), "<b>nutcase</b>");
    }

    #[test]
    fn retain_mode_slices_template_across_portions() {
        let mut fx = Fixture::new();
        let root = fx.root;
        let b = fx.el(root, "b");
        fx.text(b, "ab");
        fx.text(root, "cd");
        run(&mut fx, "abcd", FinderOptions::default().replace(Replace::template("WXYZ!")));
        assert_eq!(fx.html(), "<b>WX</b>YZ!");
    }

    #[test]
    fn template_placeholders() {
        let mut fx = Fixture::new();
        let root = fx.root;
        fx.text(root, "say bob@home ok");
        run(
            &mut fx,
            r"(\w+)@(\w+)",
            FinderOptions::default().replace(Replace::template("[$2:$1|$`|$'|$&|$9|$x]")),
        );
        assert_eq!(
            fx.doc.text_content(root),
            "say [home:bob|say | ok|bob@home||$x] ok"
        );
    }

    #[test]
    fn factory_sees_each_portion() {
        let mut fx = Fixture::new();
        let root = fx.root;
        let b = fx.el(root, "b");
        fx.text(b, "bas");
        fx.text(root, "ket");
        let mut seen = Vec::new();
        {
            let options = FinderOptions::default().replace(Replace::factory(|doc, portion, m| {
                seen.push((portion.index, portion.text.clone(), portion.is_end, m.index));
                doc.create_text(portion.text.to_uppercase())
            }));
            let pattern = Pattern::parse("basket", true).unwrap();
            find_and_replace(&mut fx.doc, root, &pattern, options).unwrap();
        }
        assert_eq!(
            seen,
            vec![
                (0, "bas".to_string(), false, 0),
                (1, "ket".to_string(), true, 0)
            ]
        );
        assert_eq!(fx.doc.text_content(root), "BASKET");
    }

    #[test]
    fn inner_portions_are_replaced_whole() {
        let mut fx = Fixture::new();
        let root = fx.root;
        fx.text(root, "one t");
        let em = fx.el(root, "em");
        fx.text(em, "w");
        fx.text(root, "o three");
        let finder = run(&mut fx, "two", FinderOptions::default().replace(Replace::template("2")));
        assert_eq!(fx.doc.text_content(root), "one 2 three");
        match &finder.reverts().steps()[0] {
            RevertStep::ReplaceRange {
                originals,
                inserted_inner,
                ..
            } => {
                assert_eq!(originals.len(), 3);
                assert_eq!(inserted_inner.len(), 1);
            }
            other => panic!("expected range step, got {other:?}"),
        }
    }

    #[test]
    fn skips_filtered_elements_while_walking() {
        let mut fx = Fixture::new();
        let root = fx.root;
        let script = fx.el(root, "script");
        fx.text(script, "addict");
        fx.text(root, "addict");
        run(
            &mut fx,
            "addict",
            FinderOptions::prose().replace(Replace::wrap("mark", None)),
        );
        assert_eq!(fx.html(), "<script>addict</script><mark>addict</mark>");
    }

    #[test]
    fn revert_restores_single_node_splices() {
        let mut fx = Fixture::new();
        let root = fx.root;
        fx.text(root, "I am an addict. addict");
        let before = fx.doc.outline(root);
        let mut finder = run(&mut fx, "addict", FinderOptions::default().replace(Replace::wrap("mark", None)));
        assert_ne!(before, fx.doc.outline(root));
        finder.revert(&mut fx.doc);
        assert_eq!(before, fx.doc.outline(root));
        assert!(finder.reverts().is_empty());
    }

    #[test]
    fn revert_restores_range_splices() {
        let mut fx = Fixture::new();
        let root = fx.root;
        fx.text(root, "a basket");
        let b = fx.el(root, "b");
        fx.text(b, " ca");
        fx.text(root, "se here");
        let before = fx.doc.outline(root);
        let mut finder = run(&mut fx, "basket case", FinderOptions::default().replace(Replace::wrap("mark", None)));
        assert_eq!(fx.doc.text_content(root), "a basket case here");
        finder.revert(&mut fx.doc);
        assert_eq!(before, fx.doc.outline(root));
    }

    #[test]
    fn never_splices_across_forced_contexts() {
        let mut fx = Fixture::new();
        let root = fx.root;
        let p1 = fx.el(root, "p");
        fx.text(p1, "basket");
        let p2 = fx.el(root, "p");
        fx.text(p2, " case");
        let finder = run(&mut fx, "basket case", FinderOptions::default().policy(Isolated));
        assert!(finder.reverts().is_empty());
    }

    #[test]
    fn out_of_range_offsets_are_fatal_after_earlier_commits() {
        let mut fx = Fixture::new();
        let root = fx.root;
        fx.text(root, "ab ab");
        let pattern = Pattern::parse("ab", true).unwrap();
        let mut finder = Finder::new(FinderOptions::default().replace(Replace::template("X")));
        let mut matches = finder.search(&fx.doc, root, &pattern).unwrap();
        let mut bogus = matches[1].clone();
        bogus.index = 2;
        bogus.start = 40;
        bogus.end = 42;
        matches.push(bogus);
        let err = finder.process(&mut fx.doc, root, matches).unwrap_err();
        assert!(matches!(err, FinderError::OffsetOutOfRange { index: 2, .. }));
        assert_eq!(fx.doc.text_content(root), "X X");
        finder.revert(&mut fx.doc);
        assert_eq!(fx.doc.text_content(root), "ab ab");
    }

    #[test]
    fn zero_length_matches_never_splice() {
        let mut fx = Fixture::new();
        let root = fx.root;
        fx.text(root, "abc");
        let pattern = Pattern::parse("b", true).unwrap();
        let mut finder = Finder::new(FinderOptions::default());
        let mut matches = finder.search(&fx.doc, root, &pattern).unwrap();
        matches[0].end = matches[0].start;
        assert!(matches!(
            finder.process(&mut fx.doc, root, matches),
            Err(FinderError::InvalidPattern { .. })
        ));
        assert_eq!(fx.doc.children(root).count(), 1);
    }

    #[test]
    fn text_roots_are_rejected() {
        let mut fx = Fixture::new();
        let root = fx.root;
        let t = fx.text(root, "abc");
        let pattern = Pattern::parse("b", true).unwrap();
        let mut finder = Finder::new(FinderOptions::default());
        let matches = finder.search(&fx.doc, t, &pattern).unwrap();
        assert_eq!(
            finder.process(&mut fx.doc, t, matches),
            Err(FinderError::UnsupportedRoot)
        );
    }

    #[test]
    fn handles_deep_trees_iteratively() {
        let mut fx = Fixture::new();
        let mut parent = fx.root;
        for _ in 0..20_000 {
            parent = fx.el(parent, "span");
        }
        fx.text(parent, "deep addict");
        let root = fx.root;
        run(&mut fx, "addict", FinderOptions::default().replace(Replace::template("X")));
        assert_eq!(fx.doc.text_content(root), "deep X");
    }

    #[test]
    fn slices_respect_char_boundaries() {
        assert_eq!(slice_clamped("héllo", 0, 2), "h");
        assert_eq!(slice_clamped("héllo", 1, 3), "é");
        assert_eq!(slice_clamped("abc", 5, 9), "");
    }
}
