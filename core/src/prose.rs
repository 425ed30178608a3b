//! Element sets for matching running prose.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::aggregate::ContextPolicy;
use crate::dom::Element;

/// Elements whose contents are never prose.
pub static NON_PROSE_ELEMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "br", "hr",
        // media / source
        "script", "style", "img", "video", "audio", "canvas", "svg", "map", "object",
        // form controls
        "input", "textarea", "select", "option", "optgroup", "button",
        // inert
        "noscript", "template",
    ]
    .into_iter()
    .collect()
});

/// Elements a match must not run across.
pub static NON_CONTIGUOUS_PROSE_ELEMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // block
        "address", "article", "aside", "blockquote", "dd", "div", "dl", "fieldset",
        "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
        "hgroup", "hr", "main", "nav", "noscript", "ol", "output", "p", "pre", "section", "ul",
        // misc non-inline
        "br", "li", "summary", "dt", "details", "rp", "rt", "rtc",
        // media / source
        "script", "style", "img", "video", "audio", "canvas", "svg", "map", "object",
        // form controls
        "input", "textarea", "select", "option", "optgroup", "button",
        // tables
        "table", "tbody", "thead", "th", "tr", "td", "caption", "col", "tfoot", "colgroup",
    ]
    .into_iter()
    .collect()
});

/// Prose matching: skip non-prose elements and anything carrying one of
/// `skip_classes`, and split contexts at block-level elements.
#[derive(Debug, Clone, Default)]
pub struct Prose {
    pub skip_classes: Vec<String>,
}

impl Prose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipping<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skip_classes: classes.into_iter().map(Into::into).collect(),
        }
    }
}

impl ContextPolicy for Prose {
    fn accepts(&self, el: &Element) -> bool {
        if NON_PROSE_ELEMENTS.contains(el.tag.as_str()) {
            return false;
        }
        !self.skip_classes.iter().any(|class| el.has_class(class))
    }

    fn forces_context(&self, el: &Element) -> bool {
        NON_CONTIGUOUS_PROSE_ELEMENTS.contains(el.tag.as_str())
    }
}
