//! The inline suggestion widget that replaces a matched term.

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId};
use crate::rules::Rule;
use crate::splice::{Portion, Replace};

/// Class and attribute names stamped onto generated widgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    pub container_class: String,
    pub marked_class: String,
    pub alternative_class: String,
    pub note_attribute: String,
    pub original_attribute: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            container_class: "haramContainer".into(),
            marked_class: "haram".into(),
            alternative_class: "halal".into(),
            note_attribute: "data-tooltip".into(),
            original_attribute: "original".into(),
        }
    }
}

/// Builds a detached widget:
///
/// ```html
/// <span data-tooltip="{note}" original="{matched}" class="{container}">
///   <span class="{marked}">{matched}</span>
///   <span class="{alternative}">{alternative}</span>
/// </span>
/// ```
pub fn build_widget(doc: &mut Document, cfg: &WidgetConfig, matched: &str, rule: &Rule) -> NodeId {
    let container = doc.create_element("span");
    if let Some(el) = doc.element_mut(container) {
        el.set_attr(&cfg.note_attribute, rule.note.as_str());
        el.set_attr(&cfg.original_attribute, matched);
        el.add_class(&cfg.container_class);
    }

    let marked = labelled_span(doc, &cfg.marked_class, matched);
    doc.append(container, marked);
    let alternative = labelled_span(doc, &cfg.alternative_class, &rule.alternative);
    doc.append(container, alternative);
    container
}

fn labelled_span(doc: &mut Document, class: &str, text: &str) -> NodeId {
    let span = doc.create_element("span");
    if let Some(el) = doc.element_mut(span) {
        el.add_class(class);
    }
    let text = doc.create_text(text);
    doc.append(span, text);
    span
}

/// Replacement that puts one widget at the first portion of each match and
/// leaves the remaining portions empty.
pub fn widget_replace<'a>(cfg: &'a WidgetConfig, rule: &'a Rule) -> Replace<'a> {
    Replace::factory(move |doc: &mut Document, portion: &Portion, m| {
        if portion.is_first() {
            build_widget(doc, cfg, m.text(), rule)
        } else {
            doc.create_text("")
        }
    })
}
