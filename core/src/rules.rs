//! Word rules: loading, validation, and the bundled default list.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FinderError, RuleError};
use crate::search::Pattern;

/// A word or phrase to flag, with its suggested alternative and a note
/// explaining the suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(alias = "word")]
    pub pattern: String,
    #[serde(alias = "alt")]
    pub alternative: String,
    #[serde(alias = "context")]
    pub note: String,
}

impl Rule {
    pub fn new(
        pattern: impl Into<String>,
        alternative: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            alternative: alternative.into(),
            note: note.into(),
        }
    }

    /// Whole-word, case-insensitive pattern for this rule's term.
    pub fn compile(&self) -> Result<Pattern, FinderError> {
        word_pattern(&self.pattern)
    }
}

/// See [`Pattern::word`].
pub fn word_pattern(word: &str) -> Result<Pattern, FinderError> {
    Pattern::word(word)
}

/// Rules that loaded plus the entries that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleLoad {
    pub rules: Vec<Rule>,
    pub rejected: Vec<RuleError>,
}

static BUILTIN: Lazy<Vec<Rule>> = Lazy::new(|| {
    let load = load_rules_json(include_str!("../data/rules.json")).unwrap_or_default();
    for err in &load.rejected {
        warn!(%err, "bundled rule skipped");
    }
    load.rules
});

/// The bundled default rule list.
pub fn builtin_rules() -> &'static [Rule] {
    &BUILTIN
}

/// Loads a JSON array of rules. Bad entries are collected in
/// [`RuleLoad::rejected`] and the rest still load.
pub fn load_rules_json(text: &str) -> Result<RuleLoad, RuleError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| RuleError::Parse(e.to_string()))?;
    let serde_json::Value::Array(items) = value else {
        return Err(RuleError::Parse("expected an array of rules".into()));
    };
    Ok(collect(items.into_iter().enumerate().map(|(index, item)| {
        serde_json::from_value::<Rule>(item).map_err(|e| malformed(index, e.to_string()))
    })))
}

/// YAML counterpart of [`load_rules_json`]. A top-level `rules:` key is also
/// accepted.
pub fn load_rules_yaml(text: &str) -> Result<RuleLoad, RuleError> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| RuleError::Parse(e.to_string()))?;
    let value = match value {
        serde_yaml::Value::Mapping(mut map) => map
            .remove("rules")
            .ok_or_else(|| RuleError::Parse("expected a `rules` list".into()))?,
        other => other,
    };
    let serde_yaml::Value::Sequence(items) = value else {
        return Err(RuleError::Parse("expected a list of rules".into()));
    };
    Ok(collect(items.into_iter().enumerate().map(|(index, item)| {
        serde_yaml::from_value::<Rule>(item).map_err(|e| malformed(index, e.to_string()))
    })))
}

fn malformed(index: usize, reason: String) -> RuleError {
    RuleError::MalformedRule { index, reason }
}

fn collect<I>(entries: I) -> RuleLoad
where
    I: Iterator<Item = Result<Rule, RuleError>>,
{
    let mut load = RuleLoad::default();
    for (index, entry) in entries.enumerate() {
        match entry.and_then(|rule| validate(index, rule)) {
            Ok(rule) => load.rules.push(rule),
            Err(err) => {
                warn!(%err, "skipping rule");
                load.rejected.push(err);
            }
        }
    }
    load
}

fn validate(index: usize, rule: Rule) -> Result<Rule, RuleError> {
    if rule.pattern.trim().is_empty() {
        return Err(malformed(index, "pattern is empty".into()));
    }
    Ok(rule)
}
