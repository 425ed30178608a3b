//! Evergreen core engine.
//! Finds configured words and phrases in the rendered text of an HTML
//! document and swaps each occurrence for an inline widget that shows the
//! original term next to a suggested alternative and an explanatory note.
//!
//! The pipeline per rule is aggregate → search → splice:
//! [`aggregate`] groups the visible text by block context, [`search`] finds
//! matches in that text, and [`Finder::process`] maps each match back onto
//! the text nodes it covers and replaces exactly that span.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub mod aggregate;
pub mod dom;
pub mod error;
pub mod html;
pub mod prose;
pub mod rules;
pub mod search;
pub mod splice;
pub mod widget;

pub use aggregate::{aggregate, AggregatedText, AllElements, ContextPolicy, Isolated};
pub use dom::{Document, Element, Namespace, NodeData, NodeId};
pub use error::{FinderError, RuleError};
pub use html::{inner_html, node_to_html, parse_html, to_html};
pub use prose::Prose;
pub use rules::{
    builtin_rules, load_rules_json, load_rules_yaml, word_pattern, Rule, RuleLoad,
};
pub use search::{search, Match, Pattern};
pub use splice::{
    find_and_replace, Finder, FinderOptions, Portion, PortionMode, Replace, RevertLog,
    RevertStep,
};
pub use widget::{build_widget, widget_replace, WidgetConfig};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// When false the engine is not run at all.
    pub enabled: bool,
    /// Start from the bundled word list.
    pub builtin_rules: bool,
    /// Extra rules, JSON or YAML by extension. Relative paths resolve against
    /// the config file's directory.
    pub rules_file: Option<PathBuf>,
    /// Classes whose elements are never matched, on top of the widget
    /// container class.
    pub skip_classes: Vec<String>,
    pub widget: WidgetConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            builtin_rules: true,
            rules_file: None,
            skip_classes: Vec::new(),
            widget: WidgetConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(text).context("invalid config structure")
    }

    /// Reads the rule list this config points at: the bundled rules (when
    /// enabled) followed by `rules_file`.
    pub fn load_rules(&self, base_dir: &Path) -> anyhow::Result<RuleLoad> {
        let mut load = RuleLoad::default();
        if self.builtin_rules {
            load.rules.extend_from_slice(builtin_rules());
        }
        if let Some(file) = &self.rules_file {
            let path = if file.is_absolute() {
                file.clone()
            } else {
                base_dir.join(file)
            };
            let extra = load_rules_file(&path)?;
            load.rules.extend(extra.rules);
            load.rejected.extend(extra.rejected);
        }
        Ok(load)
    }

    fn skip_classes(&self) -> Vec<String> {
        let mut classes = self.skip_classes.clone();
        if !classes.contains(&self.widget.container_class) {
            classes.push(self.widget.container_class.clone());
        }
        classes
    }
}

/// Loads a rule file, picking the format from its extension.
pub fn load_rules_file(path: &Path) -> anyhow::Result<RuleLoad> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read rules {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let load = if is_json {
        load_rules_json(&text)
    } else {
        load_rules_yaml(&text)
    };
    load.with_context(|| format!("Failed to parse rules {}", path.display()))
}

/// Replacement count for one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub pattern: String,
    pub alternative: String,
    pub replacements: usize,
}

/// A rule that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub pattern: String,
    pub error: FinderError,
}

/// Result of one rewrite pass. Holds what is needed to undo it.
#[derive(Debug, Default)]
pub struct Rewrite {
    pub outcomes: Vec<RuleOutcome>,
    pub failures: Vec<RuleFailure>,
    journal: Vec<RevertLog>,
}

impl Rewrite {
    pub fn total_replacements(&self) -> usize {
        self.outcomes.iter().map(|o| o.replacements).sum()
    }

    /// Outcomes with at least one replacement.
    pub fn applied(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| o.replacements > 0)
    }

    /// Undoes every rule of this pass, last rule first.
    pub fn revert(&mut self, doc: &mut Document) {
        while let Some(mut log) = self.journal.pop() {
            log.revert(doc);
        }
        for outcome in &mut self.outcomes {
            outcome.replacements = 0;
        }
    }
}

/// Applies a rule list to documents.
pub struct Rewriter {
    config: Config,
    compiled: Vec<(Rule, Pattern)>,
    invalid: Vec<RuleFailure>,
}

impl Rewriter {
    /// Compiles every rule. Rules whose pattern cannot be compiled are kept
    /// aside in [`invalid_rules`](Self::invalid_rules) and never run.
    pub fn new(config: Config, rules: impl IntoIterator<Item = Rule>) -> Self {
        let mut compiled = Vec::new();
        let mut invalid = Vec::new();
        for rule in rules {
            match rule.compile() {
                Ok(pattern) => compiled.push((rule, pattern)),
                Err(error) => {
                    warn!(pattern = %rule.pattern, %error, "skipping rule");
                    invalid.push(RuleFailure {
                        pattern: rule.pattern,
                        error,
                    });
                }
            }
        }
        Self {
            config,
            compiled,
            invalid,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.compiled.iter().map(|(rule, _)| rule)
    }

    pub fn invalid_rules(&self) -> &[RuleFailure] {
        &self.invalid
    }

    /// Rewrites `<body>`, or the whole document when there is none.
    pub fn rewrite(&self, doc: &mut Document) -> Rewrite {
        let root = doc.body().unwrap_or_else(|| doc.root());
        self.rewrite_node(doc, root)
    }

    /// Runs every rule, in order, against the subtree at `root`. Each rule
    /// sees the tree as the previous rule left it. A rule that fails is
    /// recorded and the remaining rules still run.
    pub fn rewrite_node(&self, doc: &mut Document, root: NodeId) -> Rewrite {
        let mut rewrite = Rewrite::default();
        if !self.config.enabled {
            debug!("rewriting disabled");
            return rewrite;
        }

        let skip = self.config.skip_classes();
        for (rule, pattern) in &self.compiled {
            let options = FinderOptions::default()
                .policy(Prose::skipping(skip.iter().cloned()))
                .replace(widget_replace(&self.config.widget, rule));
            let mut finder = Finder::new(options);
            let result = finder
                .search(doc, root, pattern)
                .and_then(|matches| finder.process(doc, root, matches));
            let log = finder.take_reverts();

            let replacements = match result {
                Ok(count) => count,
                Err(error) => {
                    warn!(pattern = %rule.pattern, %error, "rule failed");
                    rewrite.failures.push(RuleFailure {
                        pattern: rule.pattern.clone(),
                        error,
                    });
                    log.len()
                }
            };
            if replacements > 0 {
                debug!(pattern = %rule.pattern, replacements, "rule applied");
            }
            rewrite.outcomes.push(RuleOutcome {
                pattern: rule.pattern.clone(),
                alternative: rule.alternative.clone(),
                replacements,
            });
            if !log.is_empty() {
                rewrite.journal.push(log);
            }
        }

        info!(
            rules = self.compiled.len(),
            replacements = rewrite.total_replacements(),
            failures = rewrite.failures.len(),
            "rewrite finished"
        );
        rewrite
    }

    /// Parses `html`, rewrites it, and serializes the result.
    pub fn rewrite_html(&self, html: &str) -> (String, Rewrite) {
        let mut doc = parse_html(html);
        let rewrite = self.rewrite(&mut doc);
        (to_html(&doc), rewrite)
    }
}
