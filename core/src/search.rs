//! Pattern matching over aggregated text.

use std::sync::Arc;

use regex::{Captures, Regex, RegexBuilder};

use crate::aggregate::AggregatedText;
use crate::error::FinderError;

/// A compiled regex plus whether every match in a context is wanted
/// (`global`) or only the first one.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    global: bool,
}

impl Pattern {
    /// Wraps a compiled regex. Regexes that match the empty string are
    /// rejected up front.
    pub fn new(regex: Regex, global: bool) -> Result<Self, FinderError> {
        if regex.is_match("") {
            return Err(FinderError::InvalidPattern {
                pattern: regex.as_str().to_string(),
            });
        }
        Ok(Self { regex, global })
    }

    /// Compiles `source` as a regex.
    pub fn parse(source: &str, global: bool) -> Result<Self, FinderError> {
        let regex = Regex::new(source).map_err(|e| FinderError::Regex {
            pattern: source.to_string(),
            message: e.to_string(),
        })?;
        Self::new(regex, global)
    }

    /// Matches `text` literally, everywhere.
    pub fn literal(text: &str) -> Result<Self, FinderError> {
        Self::parse(&regex::escape(text), true)
    }

    /// Whole-word, case-insensitive, global. A `\b` is only added on a side
    /// whose edge character is a word character, otherwise terms such as
    /// `ok!` could never match.
    pub fn word(word: &str) -> Result<Self, FinderError> {
        let trimmed = word.trim();
        let mut source = String::with_capacity(trimmed.len() + 4);
        if trimmed.chars().next().is_some_and(is_word_char) {
            source.push_str(r"\b");
        }
        source.push_str(&regex::escape(trimmed));
        if trimmed.chars().next_back().is_some_and(is_word_char) {
            source.push_str(r"\b");
        }
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| FinderError::Regex {
                pattern: source.clone(),
                message: e.to_string(),
            })?;
        Self::new(regex, true)
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// One match against the flattened text stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Ordinal among the matches of one search, from zero.
    pub index: usize,
    /// Byte offset of the first matched byte in the flattened stream.
    pub start: usize,
    /// Byte offset one past the last matched byte.
    pub end: usize,
    /// `groups[0]` is the whole match, then numbered capture groups.
    pub groups: Vec<Option<String>>,
    /// The context the match was found in.
    pub context: Arc<str>,
    /// Stream offset of the first byte of `context`.
    pub context_start: usize,
}

impl Match {
    pub fn text(&self) -> &str {
        self.group(0).unwrap_or("")
    }

    pub fn group(&self, n: usize) -> Option<&str> {
        self.groups.get(n).and_then(|g| g.as_deref())
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Context text before the match.
    pub fn before(&self) -> &str {
        let local = self.start.saturating_sub(self.context_start);
        self.context.get(..local).unwrap_or("")
    }

    /// Context text after the match.
    pub fn after(&self) -> &str {
        let local = self.end.saturating_sub(self.context_start);
        self.context.get(local..).unwrap_or("")
    }
}

/// Runs `pattern` over every leaf context of `text`, in document order.
pub fn search(text: &AggregatedText, pattern: &Pattern) -> Result<Vec<Match>, FinderError> {
    let mut matches = Vec::new();
    let mut offset = 0usize;

    for leaf in text.leaves() {
        let mut context: Option<Arc<str>> = None;
        let mut push = |caps: Captures<'_>, matches: &mut Vec<Match>| -> Result<(), FinderError> {
            let Some(whole) = caps.get(0) else {
                return Ok(());
            };
            if whole.start() == whole.end() {
                return Err(FinderError::InvalidPattern {
                    pattern: pattern.as_str().to_string(),
                });
            }
            let context = context.get_or_insert_with(|| Arc::from(leaf)).clone();
            matches.push(Match {
                index: matches.len(),
                start: offset + whole.start(),
                end: offset + whole.end(),
                groups: caps
                    .iter()
                    .map(|g| g.map(|m| m.as_str().to_string()))
                    .collect(),
                context,
                context_start: offset,
            });
            Ok(())
        };

        if pattern.global {
            for caps in pattern.regex.captures_iter(leaf) {
                push(caps, &mut matches)?;
            }
        } else if let Some(caps) = pattern.regex.captures(leaf) {
            push(caps, &mut matches)?;
        }

        offset += leaf.len();
    }

    Ok(matches)
}
