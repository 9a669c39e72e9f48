use std::fmt;

use regex::{Regex, RegexBuilder};
use thiserror::Error;
use watcher_logging::watcher_warn;

/// Built-in rule used when nothing valid is stored.
pub const DEFAULT_PATTERN: &str = r"/pageimg\d+\.jpg";

const LITERAL_FLAGS: &str = "dgimsuy";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid pattern {source_text:?}: {message}")]
pub struct ValidationError {
    pub source_text: String,
    pub message: String,
}

/// A compiled, case-insensitive URL rule together with the text it came from.
#[derive(Clone)]
pub struct MatchRule {
    source: String,
    regex: Regex,
}

impl MatchRule {
    /// Compiles `source`, accepting either a bare expression or the
    /// `/body/flags` literal form.
    pub fn compile(source: &str) -> Result<Self, ValidationError> {
        let (body, dot_all) = match split_literal(source) {
            Some((body, flags)) => (body, flags.contains('s')),
            None => (source, false),
        };
        let regex = RegexBuilder::new(body)
            .case_insensitive(true)
            .dot_matches_new_line(dot_all)
            .build()
            .map_err(|err| ValidationError {
                source_text: source.to_string(),
                message: err.to_string(),
            })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }
}

impl fmt::Debug for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchRule")
            .field("source", &self.source)
            .finish()
    }
}

impl PartialEq for MatchRule {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for MatchRule {}

/// `/body/flags` with at least one flag letter; anything else is a bare pattern.
fn split_literal(source: &str) -> Option<(&str, &str)> {
    let rest = source.strip_prefix('/')?;
    let close = rest.rfind('/')?;
    let (body, flags) = (&rest[..close], &rest[close + 1..]);
    if body.is_empty() || flags.is_empty() {
        return None;
    }
    if flags.chars().all(|c| LITERAL_FLAGS.contains(c)) {
        Some((body, flags))
    } else {
        None
    }
}

/// Holder of the single active rule.
///
/// Rules use the `regex` crate syntax. Lookaround (`(?=..)`, `(?!..)`,
/// `(?<=..)`) and backreferences (`\1`) are not supported; such text fails
/// validation and the current rule stays in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternStore {
    current: MatchRule,
}

impl PatternStore {
    pub fn new(rule: MatchRule) -> Self {
        Self { current: rule }
    }

    /// Store holding the built-in rule.
    pub fn with_default() -> Self {
        Self::new(default_rule())
    }

    /// Builds the store from previously saved text.
    ///
    /// Returns `true` alongside the store when the saved text was unusable and
    /// the default had to be substituted, so the caller can overwrite it.
    pub fn from_stored(stored: Option<&str>) -> (Self, bool) {
        let Some(text) = stored else {
            return (Self::with_default(), false);
        };
        match MatchRule::compile(text) {
            Ok(rule) => (Self::new(rule), false),
            Err(err) => {
                watcher_warn!(
                    "Stored pattern {:?} does not compile, using default {}: {}",
                    text,
                    DEFAULT_PATTERN,
                    err.message
                );
                (Self::with_default(), true)
            }
        }
    }

    pub fn current_rule(&self) -> &MatchRule {
        &self.current
    }

    /// Replaces the active rule if `source` compiles; otherwise the prior rule stays.
    pub fn set_rule(&mut self, source: &str) -> Result<&MatchRule, ValidationError> {
        let rule = MatchRule::compile(source)?;
        self.current = rule;
        Ok(&self.current)
    }
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::with_default()
    }
}

fn default_rule() -> MatchRule {
    match MatchRule::compile(DEFAULT_PATTERN) {
        Ok(rule) => rule,
        Err(err) => unreachable!("built-in pattern must compile: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_pattern_is_case_insensitive() {
        let rule = MatchRule::compile(r"img\d+\.png").unwrap();
        assert!(rule.is_match("http://h/IMG12.PNG"));
        assert!(!rule.is_match("http://h/img.png"));
    }

    #[test]
    fn literal_form_strips_delimiters() {
        let rule = MatchRule::compile(r"/img\d+\.png/i").unwrap();
        assert_eq!(rule.source(), r"/img\d+\.png/i");
        assert!(rule.is_match("http://h/img1.png?x=1"));
        assert!(rule.is_match("http://h/IMG22.png"));
        assert!(!rule.is_match("http://h/img.png"));
    }

    #[test]
    fn leading_slash_without_flags_is_bare() {
        assert_eq!(split_literal(r"/pageimg\d+\.jpg"), None);
        assert_eq!(split_literal("/images/"), None);
        assert_eq!(split_literal("/a/b/x"), None);
        assert_eq!(split_literal("/a/gi"), Some(("a", "gi")));
    }

    #[test]
    fn default_rule_matches_page_images() {
        let store = PatternStore::with_default();
        assert_eq!(store.current_rule().source(), DEFAULT_PATTERN);
        assert!(store
            .current_rule()
            .is_match("https://viewer.example/doc/PageImg3.JPG?token=1"));
    }

    #[test]
    fn invalid_rule_keeps_previous() {
        let mut store = PatternStore::with_default();
        let err = store.set_rule("img(").unwrap_err();
        assert_eq!(err.source_text, "img(");
        assert!(!err.message.is_empty());
        assert_eq!(store.current_rule().source(), DEFAULT_PATTERN);
    }

    #[test]
    fn lookaround_and_backreferences_are_rejected() {
        let mut store = PatternStore::with_default();
        store.set_rule(r"img\d+").unwrap();
        for source in [r"(a)\1", r"img(?=\.png)", r"(?<!thumb)\.jpg", r"/(?!x)y/i"] {
            let err = store.set_rule(source).unwrap_err();
            assert_eq!(err.source_text, source);
            assert_eq!(store.current_rule().source(), r"img\d+");
        }
    }

    #[test]
    fn stored_text_falls_back_when_broken() {
        let (store, replaced) = PatternStore::from_stored(Some("[unclosed"));
        assert!(replaced);
        assert_eq!(store.current_rule().source(), DEFAULT_PATTERN);

        let (store, replaced) = PatternStore::from_stored(None);
        assert!(!replaced);
        assert_eq!(store.current_rule().source(), DEFAULT_PATTERN);

        let (store, replaced) = PatternStore::from_stored(Some(r"\.webp$"));
        assert!(!replaced);
        assert_eq!(store.current_rule().source(), r"\.webp$");
    }
}
