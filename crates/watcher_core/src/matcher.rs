use std::fmt;

use url::Url;

use crate::pattern::MatchRule;

/// Name used when a URL ends in `/` and has no final segment.
pub const FALLBACK_NAME: &str = "index";

/// Deduplication identity of a resource: its URL without the query string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn from_url(url: &str) -> Self {
        let end = url.find('?').unwrap_or(url.len());
        Self(url[..end].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMatch {
    pub key: CanonicalKey,
    pub name: String,
}

/// Decides whether `url` is of interest under `rule`.
///
/// Only absolute URLs with a host are considered; relative references and
/// other text never produce a match, whatever the rule says.
pub fn evaluate(url: &str, rule: &MatchRule) -> Option<ResourceMatch> {
    if url.trim().is_empty() || url.chars().any(char::is_control) {
        return None;
    }
    if !is_well_formed(url) {
        return None;
    }
    if !rule.is_match(url) {
        return None;
    }
    let key = CanonicalKey::from_url(url);
    if key.as_str().is_empty() {
        return None;
    }
    let name = match key.as_str().rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => FALLBACK_NAME.to_string(),
    };
    Some(ResourceMatch { key, name })
}

fn is_well_formed(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.has_host(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(source: &str) -> MatchRule {
        MatchRule::compile(source).unwrap()
    }

    #[test]
    fn query_string_does_not_change_key() {
        let rule = rule(r"/img\d+\.png/i");
        let a = evaluate("http://h/img1.png?x=1", &rule).unwrap();
        let b = evaluate("http://h/img1.png?x=2&y=3", &rule).unwrap();
        let c = evaluate("http://h/img1.png", &rule).unwrap();
        assert_eq!(a.key, b.key);
        assert_eq!(a.key, c.key);
        assert_eq!(a.key.as_str(), "http://h/img1.png");
        assert_eq!(a.name, "img1.png");
    }

    #[test]
    fn rejects_empty_and_control_characters() {
        let rule = rule(".*");
        assert_eq!(evaluate("", &rule), None);
        assert_eq!(evaluate("   ", &rule), None);
        assert_eq!(evaluate("http://h/a\n.png", &rule), None);
    }

    #[test]
    fn rejects_malformed_urls() {
        let rule = rule(".*");
        assert_eq!(evaluate("?x", &rule), None);
        assert_eq!(evaluate("img1.png", &rule), None);
        assert_eq!(evaluate("/pages/pageimg1.jpg", &rule), None);
        assert_eq!(evaluate("not a url", &rule), None);
        assert_eq!(evaluate("http://", &rule), None);
        assert_eq!(evaluate("data:image/png;base64,AAAA", &rule), None);
        assert!(evaluate("http://h/img1.png", &rule).is_some());
    }

    #[test]
    fn rejects_non_matching_urls() {
        let rule = rule(r"pageimg\d+\.jpg");
        assert_eq!(evaluate("http://h/styles.css", &rule), None);
    }

    #[test]
    fn pattern_may_match_inside_query() {
        let rule = rule("token=");
        let found = evaluate("http://h/files/?token=abc", &rule).unwrap();
        assert_eq!(found.key.as_str(), "http://h/files/");
        assert_eq!(found.name, FALLBACK_NAME);
    }

    #[test]
    fn evaluation_is_repeatable() {
        let rule = rule(r"\.jpg");
        let url = "https://cdn.example/p/pageimg7.jpg?v=9";
        assert_eq!(evaluate(url, &rule), evaluate(url, &rule));
    }
}
