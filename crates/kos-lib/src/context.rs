//! Context selection
//!
//! A selector is either empty (use the current kubeconfig context) or a
//! comma-separated list of regular expressions matched against every known
//! context name.

use regex::Regex;
use std::collections::BTreeSet;
use tracing::warn;

/// Outcome of resolving a selector against the known contexts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSelection {
    /// Matching context names, sorted and deduplicated
    pub contexts: Vec<String>,
    /// Patterns that failed to compile
    pub invalid_patterns: Vec<String>,
}

impl ContextSelection {
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Whether exactly one context was selected
    pub fn single(&self) -> Option<&str> {
        match self.contexts.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }
}

/// Resolve `selector` against `known` context names.
///
/// An empty selector yields the current context (when one is set). Invalid
/// patterns are logged and skipped; the remaining patterns still apply.
pub fn resolve_contexts<'a, I>(selector: &str, current: Option<&str>, known: I) -> ContextSelection
where
    I: IntoIterator<Item = &'a str>,
{
    let selector = selector.trim();
    if selector.is_empty() {
        return ContextSelection {
            contexts: current
                .filter(|c| !c.is_empty())
                .map(|c| vec![c.to_string()])
                .unwrap_or_default(),
            invalid_patterns: Vec::new(),
        };
    }

    let mut patterns = Vec::new();
    let mut invalid_patterns = Vec::new();
    for raw in selector.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match Regex::new(raw) {
            Ok(regex) => patterns.push(regex),
            Err(e) => {
                warn!(pattern = %raw, error = %e, "Context pattern does not compile");
                invalid_patterns.push(raw.to_string());
            }
        }
    }

    let matched: BTreeSet<String> = known
        .into_iter()
        .filter(|name| patterns.iter().any(|p| p.is_match(name)))
        .map(str::to_string)
        .collect();

    ContextSelection {
        contexts: matched.into_iter().collect(),
        invalid_patterns,
    }
}

/// Tenant (OpenStack cloud name) encoded in a context name: the text before
/// the first `-`
pub fn tenant_of(context: &str) -> &str {
    context.split('-').next().unwrap_or(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[&str] = &["prod-a", "prod-b", "stage-a", "dev"];

    #[test]
    fn test_empty_selector_uses_current_context() {
        let selection = resolve_contexts("", Some("stage-a"), KNOWN.iter().copied());
        assert_eq!(selection.contexts, vec!["stage-a"]);
        assert_eq!(selection.single(), Some("stage-a"));
    }

    #[test]
    fn test_empty_selector_without_current_context() {
        let selection = resolve_contexts("", None, KNOWN.iter().copied());
        assert!(selection.is_empty());
    }

    #[test]
    fn test_patterns_are_sorted_and_deduplicated() {
        let selection = resolve_contexts("prod-.*,prod-a", None, KNOWN.iter().copied());
        assert_eq!(selection.contexts, vec!["prod-a", "prod-b"]);
    }

    #[test]
    fn test_order_of_patterns_does_not_matter() {
        let ab = resolve_contexts("stage-a,dev", None, KNOWN.iter().copied());
        let ba = resolve_contexts("dev,stage-a", None, KNOWN.iter().copied());
        assert_eq!(ab, ba);
        assert_eq!(ab.contexts, vec!["dev", "stage-a"]);

        let again = resolve_contexts(&ab.contexts.join(","), None, KNOWN.iter().copied());
        assert_eq!(again.contexts, ab.contexts);
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let selection = resolve_contexts("prod-(,dev", None, KNOWN.iter().copied());
        assert_eq!(selection.contexts, vec!["dev"]);
        assert_eq!(selection.invalid_patterns, vec!["prod-("]);
    }

    #[test]
    fn test_no_match_is_not_an_error() {
        let selection = resolve_contexts("qa", None, KNOWN.iter().copied());
        assert!(selection.is_empty());
        assert!(selection.invalid_patterns.is_empty());
    }

    #[test]
    fn test_tenant_of_context() {
        assert_eq!(tenant_of("p123456-cluster1"), "p123456");
        assert_eq!(tenant_of("dev"), "dev");
    }
}
