//! Rewrites `[Source<id>]` markers in a model answer into numbered citations.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static SOURCE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[Source([^\]]+)\]").unwrap());

/// Number the valid ids cited in `text` by first appearance, starting at 1.
///
/// Every marker whose id is known becomes `[n]`; any other marker becomes
/// `[Unknown]`. Returns the rewritten text and the cited ids in citation
/// order, so `ids[n - 1]` is the page behind `[n]`.
pub fn reconcile(text: &str, is_valid: impl Fn(&str) -> bool) -> (String, Vec<String>) {
    let mut cited: Vec<String> = Vec::new();
    let mut numbers: HashMap<String, usize> = HashMap::new();

    for captures in SOURCE_MARKER.captures_iter(text) {
        let id = &captures[1];
        if !numbers.contains_key(id) && is_valid(id) {
            cited.push(id.to_string());
            numbers.insert(id.to_string(), cited.len());
        }
    }

    let rewritten = SOURCE_MARKER.replace_all(text, |captures: &regex::Captures| {
        match numbers.get(&captures[1]) {
            Some(n) => format!("[{n}]"),
            None => "[Unknown]".to_string(),
        }
    });

    (rewritten.into_owned(), cited)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(id: &str) -> bool {
        matches!(id, "A" | "12" | "34")
    }

    #[test]
    fn test_numbers_by_first_appearance() {
        let (text, ids) = reconcile("Use X[Source34] and Y[Source12], again X[Source34].", known);
        assert_eq!(text, "Use X[1] and Y[2], again X[1].");
        assert_eq!(ids, vec!["34", "12"]);
    }

    #[test]
    fn test_unknown_ids_are_marked() {
        let (text, ids) = reconcile("[SourceA][SourceB][SourceA]", known);
        assert_eq!(text, "[1][Unknown][1]");
        assert_eq!(ids, vec!["A"]);
    }

    #[test]
    fn test_unknown_first_does_not_take_a_number() {
        let (text, ids) = reconcile("[Source99] then [Source12]", known);
        assert_eq!(text, "[Unknown] then [1]");
        assert_eq!(ids, vec!["12"]);
    }

    #[test]
    fn test_no_markers() {
        let (text, ids) = reconcile("I am unable to find information within the Wiki.", known);
        assert_eq!(text, "I am unable to find information within the Wiki.");
        assert!(ids.is_empty());
    }

    #[test]
    fn test_malformed_markers_are_left_alone() {
        let (text, ids) = reconcile("[Source] [source12] Source12 [Source12", known);
        assert_eq!(text, "[Source] [source12] Source12 [Source12");
        assert!(ids.is_empty());
    }

    #[test]
    fn test_output_has_no_markers_and_is_stable() {
        let (once, _) = reconcile("a[Source12] b[SourceZ]", known);
        assert!(!SOURCE_MARKER.is_match(&once));
        let (twice, ids) = reconcile(&once, known);
        assert_eq!(once, twice);
        assert!(ids.is_empty());
    }
}
