//! `${name}` placeholder scanning

use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z]\w*)\}").expect("placeholder pattern is valid"));

/// Variable names referenced in `text`, in order of appearance (may repeat)
pub fn placeholders(text: &str) -> impl Iterator<Item = &str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

/// Whether `text` references any variable
pub fn has_placeholders(text: &str) -> bool {
    PLACEHOLDER.is_match(text)
}

/// Collect unique names across several texts, keeping first-seen order
pub fn collect_unique<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for text in texts {
        for name in placeholders(text) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}
