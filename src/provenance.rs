// MIT License
// Copyright (c) 2024 Graham King

// Ingestion records where an article came from inside the free-text license
// annotation, e.g. "CDC | URL: https://www.cdc.gov/... | Public domain".
// This is the only code that knows that convention. When articles get a real
// source_url column, change it here.

use std::sync::LazyLock;

use regex::Regex;

static URL_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"URL:\s*([^\s|]+)").expect("static regex"));

/// Best-effort extraction of the provenance URL from a license annotation
pub fn source_url(license: &str) -> Option<&str> {
    URL_LABEL
        .captures(license)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_url() {
        assert_eq!(
            source_url("Source | URL: https://cdc.gov/a | Public domain"),
            Some("https://cdc.gov/a")
        );
        assert_eq!(
            source_url("URL:https://aap.org/x?y=1"),
            Some("https://aap.org/x?y=1")
        );
    }

    #[test]
    fn no_label() {
        assert_eq!(source_url("CC-BY 4.0 https://cdc.gov/a"), None);
        assert_eq!(source_url(""), None);
        assert_eq!(source_url("URL: "), None);
    }
}
