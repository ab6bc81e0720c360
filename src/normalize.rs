// MIT License
// Copyright (c) 2024 Graham King

/// Canonical form of a source URL for equality checks: no query, no fragment,
/// no trailing slash (except on the root path), lowercase.
/// Anything that doesn't parse comes back lowercased and otherwise untouched.
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(mut parsed) = url::Url::parse(raw) else {
        return raw.to_lowercase();
    };
    parsed.set_query(None);
    parsed.set_fragment(None);

    let mut out = parsed.to_string();
    if parsed.path() != "/" && out.ends_with('/') {
        out.pop();
    }
    out.to_lowercase()
}
