// MIT License
// Copyright (c) 2024 Graham King

/// URL-safe identifier for a title: "Feeding Basics!" -> "feeding-basics"
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
        // everything else is dropped
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_titles() {
        assert_eq!(slugify("Feeding Basics"), "feeding-basics");
        assert_eq!(slugify("Sleep Tips"), "sleep-tips");
    }

    #[test]
    fn punctuation_and_separators() {
        assert_eq!(slugify("  What's  new -- in 2024?  "), "whats-new-in-2024");
        assert_eq!(slugify("snake_case_title"), "snake-case-title");
        assert_eq!(slugify("--Edge--"), "edge");
    }

    #[test]
    fn nothing_usable() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify(""), "");
    }
}
