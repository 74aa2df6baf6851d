//! Slug normalization
//!
//! Slugs are the natural key used to detect whether an incoming row refers
//! to an already-existing content item, so normalization must be stable
//! across runs.

/// Normalize a string to a URL-safe slug.
///
/// Lowercases ASCII alphanumerics, collapses every other run of characters
/// into a single dash, and trims leading/trailing dashes.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_dash = false;
    for ch in input.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash && !slug.is_empty() {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_dashes() {
        assert_eq!(slugify("Intro to Baking"), "intro-to-baking");
    }

    #[test]
    fn slugify_collapses_punctuation_runs() {
        assert_eq!(slugify("  Week #1 -- Dough!  "), "week-1-dough");
    }

    #[test]
    fn slugify_drops_non_ascii() {
        assert_eq!(slugify("crème brûlée"), "cr-me-br-l-e");
    }

    #[test]
    fn slugify_empty_input() {
        assert_eq!(slugify("   "), "");
    }

    #[test]
    fn slugify_is_stable_on_already_normalized_input() {
        assert_eq!(slugify("week-1"), "week-1");
    }
}
