//! Normalizer
//!
//! Canonical identifying data derived from human-entered names: slugs for
//! natural keys, a whitespace-normalized matching key for generic names, and
//! the dosage-form name extraction from icon URLs.
//!
//! The URL-based dosage form derivation exists because the upstream feed has
//! no explicit dosage-form column; the icon filename is the only place the
//! information appears. It is kept as an isolated function so it can be
//! swapped for a real column once the feed carries one.

/// Derive a URL-safe natural key from a human-readable name.
///
/// Lowercases, strips characters outside `[a-z0-9\s_-]`, collapses runs of
/// whitespace and underscores to a single hyphen, and trims leading/trailing
/// hyphens. Idempotent: `slugify(slugify(x)) == slugify(x)`.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();

    let filtered: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, ' ' | '\t' | '-' | '_'))
        .collect();

    let mut slug = String::with_capacity(filtered.len());
    let mut pending_separator = false;
    for c in filtered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            // whitespace, underscore, or hyphen all collapse to one hyphen
            pending_separator = true;
        }
    }

    slug
}

/// Secondary matching key for generic-name resolution.
///
/// Lowercases, replaces non-breaking spaces with regular spaces, collapses
/// whitespace runs, and trims. Distinct from slug matching: real-world
/// pharmaceutical name data carries encoding inconsistencies (NBSP, doubled
/// spaces) that slugification alone does not normalize predictably.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract a dosage-form name from an icon URL.
///
/// The filename (minus extension) encodes the form name with hyphens as
/// separators: `.../tablet-box.png` -> `"Tablet Box"`. Returns `""` for an
/// empty URL or a URL with no usable filename.
pub fn derive_dosage_form(image_url: &str) -> String {
    let url = image_url.trim();
    if url.is_empty() {
        return String::new();
    }

    let filename = url
        .rsplit('/')
        .next()
        .unwrap_or("")
        .split('?')
        .next()
        .unwrap_or("");

    let stem = match filename.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => filename,
    };

    stem.split('-')
        .filter(|part| !part.is_empty())
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Napa 500mg"), "napa-500mg");
        assert_eq!(slugify("Paracetamol"), "paracetamol");
    }

    #[test]
    fn test_slugify_strips_punctuation() {
        assert_eq!(slugify("Tab. (Extended Release)"), "tab-extended-release");
        assert_eq!(slugify("B&B Pharma Ltd."), "bb-pharma-ltd");
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("a  b"), "a-b");
        assert_eq!(slugify("a__b"), "a-b");
        assert_eq!(slugify("a -_ b"), "a-b");
    }

    #[test]
    fn test_slugify_trims_hyphens() {
        assert_eq!(slugify("  -Napa- "), "napa");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_slugify_idempotent() {
        let inputs = [
            "Napa Extra 500mg+65mg",
            "  Weird   _ Name -- ",
            "UPPER case",
            "",
        ];
        for input in inputs {
            let once = slugify(input);
            assert_eq!(slugify(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_slugify_output_alphabet() {
        for input in ["Hello, World!", "a@b#c$d", "  x  ", "100% Pure"] {
            let slug = slugify(input);
            assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            assert!(!slug.starts_with('-'));
            assert!(!slug.ends_with('-'));
        }
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Paracetamol\u{a0}+ Caffeine"), "paracetamol + caffeine");
        assert_eq!(normalize_name("  Esomeprazole   Magnesium "), "esomeprazole magnesium");
    }

    #[test]
    fn test_derive_dosage_form() {
        assert_eq!(
            derive_dosage_form("https://cdn.example.com/icons/tablet-strip.png"),
            "Tablet Strip"
        );
        assert_eq!(derive_dosage_form(".../tablet-box.png"), "Tablet Box");
        assert_eq!(derive_dosage_form("https://x.test/syrup.svg?v=2"), "Syrup");
    }

    #[test]
    fn test_derive_dosage_form_empty() {
        assert_eq!(derive_dosage_form(""), "");
        assert_eq!(derive_dosage_form("   "), "");
    }
}
