//! Name normalisation and edit-distance similarity.

/// Lowercase, drop punctuation and collapse whitespace.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// `1 − levenshtein / max(len)` over normalised names.
///
/// A name that normalises to nothing matches nothing.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize_name(a), normalize_name(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

/// Best similarity between `name` and a primary name or any alias.
pub fn best_similarity<'a>(
    name: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<(f64, &'a str)> {
    candidates
        .into_iter()
        .map(|c| (name_similarity(name, c), c))
        .fold(None, |best, (score, c)| match best {
            Some((s, _)) if s >= score => best,
            _ => Some((score, c)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalisation() {
        assert_eq!(normalize_name("  John Q. Doe,  Jr. "), "john q doe jr");
    }

    #[test]
    fn identical_after_normalisation() {
        assert_eq!(name_similarity("IVAN PETROV", "ivan  petrov."), 1.0);
    }

    #[test]
    fn one_edit_in_ten() {
        let s = name_similarity("ivan petro", "ivan petrv");
        assert!((s - 0.9).abs() < 1e-12, "{s}");
    }

    #[test]
    fn empty_never_matches() {
        assert_eq!(name_similarity("", ""), 0.0);
        assert_eq!(name_similarity("...", "a"), 0.0);
    }

    #[test]
    fn best_prefers_closest_alias() {
        let (score, which) =
            best_similarity("Vladimir Ivanov", ["Boris Smirnov", "Vladimir Ivanov"]).unwrap();
        assert_eq!(score, 1.0);
        assert_eq!(which, "Vladimir Ivanov");
        assert!(best_similarity("x", std::iter::empty()).is_none());
    }

    proptest! {
        #[test]
        fn similarity_is_bounded_and_symmetric(a in "[a-zA-Z .]{0,24}", b in "[a-zA-Z .]{0,24}") {
            let ab = name_similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&ab));
            prop_assert!((ab - name_similarity(&b, &a)).abs() < 1e-12);
        }
    }
}
