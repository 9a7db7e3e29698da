// 🔤 Name Normalization - fuzzy equality for typed names
//
// "Ana Reyes", "ANA  REYES", "Ana Reyes, Jr." → all "ana reyes"
//
// Used by the resolver to compare what a user typed against the names of
// known citizens and nurses, and by the CSV importer to skip rows that are
// already on file.

/// Honorific tokens dropped from the end of a name.
const SUFFIXES: [&str; 5] = ["jr", "sr", "ii", "iii", "iv"];

/// Normalize a name for comparison.
///
/// - Lowercase
/// - Drop everything that is not an ASCII letter, digit or whitespace
///   (underscores and apostrophes included)
/// - Collapse whitespace runs to a single space and trim
/// - Strip trailing honorific suffixes (`jr`, `sr`, `ii`, `iii`, `iv`)
///
/// Example: `"O'Brien, Jr!!"` → `"obrien"`
pub fn normalize(s: &str) -> String {
    let lowered = s.to_lowercase();

    let cleaned: String = lowered
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();

    let compact = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    strip_suffixes(&compact).to_string()
}

/// Strip honorific suffix tokens from the end of an already compacted name.
///
/// Repeats until the last token is not a suffix, so `"john jr iii"` becomes
/// `"john"` and normalizing twice never changes the result.
fn strip_suffixes(compact: &str) -> &str {
    let mut rest = compact;

    loop {
        let (head, last) = match rest.rsplit_once(' ') {
            Some((head, last)) => (head, last),
            None => ("", rest),
        };

        if last.is_empty() || !SUFFIXES.contains(&last) {
            return rest;
        }

        rest = head.trim_end();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_and_collapse() {
        assert_eq!(normalize("  ANA   Reyes "), "ana reyes");
        assert_eq!(normalize("Ana\tReyes\n"), "ana reyes");
    }

    #[test]
    fn test_strips_punctuation() {
        assert_eq!(normalize("O'Brien, Jr!!"), normalize("obrien"));
        assert_eq!(normalize("dela-cruz"), "delacruz");
        assert_eq!(normalize("snake_case"), "snakecase");
    }

    #[test]
    fn test_suffix_stripping() {
        assert_eq!(normalize("John Smith Jr."), normalize("john smith"));
        assert_eq!(normalize("John Smith SR"), "john smith");
        assert_eq!(normalize("Henry IV"), "henry");
        assert_eq!(normalize("Thurston Howell III"), "thurston howell");
        assert_eq!(normalize("John Smith II."), "john smith");
    }

    #[test]
    fn test_suffix_must_be_whole_token() {
        // "junior" and "xiv" are not suffixes, "smithjr" has no token boundary
        assert_eq!(normalize("Pat Junior"), "pat junior");
        assert_eq!(normalize("Louis XIV"), "louis xiv");
        assert_eq!(normalize("John Smithjr"), "john smithjr");
    }

    #[test]
    fn test_suffix_only_name() {
        assert_eq!(normalize("Jr."), "");
        assert_eq!(normalize("iv"), "");
    }

    #[test]
    fn test_non_ascii_letters_removed() {
        assert_eq!(normalize("Peña"), "pea");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "   ",
            "John Smith Jr.",
            "john jr iii",
            "O'Brien, Jr!!",
            "Maria  Dela Cruz",
            "jr sr",
            "Ana_Reyes-Cruz II",
            "2",
            "Zoë  d'Arc  IV.",
        ];

        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }
}
