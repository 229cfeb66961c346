//! Culture-aware string comparison.
//!
//! A naive ordinal sort puts `"Zebra"` before `"apple"` and `"Ä"` after
//! `"Z"`. Views sort strings through a [`Culture`], which wraps an ICU4X
//! collator for a locale. The default culture is the root (invariant)
//! locale.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use icu::collator::options::{CollatorOptions, Strength};
use icu::collator::Collator;
use icu::locale::Locale;
use lattice_grid_core::logging::targets;

type CompareFn = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

/// A locale used for string ordering.
#[derive(Clone)]
pub struct Culture {
    name: String,
    ignore_case: bool,
    compare: CompareFn,
}

impl Culture {
    /// The invariant culture (ICU root collation).
    pub fn invariant() -> Self {
        Self::build(Locale::UNKNOWN, String::new(), false)
    }

    /// Creates a culture from a BCP 47 name such as `"de-DE"`.
    ///
    /// Unknown or malformed names fall back to the invariant culture.
    pub fn new(name: &str) -> Self {
        match name.parse::<Locale>() {
            Ok(locale) => Self::build(locale, name.to_owned(), false),
            Err(err) => {
                tracing::warn!(
                    target: targets::CULTURE,
                    name,
                    error = %err,
                    "invalid culture name, using invariant culture"
                );
                Self::invariant()
            }
        }
    }

    /// Byte-wise ordinal comparison, no collation.
    pub fn ordinal() -> Self {
        Self {
            name: "ordinal".into(),
            ignore_case: false,
            compare: Arc::new(|a: &str, b: &str| a.cmp(b)),
        }
    }

    /// Returns this culture with case differences ignored (or not).
    pub fn with_ignore_case(self, ignore_case: bool) -> Self {
        if self.ignore_case == ignore_case || self.name == "ordinal" {
            return self;
        }
        let locale = self.name.parse::<Locale>().unwrap_or(Locale::UNKNOWN);
        Self::build(locale, self.name, ignore_case)
    }

    fn build(locale: Locale, name: String, ignore_case: bool) -> Self {
        let mut options = CollatorOptions::default();
        if ignore_case {
            options.strength = Some(Strength::Secondary);
        }
        let compare: CompareFn = match Collator::try_new(locale.into(), options) {
            Ok(collator) => Arc::new(move |a: &str, b: &str| collator.compare(a, b)),
            Err(err) => {
                tracing::warn!(
                    target: targets::CULTURE,
                    name = %name,
                    error = %err,
                    "no collation data, falling back to ordinal comparison"
                );
                Arc::new(|a: &str, b: &str| a.cmp(b))
            }
        };
        Self {
            name,
            ignore_case,
            compare,
        }
    }

    /// The culture name; empty for the invariant culture.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether case differences are ignored.
    pub fn ignores_case(&self) -> bool {
        self.ignore_case
    }

    /// Compares two strings.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        (self.compare)(a, b)
    }
}

impl Default for Culture {
    fn default() -> Self {
        Self::invariant()
    }
}

impl PartialEq for Culture {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.ignore_case == other.ignore_case
    }
}

impl Eq for Culture {}

impl fmt::Debug for Culture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Culture")
            .field("name", &self.name)
            .field("ignore_case", &self.ignore_case)
            .finish()
    }
}

/// How filter operators compare strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StringComparison {
    /// Exact byte comparison.
    Ordinal,
    /// Comparison after lower-casing both sides.
    #[default]
    OrdinalIgnoreCase,
    /// Collator equality for `Equals`; case-folded matching for substrings.
    Culture,
}

impl StringComparison {
    /// Tests two strings for equality.
    pub fn equals(self, a: &str, b: &str, culture: &Culture) -> bool {
        match self {
            StringComparison::Ordinal => a == b,
            StringComparison::OrdinalIgnoreCase => a.to_lowercase() == b.to_lowercase(),
            StringComparison::Culture => culture.compare(a, b) == Ordering::Equal,
        }
    }

    /// Tests whether `needle` occurs in `haystack`.
    pub fn contains(self, haystack: &str, needle: &str) -> bool {
        match self {
            StringComparison::Ordinal => haystack.contains(needle),
            _ => haystack.to_lowercase().contains(&needle.to_lowercase()),
        }
    }

    /// Tests whether `haystack` starts with `prefix`.
    pub fn starts_with(self, haystack: &str, prefix: &str) -> bool {
        match self {
            StringComparison::Ordinal => haystack.starts_with(prefix),
            _ => haystack.to_lowercase().starts_with(&prefix.to_lowercase()),
        }
    }

    /// Tests whether `haystack` ends with `suffix`.
    pub fn ends_with(self, haystack: &str, suffix: &str) -> bool {
        match self {
            StringComparison::Ordinal => haystack.ends_with(suffix),
            _ => haystack.to_lowercase().ends_with(&suffix.to_lowercase()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_collation_is_not_ordinal() {
        let culture = Culture::invariant();
        assert_eq!(culture.compare("apple", "Zebra"), Ordering::Less);
        assert_eq!(Culture::ordinal().compare("apple", "Zebra"), Ordering::Greater);
    }

    #[test]
    fn ignore_case_collapses_case() {
        let culture = Culture::new("en-US").with_ignore_case(true);
        assert_eq!(culture.compare("abc", "ABC"), Ordering::Equal);
        assert_ne!(Culture::new("en-US").compare("abc", "ABC"), Ordering::Equal);
    }

    #[test]
    fn bad_name_falls_back() {
        let culture = Culture::new("not a locale!!");
        assert_eq!(culture, Culture::invariant());
    }

    #[test]
    fn string_comparison_modes() {
        let culture = Culture::invariant();
        assert!(StringComparison::OrdinalIgnoreCase.equals("Rust", "rust", &culture));
        assert!(!StringComparison::Ordinal.equals("Rust", "rust", &culture));
        assert!(StringComparison::OrdinalIgnoreCase.contains("Hello World", "WORLD"));
        assert!(!StringComparison::Ordinal.starts_with("Hello", "he"));
        assert!(StringComparison::Culture.ends_with("Hello", "LO"));
    }
}
