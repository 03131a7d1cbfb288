//! URL slug type for product pages.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// The input string is empty (or nothing usable remained).
    #[error("slug cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[a-z0-9-]`.
    #[error("slug contains invalid character '{0}'")]
    InvalidCharacter(char),
    /// Leading, trailing or doubled hyphen.
    #[error("slug has a misplaced hyphen")]
    MisplacedHyphen,
}

/// A URL-safe product identifier such as `linen-shirt-olive`.
///
/// ## Constraints
///
/// - Length: 1-120 characters
/// - Characters: lowercase ASCII letters, digits and `-`
/// - No leading, trailing or consecutive hyphens
///
/// ## Examples
///
/// ```
/// use bazaar_core::Slug;
///
/// assert!(Slug::parse("linen-shirt").is_ok());
/// assert!(Slug::parse("Linen Shirt").is_err());
/// assert_eq!(Slug::from_title("Linen Shirt (Olive)").unwrap().as_str(), "linen-shirt-olive");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Maximum length of a slug.
    pub const MAX_LENGTH: usize = 120;

    /// Parse a `Slug` from an already-slugified string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, contains characters
    /// outside `[a-z0-9-]`, or has a leading, trailing or doubled hyphen.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(SlugError::InvalidCharacter(c));
        }
        if s.starts_with('-') || s.ends_with('-') || s.contains("--") {
            return Err(SlugError::MisplacedHyphen);
        }
        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a human-readable title.
    ///
    /// Every run of non-alphanumeric characters becomes a single hyphen.
    /// The result is truncated to [`Self::MAX_LENGTH`] on a word boundary
    /// where possible.
    ///
    /// # Errors
    ///
    /// Returns `SlugError::Empty` if the title has no ASCII alphanumerics.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(title.len());
        let mut pending_hyphen = false;

        for c in title.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
        }

        if out.len() > Self::MAX_LENGTH {
            out.truncate(Self::MAX_LENGTH);
            if let Some(cut) = out.rfind('-') {
                out.truncate(cut);
            }
        }

        Self::parse(out.trim_end_matches('-'))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Slug` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Slug::parse("a").is_ok());
        assert!(Slug::parse("kurta-set-2").is_ok());
    }

    #[test]
    fn test_parse_rejects_uppercase_and_spaces() {
        assert_eq!(
            Slug::parse("Kurta"),
            Err(SlugError::InvalidCharacter('K'))
        );
        assert_eq!(
            Slug::parse("kurta set"),
            Err(SlugError::InvalidCharacter(' '))
        );
    }

    #[test]
    fn test_parse_rejects_misplaced_hyphens() {
        assert_eq!(Slug::parse("-kurta"), Err(SlugError::MisplacedHyphen));
        assert_eq!(Slug::parse("kurta-"), Err(SlugError::MisplacedHyphen));
        assert_eq!(Slug::parse("kurta--set"), Err(SlugError::MisplacedHyphen));
    }

    #[test]
    fn test_parse_too_long() {
        let long = "a".repeat(Slug::MAX_LENGTH + 1);
        assert!(matches!(Slug::parse(&long), Err(SlugError::TooLong { .. })));
    }

    #[test]
    fn test_from_title() {
        assert_eq!(
            Slug::from_title("  Cotton Kurta -- Indigo!! ").unwrap().as_str(),
            "cotton-kurta-indigo"
        );
        assert_eq!(Slug::from_title("Tee 2.0").unwrap().as_str(), "tee-2-0");
    }

    #[test]
    fn test_from_title_without_alphanumerics() {
        assert_eq!(Slug::from_title("★ ★ ★"), Err(SlugError::Empty));
    }

    #[test]
    fn test_from_title_truncates_on_word_boundary() {
        let title = "word ".repeat(40);
        let slug = Slug::from_title(&title).unwrap();
        assert!(slug.as_str().len() <= Slug::MAX_LENGTH);
        assert!(slug.as_str().ends_with("word"));
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<Slug>("\"ok-slug\"").is_ok());
        assert!(serde_json::from_str::<Slug>("\"Bad Slug\"").is_err());
    }
}
