//! Validated name and tag newtypes
//!
//! Challenge names are free text with a length cap; tags are slugs that
//! match the DB constraint on the `challenges.tags` array.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

/// Maximum length for challenge and project names
pub const MAX_NAME_LEN: usize = 128;

/// Maximum number of tags on one challenge
const MAX_TAGS: usize = 16;

/// Tag slug pattern: lowercase alphanumeric with hyphens/underscores
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{0,39}$").expect("invalid tag regex"));

/// Validated challenge (or project) name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChallengeName(String);

impl ChallengeName {
    /// Create a validated name.
    ///
    /// Trimmed, non-empty, at most 128 characters.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        if trimmed.chars().count() > MAX_NAME_LEN {
            return Err(ValidationError::TooLong {
                field: "name",
                max: MAX_NAME_LEN,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for ChallengeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validated list of tag slugs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagList(Vec<String>);

impl TagList {
    /// Validate a list of tags. Duplicates are dropped, order kept.
    pub fn new<I, S>(tags: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.as_ref().trim();
            if tag.is_empty() {
                continue;
            }
            if !TAG_RE.is_match(tag) {
                return Err(ValidationError::InvalidFormat {
                    field: "tag",
                    reason: "must be lowercase alphanumeric with hyphens/underscores, max 40 chars",
                });
            }
            if !out.iter().any(|t| t == tag) {
                out.push(tag.to_owned());
            }
        }
        if out.len() > MAX_TAGS {
            return Err(ValidationError::TooLong {
                field: "tags",
                max: MAX_TAGS,
            });
        }
        Ok(Self(out))
    }

    /// Parse a comma-separated query parameter (`tags=roads,buildings`).
    pub fn parse_csv(s: &str) -> Result<Self, ValidationError> {
        Self::new(s.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_trims_and_accepts() {
        let name = ChallengeName::new("  Fix broken crossings  ").unwrap();
        assert_eq!(name.as_str(), "Fix broken crossings");
    }

    #[test]
    fn name_rejects_empty() {
        assert!(matches!(
            ChallengeName::new("   ").unwrap_err(),
            ValidationError::Empty { .. }
        ));
    }

    #[test]
    fn name_rejects_too_long() {
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            ChallengeName::new(&long).unwrap_err(),
            ValidationError::TooLong { max: 128, .. }
        ));
    }

    #[test]
    fn tags_accept_slugs() {
        let tags = TagList::parse_csv("roads,buildings,missing-sidewalk").unwrap();
        assert_eq!(tags.as_slice().len(), 3);
    }

    #[test]
    fn tags_drop_duplicates_and_blanks() {
        let tags = TagList::parse_csv("roads,,roads, buildings").unwrap();
        assert_eq!(tags.as_slice(), ["roads", "buildings"]);
    }

    #[test]
    fn tags_reject_uppercase() {
        assert!(matches!(
            TagList::parse_csv("Roads").unwrap_err(),
            ValidationError::InvalidFormat { .. }
        ));
    }

    #[test]
    fn tags_reject_too_many() {
        let many: Vec<String> = (0..17).map(|i| format!("tag{}", i)).collect();
        assert!(matches!(
            TagList::new(&many).unwrap_err(),
            ValidationError::TooLong { .. }
        ));
    }
}
