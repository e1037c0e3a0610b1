//! Release version parsing and ordering.
//!
//! Upstream release tags look like `v1.2.3`. A [`SemanticVersion`] keeps the
//! numeric text of each component exactly as published and orders versions
//! position by position using **string** comparison of that text, so `"9"`
//! sorts after `"10"`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Number of positional components carried by a version.
const COMPONENTS: usize = 3;

/// Errors raised when version text cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The version text was empty after prefix stripping.
    #[error("version string is empty")]
    Empty,

    /// A dot-separated component is not a non-negative integer.
    #[error("invalid component \"{component}\" in version \"{raw}\"")]
    InvalidComponent {
        /// The full version text as supplied.
        raw: String,
        /// The component that failed to parse.
        component: String,
    },
}

/// A three-part release version compared positionally as text.
///
/// # Examples
///
/// ```
/// use relsync::semver::SemanticVersion;
///
/// let current = SemanticVersion::parse("1.2.3").expect("valid version");
/// let remote = SemanticVersion::parse("v1.3.0").expect("valid version");
/// assert!(current < remote);
/// assert_eq!(remote.to_string(), "1.3.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticVersion {
    components: [String; COMPONENTS],
}

impl SemanticVersion {
    /// Return the fallback version used when no marker is available.
    #[must_use]
    pub fn baseline() -> Self {
        Self {
            components: ["0".to_owned(), "0".to_owned(), "0".to_owned()],
        }
    }

    /// Parse version text such as `v1.2.3` or `1.2.3`.
    ///
    /// A single leading non-digit character (`v`, `=`, ...) is stripped. Every dot-separated
    /// piece must parse as a non-negative integer. Up to three pieces are
    /// kept; missing trailing pieces become `"0"` and pieces beyond the third
    /// are validated but dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Empty`] for empty input and
    /// [`ParseError::InvalidComponent`] when any piece is not a non-negative
    /// integer.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let trimmed = strip_prefix_marker(raw);
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut components = Self::baseline().components;
        for (index, piece) in trimmed.split('.').enumerate() {
            validate_component(raw, piece)?;
            if let Some(slot) = components.get_mut(index) {
                piece.clone_into(slot);
            }
        }

        Ok(Self { components })
    }

    /// Compare two versions component by component as strings.
    ///
    /// The first differing component decides the result.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        self.components
            .iter()
            .zip(other.components.iter())
            .map(|(left, right)| left.as_str().cmp(right.as_str()))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Return true when `candidate` orders after `current`.
#[must_use]
pub fn is_newer(current: &SemanticVersion, candidate: &SemanticVersion) -> bool {
    current.compare(candidate) == Ordering::Less
}

fn strip_prefix_marker(raw: &str) -> &str {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) if !first.is_ascii_digit() => chars.as_str(),
        _ => raw,
    }
}

fn validate_component(raw: &str, piece: &str) -> Result<(), ParseError> {
    // `u64` rejects negatives; the sign check keeps `+1` out as well.
    if piece.starts_with('+') || piece.parse::<u64>().is_err() {
        return Err(ParseError::InvalidComponent {
            raw: raw.to_owned(),
            component: piece.to_owned(),
        });
    }
    Ok(())
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl FromStr for SemanticVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [major, minor, patch] = &self.components;
        write!(f, "{major}.{minor}.{patch}")
    }
}
