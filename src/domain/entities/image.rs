//! Content key identifying a requested image.

/// Identifies one piece of remote image content.
///
/// Holds the resolved URL of the content. Two keys refer to the same content
/// iff their strings are exactly equal; no further normalization happens at
/// this level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey(String);

impl ImageKey {
    /// Creates a new `ImageKey` from any string-like input.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ImageKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ImageKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_exact() {
        assert_eq!(
            ImageKey::new("https://host/a.png"),
            ImageKey::new("https://host/a.png")
        );
        assert_ne!(
            ImageKey::new("https://host/a.png"),
            ImageKey::new("https://host/A.png")
        );
    }

    #[test]
    fn displays_inner_url() {
        let key = ImageKey::from("https://host/a.png");
        assert_eq!(key.to_string(), "https://host/a.png");
        assert_eq!(key.as_str(), "https://host/a.png");
    }
}
