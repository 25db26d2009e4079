/// One alternative inside a rule's `patterns` list: either a literal string
/// matched verbatim, or a regex source fragment compiled by the host regex
/// engine (here, the `regex` crate).
#[derive(Debug, Clone, PartialEq)]
pub enum Alternative {
    Literal(String),
    Regex { source: String, unicode: bool },
}

impl Alternative {
    pub fn literal(s: impl Into<String>) -> Self {
        Alternative::Literal(s.into())
    }

    pub fn regex(source: impl Into<String>) -> Self {
        Alternative::Regex {
            source: source.into(),
            unicode: true,
        }
    }

    pub fn regex_ascii(source: impl Into<String>) -> Self {
        Alternative::Regex {
            source: source.into(),
            unicode: false,
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Alternative::Regex { .. })
    }

    /// Length used for maximal-munch ordering among literals; regex
    /// alternatives don't participate in length comparisons (they always
    /// sort ahead of literals, see `crate::normalize`).
    pub fn literal_len(&self) -> Option<usize> {
        match self {
            Alternative::Literal(s) => Some(s.chars().count()),
            Alternative::Regex { .. } => None,
        }
    }

    /// The alternative wrapped as a non-capturing regex fragment, ready to
    /// be `OR`ed together with the rule's other alternatives.
    pub fn as_fragment(&self) -> String {
        match self {
            Alternative::Literal(s) => format!("(?:{})", regex::escape(s)),
            Alternative::Regex { source, .. } => format!("(?:{})", source),
        }
    }

    pub fn unicode(&self) -> Option<bool> {
        match self {
            Alternative::Literal(_) => None,
            Alternative::Regex { unicode, .. } => Some(*unicode),
        }
    }
}

const DISALLOWED_INLINE_FLAGS: [&str; 4] = ["(?i", "(?m", "(?g", "(?y"];

/// `regex` has no separate flag-literal syntax the way some engines do
/// (e.g. `/pattern/gimy`); the only way a forbidden flag could leak into a
/// pattern here is via an inline modifier group. This is a conservative
/// substring scan rather than a full parse.
pub fn contains_disallowed_inline_flag(source: &str) -> bool {
    DISALLOWED_INLINE_FLAGS.iter().any(|needle| source.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_fragment_escapes_metacharacters() {
        let alt = Alternative::literal("a.b");
        assert_eq!(alt.as_fragment(), "(?:a\\.b)");
    }

    #[test]
    fn regex_fragment_wraps_non_capturing() {
        let alt = Alternative::regex("[0-9]+");
        assert_eq!(alt.as_fragment(), "(?:[0-9]+)");
    }

    #[test]
    fn detects_inline_case_insensitive_flag() {
        assert!(contains_disallowed_inline_flag("(?i)abc"));
        assert!(!contains_disallowed_inline_flag("(?:abc)"));
    }

    #[test]
    fn literal_len_counts_chars_not_bytes() {
        let alt = Alternative::literal("é");
        assert_eq!(alt.literal_len(), Some(1));
    }
}
