//! Builds a reverse map from literal keyword text to a kind name, exposed
//! as a closure typically plugged in as another rule's `kindFn`.

use std::collections::HashMap;
use std::rc::Rc;

/// Builds a function from candidate text to `Some(kind)` when it matches a
/// declared keyword literal, or `None` otherwise. A standalone constructor
/// rather than a `Rule` impl, since this plugs in as another rule's
/// `kindFn` instead of acting as a rule of its own.
pub fn keywords<K, L, I>(mapping: I) -> Rc<dyn Fn(&str) -> Option<String>>
where
    K: Into<String>,
    L: IntoIterator<Item = &'static str>,
    I: IntoIterator<Item = (K, L)>,
{
    let mut reverse: HashMap<&'static str, String> = HashMap::new();
    for (kind, literals) in mapping {
        let kind = kind.into();
        for literal in literals {
            reverse.insert(literal, kind.clone());
        }
    }
    Rc::new(move |text: &str| reverse.get(text).cloned())
}

/// Convenience form for a single keyword literal per kind.
pub fn keyword(kind: impl Into<String>, literal: &'static str) -> (String, Vec<&'static str>) {
    (kind.into(), vec![literal])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_keyword() {
        let kw = keywords(vec![("kw", vec!["class"])]);
        assert_eq!(kw("class"), Some("kw".to_string()));
    }

    #[test]
    fn falls_through_for_unknown_text() {
        let kw = keywords(vec![("kw", vec!["class"])]);
        assert_eq!(kw("className"), None);
    }

    #[test]
    fn supports_multiple_literals_per_kind() {
        let kw = keywords(vec![("bool", vec!["true", "false"])]);
        assert_eq!(kw("true"), Some("bool".to_string()));
        assert_eq!(kw("false"), Some("bool".to_string()));
    }
}
