//! Cache keys.
//!
//! A query is identified by an ordered tuple: the resource name followed by
//! its parameter values, e.g. `["project", "42"]` or
//! `["exploreProjects", 1, "rust", ["cli", "web"]]`. Structural equality
//! decides entry identity; prefix matching drives invalidation.

use std::fmt;

/// One element of a [`QueryKey`] tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Str(String),
    Int(i64),
    List(Vec<String>),
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        KeyPart::Str(value.clone())
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        KeyPart::Int(i64::from(value))
    }
}

impl From<Vec<String>> for KeyPart {
    fn from(value: Vec<String>) -> Self {
        KeyPart::List(value)
    }
}

impl From<&[String]> for KeyPart {
    fn from(value: &[String]) -> Self {
        KeyPart::List(value.to_vec())
    }
}

impl From<Vec<&str>> for KeyPart {
    fn from(value: Vec<&str>) -> Self {
        KeyPart::List(value.into_iter().map(str::to_string).collect())
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Str(s) => write!(f, "{s:?}"),
            KeyPart::Int(n) => write!(f, "{n}"),
            KeyPart::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item:?}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Ordered, hashable tuple identifying a resource query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    /// A key with a single resource-name part. Usually written via the
    /// [`key!`](crate::key) macro instead.
    pub fn new(resource: impl Into<KeyPart>) -> Self {
        Self(vec![resource.into()])
    }

    /// Construction hook for the `key!` macro.
    pub fn from_parts(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    /// Appends one parameter part.
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// True iff `prefix` matches the leading parts of this key. An exact
    /// match is a prefix match of equal length, so the same test serves
    /// both invalidation modes.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{part}")?;
        }
        write!(f, "]")
    }
}

/// Builds a [`QueryKey`] from part literals, mirroring the array keys the
/// server views are addressed by:
///
/// ```
/// use devhub_client::key;
///
/// let k = key!["exploreProjects", 1u32, "rust", vec!["cli", "web"]];
/// assert_eq!(k.parts().len(), 4);
/// ```
#[macro_export]
macro_rules! key {
    ($($part:expr),* $(,)?) => {
        $crate::query::QueryKey::from_parts(vec![$($crate::query::KeyPart::from($part)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = key!["project", "42"];
        let b = key!["project", "42"];
        let c = key!["project", "43"];
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_equality_is_order_sensitive() {
        assert_ne!(key!["a", "b"], key!["b", "a"]);
    }

    #[test]
    fn test_int_and_str_parts_are_distinct() {
        assert_ne!(key!["projects", 1u32], key!["projects", "1"]);
    }

    #[test]
    fn test_prefix_matching() {
        let full = key!["exploreProjects", 1u32, "", Vec::<String>::new()];
        assert!(full.starts_with(&key!["exploreProjects"]));
        assert!(full.starts_with(&key!["exploreProjects", 1u32]));
        assert!(full.starts_with(&full));
        assert!(!full.starts_with(&key!["projects"]));
        assert!(!key!["exploreProjects"].starts_with(&full));
    }

    #[test]
    fn test_display_renders_tuple() {
        let k = key!["exploreProjects", 1u32, "rust", vec!["cli", "web"]];
        assert_eq!(
            k.to_string(),
            r#"["exploreProjects", 1, "rust", ["cli", "web"]]"#
        );
    }

    #[test]
    fn test_builder_equivalent_to_macro() {
        let built = QueryKey::new("project").with("42");
        assert_eq!(built, key!["project", "42"]);
    }
}
