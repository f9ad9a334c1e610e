use std::fmt;

pub type Name = String;
pub type NamespaceName = String;

/// Fully-qualified name of a declaration.
///
/// The empty namespace is the global namespace. Ordering is by namespace first, then name, which
/// is the canonical order used for traversal and hashing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    pub namespace: NamespaceName,
    pub name: Name,
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.namespace, self.name)
        }
    }
}

impl Identifier {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self::new("", name)
    }

    /// Splits a dotted name at its last `.`; a name without dots is global.
    pub fn parse(source: &str) -> Self {
        match source.rsplit_once('.') {
            Some((namespace, name)) => Self::new(namespace, name),
            None => Self::global(source),
        }
    }

    pub fn is_global(&self) -> bool {
        self.namespace.is_empty()
    }
}

/// Joins two namespace paths, treating the empty string as the global namespace.
pub fn join_namespace(outer: &str, inner: &str) -> NamespaceName {
    match (outer.is_empty(), inner.is_empty()) {
        (true, _) => inner.to_string(),
        (false, true) => outer.to_string(),
        (false, false) => format!("{outer}.{inner}"),
    }
}

/// Drops the innermost segment of a namespace path. Returns `None` for the global namespace.
pub fn parent_namespace(namespace: &str) -> Option<&str> {
    if namespace.is_empty() {
        None
    } else {
        Some(namespace.rsplit_once('.').map(|(outer, _)| outer).unwrap_or(""))
    }
}

/// Returns `true` if `namespace` is `reserved` or nested inside it.
pub fn is_within_namespace(namespace: &str, reserved: &str) -> bool {
    namespace == reserved
        || namespace
            .strip_prefix(reserved)
            .is_some_and(|rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_at_last_dot() {
        let id = Identifier::parse("acme.users.Account");
        assert_eq!(id, Identifier::new("acme.users", "Account"));
        assert_eq!(id.to_string(), "acme.users.Account");
    }

    #[test]
    fn parse_without_dot_is_global() {
        let id = Identifier::parse("Account");
        assert!(id.is_global());
        assert_eq!(id.to_string(), "Account");
    }

    #[test]
    fn parent_namespace_walks_outward() {
        assert_eq!(parent_namespace("a.b.c"), Some("a.b"));
        assert_eq!(parent_namespace("a"), Some(""));
        assert_eq!(parent_namespace(""), None);
    }

    #[test]
    fn join_handles_global() {
        assert_eq!(join_namespace("", "a"), "a");
        assert_eq!(join_namespace("a", ""), "a");
        assert_eq!(join_namespace("a", "b.c"), "a.b.c");
    }

    #[test]
    fn reserved_prefix_requires_segment_boundary() {
        assert!(is_within_namespace("ks", "ks"));
        assert!(is_within_namespace("ks.util", "ks"));
        assert!(!is_within_namespace("kstream", "ks"));
        assert!(!is_within_namespace("app.ks", "ks"));
    }
}
