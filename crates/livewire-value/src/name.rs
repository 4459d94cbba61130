//! Namespace-qualified names: symbols and keywords.

use std::fmt;

/// A possibly namespace-qualified name, shared by [`Symbol`] and [`Keyword`].
///
/// `ns/name` parses into namespace `ns` and name `name`. A bare `/` is a
/// name on its own (the division symbol), not an empty namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct QualifiedName {
    namespace: Option<String>,
    name: String,
}

impl QualifiedName {
    fn new(namespace: Option<&str>, name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_owned),
            name: name.to_owned(),
        }
    }

    fn parse(text: &str) -> Self {
        match text.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() => {
                Self::new(Some(ns), name)
            }
            _ => Self::new(None, text),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A symbol such as `+` or `clojure.core/map`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(QualifiedName);

impl Symbol {
    /// Creates a symbol from an optional namespace and a name.
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self(QualifiedName::new(namespace, name))
    }

    /// Parses `ns/name` or `name`.
    pub fn parse(text: &str) -> Self {
        Self(QualifiedName::parse(text))
    }

    /// The namespace part, if qualified.
    pub fn namespace(&self) -> Option<&str> {
        self.0.namespace.as_deref()
    }

    /// The unqualified name.
    pub fn name(&self) -> &str {
        &self.0.name
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A keyword such as `:bar` or `:user/id`. Stored without the colon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keyword(QualifiedName);

impl Keyword {
    /// Creates a keyword from an optional namespace and a name.
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self(QualifiedName::new(namespace, name))
    }

    /// Parses `ns/name`, `name`, or either with a leading colon.
    pub fn parse(text: &str) -> Self {
        Self(QualifiedName::parse(text.strip_prefix(':').unwrap_or(text)))
    }

    /// The namespace part, if qualified.
    pub fn namespace(&self) -> Option<&str> {
        self.0.namespace.as_deref()
    }

    /// The unqualified name.
    pub fn name(&self) -> &str {
        &self.0.name
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}
