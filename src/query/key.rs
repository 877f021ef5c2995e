// Query keys.
// Structured identities for cached queries, compared by value.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One component of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    Bool(bool),
    Int(i64),
    Str(String),
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

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<i32> for KeyPart {
    fn from(value: i32) -> Self {
        KeyPart::Int(value.into())
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        KeyPart::Int(value.into())
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Bool(b) => write!(f, "{}", b),
            KeyPart::Int(i) => write!(f, "{}", i),
            KeyPart::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// Ordered sequence of parts identifying a logical query, e.g. `["foods"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<KeyPart>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Single-part key.
    pub fn of(part: impl Into<KeyPart>) -> Self {
        Self(vec![part.into()])
    }

    /// Extend the key with another part.
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Whether `prefix` matches the leading parts of this key.
    /// Every key starts with itself.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", part)?;
        }
        f.write_str("]")
    }
}
