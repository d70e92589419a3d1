use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Primary key value of a stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Integer(i64),
    Uuid(Uuid),
    Text(String),
}

impl Identifier {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "INTEGER",
            Self::Uuid(_) => "UUID",
            Self::Text(_) => "TEXT",
        }
    }

    /// `true` for the zero value of the identifier's type (`0`, nil uuid, empty text).
    ///
    /// An entity whose identifier field still holds its default is treated as
    /// having no identifier.
    pub fn is_default(&self) -> bool {
        match self {
            Self::Integer(i) => *i == 0,
            Self::Uuid(u) => u.is_nil(),
            Self::Text(s) => s.is_empty(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(u) => Some(*u),
            _ => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::Uuid(u) => write!(f, "{}", u),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Identifier {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<Uuid> for Identifier {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}
