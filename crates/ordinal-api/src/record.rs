use std::fmt;

use ordinal_core::SortableEntity;
use serde::{Deserialize, Serialize};

/// Partition inside which order keys are comparable (a parent id, a table, ...).
///
/// Keys from different scopes have no relation to each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Scope {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Scope {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// The ordering-relevant projection of a sortable record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedRecord {
    pub id: String,
    pub sort_key: Option<String>,
}

impl OrderedRecord {
    pub fn new(id: impl Into<String>, sort_key: Option<String>) -> Self {
        Self {
            id: id.into(),
            sort_key,
        }
    }

    pub fn keyed(id: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self::new(id, Some(sort_key.into()))
    }

    pub fn unkeyed(id: impl Into<String>) -> Self {
        Self::new(id, None)
    }
}

impl SortableEntity for OrderedRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }
}
