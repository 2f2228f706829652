//! Work item domain types

use serde::{Deserialize, Serialize};

/// A single unit of ingestion work
///
/// An external record id plus an optional classification tag. Work items are
/// produced once by a source enumerator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub label: Option<String>,
}

impl WorkItem {
    /// Creates a work item without label metadata
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }

    /// Creates a work item carrying a classification tag
    pub fn labeled(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: Some(label.into()),
        }
    }
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({})", self.id, label),
            None => write!(f, "{}", self.id),
        }
    }
}
