//! Tweet domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tweet as stored by the ingester
///
/// `user_id` may be missing for tweets loaded from datasets that only carry
/// the text; those are repaired later by resolving the author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub user_id: Option<String>,
    pub text: String,
    pub label: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Tweet {
    /// Returns a copy of this tweet tagged with `label`
    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    /// Whether the author of this tweet is still unknown
    pub fn is_missing_user(&self) -> bool {
        self.user_id.as_deref().is_none_or(str::is_empty)
    }
}
