//! Twitter user domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Twitter account as stored by the ingester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwitterUser {
    pub user_id: String,
    pub screen_name: String,
    pub name: String,
    pub description: Option<String>,
    pub followers_count: i64,
    pub friends_count: i64,
    pub created_at: Option<DateTime<Utc>>,
}
