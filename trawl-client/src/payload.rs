//! Upstream payload types
//!
//! The subset of the upstream JSON the ingester needs, plus conversions into
//! the domain types from `trawl-core`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use trawl_core::domain::tweet::Tweet;
use trawl_core::domain::user::TwitterUser;

/// Timestamp layout used by the upstream API, e.g. `Wed Oct 10 20:19:24 +0000 2018`
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TweetPayload {
    pub id_str: String,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub user: Option<UserPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserPayload {
    pub id_str: String,
    #[serde(default)]
    pub screen_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub followers_count: i64,
    #[serde(default)]
    pub friends_count: i64,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchPayload {
    #[serde(default)]
    pub statuses: Vec<TweetPayload>,
}

impl SearchPayload {
    /// Screen name of the author of the first matching status
    pub fn first_author(&self) -> Option<String> {
        self.statuses
            .first()
            .and_then(|status| status.user.as_ref())
            .map(|user| user.screen_name.trim_start_matches('@').to_string())
            .filter(|name| !name.is_empty())
    }
}

impl From<TweetPayload> for Tweet {
    fn from(payload: TweetPayload) -> Self {
        Tweet {
            id: payload.id_str,
            user_id: payload.user.map(|user| user.id_str),
            text: payload.full_text.or(payload.text).unwrap_or_default(),
            label: None,
            created_at: payload.created_at.as_deref().and_then(parse_created_at),
        }
    }
}

impl From<UserPayload> for TwitterUser {
    fn from(payload: UserPayload) -> Self {
        TwitterUser {
            user_id: payload.id_str,
            screen_name: payload.screen_name,
            name: payload.name,
            description: payload.description.filter(|d| !d.is_empty()),
            followers_count: payload.followers_count,
            friends_count: payload.friends_count,
            created_at: payload.created_at.as_deref().and_then(parse_created_at),
        }
    }
}

fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, CREATED_AT_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_tweet_conversion_prefers_full_text() {
        let payload: TweetPayload = serde_json::from_str(
            r#"{
                "id_str": "572342978255048705",
                "full_text": "the whole thing",
                "text": "the whole…",
                "created_at": "Mon Mar 02 10:15:00 +0000 2015",
                "user": { "id_str": "1234", "screen_name": "someone" }
            }"#,
        )
        .unwrap();

        let tweet = Tweet::from(payload);
        assert_eq!(tweet.id, "572342978255048705");
        assert_eq!(tweet.user_id.as_deref(), Some("1234"));
        assert_eq!(tweet.text, "the whole thing");
        assert_eq!(tweet.created_at.unwrap().year(), 2015);
        assert!(tweet.label.is_none());
    }

    #[test]
    fn test_user_conversion_drops_empty_description() {
        let payload: UserPayload = serde_json::from_str(
            r#"{ "id_str": "99", "screen_name": "bob", "name": "Bob", "description": "" }"#,
        )
        .unwrap();

        let user = TwitterUser::from(payload);
        assert_eq!(user.user_id, "99");
        assert_eq!(user.followers_count, 0);
        assert!(user.description.is_none());
        assert!(user.created_at.is_none());
    }

    #[test]
    fn test_search_first_author() {
        let payload: SearchPayload = serde_json::from_str(
            r#"{ "statuses": [
                { "id_str": "1", "text": "a", "user": { "id_str": "7", "screen_name": "alice" } },
                { "id_str": "2", "text": "b", "user": { "id_str": "8", "screen_name": "bob" } }
            ] }"#,
        )
        .unwrap();
        assert_eq!(payload.first_author().as_deref(), Some("alice"));

        let empty: SearchPayload = serde_json::from_str(r#"{ "statuses": [] }"#).unwrap();
        assert!(empty.first_author().is_none());
    }
}
